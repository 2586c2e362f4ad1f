// All LLM prompt templates for the generation module.
// Placeholders are filled by `generation::compiler`; shared fragments live in
// `llm_client::prompts`.

/// Cold-start instructions. Replace: {theme}, {embedding_rules},
/// {projects_section}, {namespacing}, {output_rules}
pub const COLD_START_TEMPLATE: &str = r#"You are an expert in generating professional, responsive HTML resumes with inline CSS.
Generate a clean, modern, and visually appealing resume using only HTML with inline styles.

- The resume must use a **{theme}** theme with a {theme} background and contrasting text.
- Use modern fonts, soft shadows and subtle accent colors.
- The layout must be mobile-friendly and adapt to different screen sizes without external CSS or media queries.
{embedding_rules}

Include sections for:
- Name & Contact Information
- About Me
- Experience
- Education
- Skills
{projects_section}

NAMESPACING (mandatory):
{namespacing}

The resume content comes from the candidate's brief in the next message. Use only facts from the brief; never invent employers, dates or credentials.

{output_rules}"#;

pub const PROJECTS_SECTION: &str = "- Projects (include GitHub links if provided)";

pub const HTML_FIELD_OUTPUT: &str =
    "Return the complete resume fragment as a single string in the `html` field.";

pub const TEMPLATE_FIELDS_OUTPUT: &str = "Return each section as its own HTML fragment in the matching field: \
`jobtitle` (name, title and contact line), `aboutme`, `experience`, `education`, `skills`, \
and `projects` when the brief mentions any projects.";

/// Context-aware instructions. Replace: {color}, {header_text_color},
/// {body_text_color}, {embedding_rules}, {namespacing}, {html_only_output},
/// {resume_context}, {current_document}, {previous_requests}
pub const CONTEXT_TEMPLATE: &str = r#"You are an expert resume designer refining an HTML resume through a conversation.
Apply the user's latest instruction (the next message) to the resume described below and return the complete updated resume.

RESUME DATA (source of truth; never invent details that are not listed):
{resume_context}
{current_document}{previous_requests}
COLOR RULES:
- Header and footer background color: {color}.
- Header and footer text color: {header_text_color}, so it contrasts with the header background.
- Body text color: {body_text_color}.

{embedding_rules}

NAMESPACING (mandatory):
{namespacing}

{html_only_output}"#;

/// Replace: {html}
pub const CURRENT_DOCUMENT_BLOCK: &str = "
CURRENT DOCUMENT (modify this rather than starting over; keep what the instruction does not change):
{html}
";

/// Replace: {requests}
pub const PREVIOUS_REQUESTS_BLOCK: &str = "
EARLIER INSTRUCTIONS (already applied, oldest first):
{requests}
";

/// Replace: {prefix}
pub const NAMESPACING_RULES: &str = "\
- Every class name and id MUST be prefixed with '{prefix}-'.\n\
- Wrap the entire resume in exactly one parent element with id '{prefix}-container'.";

pub const IMAGE_CONVERSION_SYSTEM: &str = "You are an expert in converting images of resume \
    templates into pixel-perfect HTML and CSS code.";

pub const IMAGE_CONVERSION_PROMPT: &str = r#"The attached image shows a resume template. Convert it into an exact HTML replica, including all colors, fonts, alignments, and visual details.

Requirements:
1. Exact replica: reproduce the structure, colors, fonts, and layout of the image using inline CSS for every style.
2. Colors: use the exact hex codes or RGB values for backgrounds, text and borders.
3. Fonts: use the same font families and sizes; when a font is unavailable pick the closest alternative and name it in an HTML comment.
4. Alignment: align every element exactly as in the image using text-align, margin, padding and flexbox.
5. Sections: include every section visible in the image (e.g. Name, Contact Information, About Me, Experience, Education, Skills, Projects) using <header>, <section> and <footer>.
6. Responsiveness: the layout must adapt to different screen sizes.
7. Comments: add short HTML comments explaining each section."#;
