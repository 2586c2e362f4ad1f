//! Prompt Compiler: turns a resume snapshot (or a free-text brief) plus a user
//! instruction into a single generation request.
//!
//! Pure: no I/O, no clock. The uniqueness token is an argument, so the same
//! inputs always compile to the same request.

use crate::generation::prompts::{
    COLD_START_TEMPLATE, CONTEXT_TEMPLATE, CURRENT_DOCUMENT_BLOCK, HTML_FIELD_OUTPUT,
    IMAGE_CONVERSION_PROMPT, IMAGE_CONVERSION_SYSTEM, NAMESPACING_RULES, PREVIOUS_REQUESTS_BLOCK,
    PROJECTS_SECTION, TEMPLATE_FIELDS_OUTPUT,
};
use crate::llm_client::gateway::{OutputShape, ShapeField};
use crate::llm_client::prompts::{EMBEDDING_RULES, HTML_ONLY_OUTPUT};
use crate::models::resume::ResumeSnapshot;

/// Header/footer background when the resume has no theme color yet.
pub const DEFAULT_THEME_COLOR: &str = "#1f2937";
pub const BODY_TEXT_COLOR: &str = "#333333";
const LIGHT_TEXT: &str = "#ffffff";
const DARK_TEXT: &str = "#111111";
/// Earlier instructions echoed back into a refinement prompt.
const MAX_PREVIOUS_REQUESTS: usize = 10;

pub const HTML_FIELD: &str = "html";
pub const TEMPLATE_FIELDS: [&str; 6] = [
    "jobtitle",
    "aboutme",
    "experience",
    "education",
    "skills",
    "projects",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn from_dark_flag(is_dark: bool) -> Self {
        if is_dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

/// A fully-rendered request for the generation gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPrompt {
    pub instructions: String,
    pub user_message: String,
    pub output_shape: Option<OutputShape>,
}

pub fn namespace_prefix(token: u64) -> String {
    format!("resume-{token}")
}

pub fn container_id(token: u64) -> String {
    format!("{}-container", namespace_prefix(token))
}

pub fn html_shape() -> OutputShape {
    OutputShape {
        name: "resume_schema",
        fields: vec![ShapeField {
            name: HTML_FIELD,
            description: Some("The complete resume as one self-contained HTML fragment"),
            required: true,
        }],
    }
}

pub fn template_shape() -> OutputShape {
    OutputShape {
        name: "resume_schema",
        fields: TEMPLATE_FIELDS
            .iter()
            .map(|&name| ShapeField {
                name,
                description: (name == "projects").then_some("GitHub links if provided"),
                required: name != "projects",
            })
            .collect(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Variants
// ────────────────────────────────────────────────────────────────────────────

/// Cold start: no stored resume, only the candidate's free-text brief.
pub fn compile_cold_start(
    brief: &str,
    theme: Theme,
    with_template: bool,
    token: u64,
) -> CompiledPrompt {
    let (projects_section, output_rules, output_shape) = if with_template {
        (PROJECTS_SECTION, TEMPLATE_FIELDS_OUTPUT, template_shape())
    } else {
        ("", HTML_FIELD_OUTPUT, html_shape())
    };

    let instructions = render(
        COLD_START_TEMPLATE,
        &[
            ("theme", theme.as_str()),
            ("embedding_rules", EMBEDDING_RULES),
            ("projects_section", projects_section),
            ("namespacing", &namespacing(token)),
            ("output_rules", output_rules),
        ],
    );

    CompiledPrompt {
        instructions,
        user_message: brief.trim().to_string(),
        output_shape: Some(output_shape),
    }
}

/// Refinement of an existing resume. The snapshot is expected to already carry
/// any color change made in the same request, and the instruction as its last
/// user turn.
pub fn compile_with_context(
    snapshot: &ResumeSnapshot,
    instruction: &str,
    token: u64,
) -> CompiledPrompt {
    let color = non_empty(snapshot.resume.color.as_deref()).unwrap_or(DEFAULT_THEME_COLOR);

    let current_document = non_empty(snapshot.resume.rendered_html.as_deref())
        .map(|html| render(CURRENT_DOCUMENT_BLOCK, &[("html", html)]))
        .unwrap_or_default();

    let previous = previous_requests(snapshot, instruction);
    let previous_requests = if previous.is_empty() {
        String::new()
    } else {
        render(PREVIOUS_REQUESTS_BLOCK, &[("requests", &previous)])
    };

    let instructions = render(
        CONTEXT_TEMPLATE,
        &[
            ("color", color),
            ("header_text_color", contrast_text_color(color)),
            ("body_text_color", BODY_TEXT_COLOR),
            ("embedding_rules", EMBEDDING_RULES),
            ("namespacing", &namespacing(token)),
            ("html_only_output", HTML_ONLY_OUTPUT),
            ("previous_requests", &previous_requests),
            ("current_document", &current_document),
            ("resume_context", &render_resume_context(snapshot)),
        ],
    );

    CompiledPrompt {
        instructions,
        user_message: instruction.trim().to_string(),
        output_shape: None,
    }
}

pub fn compile_image_conversion() -> CompiledPrompt {
    CompiledPrompt {
        instructions: format!("{IMAGE_CONVERSION_SYSTEM} {HTML_ONLY_OUTPUT}"),
        user_message: IMAGE_CONVERSION_PROMPT.to_string(),
        output_shape: None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fragments
// ────────────────────────────────────────────────────────────────────────────

fn namespacing(token: u64) -> String {
    render(NAMESPACING_RULES, &[("prefix", &namespace_prefix(token))])
}

/// Fills `{name}` placeholders in a single left-to-right pass over `template`.
/// Substituted values are never rescanned, and unknown names are left as written.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let hit = tail.find('}').and_then(|close| {
            let name = &tail[1..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match hit {
            Some((close, value)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn present(value: &str) -> Option<&str> {
    non_empty(Some(value))
}

/// Serializes every known field as labeled lines. Sections with no data are
/// omitted entirely.
pub fn render_resume_context(snapshot: &ResumeSnapshot) -> String {
    let resume = &snapshot.resume;
    let mut lines: Vec<String> = Vec::new();

    let scalars = [
        ("Full name", resume.full_name.as_deref()),
        ("Email", resume.email.as_deref()),
        ("Phone", resume.phone_number.as_deref()),
        ("Profession", resume.working_profession.as_deref()),
        ("Summary", resume.career_summary.as_deref()),
    ];
    for (label, value) in scalars {
        if let Some(value) = non_empty(value) {
            lines.push(format!("{label}: {value}"));
        }
    }

    let skills: Vec<&str> = resume
        .skills
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if !skills.is_empty() {
        lines.push(format!("Skills: {}", skills.join(", ")));
    }

    push_section(
        &mut lines,
        "Experience",
        snapshot.experience.iter().map(|e| {
            join_parts(&[
                present(&e.job_title).map(str::to_string),
                present(&e.company_name).map(|c| format!("at {c}")),
                present(&e.duration).map(|d| format!("({d})")),
            ])
        }),
    );

    push_section(
        &mut lines,
        "Education",
        snapshot.education.iter().map(|e| {
            join_parts(&[
                present(&e.degree).map(str::to_string),
                present(&e.institution).map(|i| format!("at {i}")),
                present(&e.graduated_year).map(|y| format!("({y})")),
            ])
        }),
    );

    push_section(
        &mut lines,
        "Certifications",
        snapshot.certifications.iter().map(|c| {
            join_parts(&[
                present(&c.name).map(str::to_string),
                present(&c.issuer).map(|i| format!("issued by {i}")),
                c.date_issued.map(|d| format!("on {d}")),
                non_empty(c.deployed_url.as_deref()).map(|u| format!("<{u}>")),
            ])
        }),
    );

    push_section(
        &mut lines,
        "Projects",
        snapshot.projects.iter().map(|p| {
            let stack: Vec<&str> = p
                .tech_stack
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect();
            join_parts(&[
                present(&p.title).map(|t| format!("{t}:")),
                present(&p.description).map(str::to_string),
                (!stack.is_empty()).then(|| format!("[stack: {}]", stack.join(", "))),
                non_empty(p.link.as_deref()).map(|l| format!("<{l}>")),
            ])
        }),
    );

    lines.join("\n")
}

fn push_section(lines: &mut Vec<String>, label: &str, items: impl Iterator<Item = String>) {
    let items: Vec<String> = items.filter(|i| !i.is_empty()).collect();
    if items.is_empty() {
        return;
    }
    lines.push(format!("{label}:"));
    for (n, item) in items.iter().enumerate() {
        lines.push(format!("  {}. {item}", n + 1));
    }
}

fn join_parts(parts: &[Option<String>]) -> String {
    parts
        .iter()
        .flatten()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Earlier user instructions, oldest first, excluding the one being applied now.
fn previous_requests(snapshot: &ResumeSnapshot, instruction: &str) -> String {
    let mut requests: Vec<&str> = snapshot
        .conversation
        .iter()
        .filter(|t| t.is_user())
        .map(|t| t.message.trim())
        .collect();
    if requests.last() == Some(&instruction.trim()) {
        requests.pop();
    }
    let skip = requests.len().saturating_sub(MAX_PREVIOUS_REQUESTS);
    requests
        .iter()
        .skip(skip)
        .map(|r| format!("- {r}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// White or near-black text, whichever reads better on `background`.
/// Non-hex colors (CSS names, rgb()) get white text.
pub fn contrast_text_color(background: &str) -> &'static str {
    let hex = background.trim().trim_start_matches('#');
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return LIGHT_TEXT,
    };
    let channel = |i: usize| {
        expanded
            .get(i..i + 2)
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
    };
    let (Some(r), Some(g), Some(b)) = (channel(0), channel(2), channel(4)) else {
        return LIGHT_TEXT;
    };

    // Perceived brightness (ITU-R BT.601 weights).
    let brightness = (299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000;
    if brightness > 150 {
        DARK_TEXT
    } else {
        LIGHT_TEXT
    }
}
