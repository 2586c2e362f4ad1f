// Cross-cutting prompt fragments shared by every HTML-producing request.
// The generation prompt compiler owns the request-specific templates.

/// Appended to instructions whose answer is consumed as raw HTML.
pub const HTML_ONLY_OUTPUT: &str = "\
    Return ONLY the HTML code with inline CSS. \
    Do NOT include explanations, apologies or any text outside the HTML. \
    Do NOT wrap the answer in markdown code fences.";

/// Appended to every instruction that produces a resume fragment meant to be
/// embedded in a host page.
pub const EMBEDDING_RULES: &str = "\
    - Use semantic HTML (<header>, <section>, <footer>) and organize content properly.\n\
    - Apply inline CSS only: no <style> blocks, no external stylesheets, no scripts.\n\
    - The resume must not affect or override other components when embedded in a page.\n\
    - Follow accessibility best practices and keep the markup well-structured and readable.";
