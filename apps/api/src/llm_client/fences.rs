//! Post-processing of raw model text.
//!
//! Contract: if the text starts with a code-fence delimiter (optionally tagged,
//! e.g. "```html") and/or ends with one, those delimiters are removed and the
//! remainder trimmed. Anything else passes through unchanged apart from
//! surrounding whitespace. Fences in the middle of the text are left alone.

const FENCE: &str = "```";

pub fn strip_fences(text: &str) -> &str {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix(FENCE) {
        // Drop the info string ("html", "json", ...) up to the end of the line.
        body = match rest.find('\n') {
            Some(newline) if is_info_string(&rest[..newline]) => &rest[newline + 1..],
            None if is_info_string(rest) => "",
            _ => rest,
        };
    }

    if let Some(rest) = body.trim_end().strip_suffix(FENCE) {
        body = rest;
    }

    body.trim()
}

fn is_info_string(s: &str) -> bool {
    s.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.'))
}
