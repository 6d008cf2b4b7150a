//! Tool name humanization.

/// Split a camelCase, snake_case or kebab-case identifier into space separated
/// words. Letter case is preserved.
pub fn humanize(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 8);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch == '_' || ch == '-' || ch.is_whitespace() {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
            prev_lower = false;
            continue;
        }
        if ch.is_ascii_uppercase() && prev_lower {
            out.push(' ');
        }
        out.push(ch);
        prev_lower = ch.is_ascii_lowercase();
    }
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out
}
