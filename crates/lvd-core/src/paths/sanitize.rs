//! Portable path-component sanitization.

const MAX_CHARS: usize = 200;
const RESERVED: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Sanitizes a string for use as one path component on any desktop OS.
///
/// - Replaces `<>:"/\|?*` and control characters with `_`
/// - Trims leading/trailing dots and whitespace
/// - Collapses runs of underscores and whitespace into a single `_`
/// - Prefixes Windows device names (`CON`, `COM1`, ...) with `_`
/// - Limits length to 200 characters; empty input becomes `file`
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if RESERVED.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());

    let mut out = String::with_capacity(trimmed.len());
    let mut in_run = false;
    for c in trimmed.chars() {
        if c == '_' || c.is_whitespace() {
            if !in_run {
                out.push('_');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }

    if is_device_name(&out) {
        out.insert(0, '_');
    }

    let out: String = out.chars().take(MAX_CHARS).collect();
    if out.is_empty() {
        "file".to_string()
    } else {
        out
    }
}

fn is_device_name(s: &str) -> bool {
    let upper = s.to_ascii_uppercase();
    match upper.as_str() {
        "CON" | "PRN" | "AUX" | "NUL" => true,
        _ => {
            let mut chars = upper.chars();
            match chars.next_back() {
                Some('1'..='9') => matches!(chars.as_str(), "COM" | "LPT"),
                _ => false,
            }
        }
    }
}
