//! Pulling a JSON document out of free-form model text.

/// Strip a leading/trailing markdown fence (```json ... ```), if present.
pub(crate) fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "JSON", ...).
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Locate the first `{` or `[` and return the balanced document starting
/// there, honoring string literals and escapes. Both delimiter kinds are
/// tracked together, so a document whose braces and brackets do not nest
/// properly is rejected. Returns `None` when no balanced document exists.
pub(crate) fn extract_json(text: &str) -> Option<&str> {
    let text = strip_fences(text);
    let start = text.find(['{', '['])?;

    let mut expected_closers: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in text.as_bytes()[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            _ if in_string => {}
            b'{' => expected_closers.push(b'}'),
            b'[' => expected_closers.push(b']'),
            b'}' | b']' => {
                if expected_closers.pop() != Some(b) {
                    return None;
                }
                if expected_closers.is_empty() {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
