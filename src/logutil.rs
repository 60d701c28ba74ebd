//! Helpers for logging player-supplied text (chat commands, display names) on one line.

const MAX_PREVIEW: usize = 120;

/// Escape `s` for single-line logging and cap it at a short preview.
///
/// Newlines, tabs and other control characters become visible escapes; backslashes are
/// doubled so escapes stay unambiguous.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 4);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:04x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out
}
