use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub fn format_mib(mib: u64) -> String {
    format!("{mib} MiB")
}

/// Cut `s` to at most `max_width` terminal columns, marking the cut with an
/// ellipsis.
pub fn truncate_display(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let budget = max_width.saturating_sub(1);
    let mut width = 0;
    let mut out: String = s
        .chars()
        .take_while(|ch| {
            width += ch.width().unwrap_or(0);
            width <= budget
        })
        .collect();
    out.push('\u{2026}');
    out
}
