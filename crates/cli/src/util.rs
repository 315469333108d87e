use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Display width of a string, accounting for CJK double-width, emoji, etc.
pub(crate) fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Fit a string into exactly `width` display columns: right-pad when short,
/// cut with a trailing `…` when long.
pub(crate) fn fit(s: &str, width: usize) -> String {
    let w = display_width(s);
    if w <= width {
        return format!("{}{}", s, " ".repeat(width - w));
    }
    if width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for ch in s.chars() {
        let cw = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + cw > width - 1 {
            break;
        }
        out.push(ch);
        used += cw;
    }
    out.push('…');
    used += 1;
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

/// Right-align within `width` columns (no truncation).
pub(crate) fn align_right(s: &str, width: usize) -> String {
    format!("{}{}", " ".repeat(width.saturating_sub(display_width(s))), s)
}
