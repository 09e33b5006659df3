use unicode_width::UnicodeWidthChar;

pub fn char_display_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

pub fn display_width(text: &str) -> usize {
    text.chars().map(char_display_width).sum()
}

/// Splits `text` into rows no wider than `width` columns. Newlines always
/// start a new row; `\r` is ignored. Never returns an empty vector.
pub fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = vec![String::new()];
    let mut used = 0usize;
    for ch in text.chars() {
        match ch {
            '\r' => continue,
            '\n' => {
                rows.push(String::new());
                used = 0;
                continue;
            }
            _ => {}
        }
        let ch_width = char_display_width(ch);
        if used + ch_width > width && used > 0 {
            rows.push(String::new());
            used = 0;
        }
        if let Some(row) = rows.last_mut() {
            row.push(ch);
        }
        used += ch_width;
    }
    rows
}

/// Rows `lines` occupy once wrapped at `width`.
pub fn visual_row_count(lines: &[String], width: usize) -> usize {
    lines.iter().map(|line| wrap_lines(line, width).len()).sum()
}

/// Row and column of the cursor at `cursor_byte` after wrapping at `width`.
pub fn cursor_row_col(text: &str, cursor_byte: usize, width: usize) -> (usize, usize) {
    let width = width.max(1);
    let cursor_byte = clamp_to_char_boundary_left(text, cursor_byte);
    let (mut row, mut col) = (0usize, 0usize);

    for (idx, ch) in text.char_indices() {
        if idx >= cursor_byte {
            break;
        }
        match ch {
            '\r' => continue,
            '\n' => {
                row += 1;
                col = 0;
                continue;
            }
            _ => {}
        }
        let ch_width = char_display_width(ch);
        if col + ch_width > width && col > 0 {
            row += 1;
            col = 0;
        }
        col += ch_width;
    }

    if col >= width {
        (row + 1, 0)
    } else {
        (row, col)
    }
}

/// Cuts `text` to `width` columns, ending in `...` when something was cut.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    if display_width(text) <= width {
        return text.to_string();
    }
    let budget = width.saturating_sub(3);
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let ch_width = char_display_width(ch);
        if used + ch_width > budget {
            break;
        }
        out.push(ch);
        used += ch_width;
    }
    if width >= 3 {
        out.push_str("...");
    }
    out
}

pub fn clamp_to_char_boundary_left(text: &str, cursor: usize) -> usize {
    let mut cursor = cursor.min(text.len());
    while cursor > 0 && !text.is_char_boundary(cursor) {
        cursor -= 1;
    }
    cursor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_counts_wide_characters() {
        assert_eq!(wrap_lines("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(wrap_lines("\u{4f60}\u{597d}\u{4f60}", 4), vec!["\u{4f60}\u{597d}", "\u{4f60}"]);
        assert_eq!(wrap_lines("a\r\nb", 10), vec!["a", "b"]);
        assert_eq!(wrap_lines("", 10), vec![""]);
    }

    #[test]
    fn test_visual_row_count() {
        let lines = vec!["12345678".to_string(), String::new(), "x".to_string()];
        assert_eq!(visual_row_count(&lines, 4), 4);
    }

    #[test]
    fn test_cursor_row_col_wraps_at_width() {
        assert_eq!(cursor_row_col("abcd", 4, 4), (1, 0));
        assert_eq!(cursor_row_col("ab\ncd", 4, 10), (1, 1));
        assert_eq!(cursor_row_col("h\u{e9}", 2, 10), (0, 1));
    }

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("short", 10), "short");
        assert_eq!(truncate_to_width("model:gpt-4o template:x", 10), "model:g...");
    }
}
