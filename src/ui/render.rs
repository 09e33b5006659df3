use crate::session::NoticeLevel;
use crate::ui::input_metrics::{cursor_row_col, truncate_to_width, visual_row_count, wrap_lines};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};

const HIDDEN_TRANSCRIPT_HINT: &str = "transcript hidden (/show to bring it back)";

pub fn input_visual_rows(input: &str, width: usize) -> usize {
    wrap_lines(input, width).len()
}

fn transcript_style(line: &str) -> Style {
    if line.starts_with("> ") {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else if line.starts_with('\u{1f527}') {
        Style::default().fg(Color::Magenta)
    } else if line.starts_with('[') && line.ends_with(']') {
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC)
    } else {
        Style::default().fg(Color::White)
    }
}

pub fn styled_transcript(lines: &[String]) -> Vec<Line<'_>> {
    lines
        .iter()
        .map(|line| Line::styled(line.as_str(), transcript_style(line)))
        .collect()
}

/// First row to show so that the view sits `scroll_back` rows above the
/// bottom of the transcript.
pub fn transcript_top_row(total_rows: usize, viewport_rows: usize, scroll_back: usize) -> usize {
    let bottom_top = total_rows.saturating_sub(viewport_rows);
    bottom_top.saturating_sub(scroll_back)
}

pub fn render_transcript(
    frame: &mut Frame<'_>,
    area: Rect,
    lines: &[String],
    scroll_back: usize,
    visible: bool,
) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    if !visible {
        frame.render_widget(
            Paragraph::new(HIDDEN_TRANSCRIPT_HINT)
                .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM)),
            area,
        );
        return;
    }

    let total = visual_row_count(lines, area.width as usize);
    let top = transcript_top_row(total, area.height as usize, scroll_back);
    let paragraph = Paragraph::new(styled_transcript(lines))
        .wrap(Wrap { trim: false })
        .scroll((top.min(u16::MAX as usize) as u16, 0));
    frame.render_widget(paragraph, area);
}

pub fn render_status_line(
    frame: &mut Frame<'_>,
    area: Rect,
    status: &str,
    notice: Option<(NoticeLevel, &str)>,
) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    let width = area.width as usize;
    let status = truncate_to_width(status, width);
    let mut spans = vec![Span::styled(
        status.clone(),
        Style::default().fg(Color::DarkGray),
    )];

    if let Some((level, message)) = notice {
        let remaining = width.saturating_sub(status.chars().count() + 3);
        if remaining > 0 {
            let color = match level {
                NoticeLevel::Info => Color::Green,
                NoticeLevel::Warn => Color::Yellow,
                NoticeLevel::Error => Color::Red,
            };
            spans.push(Span::raw(" | "));
            spans.push(Span::styled(
                truncate_to_width(message, remaining),
                Style::default().fg(color),
            ));
        }
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

pub fn render_input(frame: &mut Frame<'_>, area: Rect, input: &str, cursor_byte: usize) {
    if area.height == 0 || area.width <= 2 {
        return;
    }

    let input_width = area.width.saturating_sub(2).max(1) as usize;
    let rows = wrap_lines(input, input_width);
    let (cursor_row, cursor_col) = cursor_row_col(input, cursor_byte, input_width);
    let visible_rows = area.height as usize;
    let window_start = cursor_row.saturating_add(1).saturating_sub(visible_rows);

    let rendered: Vec<Line<'_>> = (0..visible_rows)
        .map(|offset| {
            let row_index = window_start + offset;
            let prefix = if row_index == 0 { "> " } else { "  " };
            let row = rows.get(row_index).cloned().unwrap_or_default();
            Line::from(format!("{prefix}{row}"))
        })
        .collect();

    frame.render_widget(
        Paragraph::new(rendered).style(Style::default().fg(Color::Gray).bg(Color::Rgb(24, 24, 24))),
        area,
    );

    let cursor_y = area
        .y
        .saturating_add(cursor_row.saturating_sub(window_start) as u16);
    let cursor_x = area
        .x
        .saturating_add(2 + cursor_col as u16)
        .min(area.x.saturating_add(area.width.saturating_sub(1)));
    frame.set_cursor_position((cursor_x, cursor_y));
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    #[test]
    fn test_top_row_follows_bottom_and_scroll_back() {
        assert_eq!(transcript_top_row(100, 20, 0), 80);
        assert_eq!(transcript_top_row(100, 20, 30), 50);
        assert_eq!(transcript_top_row(100, 20, 500), 0);
        assert_eq!(transcript_top_row(5, 20, 0), 0);
    }

    #[test]
    fn test_transcript_styles() {
        assert_eq!(transcript_style("> hi").fg, Some(Color::Cyan));
        assert_eq!(transcript_style("[cancelled]").fg, Some(Color::DarkGray));
        assert_eq!(transcript_style("\u{1f527} llm_time()").fg, Some(Color::Magenta));
        assert_eq!(transcript_style("plain").fg, Some(Color::White));
    }

    #[test]
    fn test_render_transcript_shows_latest_rows() {
        let backend = TestBackend::new(20, 2);
        let mut terminal = Terminal::new(backend).expect("terminal");
        let lines: Vec<String> = ["one", "two", "three"].iter().map(|s| s.to_string()).collect();
        terminal
            .draw(|frame| render_transcript(frame, frame.area(), &lines, 0, true))
            .expect("draw");

        let buffer = terminal.backend().buffer();
        let row = |y: u16| -> String {
            (0..buffer.area.width)
                .map(|x| buffer[(x, y)].symbol().to_string())
                .collect::<String>()
        };
        assert!(row(0).starts_with("two"));
        assert!(row(1).starts_with("three"));
    }
}
