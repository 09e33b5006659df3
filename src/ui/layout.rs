use ratatui::layout::{Constraint, Direction, Layout, Rect};

pub const MAX_INPUT_ROWS: u16 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Panes {
    pub status: Rect,
    pub transcript: Rect,
    pub input: Rect,
}

/// Status line on top, transcript in the middle, input at the bottom.
pub fn split_panes(area: Rect, input_rows: u16) -> Panes {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(input_rows.clamp(1, MAX_INPUT_ROWS)),
        ])
        .split(area);

    Panes {
        status: chunks[0],
        transcript: chunks[1],
        input: chunks[2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_splits_into_three_panes() {
        let panes = split_panes(Rect::new(0, 0, 80, 20), 3);

        assert_eq!(panes.status.height, 1);
        assert_eq!(panes.transcript.height, 16);
        assert_eq!(panes.input.height, 3);
        assert_eq!(panes.transcript.y, 1);
        assert_eq!(panes.input.y, 17);
    }

    #[test]
    fn input_rows_are_clamped() {
        let panes = split_panes(Rect::new(0, 0, 80, 20), 40);
        assert_eq!(panes.input.height, MAX_INPUT_ROWS);
        let panes = split_panes(Rect::new(0, 0, 80, 20), 0);
        assert_eq!(panes.input.height, 1);
    }
}
