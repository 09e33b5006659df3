use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::runtime::frontend::ScrollAction;
use crate::ui::input_metrics::clamp_to_char_boundary_left;

const PAGE_ROWS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    None,
    Submit(String),
    Interrupt,
    Quit,
    Scroll(ScrollAction),
}

/// Prompt line editor with multi-line input and recall of earlier prompts.
#[derive(Debug, Default)]
pub struct InputEditor {
    buffer: String,
    cursor: usize,
    history: Vec<String>,
    history_index: Option<usize>,
    /// Unsent text saved while browsing history.
    stash: Option<String>,
}

impl InputEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn prev_boundary(&self, idx: usize) -> usize {
        let idx = clamp_to_char_boundary_left(&self.buffer, idx);
        self.buffer[..idx]
            .char_indices()
            .next_back()
            .map_or(0, |(i, _)| i)
    }

    fn next_boundary(&self, idx: usize) -> usize {
        let idx = clamp_to_char_boundary_left(&self.buffer, idx);
        self.buffer[idx..]
            .chars()
            .next()
            .map_or(self.buffer.len(), |ch| idx + ch.len_utf8())
    }

    fn leave_history(&mut self) {
        self.history_index = None;
        self.stash = None;
    }

    pub fn insert_str(&mut self, value: &str) {
        self.leave_history();
        let cursor = clamp_to_char_boundary_left(&self.buffer, self.cursor);
        self.buffer.insert_str(cursor, value);
        self.cursor = cursor + value.len();
    }

    pub fn backspace(&mut self) {
        let end = clamp_to_char_boundary_left(&self.buffer, self.cursor);
        if end == 0 {
            return;
        }
        self.leave_history();
        let start = self.prev_boundary(end);
        self.buffer.replace_range(start..end, "");
        self.cursor = start;
    }

    pub fn delete(&mut self) {
        let start = clamp_to_char_boundary_left(&self.buffer, self.cursor);
        if start >= self.buffer.len() {
            return;
        }
        self.leave_history();
        let end = self.next_boundary(start);
        self.buffer.replace_range(start..end, "");
        self.cursor = start;
    }

    /// Takes the buffer for sending. Blank input stays in the editor.
    pub fn submit(&mut self) -> Option<String> {
        if self.buffer.trim().is_empty() {
            return None;
        }
        let value = std::mem::take(&mut self.buffer);
        if self.history.last() != Some(&value) {
            self.history.push(value.clone());
        }
        self.cursor = 0;
        self.leave_history();
        Some(value)
    }

    pub fn history_up(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let next = match self.history_index {
            Some(idx) => idx.saturating_sub(1),
            None => {
                self.stash = Some(self.buffer.clone());
                self.history.len() - 1
            }
        };
        self.history_index = Some(next);
        self.buffer = self.history[next].clone();
        self.cursor = self.buffer.len();
    }

    pub fn history_down(&mut self) {
        let Some(idx) = self.history_index else {
            return;
        };
        if idx + 1 < self.history.len() {
            self.history_index = Some(idx + 1);
            self.buffer = self.history[idx + 1].clone();
        } else {
            self.history_index = None;
            self.buffer = self.stash.take().unwrap_or_default();
        }
        self.cursor = self.buffer.len();
    }

    pub fn apply_event(&mut self, event: Event) -> EditorAction {
        match event {
            Event::Paste(text) => {
                self.insert_str(&text);
                EditorAction::None
            }
            Event::Key(key) if key.kind != KeyEventKind::Release => self.apply_key(key),
            _ => EditorAction::None,
        }
    }

    pub fn apply_key(&mut self, key: KeyEvent) -> EditorAction {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => return EditorAction::Interrupt,
            KeyCode::Char('d') if ctrl => {
                if self.buffer.is_empty() {
                    return EditorAction::Quit;
                }
                self.delete();
            }
            KeyCode::Char('j') if ctrl => self.insert_str("\n"),
            KeyCode::Char('u') if ctrl => {
                self.leave_history();
                self.buffer.clear();
                self.cursor = 0;
            }
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) => self.insert_str("\n"),
            KeyCode::Enter => {
                if let Some(value) = self.submit() {
                    return EditorAction::Submit(value);
                }
            }
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.cursor = self.prev_boundary(self.cursor),
            KeyCode::Right => self.cursor = self.next_boundary(self.cursor),
            KeyCode::Home if ctrl => return EditorAction::Scroll(ScrollAction::Home),
            KeyCode::End if ctrl => return EditorAction::Scroll(ScrollAction::End),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.buffer.len(),
            KeyCode::Up if ctrl => return EditorAction::Scroll(ScrollAction::LineUp),
            KeyCode::Down if ctrl => return EditorAction::Scroll(ScrollAction::LineDown),
            KeyCode::Up => self.history_up(),
            KeyCode::Down => self.history_down(),
            KeyCode::PageUp => return EditorAction::Scroll(ScrollAction::PageUp(PAGE_ROWS)),
            KeyCode::PageDown => return EditorAction::Scroll(ScrollAction::PageDown(PAGE_ROWS)),
            KeyCode::Char(ch) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
                self.insert_str(&ch.to_string())
            }
            _ => {}
        }
        EditorAction::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn type_text(editor: &mut InputEditor, text: &str) {
        for ch in text.chars() {
            editor.apply_key(key(KeyCode::Char(ch)));
        }
    }

    #[test]
    fn test_unicode_cursor_editing() {
        let mut editor = InputEditor::new();
        type_text(&mut editor, "h\u{e9}\u{4f60}");
        editor.apply_key(key(KeyCode::Left));
        editor.apply_key(key(KeyCode::Backspace));
        assert_eq!(editor.buffer(), "h\u{4f60}");
        editor.apply_key(key(KeyCode::Delete));
        assert_eq!(editor.buffer(), "h");
        assert_eq!(editor.cursor(), 1);
    }

    #[test]
    fn test_submit_and_recall() {
        let mut editor = InputEditor::new();
        type_text(&mut editor, "first");
        assert_eq!(
            editor.apply_key(key(KeyCode::Enter)),
            EditorAction::Submit("first".into())
        );
        type_text(&mut editor, "draft");
        editor.apply_key(key(KeyCode::Up));
        assert_eq!(editor.buffer(), "first");
        editor.apply_key(key(KeyCode::Down));
        assert_eq!(editor.buffer(), "draft");
    }

    #[test]
    fn test_blank_submit_is_ignored_and_multiline_kept() {
        let mut editor = InputEditor::new();
        type_text(&mut editor, "  ");
        assert_eq!(editor.apply_key(key(KeyCode::Enter)), EditorAction::None);

        let mut editor = InputEditor::new();
        type_text(&mut editor, "a");
        editor.apply_key(ctrl('j'));
        type_text(&mut editor, "b");
        assert_eq!(
            editor.apply_key(key(KeyCode::Enter)),
            EditorAction::Submit("a\nb".into())
        );
    }

    #[test]
    fn test_control_keys() {
        let mut editor = InputEditor::new();
        assert_eq!(editor.apply_key(ctrl('c')), EditorAction::Interrupt);
        assert_eq!(editor.apply_key(ctrl('d')), EditorAction::Quit);
        assert_eq!(
            editor.apply_key(key(KeyCode::PageUp)),
            EditorAction::Scroll(ScrollAction::PageUp(PAGE_ROWS))
        );
        editor.apply_event(Event::Paste("pasted".into()));
        editor.apply_key(ctrl('u'));
        assert_eq!(editor.buffer(), "");
    }
}
