use regex::Regex;
use std::sync::OnceLock;

/// Recovers logical lines from the raw bytes a subprocess writes to its
/// terminal.
///
/// Chunks may end anywhere: mid-line, mid-escape-sequence or in the middle of
/// a multi-byte character. Bytes are only decoded once a full line has been
/// seen, so none of those splits leak into the output.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every line it completed, ANSI-stripped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        let mut idx = 0;

        while idx < self.pending.len() {
            match self.pending[idx] {
                b'\n' => {
                    lines.push(decode_line(&self.pending[start..idx]));
                    idx += 1;
                    start = idx;
                }
                b'\r' => {
                    // Hold a trailing CR: its LF may be in the next chunk.
                    if idx + 1 == self.pending.len() {
                        break;
                    }
                    lines.push(decode_line(&self.pending[start..idx]));
                    idx += if self.pending[idx + 1] == b'\n' { 2 } else { 1 };
                    start = idx;
                }
                _ => idx += 1,
            }
        }

        if start > 0 {
            self.pending.drain(..start);
        }
        lines
    }

    /// Flushes the unterminated remainder. Returns `None` when nothing
    /// printable is left.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let rest = rest.strip_suffix(b"\r").unwrap_or(&rest[..]);
        if rest.is_empty() {
            return None;
        }
        let line = decode_line(rest);
        if line.is_empty() {
            None
        } else {
            Some(line)
        }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    strip_ansi(&String::from_utf8_lossy(bytes))
}

fn ansi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"\x1b\[[0-?]*[ -/]*[@-~]",
            r"|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)",
            r"|\x1b[@-Z\\-_]",
            r"|\x{9b}[0-?]*[ -/]*[@-~]",
        ))
        .expect("ansi pattern is a valid regex")
    })
}

/// Removes terminal escape sequences and stray control characters (tabs are
/// kept).
pub fn strip_ansi(text: &str) -> String {
    ansi_pattern()
        .replace_all(text, "")
        .chars()
        .filter(|ch| *ch == '\t' || !ch.is_control())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crlf_split_across_chunks_is_one_boundary() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push(b"hello\r"), Vec::<String>::new());
        assert_eq!(framer.push(b"\nworld"), vec!["hello".to_string()]);
        assert_eq!(framer.finish().as_deref(), Some("world"));
    }

    #[test]
    fn test_lone_carriage_return_splits_progress_redraws() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"10%\r20%\r30%\n");
        assert_eq!(lines, vec!["10%", "20%", "30%"]);
        assert!(framer.is_empty());
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let mut framer = LineFramer::new();
        let bytes = "caf\u{e9} \u{1f527}\n".as_bytes();
        let (head, tail) = bytes.split_at(4);
        assert!(framer.push(head).is_empty());
        assert_eq!(framer.push(tail), vec!["caf\u{e9} \u{1f527}".to_string()]);
    }

    #[test]
    fn test_strip_ansi_removes_csi_osc_and_c1() {
        assert_eq!(strip_ansi("\x1b[1;32mgreen\x1b[0m"), "green");
        assert_eq!(strip_ansi("\x1b]0;title\x07text"), "text");
        assert_eq!(strip_ansi("\x1b]8;;http://x\x1b\\link"), "link");
        assert_eq!(strip_ansi("\u{9b}2Kcleared"), "cleared");
        assert_eq!(strip_ansi("\x1b[?25lhidden\x1b[?25h"), "hidden");
        assert_eq!(strip_ansi("a\tb\x07"), "a\tb");
    }

    #[test]
    fn test_finish_ignores_escape_only_remainder() {
        let mut framer = LineFramer::new();
        framer.push(b"done\n\x1b[0m");
        assert_eq!(framer.finish(), None);
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn test_clear_drops_partial_line() {
        let mut framer = LineFramer::new();
        framer.push(b"partial");
        framer.clear();
        assert_eq!(framer.finish(), None);
    }
}
