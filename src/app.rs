use anyhow::Result;
use tokio::sync::mpsc;

use crate::backend::BackendRegistry;
use crate::config::Config;
use crate::job::{JobEvent, JobRunner};
use crate::runtime::frontend::ScrollAction;
use crate::runtime::mode::RuntimeMode;
use crate::runtime::r#loop::Runtime;
use crate::session::{
    parse_user_command, NoticeLevel, Presenter, Session, SessionStatus, UserCommand,
};

const DEFAULT_MAX_HISTORY_LINES: usize = 5000;
const MAX_HISTORY_LINES_ENV: &str = "LLMDECK_MAX_HISTORY_LINES";
const SPINNER_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
const QUIT_HINT: &str = "Press Ctrl+C again to exit.";

struct HistoryState {
    lines: Vec<String>,
    /// Rows above the bottom; zero means following new output.
    scroll_back: usize,
    visible: bool,
}

impl Default for HistoryState {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            scroll_back: 0,
            visible: true,
        }
    }
}

/// Terminal presentation of a session: transcript, status line and notices.
pub struct TuiMode {
    history: HistoryState,
    history_line_cap: usize,
    status: SessionStatus,
    notice: Option<(NoticeLevel, String)>,
    spinner_tick: usize,
    pending_quit: bool,
    quit_requested: bool,
}

impl TuiMode {
    /// Caps the transcript at `$LLMDECK_MAX_HISTORY_LINES` lines.
    pub fn new() -> Self {
        Self::with_history_cap(resolve_history_line_cap())
    }

    pub fn with_history_cap(history_line_cap: usize) -> Self {
        Self {
            history: HistoryState::default(),
            history_line_cap: history_line_cap.max(1),
            status: SessionStatus::default(),
            notice: None,
            spinner_tick: 0,
            pending_quit: false,
            quit_requested: false,
        }
    }

    pub fn history_lines(&self) -> &[String] {
        &self.history.lines
    }

    pub fn scroll_back(&self) -> usize {
        self.history.scroll_back
    }

    pub fn transcript_visible(&self) -> bool {
        self.history.visible
    }

    pub fn notice(&self) -> Option<(NoticeLevel, &str)> {
        self.notice
            .as_ref()
            .map(|(level, message)| (*level, message.as_str()))
    }

    pub fn status_line(&self) -> String {
        if self.status.loading {
            let frame = SPINNER_FRAMES[self.spinner_tick % SPINNER_FRAMES.len()];
            format!("{frame} {}", self.status)
        } else {
            self.status.to_string()
        }
    }

    fn max_scroll_back(&self) -> usize {
        self.history.lines.len().saturating_sub(1)
    }

    fn push_history_lines(&mut self, lines: &[String]) {
        self.history.lines.extend_from_slice(lines);
        if self.history.scroll_back > 0 {
            // Keep the viewed rows in place while output streams in below.
            self.history.scroll_back = (self.history.scroll_back + lines.len()).min(self.max_scroll_back());
        }
        self.enforce_history_cap();
    }

    fn enforce_history_cap(&mut self) {
        let cap = self.history_line_cap;
        if self.history.lines.len() <= cap {
            return;
        }
        let excess = self.history.lines.len() - cap;
        self.history.lines.drain(..excess);
        self.history.scroll_back = self.history.scroll_back.min(self.max_scroll_back());
    }
}

fn resolve_history_line_cap() -> usize {
    std::env::var(MAX_HISTORY_LINES_ENV)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|cap| *cap > 0)
        .unwrap_or(DEFAULT_MAX_HISTORY_LINES)
}

impl Default for TuiMode {
    fn default() -> Self {
        Self::new()
    }
}

impl Presenter for TuiMode {
    fn append_lines(&mut self, lines: &[String]) {
        self.push_history_lines(lines);
    }

    fn set_visible(&mut self, visible: bool) {
        self.history.visible = visible;
    }

    fn focus(&mut self) {
        self.history.scroll_back = 0;
    }

    fn update_status(&mut self, status: &SessionStatus) {
        self.status = status.clone();
    }

    fn notify(&mut self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => tracing::debug!(%message, "notice"),
            NoticeLevel::Warn => tracing::warn!(%message, "notice"),
            NoticeLevel::Error => tracing::error!(%message, "notice"),
        }
        self.notice = Some((level, message.to_string()));
    }
}

impl RuntimeMode for TuiMode {
    fn on_user_input(&mut self, input: String) -> Option<UserCommand> {
        self.pending_quit = false;
        self.notice = None;
        match parse_user_command(&input) {
            Ok(command) => Some(command),
            Err(err) => {
                self.notify(NoticeLevel::Warn, &err.to_string());
                None
            }
        }
    }

    fn on_idle_interrupt(&mut self) {
        if self.pending_quit {
            self.quit_requested = true;
        } else {
            self.pending_quit = true;
            self.notify(NoticeLevel::Info, QUIT_HINT);
        }
    }

    fn on_scroll(&mut self, action: ScrollAction) {
        let max = self.max_scroll_back();
        let back = &mut self.history.scroll_back;
        *back = match action {
            ScrollAction::LineUp => back.saturating_add(1),
            ScrollAction::LineDown => back.saturating_sub(1),
            ScrollAction::PageUp(step) => back.saturating_add(step.max(1)),
            ScrollAction::PageDown(step) => back.saturating_sub(step.max(1)),
            ScrollAction::Home => max,
            ScrollAction::End => 0,
        }
        .min(max);
    }

    fn on_tick(&mut self) {
        if self.status.loading {
            self.spinner_tick = self.spinner_tick.wrapping_add(1);
        }
    }

    fn quit_requested(&self) -> bool {
        self.quit_requested
    }
}

/// Wires config, backend, transport and session into a runtime for the TUI.
pub fn build_runtime(config: Config) -> Result<Runtime<TuiMode>> {
    let registry = BackendRegistry::with_defaults(&config);
    let backend = registry.resolve(&config.backend)?;
    let runner = JobRunner::new(config.transport.build()).with_cwd(config.working_dir.clone());
    let (events_tx, events_rx) = mpsc::unbounded_channel::<JobEvent>();

    tracing::info!(
        backend = backend.name(),
        binary = %config.binary,
        transport = ?config.transport,
        "session ready"
    );
    let session = Session::new(config, backend, runner, events_tx);
    let mut mode = TuiMode::new();
    mode.update_status(&session.status());
    Ok(Runtime::new(mode, session, events_rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScopedEnv;

    fn test_mode() -> TuiMode {
        TuiMode::with_history_cap(DEFAULT_MAX_HISTORY_LINES)
    }

    fn lines(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line-{i}")).collect()
    }

    #[test]
    fn test_transcript_does_not_exceed_cap() {
        let mut mode = {
            let mut env = ScopedEnv::new();
            env.set(MAX_HISTORY_LINES_ENV, "10");
            TuiMode::new()
        };

        for chunk in 0..5 {
            mode.append_lines(&lines(4));
            assert!(mode.history_lines().len() <= 10, "chunk {chunk}");
        }
        assert_eq!(mode.history_lines().len(), 10);
        assert_eq!(mode.history_lines()[9], "line-3");
    }

    #[test]
    fn test_history_cap_env_invalid_uses_default() {
        let mut env = ScopedEnv::new();
        env.set(MAX_HISTORY_LINES_ENV, "invalid-cap");
        let mode = TuiMode::new();
        assert_eq!(mode.history_line_cap, DEFAULT_MAX_HISTORY_LINES);
    }

    #[test]
    fn test_scroll_back_is_kept_while_output_streams() {
        let mut mode = test_mode();
        mode.append_lines(&lines(50));
        mode.on_scroll(ScrollAction::PageUp(10));
        assert_eq!(mode.scroll_back(), 10);

        mode.append_lines(&lines(3));
        assert_eq!(mode.scroll_back(), 13);

        mode.on_scroll(ScrollAction::End);
        mode.append_lines(&lines(3));
        assert_eq!(mode.scroll_back(), 0);

        mode.on_scroll(ScrollAction::Home);
        assert_eq!(mode.scroll_back(), 55);
        mode.focus();
        assert_eq!(mode.scroll_back(), 0);
    }

    #[test]
    fn test_explicit_cap_ignores_environment() {
        let mut env = ScopedEnv::new();
        env.set(MAX_HISTORY_LINES_ENV, "2");
        let mut mode = TuiMode::with_history_cap(4);
        mode.append_lines(&lines(6));
        assert_eq!(mode.history_lines(), ["line-2", "line-3", "line-4", "line-5"]);
    }

    #[test]
    fn test_double_idle_interrupt_requests_quit() {
        let mut mode = test_mode();
        mode.on_idle_interrupt();
        assert!(!mode.quit_requested());
        assert_eq!(mode.notice(), Some((NoticeLevel::Info, QUIT_HINT)));

        mode.on_user_input("hello".into());
        mode.on_idle_interrupt();
        assert!(!mode.quit_requested(), "typing disarms the quit");
        mode.on_idle_interrupt();
        assert!(mode.quit_requested());
    }

    #[test]
    fn test_bad_command_becomes_warning() {
        let mut mode = test_mode();
        assert_eq!(mode.on_user_input("/nope".into()), None);
        assert!(matches!(mode.notice(), Some((NoticeLevel::Warn, _))));
        assert_eq!(
            mode.on_user_input("/reset".into()),
            Some(UserCommand::ResetContext)
        );
    }

    #[test]
    fn test_status_line_spins_while_loading() {
        let mut mode = test_mode();
        mode.update_status(&SessionStatus {
            model: Some("gpt-4o".into()),
            loading: true,
            ..SessionStatus::default()
        });
        let first = mode.status_line();
        mode.on_tick();
        let second = mode.status_line();
        assert_ne!(first, second);
        assert!(second.ends_with("model:gpt-4o"));
    }

    #[tokio::test]
    async fn test_build_runtime_uses_configured_backend() {
        let runtime = build_runtime(Config::default()).expect("runtime");
        assert!(!runtime.session.is_busy());

        let config = Config {
            backend: "missing".into(),
            ..Config::default()
        };
        assert!(build_runtime(config).is_err());
    }
}
