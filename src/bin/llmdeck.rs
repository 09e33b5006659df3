use anyhow::{bail, Result};
use crossterm::event;
use ratatui::widgets::Clear;
use std::path::PathBuf;
use std::time::Duration;

use llmdeck::app::{build_runtime, TuiMode};
use llmdeck::config::Config;
use llmdeck::logging;
use llmdeck::runtime::frontend::{FrontendAdapter, UserInputEvent};
use llmdeck::terminal::TerminalGuard;
use llmdeck::ui::editor::{EditorAction, InputEditor};
use llmdeck::ui::layout::split_panes;
use llmdeck::ui::render::{input_visual_rows, render_input, render_status_line, render_transcript};

const POLL_INTERVAL: Duration = Duration::from_millis(16);
const USAGE: &str = "usage: llmdeck [--config <path>]";

struct ManagedTuiFrontend {
    terminal: TerminalGuard,
    editor: InputEditor,
    quit: bool,
}

impl ManagedTuiFrontend {
    fn new() -> Result<Self> {
        let terminal = TerminalGuard::enter()?;
        Self::drain_startup_events();
        Ok(Self {
            terminal,
            editor: InputEditor::new(),
            quit: false,
        })
    }

    /// Drops input queued before the screen was ready (e.g. terminal replies).
    fn drain_startup_events() {
        for _ in 0..1024 {
            match event::poll(Duration::from_millis(0)) {
                Ok(true) => {
                    if event::read().is_err() {
                        break;
                    }
                }
                Ok(false) | Err(_) => break,
            }
        }
    }
}

impl FrontendAdapter<TuiMode> for ManagedTuiFrontend {
    fn poll_user_input(&mut self, _mode: &TuiMode) -> Option<UserInputEvent> {
        let Ok(has_event) = event::poll(POLL_INTERVAL) else {
            self.quit = true;
            return None;
        };
        if !has_event {
            return None;
        }
        let Ok(ev) = event::read() else {
            self.quit = true;
            return None;
        };

        match self.editor.apply_event(ev) {
            EditorAction::None => None,
            EditorAction::Submit(text) => Some(UserInputEvent::Text(text)),
            EditorAction::Interrupt => Some(UserInputEvent::Interrupt),
            EditorAction::Scroll(action) => Some(UserInputEvent::Scroll(action)),
            EditorAction::Quit => {
                self.quit = true;
                None
            }
        }
    }

    fn render(&mut self, mode: &TuiMode) {
        let status = mode.status_line();
        let notice = mode.notice();
        let input = self.editor.buffer();
        let cursor = self.editor.cursor();

        let drawn = self.terminal.draw(|frame| {
            let area = frame.area();
            frame.render_widget(Clear, area);
            let input_width = area.width.saturating_sub(2).max(1) as usize;
            let input_rows = input_visual_rows(input, input_width) as u16;
            let panes = split_panes(area, input_rows);

            render_status_line(frame, panes.status, &status, notice);
            render_transcript(
                frame,
                panes.transcript,
                mode.history_lines(),
                mode.scroll_back(),
                mode.transcript_visible(),
            );
            render_input(frame, panes.input, input, cursor);
        });
        if let Err(err) = drawn {
            tracing::error!(error = %err, "failed to draw frame");
            self.quit = true;
        }
    }

    fn should_quit(&self) -> bool {
        self.quit
    }
}

fn parse_args() -> Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    let mut config_path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => match args.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => bail!("--config needs a path\n{USAGE}"),
            },
            "--help" | "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other => bail!("unexpected argument '{other}'\n{USAGE}"),
        }
    }
    Ok(config_path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = parse_args()?;
    logging::init();

    let config = Config::load(config_path.as_deref())?;
    config.validate()?;

    let mut runtime = build_runtime(config)?;
    let mut frontend = ManagedTuiFrontend::new()?;
    runtime.run(&mut frontend).await;
    Ok(())
}
