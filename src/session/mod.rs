pub mod command;
pub mod hooks;

use anyhow::{bail, Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::backend::Backend;
use crate::command::{CommandOptions, Continuation};
use crate::config::{Config, HookCommand};
use crate::context::{ContextAccumulator, Snippet};
use crate::job::{JobEvent, JobExit, JobRunner, Usage};
use crate::util::{filetype_for_path, is_url, truncate_chars};

pub use command::{parse_user_command, ParseCommandError, Selection, UserCommand};

const CONTEXT_PREVIEW_CHARS: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

/// Everything the status line shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStatus {
    pub model: Option<String>,
    pub template: Option<String>,
    pub loading: bool,
    pub usage: Usage,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model:{}", self.model.as_deref().unwrap_or("default"))?;
        if let Some(template) = &self.template {
            write!(f, " template:{template}")?;
        }
        if self.usage.input > 0 || self.usage.output > 0 {
            write!(
                f,
                " tokens:{}in/{}out",
                self.usage.input, self.usage.output
            )?;
        }
        if self.usage.cost > 0.0 {
            write!(f, " cost:${:.4}", self.usage.cost)?;
        }
        Ok(())
    }
}

/// Presentation surface driven by the session.
pub trait Presenter {
    fn append_lines(&mut self, lines: &[String]);
    fn set_visible(&mut self, visible: bool);
    fn focus(&mut self);
    fn update_status(&mut self, status: &SessionStatus);
    fn notify(&mut self, level: NoticeLevel, message: &str);
}

/// Whether the caller should keep running after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub model: Option<String>,
    pub template: Option<String>,
    pub continuation: Continuation,
    pub usage: Usage,
    pub context: ContextAccumulator,
}

impl SessionState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model.clone(),
            template: config.template.clone(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
struct Turn {
    output_lines: usize,
}

/// One chat session: its state, the job runner, and the backend that turns
/// prompts into commands.
pub struct Session {
    config: Config,
    backend: Arc<dyn Backend>,
    runner: JobRunner,
    events_tx: mpsc::UnboundedSender<JobEvent>,
    state: SessionState,
    turn: Option<Turn>,
}

impl Session {
    pub fn new(
        config: Config,
        backend: Arc<dyn Backend>,
        runner: JobRunner,
        events_tx: mpsc::UnboundedSender<JobEvent>,
    ) -> Self {
        let state = SessionState::from_config(&config);
        Self {
            config,
            backend,
            runner,
            events_tx,
            state,
            turn: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// True from a successful submit until that job's `Exit` has been
    /// handled, which can be later than the process itself ending.
    pub fn is_busy(&self) -> bool {
        self.runner.is_busy() || self.turn.is_some()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            model: self.state.model.clone(),
            template: self.state.template.clone(),
            loading: self.turn.is_some(),
            usage: self.state.usage,
        }
    }

    fn refresh_status<P: Presenter + ?Sized>(&self, presenter: &mut P) {
        presenter.update_status(&self.status());
    }

    fn command_options(&self, prompt: String) -> CommandOptions {
        let mut options = CommandOptions::new(prompt);
        options.model = self.state.model.clone();
        options.template = self.state.template.clone();
        options.continuation = self.state.continuation.clone();
        options.show_usage = self.config.show_usage;
        options.no_stream = self.config.no_stream;
        options.raw = !self.backend.supports_tools();
        options.ctx_files = self.state.context.fragments().to_vec();
        options.tools = self.state.context.tools().to_vec();
        options.functions = self.state.context.functions().to_vec();
        options.online = self.config.online;
        options.system_prompt = self.config.system_prompt.clone();
        options.model_options = self.config.model_options.clone();
        options.chain_limit = self.config.chain_limit;
        options
    }

    async fn run_hook_into_context<P: Presenter + ?Sized>(
        &mut self,
        hook: &HookCommand,
        presenter: &mut P,
    ) {
        match hooks::run_hook(hook, &self.config.working_dir).await {
            Ok(Some(Snippet {
                filepath,
                filetype,
                text,
            })) => self.state.context.add_snippet(&text, &filepath, &filetype),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "hook failed");
                presenter.notify(NoticeLevel::Warn, &format!("{err:#}"));
            }
        }
    }

    /// Sends `input` with the collected context. Returns whether a job was
    /// started; rejections are reported through the presenter.
    pub async fn submit<P: Presenter + ?Sized>(&mut self, input: &str, presenter: &mut P) -> bool {
        if self.is_busy() {
            presenter.notify(
                NoticeLevel::Warn,
                "A request is already running. Cancel it first.",
            );
            return false;
        }
        let input = input.trim();
        if input.is_empty() {
            presenter.notify(NoticeLevel::Warn, "Nothing to send.");
            return false;
        }

        if let Some(hook) = self.config.hooks.pre.clone() {
            self.run_hook_into_context(&hook, presenter).await;
        }

        let prompt = self.state.context.render_prompt(input);
        let argv = self.backend.build_command(&self.command_options(prompt));
        if let Err(err) = self.runner.start(argv, self.events_tx.clone()) {
            tracing::warn!(error = %err, "failed to start job");
            presenter.notify(NoticeLevel::Error, &err.to_string());
            return false;
        }

        self.turn = Some(Turn::default());
        let echo: Vec<String> = input.lines().map(|line| format!("> {line}")).collect();
        presenter.append_lines(&echo);
        presenter.set_visible(true);
        presenter.focus();
        self.refresh_status(presenter);
        true
    }

    pub async fn handle_event<P: Presenter + ?Sized>(&mut self, event: JobEvent, presenter: &mut P) {
        match event {
            JobEvent::Line(line) => {
                if let Some(turn) = self.turn.as_mut() {
                    turn.output_lines += 1;
                }
                presenter.append_lines(&[line]);
            }
            JobEvent::Usage(usage) => {
                self.state.usage += usage;
                self.refresh_status(presenter);
            }
            JobEvent::Exit(exit) => self.finish_turn(exit, presenter).await,
        }
    }

    async fn finish_turn<P: Presenter + ?Sized>(&mut self, exit: JobExit, presenter: &mut P) {
        let turn = self.turn.take().unwrap_or_default();

        let note = if exit.cancelled {
            Some("[cancelled]".to_string())
        } else if exit.code != 0 {
            Some(format!("[exited with code {}]", exit.code))
        } else if turn.output_lines == 0 {
            Some("[no output]".to_string())
        } else {
            None
        };
        let mut lines: Vec<String> = note.into_iter().collect();
        lines.push(String::new());
        presenter.append_lines(&lines);

        if exit.success() {
            if self.state.continuation == Continuation::New {
                self.state.continuation = Continuation::Latest;
            }
            if self.config.reset_context_per_prompt {
                self.state.context.reset();
            }
        }
        if !exit.cancelled {
            if let Some(hook) = self.config.hooks.post.clone() {
                self.run_hook_into_context(&hook, presenter).await;
            }
        }
        self.refresh_status(presenter);
    }

    /// Returns `false` when nothing was running.
    pub fn cancel<P: Presenter + ?Sized>(&mut self, presenter: &mut P) -> bool {
        let cancelled = self.runner.cancel();
        // The process may already be gone with its Exit still queued.
        if !cancelled && self.turn.is_none() {
            presenter.notify(NoticeLevel::Info, "Nothing to cancel.");
        }
        cancelled
    }

    /// Stops any running job and returns to the configured defaults.
    pub fn new_chat<P: Presenter + ?Sized>(&mut self, presenter: &mut P) {
        self.runner.cancel();
        self.state = SessionState::from_config(&self.config);
        presenter.notify(NoticeLevel::Info, "Started a new chat.");
        self.refresh_status(presenter);
    }

    pub fn set_model(&mut self, model: Option<String>) {
        self.state.model = model;
    }

    pub fn set_template(&mut self, template: Option<String>) {
        self.state.template = template;
    }

    /// Continues the latest conversation, or `id` when given.
    pub fn continue_with(&mut self, id: Option<String>) {
        self.state.continuation = id.map_or(Continuation::Latest, Continuation::Conversation);
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        self.config.working_dir.join(path)
    }

    /// Adds a file or URL fragment. Returns `false` if it was already there.
    pub fn add_file(&mut self, path: &str) -> Result<bool> {
        let path = path.trim();
        if !is_url(path) && !self.resolve_path(path).exists() {
            bail!("No such file: {path}");
        }
        Ok(self.state.context.add_fragment(path))
    }

    /// Inlines a file, or the 1-based inclusive `lines` of it, as a snippet.
    pub fn add_snippet_from_file(&mut self, path: &str, lines: Option<(usize, usize)>) -> Result<()> {
        let content = std::fs::read_to_string(self.resolve_path(path))
            .with_context(|| format!("failed to read {path}"))?;

        let (text, label) = match lines {
            None => (content, path.to_string()),
            Some((start, end)) => {
                let total = content.lines().count();
                if start == 0 || start > end || start > total {
                    bail!("{path} has {total} lines; cannot take {start}-{end}");
                }
                let selected: Vec<&str> = content
                    .lines()
                    .skip(start - 1)
                    .take(end.min(total) - start + 1)
                    .collect();
                (selected.join("\n"), format!("{path}:{start}-{}", end.min(total)))
            }
        };
        self.state
            .context
            .add_snippet(&text, &label, &filetype_for_path(path));
        Ok(())
    }

    pub fn add_tool(&mut self, name: &str) -> Result<bool> {
        if !self.backend.supports_tools() {
            bail!("Backend '{}' does not support tools", self.backend.name());
        }
        Ok(self.state.context.add_tool(name.trim()))
    }

    pub fn add_function(&mut self, text: &str) -> bool {
        self.state.context.add_function(text.trim())
    }

    pub fn reset_context(&mut self) {
        self.state.context.reset();
    }

    /// One human-readable line per context item.
    pub fn context_lines(&self) -> Vec<String> {
        let context = &self.state.context;
        let mut lines = Vec::new();
        lines.extend(context.fragments().iter().map(|f| format!("fragment  {f}")));
        lines.extend(context.snippets().iter().map(|s| {
            format!(
                "snippet   {} ({}, {} lines)",
                s.filepath,
                s.filetype,
                s.text.lines().count()
            )
        }));
        lines.extend(context.tools().iter().map(|t| format!("tool      {t}")));
        lines.extend(context.functions().iter().map(|f| {
            let first = f.lines().next().unwrap_or_default();
            format!("function  {}", truncate_chars(first, CONTEXT_PREVIEW_CHARS))
        }));
        lines
    }

    fn show_listing<P: Presenter + ?Sized>(
        presenter: &mut P,
        title: &str,
        entries: Vec<String>,
        empty: &str,
    ) {
        if entries.is_empty() {
            presenter.notify(NoticeLevel::Warn, empty);
            return;
        }
        let mut lines = vec![format!("{title}:")];
        lines.extend(entries.into_iter().map(|entry| format!("  {entry}")));
        lines.push(String::new());
        presenter.append_lines(&lines);
        presenter.set_visible(true);
    }

    fn report<T, P: Presenter + ?Sized>(presenter: &mut P, result: Result<T>, done: impl FnOnce(T) -> String) {
        match result {
            Ok(value) => presenter.notify(NoticeLevel::Info, &done(value)),
            Err(err) => presenter.notify(NoticeLevel::Warn, &format!("{err:#}")),
        }
    }

    /// Applies one parsed user command.
    pub async fn execute<P: Presenter + ?Sized>(
        &mut self,
        command: UserCommand,
        presenter: &mut P,
    ) -> Control {
        match command {
            UserCommand::Prompt(text) => {
                self.submit(&text, presenter).await;
            }
            UserCommand::Model(selection) => {
                self.apply_selection("Model", selection, presenter, |state| &mut state.model)
            }
            UserCommand::Template(selection) => {
                self.apply_selection("Template", selection, presenter, |state| &mut state.template)
            }
            UserCommand::AddFile(path) => {
                let result = self.add_file(&path);
                Self::report(presenter, result, |added| {
                    if added {
                        format!("Added {path}")
                    } else {
                        format!("{path} is already in context")
                    }
                });
            }
            UserCommand::Snippet { path, lines } => {
                let result = self.add_snippet_from_file(&path, lines);
                Self::report(presenter, result, |()| format!("Added snippet from {path}"));
            }
            UserCommand::Tool(name) => {
                let result = self.add_tool(&name);
                Self::report(presenter, result, |added| {
                    if added {
                        format!("Enabled tool {name}")
                    } else {
                        format!("Tool {name} is already enabled")
                    }
                });
            }
            UserCommand::Function(text) => {
                let message = if self.add_function(&text) {
                    "Added function"
                } else {
                    "Function is already in context"
                };
                presenter.notify(NoticeLevel::Info, message);
            }
            UserCommand::ShowContext => {
                let lines = self.context_lines();
                Self::show_listing(presenter, "Context", lines, "Context is empty.");
            }
            UserCommand::ResetContext => {
                self.reset_context();
                presenter.notify(NoticeLevel::Info, "Context cleared.");
            }
            UserCommand::NewChat => self.new_chat(presenter),
            UserCommand::Continue(id) => {
                let message = match &id {
                    Some(id) => format!("Continuing conversation {id}"),
                    None => "Continuing the latest conversation".to_string(),
                };
                self.continue_with(id);
                presenter.notify(NoticeLevel::Info, &message);
            }
            UserCommand::ListModels => {
                let models = self.backend.list_models().await;
                let entries = models
                    .into_iter()
                    .map(|m| {
                        if m.aliases.is_empty() {
                            format!("{} ({})", m.id, m.provider)
                        } else {
                            format!("{} ({}; aliases: {})", m.id, m.provider, m.aliases.join(", "))
                        }
                    })
                    .collect();
                Self::show_listing(presenter, "Models", entries, "No models reported.");
            }
            UserCommand::ListTemplates => {
                let templates = self.backend.list_templates().await;
                Self::show_listing(presenter, "Templates", templates, "No templates reported.");
            }
            UserCommand::ListTools => {
                let tools = self.backend.list_tools().await;
                Self::show_listing(presenter, "Tools", tools, "No tools reported.");
            }
            UserCommand::History(limit) => {
                let history = self.backend.history(limit).await;
                let entries = history
                    .into_iter()
                    .map(|c| {
                        format!(
                            "{}  {}  {}",
                            c.id,
                            c.model.as_deref().unwrap_or("?"),
                            truncate_chars(
                                c.first_prompt.lines().next().unwrap_or_default(),
                                CONTEXT_PREVIEW_CHARS
                            )
                        )
                    })
                    .collect();
                Self::show_listing(presenter, "Conversations", entries, "No conversations found.");
            }
            UserCommand::Cancel => {
                self.cancel(presenter);
            }
            UserCommand::Show => presenter.set_visible(true),
            UserCommand::Hide => presenter.set_visible(false),
            UserCommand::Help => {
                let lines = command::HELP_LINES.iter().map(|line| line.to_string()).collect();
                Self::show_listing(presenter, "Commands", lines, "");
            }
            UserCommand::Quit => {
                self.runner.cancel();
                return Control::Quit;
            }
        }
        Control::Continue
    }

    fn apply_selection<P: Presenter + ?Sized>(
        &mut self,
        label: &str,
        selection: Selection,
        presenter: &mut P,
        field: impl FnOnce(&mut SessionState) -> &mut Option<String>,
    ) {
        let slot = field(&mut self.state);
        let message = match selection {
            Selection::Show => format!(
                "{label}: {}",
                slot.as_deref().unwrap_or("(tool default)")
            ),
            Selection::Clear => {
                *slot = None;
                format!("{label} cleared")
            }
            Selection::Set(name) => {
                let message = format!("{label} set to {name}");
                *slot = Some(name);
                message
            }
        };
        presenter.notify(NoticeLevel::Info, &message);
        self.refresh_status(presenter);
    }
}
