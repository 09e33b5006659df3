use serde_json::Value;
use std::collections::BTreeMap;

use crate::util::extension_of;

pub const DEFAULT_CHAIN_LIMIT: u32 = 100;

/// Marks the end of flags so a prompt starting with `-` stays a prompt.
pub const END_OF_OPTIONS: &str = "--";

/// Extensions sent as binary attachments (`-a`) rather than text fragments (`-f`).
#[rustfmt::skip]
const ATTACHMENT_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "webp", "bmp", "tiff", "tif", "heic", "heif", "svg", "ico",
    // documents
    "pdf",
    // audio
    "mp3", "wav", "ogg", "flac", "m4a", "aac",
    // video
    "mp4", "mov", "webm", "avi", "mkv",
    // archives
    "zip", "tar", "gz", "tgz", "bz2", "xz", "7z",
];

/// Which conversation a request belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Continuation {
    /// Start a fresh conversation.
    #[default]
    New,
    /// Continue the most recent conversation.
    Latest,
    /// Continue a specific conversation by id.
    Conversation(String),
}

impl From<bool> for Continuation {
    fn from(value: bool) -> Self {
        if value {
            Continuation::Latest
        } else {
            Continuation::New
        }
    }
}

impl From<String> for Continuation {
    fn from(id: String) -> Self {
        Continuation::Conversation(id)
    }
}

impl From<&str> for Continuation {
    fn from(id: &str) -> Self {
        Continuation::Conversation(id.to_string())
    }
}

/// Everything that shapes one invocation of the external tool.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOptions {
    pub prompt: String,
    pub model: Option<String>,
    pub template: Option<String>,
    pub continuation: Continuation,
    pub show_usage: bool,
    pub no_stream: bool,
    /// Drops the tool-enabling defaults.
    pub raw: bool,
    pub ctx_files: Vec<String>,
    pub tools: Vec<String>,
    pub functions: Vec<String>,
    pub online: bool,
    pub system_prompt: Option<String>,
    pub model_options: BTreeMap<String, Value>,
    pub chain_limit: u32,
}

impl CommandOptions {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            template: None,
            continuation: Continuation::New,
            show_usage: false,
            no_stream: false,
            raw: false,
            ctx_files: Vec::new(),
            tools: Vec::new(),
            functions: Vec::new(),
            online: false,
            system_prompt: None,
            model_options: BTreeMap::new(),
            chain_limit: DEFAULT_CHAIN_LIMIT,
        }
    }
}

pub fn is_attachment(path: &str) -> bool {
    extension_of(path).is_some_and(|ext| ATTACHMENT_EXTENSIONS.contains(&ext.as_str()))
}

fn option_value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Builds the argument vector for one request. Pure: same inputs, same
/// output, and the prompt is always last, right after `--`.
pub fn build_command(binary: &str, options: &CommandOptions) -> Vec<String> {
    let mut argv = vec![binary.to_string()];
    let mut push = |parts: &[&str]| argv.extend(parts.iter().map(|part| part.to_string()));

    if !options.raw {
        push(&["--td", "--cl", &options.chain_limit.to_string()]);
    }
    if options.no_stream {
        push(&["--no-stream"]);
    }
    match &options.continuation {
        Continuation::Conversation(id) => push(&["--cid", id]),
        Continuation::Latest => push(&["-c"]),
        Continuation::New => {}
    }
    if options.show_usage {
        push(&["-u"]);
    }
    if let Some(model) = &options.model {
        push(&["-m", model]);
    }
    for path in &options.ctx_files {
        let flag = if is_attachment(path) { "-a" } else { "-f" };
        push(&[flag, path]);
    }
    for tool in &options.tools {
        push(&["-T", tool]);
    }
    for function in &options.functions {
        push(&["--functions", function]);
    }
    if options.online {
        push(&["-o", "online", "1"]);
    }
    if let Some(system) = &options.system_prompt {
        push(&["-s", system]);
    }
    for (key, value) in &options.model_options {
        push(&["-o", key, &option_value_text(value)]);
    }
    if let Some(template) = &options.template {
        push(&["-t", template]);
    }
    push(&[END_OF_OPTIONS, &options.prompt]);

    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_command_enables_tools_by_default() {
        let argv = build_command("llm", &CommandOptions::new("hello"));
        assert_eq!(argv, vec!["llm", "--td", "--cl", "100", "--", "hello"]);
    }

    #[test]
    fn test_raw_drops_tool_flags() {
        let mut options = CommandOptions::new("hello");
        options.raw = true;
        options.chain_limit = 5;
        assert_eq!(build_command("llm", &options), vec!["llm", "--", "hello"]);
    }

    #[test]
    fn test_continuation_flags() {
        let mut options = CommandOptions::new("p");
        options.raw = true;

        options.continuation = true.into();
        assert_eq!(build_command("llm", &options), vec!["llm", "-c", "--", "p"]);

        options.continuation = "01abc".into();
        assert_eq!(
            build_command("llm", &options),
            vec!["llm", "--cid", "01abc", "--", "p"]
        );

        options.continuation = false.into();
        assert_eq!(build_command("llm", &options), vec!["llm", "--", "p"]);
    }

    #[test]
    fn test_full_flag_order() {
        let mut options = CommandOptions::new("explain");
        options.no_stream = true;
        options.continuation = Continuation::Latest;
        options.show_usage = true;
        options.model = Some("gpt-4o".into());
        options.ctx_files = vec!["a.rs".into()];
        options.tools = vec!["llm_time".into()];
        options.functions = vec!["def f(): pass".into()];
        options.online = true;
        options.system_prompt = Some("be brief".into());
        options.model_options.insert("temperature".into(), json!(0.2));
        options.model_options.insert("stop".into(), json!("END"));
        options.template = Some("review".into());
        options.chain_limit = 7;

        assert_eq!(
            build_command("/usr/bin/llm", &options),
            vec![
                "/usr/bin/llm",
                "--td",
                "--cl",
                "7",
                "--no-stream",
                "-c",
                "-u",
                "-m",
                "gpt-4o",
                "-f",
                "a.rs",
                "-T",
                "llm_time",
                "--functions",
                "def f(): pass",
                "-o",
                "online",
                "1",
                "-s",
                "be brief",
                "-o",
                "stop",
                "END",
                "-o",
                "temperature",
                "0.2",
                "-t",
                "review",
                "--",
                "explain",
            ]
        );
    }

    #[test]
    fn test_attachment_detection() {
        assert!(is_attachment("scan.PDF"));
        assert!(is_attachment("https://x.test/cat.jpeg?size=large"));
        assert!(is_attachment("backup.tar.gz"));
        assert!(!is_attachment("notes.md"));
        assert!(!is_attachment("Dockerfile"));
    }

    #[test]
    fn test_every_attachment_category_is_recognised() {
        for path in ["icon.ico", "memo.pdf", "talk.aac", "voice.mp3", "clip.mkv", "demo.mp4", "src.7z"] {
            assert!(is_attachment(path), "{path}");
        }
    }
}
