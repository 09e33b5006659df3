use thiserror::Error;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Show the current value, clear it, or set a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Show,
    Clear,
    Set(String),
}

impl Selection {
    fn parse(arg: &str) -> Self {
        match arg {
            "" => Selection::Show,
            "-" => Selection::Clear,
            name => Selection::Set(name.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Prompt(String),
    Model(Selection),
    Template(Selection),
    AddFile(String),
    Snippet {
        path: String,
        /// 1-based inclusive line range.
        lines: Option<(usize, usize)>,
    },
    Tool(String),
    Function(String),
    ShowContext,
    ResetContext,
    NewChat,
    Continue(Option<String>),
    ListModels,
    ListTemplates,
    ListTools,
    History(usize),
    Cancel,
    Show,
    Hide,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseCommandError {
    #[error("unknown command `/{0}` (try /help)")]
    Unknown(String),
    #[error("`/{command}` needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("`/{command}`: invalid argument `{value}`")]
    InvalidArgument { command: &'static str, value: String },
}

pub const HELP_LINES: &[&str] = &[
    "/model [name|-]        show, set or clear the model",
    "/template [name|-]     show, set or clear the template",
    "/add <path|url>        attach a file or URL",
    "/snippet <path>[:a-b]  inline a file, optionally lines a to b",
    "/tool <name>           enable a tool",
    "/function <code>       add a function definition",
    "/context               list collected context",
    "/reset                 clear collected context",
    "/new                   start a new conversation",
    "/continue [id]         continue the latest or a given conversation",
    "/models /templates /tools",
    "/history [n]           recent conversations",
    "/cancel                stop the running request",
    "/show /hide            toggle the transcript",
    "/quit",
    "//text                 send text starting with `/`",
];

/// Parses one line of user input. Anything not starting with `/` is a prompt.
pub fn parse_user_command(input: &str) -> Result<UserCommand, ParseCommandError> {
    let trimmed = input.trim();
    let Some(body) = trimmed.strip_prefix('/') else {
        return Ok(UserCommand::Prompt(input.to_string()));
    };
    if body.starts_with('/') {
        return Ok(UserCommand::Prompt(body.to_string()));
    }

    let (name, arg) = match body.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (body, ""),
    };

    let command = match name {
        "model" => UserCommand::Model(Selection::parse(arg)),
        "template" => UserCommand::Template(Selection::parse(arg)),
        "add" => UserCommand::AddFile(required(arg, "add", "a path or URL")?),
        "snippet" => parse_snippet(&required(arg, "snippet", "a path")?)?,
        "tool" => UserCommand::Tool(required(arg, "tool", "a tool name")?),
        "function" => UserCommand::Function(required(arg, "function", "a definition")?),
        "context" => UserCommand::ShowContext,
        "reset" => UserCommand::ResetContext,
        "new" => UserCommand::NewChat,
        "continue" => UserCommand::Continue((!arg.is_empty()).then(|| arg.to_string())),
        "models" => UserCommand::ListModels,
        "templates" => UserCommand::ListTemplates,
        "tools" => UserCommand::ListTools,
        "history" => UserCommand::History(if arg.is_empty() {
            DEFAULT_HISTORY_LIMIT
        } else {
            parse_positive(arg, "history")?
        }),
        "cancel" => UserCommand::Cancel,
        "show" => UserCommand::Show,
        "hide" => UserCommand::Hide,
        "help" => UserCommand::Help,
        "quit" | "q" => UserCommand::Quit,
        other => return Err(ParseCommandError::Unknown(other.to_string())),
    };
    Ok(command)
}

fn required(
    arg: &str,
    command: &'static str,
    argument: &'static str,
) -> Result<String, ParseCommandError> {
    if arg.is_empty() {
        return Err(ParseCommandError::MissingArgument { command, argument });
    }
    Ok(arg.to_string())
}

fn parse_positive(raw: &str, command: &'static str) -> Result<usize, ParseCommandError> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ParseCommandError::InvalidArgument {
            command,
            value: raw.to_string(),
        }),
    }
}

/// `path`, `path:7` or `path:3-9`. A suffix that is not a line spec stays
/// part of the path.
fn parse_snippet(arg: &str) -> Result<UserCommand, ParseCommandError> {
    let Some((path, spec)) = arg.rsplit_once(':') else {
        return Ok(UserCommand::Snippet {
            path: arg.to_string(),
            lines: None,
        });
    };
    if path.is_empty() || spec.is_empty() || !spec.chars().all(|c| c.is_ascii_digit() || c == '-')
    {
        return Ok(UserCommand::Snippet {
            path: arg.to_string(),
            lines: None,
        });
    }

    let invalid = || ParseCommandError::InvalidArgument {
        command: "snippet",
        value: spec.to_string(),
    };
    let (start, end) = match spec.split_once('-') {
        Some((a, b)) => (parse_positive(a, "snippet"), parse_positive(b, "snippet")),
        None => (parse_positive(spec, "snippet"), parse_positive(spec, "snippet")),
    };
    let (start, end) = (start.map_err(|_| invalid())?, end.map_err(|_| invalid())?);
    if start > end {
        return Err(invalid());
    }
    Ok(UserCommand::Snippet {
        path: path.to_string(),
        lines: Some((start, end)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_prompt_verbatim() {
        assert_eq!(
            parse_user_command("  explain this\n"),
            Ok(UserCommand::Prompt("  explain this\n".to_string()))
        );
        assert_eq!(
            parse_user_command("//etc/hosts is odd"),
            Ok(UserCommand::Prompt("/etc/hosts is odd".to_string()))
        );
    }

    #[test]
    fn test_selection_forms() {
        assert_eq!(
            parse_user_command("/model"),
            Ok(UserCommand::Model(Selection::Show))
        );
        assert_eq!(
            parse_user_command("/model -"),
            Ok(UserCommand::Model(Selection::Clear))
        );
        assert_eq!(
            parse_user_command("/template  review "),
            Ok(UserCommand::Template(Selection::Set("review".into())))
        );
    }

    #[test]
    fn test_snippet_ranges() {
        assert_eq!(
            parse_user_command("/snippet src/lib.rs:3-9"),
            Ok(UserCommand::Snippet {
                path: "src/lib.rs".into(),
                lines: Some((3, 9)),
            })
        );
        assert_eq!(
            parse_user_command("/snippet a.py:4"),
            Ok(UserCommand::Snippet {
                path: "a.py".into(),
                lines: Some((4, 4)),
            })
        );
        assert_eq!(
            parse_user_command("/snippet C:notes.txt"),
            Ok(UserCommand::Snippet {
                path: "C:notes.txt".into(),
                lines: None,
            })
        );
        assert!(matches!(
            parse_user_command("/snippet a.py:9-3"),
            Err(ParseCommandError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_arguments_and_errors() {
        assert_eq!(
            parse_user_command("/function def f(x): return x"),
            Ok(UserCommand::Function("def f(x): return x".into()))
        );
        assert_eq!(parse_user_command("/history"), Ok(UserCommand::History(10)));
        assert_eq!(parse_user_command("/history 3"), Ok(UserCommand::History(3)));
        assert_eq!(
            parse_user_command("/continue 01hx"),
            Ok(UserCommand::Continue(Some("01hx".into())))
        );
        assert_eq!(
            parse_user_command("/add"),
            Err(ParseCommandError::MissingArgument {
                command: "add",
                argument: "a path or URL",
            })
        );
        assert!(matches!(
            parse_user_command("/history zero"),
            Err(ParseCommandError::InvalidArgument { .. })
        ));
        assert_eq!(
            parse_user_command("/frobnicate"),
            Err(ParseCommandError::Unknown("frobnicate".into()))
        );
    }
}
