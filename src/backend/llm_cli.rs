use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;

use super::{Backend, ConversationSummary, ModelInfo};
use crate::command::{build_command, CommandOptions};
use crate::config::Config;

const BACKEND_NAME: &str = "llm";
const ALIASES_MARKER: &str = " (aliases: ";

/// Backend for the `llm` command-line tool.
#[derive(Debug, Clone)]
pub struct LlmCliBackend {
    binary: String,
    working_dir: Option<PathBuf>,
}

impl LlmCliBackend {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            working_dir: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            binary: config.binary.clone(),
            working_dir: Some(config.working_dir.clone()),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Runs a listing subcommand and returns its stdout, or `None` after
    /// logging why it could not be used.
    async fn query(&self, args: &[&str]) -> Option<String> {
        let mut command = tokio::process::Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let output = match command.output().await {
            Ok(output) => output,
            Err(err) => {
                tracing::warn!(binary = %self.binary, ?args, error = %err, "backend query failed to start");
                return None;
            }
        };
        if !output.status.success() {
            tracing::warn!(
                binary = %self.binary,
                ?args,
                code = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "backend query exited unsuccessfully"
            );
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Backend for LlmCliBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn build_command(&self, options: &CommandOptions) -> Vec<String> {
        build_command(&self.binary, options)
    }

    async fn list_models(&self) -> Vec<ModelInfo> {
        self.query(&["models", "list"])
            .await
            .map(|out| parse_models(&out))
            .unwrap_or_default()
    }

    async fn list_templates(&self) -> Vec<String> {
        self.query(&["templates", "list"])
            .await
            .map(|out| parse_templates(&out))
            .unwrap_or_default()
    }

    async fn list_tools(&self) -> Vec<String> {
        self.query(&["tools", "list", "--json"])
            .await
            .map(|out| parse_tools(&out))
            .unwrap_or_default()
    }

    async fn history(&self, limit: usize) -> Vec<ConversationSummary> {
        let limit = limit.to_string();
        self.query(&["logs", "list", "--json", "-n", &limit])
            .await
            .map(|out| parse_history(&out))
            .unwrap_or_default()
    }
}

/// Parses `Provider: model-id (aliases: a, b)` lines. The trailing
/// `Default: <id>` line and anything unrecognised are skipped.
pub fn parse_models(output: &str) -> Vec<ModelInfo> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with("Default:") {
                return None;
            }
            let (provider, rest) = line.split_once(": ")?;
            let (id, aliases) = match rest.split_once(ALIASES_MARKER) {
                Some((id, tail)) => {
                    let aliases = tail
                        .trim_end_matches(')')
                        .split(',')
                        .map(str::trim)
                        .filter(|alias| !alias.is_empty())
                        .map(str::to_string)
                        .collect();
                    (id, aliases)
                }
                None => (rest, Vec::new()),
            };
            let id = id.trim();
            if provider.trim().is_empty() || id.is_empty() {
                return None;
            }
            Some(ModelInfo {
                provider: provider.trim().to_string(),
                id: id.to_string(),
                aliases,
            })
        })
        .collect()
}

/// Parses `name : summary` lines into template names.
pub fn parse_templates(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let name = line.split_once(" : ").map_or(line, |(name, _)| name).trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

#[derive(Deserialize)]
struct ToolListing {
    #[serde(default)]
    tools: Vec<ToolEntry>,
}

#[derive(Deserialize)]
struct ToolEntry {
    name: String,
}

pub fn parse_tools(output: &str) -> Vec<String> {
    match serde_json::from_str::<ToolListing>(output) {
        Ok(listing) => listing.tools.into_iter().map(|tool| tool.name).collect(),
        Err(err) => {
            tracing::warn!(error = %err, "malformed tool listing");
            Vec::new()
        }
    }
}

#[derive(Deserialize)]
struct LogEntry {
    conversation_id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    datetime_utc: Option<String>,
}

/// Groups log entries by conversation. `llm logs list` prints newest first,
/// so conversations keep that order while the last entry seen for each one
/// supplies its opening prompt, model and start time.
pub fn parse_history(output: &str) -> Vec<ConversationSummary> {
    let entries: Vec<LogEntry> = match serde_json::from_str(output) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(error = %err, "malformed conversation log listing");
            return Vec::new();
        }
    };

    let mut summaries: Vec<ConversationSummary> = Vec::new();
    for entry in entries {
        let Some(id) = entry.conversation_id.filter(|id| !id.is_empty()) else {
            continue;
        };
        if let Some(summary) = summaries.iter_mut().find(|summary| summary.id == id) {
            if let Some(prompt) = entry.prompt {
                summary.first_prompt = prompt;
            }
            if entry.model.is_some() {
                summary.model = entry.model;
            }
            if entry.datetime_utc.is_some() {
                summary.started_at = entry.datetime_utc;
            }
            continue;
        }
        summaries.push(ConversationSummary {
            id,
            model: entry.model,
            first_prompt: entry.prompt.unwrap_or_default(),
            started_at: entry.datetime_utc,
        });
    }
    summaries
}
