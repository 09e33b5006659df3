use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::command::DEFAULT_CHAIN_LIMIT;
use crate::job::TransportKind;
use crate::util::parse_bool_str;

const CONFIG_PATH_ENV: &str = "LLMDECK_CONFIG";
const BINARY_ENV: &str = "LLMDECK_BINARY";
const MODEL_ENV: &str = "LLMDECK_MODEL";
const TEMPLATE_ENV: &str = "LLMDECK_TEMPLATE";
const CHAIN_LIMIT_ENV: &str = "LLMDECK_CHAIN_LIMIT";
const RESET_CONTEXT_ENV: &str = "LLMDECK_RESET_CONTEXT";

pub const DEFAULT_BINARY: &str = "llm";
pub const DEFAULT_BACKEND: &str = "llm";

/// Backends this build knows how to construct.
pub const KNOWN_BACKENDS: &[&str] = &[DEFAULT_BACKEND];

/// Shell command run around a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookCommand {
    pub command: String,
    /// Add non-blank stdout to the context as a snippet.
    #[serde(default)]
    pub capture: bool,
    #[serde(default)]
    pub filetype: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hooks {
    pub pre: Option<HookCommand>,
    pub post: Option<HookCommand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub binary: String,
    pub backend: String,
    pub transport: TransportKind,
    pub model: Option<String>,
    pub template: Option<String>,
    pub reset_context_per_prompt: bool,
    pub chain_limit: u32,
    pub show_usage: bool,
    pub no_stream: bool,
    pub online: bool,
    pub system_prompt: Option<String>,
    pub model_options: BTreeMap<String, Value>,
    pub hooks: Hooks,
    #[serde(skip)]
    pub working_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            backend: DEFAULT_BACKEND.to_string(),
            transport: TransportKind::default(),
            model: None,
            template: None,
            reset_context_per_prompt: false,
            chain_limit: DEFAULT_CHAIN_LIMIT,
            show_usage: true,
            no_stream: false,
            online: false,
            system_prompt: None,
            model_options: BTreeMap::new(),
            hooks: Hooks::default(),
            working_dir: PathBuf::from("."),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Loads from `explicit` or `$LLMDECK_CONFIG` or the user config dir,
    /// then applies environment overrides. A missing default file is fine;
    /// a missing explicit file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let requested = explicit
            .map(Path::to_path_buf)
            .or_else(|| non_empty_env(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut config = match requested {
            Some(path) => Self::from_file(&path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env_overrides()?;
        config.working_dir = std::env::current_dir()?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("llmdeck").join("config.toml"))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(binary) = non_empty_env(BINARY_ENV) {
            self.binary = binary;
        }
        if let Some(model) = non_empty_env(MODEL_ENV) {
            self.model = Some(model);
        }
        if let Some(template) = non_empty_env(TEMPLATE_ENV) {
            self.template = Some(template);
        }
        if let Some(raw) = non_empty_env(CHAIN_LIMIT_ENV) {
            self.chain_limit = raw
                .parse()
                .with_context(|| format!("Invalid {CHAIN_LIMIT_ENV} '{raw}': expected an integer"))?;
        }
        if let Some(raw) = non_empty_env(RESET_CONTEXT_ENV) {
            match parse_bool_str(&raw) {
                Some(flag) => self.reset_context_per_prompt = flag,
                None => bail!("Invalid {RESET_CONTEXT_ENV} '{raw}': expected true or false"),
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.binary.trim().is_empty() {
            bail!("binary must not be empty");
        }

        if self.chain_limit == 0 {
            bail!("chain_limit must be at least 1");
        }

        if !KNOWN_BACKENDS.contains(&self.backend.as_str()) {
            bail!(
                "Unknown backend '{}'. Expected one of: {}",
                self.backend,
                KNOWN_BACKENDS.join(", ")
            );
        }

        for (stage, hook) in [("pre", &self.hooks.pre), ("post", &self.hooks.post)] {
            if hook.as_ref().is_some_and(|h| h.command.trim().is_empty()) {
                bail!("hooks.{stage}.command must not be empty");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScopedEnv;

    fn clean_env() -> ScopedEnv {
        let mut env = ScopedEnv::new();
        for key in [
            CONFIG_PATH_ENV,
            BINARY_ENV,
            MODEL_ENV,
            TEMPLATE_ENV,
            CHAIN_LIMIT_ENV,
            RESET_CONTEXT_ENV,
        ] {
            env.remove(key);
        }
        env
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.binary, "llm");
        assert_eq!(config.chain_limit, 100);
        assert!(config.show_usage);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_with_hooks_and_options() {
        let config = Config::from_toml(
            r#"
            binary = "/opt/llm"
            transport = "pipe"
            model = "gpt-4o-mini"
            chain_limit = 12

            [model_options]
            temperature = 0.3

            [hooks.pre]
            command = "git diff"
            capture = true
            filetype = "diff"
            "#,
        )
        .expect("parse");

        assert_eq!(config.binary, "/opt/llm");
        assert_eq!(config.transport, TransportKind::Pipe);
        assert_eq!(config.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.chain_limit, 12);
        assert_eq!(config.model_options["temperature"], serde_json::json!(0.3));
        let pre = config.hooks.pre.expect("pre hook");
        assert!(pre.capture);
        assert_eq!(pre.filetype.as_deref(), Some("diff"));
        assert!(config.hooks.post.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config {
            chain_limit: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        config.chain_limit = 1;
        config.backend = "ollama".to_string();
        assert!(config.validate().is_err());

        config.backend = DEFAULT_BACKEND.to_string();
        config.hooks.post = Some(HookCommand {
            command: "  ".to_string(),
            capture: false,
            filetype: None,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut env = clean_env();
        env.set(MODEL_ENV, "claude-haiku")
            .set(CHAIN_LIMIT_ENV, "3")
            .set(RESET_CONTEXT_ENV, "yes");

        let mut config = Config::default();
        config.apply_env_overrides().expect("overrides");
        assert_eq!(config.model.as_deref(), Some("claude-haiku"));
        assert_eq!(config.chain_limit, 3);
        assert!(config.reset_context_per_prompt);

        env.set(RESET_CONTEXT_ENV, "sometimes");
        assert!(config.apply_env_overrides().is_err());
    }

    #[test]
    fn test_load_reads_explicit_file() {
        let _env = clean_env();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "binary = \"llm-dev\"\nshow_usage = false\n").expect("write");

        let config = Config::load(Some(&path)).expect("load");
        assert_eq!(config.binary, "llm-dev");
        assert!(!config.show_usage);

        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
