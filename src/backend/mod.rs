pub mod llm_cli;

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::command::CommandOptions;
use crate::config::Config;

pub use llm_cli::LlmCliBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub provider: String,
    pub id: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub id: String,
    pub model: Option<String>,
    pub first_prompt: String,
    pub started_at: Option<String>,
}

/// What the session needs from an external LLM tool.
///
/// Listing queries never fail: an unavailable or malformed answer is an
/// empty list.
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    fn supports_tools(&self) -> bool;

    fn build_command(&self, options: &CommandOptions) -> Vec<String>;

    async fn list_models(&self) -> Vec<ModelInfo>;

    async fn list_templates(&self) -> Vec<String>;

    async fn list_tools(&self) -> Vec<String>;

    async fn history(&self, limit: usize) -> Vec<ConversationSummary>;
}

/// Backends keyed by name.
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(config: &Config) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(LlmCliBackend::from_config(config)));
        registry
    }

    /// Replaces any backend already registered under the same name.
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Backend>> {
        self.backends.get(name).cloned()
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Backend>> {
        match self.get(name) {
            Some(backend) => Ok(backend),
            None => bail!("Unknown backend '{name}'"),
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }
}
