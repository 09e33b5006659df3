use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_PATH: &str = "/tmp/llmdeck.log";
const LOG_FILTER_ENV: &str = "LLMDECK_LOG";
const LOG_PATH_ENV: &str = "LLMDECK_LOG_PATH";

/// Installs the global tracing subscriber. While the TUI owns the terminal,
/// events go to a log file instead of stderr.
pub fn init() {
    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let file = resolve_log_path().and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| eprintln!("llmdeck: cannot open log file {path}: {err}"))
            .ok()
    });

    let installed = match file {
        Some(file) => builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init(),
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    // A subscriber may already be installed (tests, embedding).
    let _ = installed;
}

fn resolve_log_path() -> Option<String> {
    std::env::var(LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            if std::io::stderr().is_terminal() {
                Some(DEFAULT_LOG_PATH.to_string())
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScopedEnv;

    #[test]
    fn test_resolve_log_path_uses_env_override() {
        let mut env = ScopedEnv::new();
        env.set(LOG_PATH_ENV, " /tmp/test-llmdeck.log ");
        assert_eq!(resolve_log_path().as_deref(), Some("/tmp/test-llmdeck.log"));
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        let mut env = ScopedEnv::new();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("llmdeck.log");
        env.set(LOG_PATH_ENV, &path);
        init();
        init();
        assert!(path.exists());
    }
}
