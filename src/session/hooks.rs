use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Stdio;

use crate::config::HookCommand;
use crate::context::Snippet;

const DEFAULT_HOOK_FILETYPE: &str = "text";

/// Runs `hook` through `sh -c` in `cwd`. Returns the captured stdout as a
/// snippet when the hook asks for capture and printed something.
pub async fn run_hook(hook: &HookCommand, cwd: &Path) -> Result<Option<Snippet>> {
    let output = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(&hook.command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("failed to run hook `{}`", hook.command))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "hook `{}` exited with {}: {}",
            hook.command,
            output
                .status
                .code()
                .map_or_else(|| "a signal".to_string(), |code| format!("code {code}")),
            stderr.trim()
        );
    }
    tracing::debug!(command = %hook.command, "hook finished");

    if !hook.capture {
        return Ok(None);
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = stdout.trim();
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(Snippet {
        filepath: format!("hook: {}", hook.command),
        filetype: hook
            .filetype
            .clone()
            .unwrap_or_else(|| DEFAULT_HOOK_FILETYPE.to_string()),
        text: text.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook(command: &str, capture: bool) -> HookCommand {
        HookCommand {
            command: command.to_string(),
            capture,
            filetype: None,
        }
    }

    #[tokio::test]
    async fn test_captured_output_becomes_snippet() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("marker.txt"), "from cwd\n").expect("write");

        let snippet = run_hook(&hook("cat marker.txt", true), dir.path())
            .await
            .expect("hook")
            .expect("snippet");
        assert_eq!(snippet.filepath, "hook: cat marker.txt");
        assert_eq!(snippet.filetype, "text");
        assert_eq!(snippet.text, "from cwd");
    }

    #[tokio::test]
    async fn test_uncaptured_or_blank_output_is_dropped() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(run_hook(&hook("echo hi", false), dir.path())
            .await
            .expect("hook")
            .is_none());
        assert!(run_hook(&hook("printf '  \\n'", true), dir.path())
            .await
            .expect("hook")
            .is_none());
    }

    #[tokio::test]
    async fn test_failing_hook_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = run_hook(&hook("echo nope >&2; exit 3", true), dir.path())
            .await
            .expect_err("hook should fail");
        let message = err.to_string();
        assert!(message.contains("code 3"));
        assert!(message.contains("nope"));
    }
}
