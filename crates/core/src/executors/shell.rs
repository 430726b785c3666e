//! `shell.exec` action: run a command with a working directory and timeout.

use std::time::Duration;

use serde_json::json;
use tokio::process::Command;
use tracing::{debug, warn};

use super::ActionOutcome;
use crate::config::ShellConfig;

/// Run the configured command through `sh -c`, capturing stdout, stderr and
/// the exit code. The process is killed when the timeout elapses.
pub async fn execute(config: &ShellConfig) -> ActionOutcome {
    let Some(command) = config.command.as_deref().filter(|c| !c.trim().is_empty()) else {
        return ActionOutcome::failure(json!({"error": "Shell action requires a command"}));
    };
    let timeout_ms = config.timeout_ms();

    debug!(command, timeout_ms, "Executing shell action");

    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).kill_on_drop(true);
    if let Some(dir) = &config.working_directory {
        cmd.current_dir(dir);
    }

    match tokio::time::timeout(Duration::from_millis(timeout_ms), cmd.output()).await {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            let exit_code = output.status.code().unwrap_or(-1);
            let payload = json!({
                "stdout": stdout,
                "stderr": stderr,
                "exitCode": exit_code,
            });
            if output.status.success() {
                ActionOutcome::success(payload)
            } else {
                ActionOutcome::failure(payload)
            }
        }
        Ok(Err(e)) => ActionOutcome::failure(json!({
            "error": format!("Failed to run command: {}", e),
        })),
        Err(_) => {
            // kill_on_drop reaps the child when the timeout drops the future
            warn!(command, timeout_ms, "Shell action timed out");
            ActionOutcome::failure(json!({
                "error": format!("Command timed out after {}ms", timeout_ms),
            }))
        }
    }
}
