use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Failure messages are truncated so DLQ stats can group on them without
/// dragging whole stderr dumps around.
const ERROR_MESSAGE_LIMIT: usize = 500;

/// Result of running one job command. Failures here are data for the retry
/// policy, not errors: the worker decides retry vs DLQ from `Job.attempts`.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    /// Exit status zero within the timeout.
    Completed { stdout: String, stderr: String },
    /// Non-zero exit, timeout, or spawn failure. `exit_code` is `None` when
    /// the process never produced one (timeout, signal, spawn error).
    Failed {
        exit_code: Option<i32>,
        message: String,
    },
}

/// Run `command` through `sh -c` with a hard timeout. The timeout is enforced
/// here, not cooperatively: when it elapses the child is killed outright.
pub async fn execute_command(command: &str, timeout: Duration) -> CommandOutcome {
    let child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) => {
            return CommandOutcome::Failed {
                exit_code: None,
                message: truncate(format!("failed to spawn command: {e}")),
            }
        }
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout)
                .trim_end()
                .to_string();
            let stderr = String::from_utf8_lossy(&output.stderr)
                .trim_end()
                .to_string();

            if output.status.success() {
                CommandOutcome::Completed { stdout, stderr }
            } else {
                let exit_code = output.status.code();
                CommandOutcome::Failed {
                    exit_code,
                    message: failure_message(exit_code, &stderr),
                }
            }
        }
        Ok(Err(e)) => CommandOutcome::Failed {
            exit_code: None,
            message: truncate(format!("failed to wait for command: {e}")),
        },
        // Dropping the wait future drops the child handle, which kills the
        // process (kill_on_drop).
        Err(_) => CommandOutcome::Failed {
            exit_code: None,
            message: format!("command timed out after {}s", timeout.as_secs()),
        },
    }
}

fn failure_message(exit_code: Option<i32>, stderr: &str) -> String {
    let mut message = match exit_code {
        Some(code) => format!("command exited with status {code}"),
        None => "command terminated by signal".to_string(),
    };
    if !stderr.is_empty() {
        message.push_str(": ");
        message.push_str(stderr);
    }
    truncate(message)
}

fn truncate(message: String) -> String {
    if message.chars().count() <= ERROR_MESSAGE_LIMIT {
        message
    } else {
        message.chars().take(ERROR_MESSAGE_LIMIT).collect()
    }
}
