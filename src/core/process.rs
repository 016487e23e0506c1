//! Process management - Spawning children and resolving their PIDs

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::command::ParsedCommand;
use super::error::LaunchError;
use super::instance::ConfigId;

/// Default bound for waiting on a PID that was not assigned synchronously
pub const DEFAULT_PID_RESOLVE_TIMEOUT: Duration = Duration::from_millis(50);

/// Spawn a child with all standard streams discarded.
///
/// The child stays in our process group and is not killed when its handle
/// is dropped.
pub fn spawn_process(config_id: &ConfigId, command: &ParsedCommand) -> Result<Child, LaunchError> {
    info!(
        config_id = %config_id,
        "Spawning {:?} with args {:?}",
        command.program, command.args
    );

    Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(false)
        .spawn()
        .map_err(|e| LaunchError::Spawn {
            config_id: config_id.clone(),
            cause: format!("Spawn failed: {}", e),
        })
}

/// Get the OS PID of a freshly spawned child.
///
/// The PID is normally available at once. Otherwise wait up to `timeout` for
/// the child to report an error or finish; a child that has no PID by then
/// most likely exited immediately.
pub async fn resolve_pid(
    config_id: &ConfigId,
    child: &mut Child,
    timeout: Duration,
) -> Result<u32, LaunchError> {
    if let Some(pid) = child.id() {
        debug!(config_id = %config_id, pid, "PID assigned synchronously");
        return Ok(pid);
    }

    let spawn_error = |cause: String| LaunchError::Spawn {
        config_id: config_id.clone(),
        cause,
    };

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Err(e)) => Err(spawn_error(format!("Failed to get PID. Error: {}", e))),
        Ok(Ok(status)) => {
            warn!(config_id = %config_id, %status, "Process ended before its PID was read");
            Err(spawn_error(format!(
                "Failed to get PID. Process exited immediately ({})",
                status
            )))
        }
        Err(_) => child.id().ok_or_else(|| {
            spawn_error("Failed to get PID. Process might have exited immediately.".to_string())
        }),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::command::parse_command;

    #[tokio::test]
    async fn test_spawn_and_resolve_pid() {
        let config_id = ConfigId::new("sleeper");
        let command = parse_command("sleep 1").unwrap();
        let mut child = spawn_process(&config_id, &command).unwrap();

        let pid = resolve_pid(&config_id, &mut child, DEFAULT_PID_RESOLVE_TIMEOUT)
            .await
            .unwrap();
        assert!(pid > 0);

        child.start_kill().unwrap();
        child.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let config_id = ConfigId::new("ghost");
        let command = parse_command("/nonexistent/tvlauncher-test-binary --flag").unwrap();

        match spawn_process(&config_id, &command) {
            Err(LaunchError::Spawn { config_id: id, cause }) => {
                assert_eq!(id, config_id);
                assert!(cause.starts_with("Spawn failed"));
            }
            other => panic!("expected spawn error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_reaped_child_has_no_pid() {
        let config_id = ConfigId::new("quick");
        let command = parse_command("true").unwrap();
        let mut child = spawn_process(&config_id, &command).unwrap();
        child.wait().await.unwrap();

        let result = resolve_pid(&config_id, &mut child, DEFAULT_PID_RESOLVE_TIMEOUT).await;
        assert!(matches!(result, Err(LaunchError::Spawn { .. })));
    }
}
