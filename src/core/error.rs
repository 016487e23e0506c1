//! Error types for launching and killing app processes

use thiserror::Error;

use super::instance::{ConfigId, InstanceId};

/// Failure to start an app
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Application {config_id} is already running")]
    AlreadyRunning { config_id: ConfigId },

    #[error("Invalid or empty command provided: {command:?}")]
    InvalidCommand { command: String },

    #[error("Failed to spawn process for {config_id}: {cause}")]
    Spawn { config_id: ConfigId, cause: String },
}

/// Failure to deliver a signal at the OS level
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("No such process: {pid}")]
    NotFound { pid: u32 },

    #[error("Permission denied signalling process {pid}")]
    PermissionDenied { pid: u32 },

    #[error("Failed to signal process {pid}: {message}")]
    Unknown { pid: u32, message: String },
}

/// Failure to kill a launched instance
#[derive(Debug, Error)]
pub enum KillError {
    #[error("Instance {launch_instance_id} not found")]
    NotFound { launch_instance_id: InstanceId },

    #[error("Instance {launch_instance_id} has already exited")]
    AlreadyExited { launch_instance_id: InstanceId },

    #[error("Failed to kill instance {launch_instance_id} (PID {pid})")]
    Signal {
        launch_instance_id: InstanceId,
        pid: u32,
        #[source]
        source: ProcessError,
    },
}

impl KillError {
    /// The signal target was already gone, i.e. the kill raced a natural exit
    pub fn is_process_gone(&self) -> bool {
        matches!(
            self,
            Self::Signal {
                source: ProcessError::NotFound { .. },
                ..
            }
        )
    }
}
