//! Core module - App process supervision: launching, exit tracking and notification

mod command;
mod error;
mod instance;
mod notifier;
mod process;
pub mod settings;
mod store;
mod supervisor;
mod watcher;

pub use command::{parse_command, ParsedCommand};
pub use error::{KillError, LaunchError, ProcessError};
pub use instance::{
    AppConfig, ConfigId, ExitInfo, IdGenerator, InstanceId, InstanceStatus, LaunchInstance,
    LaunchInstanceInfo, SequentialIdGenerator, UuidGenerator,
};
pub use notifier::{Notifier, Subscription};
pub use process::DEFAULT_PID_RESOLVE_TIMEOUT;
pub use settings::SupervisorSettings;
pub use store::{InstanceStore, LaunchClaim};
pub use supervisor::Supervisor;
pub use watcher::classify_exit_status;
