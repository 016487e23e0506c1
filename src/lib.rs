//! tvlauncher - Application process supervisor for a TV launcher shell
//!
//! Spawns the processes behind user-defined apps, tracks every launch until
//! it exits and publishes each state change to registered listeners.

pub mod core;
pub mod persistence;
pub mod platform;

pub use crate::core::{
    AppConfig, ConfigId, ExitInfo, InstanceId, KillError, LaunchError, LaunchInstanceInfo,
    ProcessError, Subscription, Supervisor, SupervisorSettings,
};

/// Application name constant
pub const APP_NAME: &str = "tvlauncher";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
