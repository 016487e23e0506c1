//! Instance management - App configs, launch instances and their exit results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Identifier of a user-defined app configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigId(pub String);

impl ConfigId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConfigId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ConfigId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one launch of a config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of launch instance identifiers
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> InstanceId;
}

/// Random v4 UUIDs, the production generator
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> InstanceId {
        InstanceId::new()
    }
}

/// Deterministic ids built from an incrementing counter.
///
/// The first id is `00000000-0000-0000-0000-000000000001`.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> InstanceId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        InstanceId(Uuid::from_u128(n as u128))
    }
}

/// A user-defined app: a named launch command plus display metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub id: ConfigId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub launch_command: String,
}

impl AppConfig {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        launch_command: impl Into<String>,
    ) -> Self {
        Self {
            id: ConfigId::new(id),
            name: name.into(),
            icon: None,
            launch_command: launch_command.into(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// How a launched process ended
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExitInfo {
    /// Exit code 0, no signal
    Success,
    /// Nonzero exit code, no signal
    ExitCode { code: i32 },
    /// Terminated by a signal, e.g. `SIGKILL`
    Signal { signal: String },
    /// Neither code nor signal, or the process reported an error
    Unknown,
}

impl ExitInfo {
    /// Total classification of an OS exit report.
    ///
    /// A signal always wins over a code.
    pub fn from_parts(code: Option<i32>, signal: Option<&str>) -> Self {
        match (code, signal) {
            (_, Some(signal)) => Self::Signal {
                signal: signal.to_string(),
            },
            (Some(0), None) => Self::Success,
            (Some(code), None) => Self::ExitCode { code },
            (None, None) => Self::Unknown,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn label(&self) -> String {
        match self {
            Self::Success => "exited successfully".to_string(),
            Self::ExitCode { code } => format!("exited with code {}", code),
            Self::Signal { signal } => format!("terminated by {}", signal),
            Self::Unknown => "exited for an unknown reason".to_string(),
        }
    }
}

impl std::fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Lifecycle state of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    Running,
    Exited,
}

impl InstanceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Exited => "Exited",
        }
    }
}

/// One launch of a config, as held by the instance store
#[derive(Debug, Clone)]
pub struct LaunchInstance {
    pub launch_instance_id: InstanceId,
    pub config_id: ConfigId,
    pub pid: u32,
    /// `None` while the process runs; set exactly once
    pub exit_result: Option<ExitInfo>,
    pub launched_at: DateTime<Utc>,
    pub exited_at: Option<DateTime<Utc>>,
}

impl LaunchInstance {
    /// New instances always start out running
    pub fn running(launch_instance_id: InstanceId, config_id: ConfigId, pid: u32) -> Self {
        Self {
            launch_instance_id,
            config_id,
            pid,
            exit_result: None,
            launched_at: Utc::now(),
            exited_at: None,
        }
    }

    pub fn status(&self) -> InstanceStatus {
        if self.exit_result.is_some() {
            InstanceStatus::Exited
        } else {
            InstanceStatus::Running
        }
    }

    pub fn is_running(&self) -> bool {
        self.exit_result.is_none()
    }

    /// Get uptime, or total runtime once exited
    pub fn runtime(&self) -> chrono::Duration {
        self.exited_at.unwrap_or_else(Utc::now) - self.launched_at
    }

    pub fn info(&self) -> LaunchInstanceInfo {
        LaunchInstanceInfo {
            config_id: self.config_id.clone(),
            launch_instance_id: self.launch_instance_id,
            pid: self.pid,
            exit_result: self.exit_result.clone(),
            launched_at: self.launched_at,
            exited_at: self.exited_at,
        }
    }
}

/// Public projection of an instance handed to observers and callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchInstanceInfo {
    pub config_id: ConfigId,
    pub launch_instance_id: InstanceId,
    pub pid: u32,
    pub exit_result: Option<ExitInfo>,
    pub launched_at: DateTime<Utc>,
    pub exited_at: Option<DateTime<Utc>>,
}

impl LaunchInstanceInfo {
    pub fn status(&self) -> InstanceStatus {
        if self.exit_result.is_some() {
            InstanceStatus::Exited
        } else {
            InstanceStatus::Running
        }
    }

    pub fn is_running(&self) -> bool {
        self.exit_result.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_classification() {
        assert_eq!(ExitInfo::from_parts(None, None), ExitInfo::Unknown);
        assert_eq!(ExitInfo::from_parts(Some(0), None), ExitInfo::Success);
        assert_eq!(
            ExitInfo::from_parts(Some(2), None),
            ExitInfo::ExitCode { code: 2 }
        );
        assert_eq!(
            ExitInfo::from_parts(Some(-1), None),
            ExitInfo::ExitCode { code: -1 }
        );
        assert_eq!(
            ExitInfo::from_parts(Some(0), Some("SIGTERM")),
            ExitInfo::Signal {
                signal: "SIGTERM".to_string()
            }
        );
        assert_eq!(
            ExitInfo::from_parts(None, Some("SIGKILL")),
            ExitInfo::Signal {
                signal: "SIGKILL".to_string()
            }
        );
    }

    #[test]
    fn test_sequential_ids_are_deterministic() {
        let gen = SequentialIdGenerator::new();
        assert_eq!(gen.next_id(), InstanceId(Uuid::from_u128(1)));
        assert_eq!(gen.next_id(), InstanceId(Uuid::from_u128(2)));
    }

    #[test]
    fn test_new_instance_is_running() {
        let instance = LaunchInstance::running(InstanceId::new(), "kodi".into(), 42);
        assert!(instance.is_running());
        assert_eq!(instance.status(), InstanceStatus::Running);
        assert!(instance.info().exit_result.is_none());
    }

    #[test]
    fn test_app_config_uses_camel_case() {
        let config = AppConfig::new("kodi", "Kodi", "/usr/bin/kodi --fullscreen");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["launchCommand"], "/usr/bin/kodi --fullscreen");
        assert!(json.get("icon").is_none());

        let parsed: AppConfig = serde_json::from_str(
            r#"{"id":"vlc","name":"VLC","icon":"vlc.png","launchCommand":"vlc"}"#,
        )
        .unwrap();
        assert_eq!(parsed.icon.as_deref(), Some("vlc.png"));
        assert_eq!(parsed.id, ConfigId::new("vlc"));
    }

    #[test]
    fn test_exit_info_serialization_is_tagged() {
        let json = serde_json::to_value(ExitInfo::ExitCode { code: 3 }).unwrap();
        assert_eq!(json["type"], "ExitCode");
        assert_eq!(json["code"], 3);
    }
}
