//! Supervisor - Launch, kill and observe app processes

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::command::parse_command;
use super::error::{KillError, LaunchError};
use super::instance::{
    AppConfig, ConfigId, IdGenerator, InstanceId, LaunchInstance, LaunchInstanceInfo,
    UuidGenerator,
};
use super::notifier::{Notifier, Subscription};
use super::process::{resolve_pid, spawn_process, DEFAULT_PID_RESOLVE_TIMEOUT};
use super::settings::SupervisorSettings;
use super::store::InstanceStore;
use super::watcher::{spawn_exit_watcher, Finalizer};
use crate::platform;

/// Spawns app processes and tracks every launch until it exits.
///
/// State changes of an instance are written only by its exit watcher, so
/// each instance produces exactly one "running" and one "exited" update.
/// Cloning yields a handle to the same supervisor. Must be used from within
/// a Tokio runtime.
#[derive(Clone)]
pub struct Supervisor {
    store: Arc<InstanceStore>,
    notifier: Notifier,
    ids: Arc<dyn IdGenerator>,
    pid_resolve_timeout: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self {
            store: Arc::new(InstanceStore::new()),
            notifier: Notifier::new(),
            ids: Arc::new(UuidGenerator),
            pid_resolve_timeout: DEFAULT_PID_RESOLVE_TIMEOUT,
        }
    }
}

impl Supervisor {
    pub fn new(settings: &SupervisorSettings) -> Self {
        Self::default().with_pid_resolve_timeout(settings.pid_resolve_timeout())
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    pub fn with_pid_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.pid_resolve_timeout = timeout;
        self
    }

    /// Launch an app.
    ///
    /// Returns as soon as the process has a PID; the instance is then
    /// running and an exit watcher has been started for it.
    pub async fn launch(&self, config: &AppConfig) -> Result<LaunchInstanceInfo, LaunchError> {
        let claim = self.store.claim_config(&config.id)?;

        let command =
            parse_command(&config.launch_command).ok_or_else(|| LaunchError::InvalidCommand {
                command: config.launch_command.clone(),
            })?;

        let mut child = spawn_process(&config.id, &command)?;
        let pid = resolve_pid(&config.id, &mut child, self.pid_resolve_timeout).await?;

        let instance = LaunchInstance::running(self.ids.next_id(), config.id.clone(), pid);
        let instance_id = instance.launch_instance_id;
        let info = instance.info();

        if !claim.insert(instance) {
            if let Err(e) = child.start_kill() {
                error!(pid, "Failed to kill untracked process: {}", e);
            }
            return Err(LaunchError::Spawn {
                config_id: config.id.clone(),
                cause: format!("Launch instance id {} is already in use", instance_id),
            });
        }

        info!(
            config_id = %config.id,
            instance_id = %instance_id,
            pid,
            "Launched '{}'",
            config.name
        );
        self.notifier.notify(&info);

        let finalizer = Finalizer::new(
            Arc::clone(&self.store),
            self.notifier.clone(),
            instance_id,
            config.id.clone(),
            pid,
        );
        spawn_exit_watcher(child, finalizer);

        Ok(info)
    }

    /// Send SIGKILL to a running instance.
    ///
    /// Does not change the instance's state; its exit watcher records the
    /// result once the OS reports the termination.
    pub fn kill(&self, id: &InstanceId) -> Result<(), KillError> {
        let instance = self.store.get(id).ok_or(KillError::NotFound {
            launch_instance_id: *id,
        })?;

        if !instance.is_running() {
            warn!(instance_id = %id, "Attempted to kill an instance that has already exited");
            return Err(KillError::AlreadyExited {
                launch_instance_id: *id,
            });
        }

        platform::kill_process(instance.pid).map_err(|source| {
            warn!(
                instance_id = %id,
                pid = instance.pid,
                "Failed to send SIGKILL: {}",
                source
            );
            KillError::Signal {
                launch_instance_id: *id,
                pid: instance.pid,
                source,
            }
        })?;

        info!(
            config_id = %instance.config_id,
            instance_id = %id,
            pid = instance.pid,
            "Sent SIGKILL"
        );
        Ok(())
    }

    pub fn get_state(&self, id: &InstanceId) -> Option<LaunchInstanceInfo> {
        self.store.get(id).map(|i| i.info())
    }

    /// Register a listener for instance updates
    pub fn on_instance_update<F>(&self, listener: F) -> Subscription
    where
        F: Fn(LaunchInstanceInfo) + Send + Sync + 'static,
    {
        self.notifier.subscribe(listener)
    }

    /// All instances ever launched, oldest first
    pub fn instances(&self) -> Vec<LaunchInstanceInfo> {
        self.store.list().iter().map(|i| i.info()).collect()
    }

    /// All launches of one config, oldest first
    pub fn instances_for_config(&self, config_id: &ConfigId) -> Vec<LaunchInstanceInfo> {
        self.store
            .list_by_config(config_id)
            .iter()
            .map(|i| i.info())
            .collect()
    }

    pub fn is_running(&self, config_id: &ConfigId) -> bool {
        !self.store.list_running_by_config(config_id).is_empty()
    }
}
