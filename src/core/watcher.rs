//! Exit watcher - One background task per launched process

use std::process::ExitStatus;
use std::sync::Arc;

use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::instance::{ConfigId, ExitInfo, InstanceId};
use super::notifier::Notifier;
use super::store::InstanceStore;
use crate::platform;

/// Classify an OS exit status
pub fn classify_exit_status(status: ExitStatus) -> ExitInfo {
    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal().map(platform::signal_name)
    };
    #[cfg(not(unix))]
    let signal: Option<String> = None;

    ExitInfo::from_parts(status.code(), signal.as_deref())
}

/// Applies the final exit result of one instance.
///
/// If dropped before [`Finalizer::finalize`] ran (the watcher panicked or was
/// torn down with the runtime) the instance is finalized as `Unknown`.
pub(crate) struct Finalizer {
    store: Arc<InstanceStore>,
    notifier: Notifier,
    instance_id: InstanceId,
    config_id: ConfigId,
    pid: u32,
    done: bool,
}

impl Finalizer {
    pub(crate) fn new(
        store: Arc<InstanceStore>,
        notifier: Notifier,
        instance_id: InstanceId,
        config_id: ConfigId,
        pid: u32,
    ) -> Self {
        Self {
            store,
            notifier,
            instance_id,
            config_id,
            pid,
            done: false,
        }
    }

    /// Set the exit result and publish it. Returns whether this call applied it.
    pub(crate) fn finalize(&mut self, exit: ExitInfo) -> bool {
        self.done = true;

        if !self.store.try_set_exit(&self.instance_id, exit.clone()) {
            warn!(
                config_id = %self.config_id,
                instance_id = %self.instance_id,
                pid = self.pid,
                "Exit result already set, ignoring {:?}",
                exit
            );
            return false;
        }

        info!(
            config_id = %self.config_id,
            instance_id = %self.instance_id,
            pid = self.pid,
            "App {}",
            exit
        );
        if let Some(instance) = self.store.get(&self.instance_id) {
            self.notifier.notify(&instance.info());
        }
        true
    }
}

impl Drop for Finalizer {
    fn drop(&mut self) {
        if !self.done {
            error!(
                config_id = %self.config_id,
                instance_id = %self.instance_id,
                pid = self.pid,
                "Exit watcher ended without a result"
            );
            self.finalize(ExitInfo::Unknown);
        }
    }
}

/// Start the background task that waits for `child` to end.
///
/// The child handle is dropped once the result is applied.
pub(crate) fn spawn_exit_watcher(mut child: Child, mut finalizer: Finalizer) -> JoinHandle<()> {
    tokio::spawn(async move {
        let exit = match child.wait().await {
            Ok(status) => {
                let exit = classify_exit_status(status);
                if exit == ExitInfo::Unknown {
                    warn!(
                        instance_id = %finalizer.instance_id,
                        pid = finalizer.pid,
                        "Process exited with neither an exit code nor a signal"
                    );
                }
                exit
            }
            Err(e) => {
                error!(
                    instance_id = %finalizer.instance_id,
                    pid = finalizer.pid,
                    "Error waiting on launched app: {}",
                    e
                );
                ExitInfo::Unknown
            }
        };

        finalizer.finalize(exit);
        drop(child);
    })
}
