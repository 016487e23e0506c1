//! Instance store - The single source of truth for launch instances

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, error};

use super::error::LaunchError;
use super::instance::{ConfigId, ExitInfo, InstanceId, LaunchInstance};

#[derive(Default)]
struct StoreInner {
    instances: HashMap<InstanceId, LaunchInstance>,
    /// Configs with a launch in flight that has not inserted yet
    pending: HashSet<ConfigId>,
}

/// In-memory map of every instance launched by one supervisor.
///
/// Entries are never removed, so exited instances stay queryable. Every
/// operation takes the lock for a short synchronous section only.
#[derive(Default)]
pub struct InstanceStore {
    inner: RwLock<StoreInner>,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Critical sections never leave the map half-updated, so a poisoned
    // lock still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, id: &InstanceId) -> Option<LaunchInstance> {
        self.read().instances.get(id).cloned()
    }

    /// Instances of a config that have not exited yet
    pub fn list_running_by_config(&self, config_id: &ConfigId) -> Vec<LaunchInstance> {
        self.read()
            .instances
            .values()
            .filter(|i| &i.config_id == config_id && i.is_running())
            .cloned()
            .collect()
    }

    /// Every instance of a config, oldest first
    pub fn list_by_config(&self, config_id: &ConfigId) -> Vec<LaunchInstance> {
        let mut instances: Vec<LaunchInstance> = self
            .read()
            .instances
            .values()
            .filter(|i| &i.config_id == config_id)
            .cloned()
            .collect();
        instances.sort_by_key(|i| i.launched_at);
        instances
    }

    /// Every instance, oldest first
    pub fn list(&self) -> Vec<LaunchInstance> {
        let mut instances: Vec<LaunchInstance> = self.read().instances.values().cloned().collect();
        instances.sort_by_key(|i| i.launched_at);
        instances
    }

    pub fn len(&self) -> usize {
        self.read().instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a new instance. Returns false if the id is already taken.
    pub fn insert(&self, instance: LaunchInstance) -> bool {
        Self::insert_locked(&mut self.write(), instance)
    }

    fn insert_locked(inner: &mut StoreInner, instance: LaunchInstance) -> bool {
        let id = instance.launch_instance_id;
        if inner.instances.contains_key(&id) {
            error!(instance_id = %id, "Refusing to insert duplicate launch instance id");
            return false;
        }
        inner.instances.insert(id, instance);
        true
    }

    /// Reserve the right to launch a config.
    ///
    /// Fails if the config has a running instance or another launch of it is
    /// in flight. The reservation is released when the claim is dropped or
    /// consumed by [`LaunchClaim::insert`].
    pub fn claim_config(self: &Arc<Self>, config_id: &ConfigId) -> Result<LaunchClaim, LaunchError> {
        let mut inner = self.write();
        let running = inner
            .instances
            .values()
            .any(|i| &i.config_id == config_id && i.is_running());
        if running || !inner.pending.insert(config_id.clone()) {
            return Err(LaunchError::AlreadyRunning {
                config_id: config_id.clone(),
            });
        }
        debug!(config_id = %config_id, "Claimed config for launch");
        Ok(LaunchClaim {
            store: Arc::clone(self),
            config_id: config_id.clone(),
            released: false,
        })
    }

    /// Set the exit result of a running instance.
    ///
    /// Returns whether the update happened; false if the instance is unknown
    /// or was already finalized.
    pub fn try_set_exit(&self, id: &InstanceId, exit: ExitInfo) -> bool {
        let mut inner = self.write();
        match inner.instances.get_mut(id) {
            Some(instance) if instance.exit_result.is_none() => {
                instance.exit_result = Some(exit);
                instance.exited_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }
}

/// A reservation held by an in-flight launch of one config
#[must_use = "dropping a claim releases it"]
pub struct LaunchClaim {
    store: Arc<InstanceStore>,
    config_id: ConfigId,
    released: bool,
}

impl LaunchClaim {
    pub fn config_id(&self) -> &ConfigId {
        &self.config_id
    }

    /// Insert the launched instance and release the claim atomically
    pub fn insert(mut self, instance: LaunchInstance) -> bool {
        let mut inner = self.store.write();
        inner.pending.remove(&self.config_id);
        self.released = true;
        InstanceStore::insert_locked(&mut inner, instance)
    }
}

impl Drop for LaunchClaim {
    fn drop(&mut self) {
        if !self.released {
            self.store.write().pending.remove(&self.config_id);
            debug!(config_id = %self.config_id, "Released launch claim");
        }
    }
}
