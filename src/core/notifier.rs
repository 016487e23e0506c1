//! Fan-out of instance updates to registered listeners

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use tracing::{debug, error};

use super::instance::LaunchInstanceInfo;

type Listener = Arc<dyn Fn(LaunchInstanceInfo) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    entries: RwLock<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

/// Registry of instance update listeners.
///
/// Cloning yields a handle to the same registry.
#[derive(Clone, Default)]
pub struct Notifier {
    inner: Arc<Listeners>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays registered until
    /// [`Subscription::unsubscribe`] is called.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(LaunchInstanceInfo) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut entries = self
            .inner
            .entries
            .write()
            .unwrap_or_else(|e| e.into_inner());
        entries.push((id, Arc::new(listener)));
        debug!("Registered instance update listener. Total: {}", entries.len());

        Subscription {
            listeners: Arc::downgrade(&self.inner),
            id,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .entries
            .read()
            .map(|e| e.len())
            .unwrap_or(0)
    }

    /// Deliver an update to every listener registered right now.
    ///
    /// Listeners run outside the registry lock, so they may subscribe or
    /// unsubscribe. A panicking listener is logged and skipped.
    pub fn notify(&self, info: &LaunchInstanceInfo) {
        let snapshot: Vec<Listener> = self
            .inner
            .entries
            .read()
            .map(|e| e.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        debug!(
            instance_id = %info.launch_instance_id,
            "Notifying {} listeners of {} instance",
            snapshot.len(),
            info.status().label()
        );

        for listener in snapshot {
            let update = info.clone();
            if catch_unwind(AssertUnwindSafe(|| (listener.as_ref())(update))).is_err() {
                error!(
                    instance_id = %info.launch_instance_id,
                    "Instance update listener panicked"
                );
            }
        }
    }
}

/// Handle returned by [`Notifier::subscribe`]
#[derive(Debug)]
pub struct Subscription {
    listeners: Weak<Listeners>,
    id: u64,
}

impl Subscription {
    /// Remove the listener. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(listeners) = self.listeners.upgrade() else {
            return false;
        };
        let mut entries = listeners
            .entries
            .write()
            .unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|(id, _)| *id != self.id);
        debug!("Unregistered instance update listener. Remaining: {}", entries.len());
        entries.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instance::{ExitInfo, InstanceId, LaunchInstance};
    use std::sync::Mutex;

    fn info() -> LaunchInstanceInfo {
        LaunchInstance::running(InstanceId::new(), "kodi".into(), 7).info()
    }

    #[test]
    fn test_notify_reaches_all_listeners() {
        let notifier = Notifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let a = Arc::clone(&seen);
        let _sub_a = notifier.subscribe(move |i| a.lock().unwrap().push(("a", i.pid)));
        let b = Arc::clone(&seen);
        let _sub_b = notifier.subscribe(move |i| b.lock().unwrap().push(("b", i.pid)));

        notifier.notify(&info());
        assert_eq!(*seen.lock().unwrap(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let notifier = Notifier::new();
        let count = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&count);
        let sub = notifier.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        notifier.notify(&info());
        assert!(sub.unsubscribe());
        notifier.notify(&info());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let notifier = Notifier::new();
        let delivered = Arc::new(Mutex::new(None));

        let _bad = notifier.subscribe(|_| panic!("listener failure"));
        let d = Arc::clone(&delivered);
        let _good = notifier.subscribe(move |i| {
            *d.lock().unwrap() = Some(i.exit_result);
        });

        let mut update = info();
        update.exit_result = Some(ExitInfo::Success);
        notifier.notify(&update);

        assert_eq!(*delivered.lock().unwrap(), Some(Some(ExitInfo::Success)));
    }

    #[test]
    fn test_unsubscribe_after_notifier_dropped() {
        let notifier = Notifier::new();
        let sub = notifier.subscribe(|_| {});
        drop(notifier);
        assert!(!sub.unsubscribe());
    }
}
