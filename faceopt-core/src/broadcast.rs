//! Ordered publish-subscribe for session snapshots.
//!
//! Listeners are keyed by a monotonically increasing subscription id, so a
//! [`Subscription`] can only ever remove the listener it registered.
//!
//! Snapshots go through one FIFO queue. Whoever finds the queue idle delivers
//! everything pending, each snapshot to every listener in subscription order,
//! before returning. A snapshot published while a delivery is in progress
//! (from a listener, or from another thread) is handed to that delivery and
//! arrives after the snapshot being delivered, never interleaved with it.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::Session;

/// Callback invoked with every broadcast snapshot
pub type Listener = Arc<dyn Fn(&Session) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
    pending: VecDeque<Session>,
    delivering: bool,
}

/// Fan-out of session snapshots to registered listeners
#[derive(Clone, Default)]
pub struct SessionBroadcaster {
    registry: Arc<Mutex<Registry>>,
}

impl SessionBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for all future broadcasts.
    ///
    /// The listener stays registered until the returned handle is
    /// unsubscribed or dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.listeners.push((id, Arc::new(listener)));
        tracing::trace!(subscription = id, "Listener subscribed");

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
            active: true,
        }
    }

    /// Publish `session` to every listener.
    ///
    /// No-op when there is no session. Listeners may subscribe, unsubscribe
    /// or publish from inside the callback.
    pub fn notify(&self, session: Option<&Session>) {
        let Some(session) = session else { return };
        self.enqueue(session.clone());
        self.deliver_pending();
    }

    /// Queue a snapshot without delivering it.
    ///
    /// The runner calls this while holding its state lock, so queue order
    /// matches mutation order; [`Self::deliver_pending`] follows once the
    /// lock is released.
    pub(crate) fn enqueue(&self, session: Session) {
        self.registry.lock().pending.push_back(session);
    }

    /// Deliver queued snapshots unless another call is already doing so
    pub(crate) fn deliver_pending(&self) {
        {
            let mut registry = self.registry.lock();
            if registry.delivering {
                return;
            }
            registry.delivering = true;
        }
        let _delivery = DeliveryGuard(&self.registry);

        loop {
            let (session, listeners) = {
                let mut registry = self.registry.lock();
                let Some(session) = registry.pending.pop_front() else {
                    registry.delivering = false;
                    return;
                };
                let listeners: Vec<Listener> = registry
                    .listeners
                    .iter()
                    .map(|(_, listener)| Arc::clone(listener))
                    .collect();
                (session, listeners)
            };

            for listener in listeners {
                listener(&session);
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.lock().listeners.len()
    }
}

/// Releases the delivery slot if a listener panics mid-delivery
struct DeliveryGuard<'a>(&'a Mutex<Registry>);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        // A normal exit already cleared the flag under the same lock that
        // found the queue empty; clearing it again could race a new deliverer.
        if std::thread::panicking() {
            self.0.lock().delivering = false;
        }
    }
}

impl std::fmt::Debug for SessionBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBroadcaster")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle for one registered listener
///
/// Unsubscribes on drop unless [`Subscription::detach`] was called.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    id: u64,
    registry: std::sync::Weak<Mutex<Registry>>,
    active: bool,
}

impl Subscription {
    /// Remove this listener. Calling it again is harmless.
    pub fn unsubscribe(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        if let Some(registry) = self.registry.upgrade() {
            registry.lock().listeners.retain(|(id, _)| *id != self.id);
            tracing::trace!(subscription = self.id, "Listener unsubscribed");
        }
    }

    /// Keep the listener registered for the broadcaster's whole lifetime
    pub fn detach(mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{initial_steps, DEFAULT_CATALOG};
    use crate::types::{OptimizationConfig, SessionStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session() -> Session {
        Session {
            id: "opt_broadcast".to_string(),
            config: OptimizationConfig::default(),
            status: SessionStatus::Running,
            steps: initial_steps(DEFAULT_CATALOG),
            started_at: None,
            ended_at: None,
            results: None,
        }
    }

    #[test]
    fn test_notify_in_subscription_order() {
        let broadcaster = SessionBroadcaster::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        let _a = broadcaster.subscribe(move |_| o1.lock().push("a"));
        let o2 = order.clone();
        let _b = broadcaster.subscribe(move |_| o2.lock().push("b"));

        broadcaster.notify(Some(&session()));
        broadcaster.notify(Some(&session()));

        assert_eq!(*order.lock(), vec!["a", "b", "a", "b"]);
    }

    #[test]
    fn test_notify_without_session_is_noop() {
        let broadcaster = SessionBroadcaster::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let _sub = broadcaster.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        broadcaster.notify(None);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_notify_with_no_listeners() {
        let broadcaster = SessionBroadcaster::new();
        broadcaster.notify(Some(&session()));
        assert_eq!(broadcaster.listener_count(), 0);
    }

    #[test]
    fn test_unsubscribe_is_idempotent_and_targeted() {
        let broadcaster = SessionBroadcaster::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c1 = count.clone();
        let mut first = broadcaster.subscribe(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = count.clone();
        let _second = broadcaster.subscribe(move |_| {
            c2.fetch_add(10, Ordering::SeqCst);
        });

        first.unsubscribe();
        first.unsubscribe();
        assert!(!first.is_active());

        let c3 = count.clone();
        let _third = broadcaster.subscribe(move |_| {
            c3.fetch_add(100, Ordering::SeqCst);
        });
        assert_eq!(broadcaster.listener_count(), 2);

        broadcaster.notify(Some(&session()));
        assert_eq!(count.load(Ordering::SeqCst), 110);
    }

    #[test]
    fn test_drop_unsubscribes_but_detach_keeps() {
        let broadcaster = SessionBroadcaster::new();
        {
            let _scoped = broadcaster.subscribe(|_| {});
            assert_eq!(broadcaster.listener_count(), 1);
        }
        assert_eq!(broadcaster.listener_count(), 0);

        broadcaster.subscribe(|_| {}).detach();
        assert_eq!(broadcaster.listener_count(), 1);
    }

    #[test]
    fn test_listener_can_reenter_broadcaster() {
        let broadcaster = SessionBroadcaster::new();
        let inner = broadcaster.clone();
        let late = Arc::new(Mutex::new(Vec::new()));

        let late_ref = late.clone();
        let _sub = broadcaster.subscribe(move |_| {
            inner.subscribe(|_| {}).detach();
            late_ref.lock().push(inner.listener_count());
        });

        broadcaster.notify(Some(&session()));
        assert_eq!(*late.lock(), vec![2]);
    }

    #[test]
    fn test_nested_publish_is_delivered_after_current_round() {
        let broadcaster = SessionBroadcaster::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let republisher = broadcaster.clone();
        let _first = broadcaster.subscribe(move |s| {
            if s.status == SessionStatus::Running {
                let mut stopped = s.clone();
                stopped.status = SessionStatus::Error;
                republisher.notify(Some(&stopped));
            }
        });
        let sink = seen.clone();
        let _second = broadcaster.subscribe(move |s| sink.lock().push(s.status));

        broadcaster.notify(Some(&session()));

        assert_eq!(*seen.lock(), vec![SessionStatus::Running, SessionStatus::Error]);
    }

    #[test]
    fn test_panicking_listener_releases_delivery() {
        let broadcaster = SessionBroadcaster::new();
        let mut failing = broadcaster.subscribe(|_| panic!("listener failure"));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            broadcaster.notify(Some(&session()));
        }));
        assert!(result.is_err());
        failing.unsubscribe();

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let _sub = broadcaster.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        broadcaster.notify(Some(&session()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_publishers_deliver_whole_rounds() {
        let broadcaster = SessionBroadcaster::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..3 {
            let sink = seen.clone();
            broadcaster
                .subscribe(move |s| sink.lock().push(s.id.clone()))
                .detach();
        }

        let threads: Vec<_> = (0..4)
            .map(|t| {
                let broadcaster = broadcaster.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let mut snapshot = session();
                        snapshot.id = format!("{t}-{i}");
                        broadcaster.notify(Some(&snapshot));
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let seen = seen.lock();
        assert_eq!(seen.len(), 4 * 25 * 3);
        for round in seen.chunks(3) {
            assert!(round.iter().all(|id| *id == round[0]), "{round:?}");
        }
    }
}
