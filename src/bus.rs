//! In-process fan-out for queue mutations.
//!
//! Several independent consumers (the pending badge, the auto-flush task,
//! open screens) need to observe queue changes without polling storage.
//! This is a same-process relay only; it carries no payload and knows
//! nothing about transports.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use tracing::warn;

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Default)]
pub struct QueueBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: Mutex<u64>,
}

impl QueueBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays registered until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = {
            let mut next = self.inner.next_id.lock().unwrap_or_else(|e| e.into_inner());
            *next += 1;
            *next
        };

        let mut listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        listeners.push((id, Arc::new(listener)));

        Subscription {
            bus: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Invoke every current listener, in subscription order.
    ///
    /// Listeners run outside the registry lock, so a listener may
    /// subscribe or drop subscriptions reentrantly. A panicking listener
    /// is contained and does not stop the ones after it.
    pub fn notify(&self) {
        let snapshot: Vec<Listener> = {
            let listeners = self
                .inner
                .listeners
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            listeners.iter().map(|(_, l)| l.clone()).collect()
        };

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener())).is_err() {
                warn!("Queue bus listener panicked; continuing with the rest");
            }
        }
    }

    #[cfg(test)]
    fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

/// Drop guard for a bus registration.
pub struct Subscription {
    bus: Weak<BusInner>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            let mut listeners = inner.listeners.lock().unwrap_or_else(|e| e.into_inner());
            listeners.retain(|(id, _)| *id != self.id);
        }
    }
}
