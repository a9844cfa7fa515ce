//! IP address change listeners
//!
//! The registry holds non-owning handles: callers keep their listener alive
//! in an `Arc` and may unregister with the returned [`ListenerId`]. A listener
//! that is dropped without unregistering is pruned on the next notification.
//!
//! Notification runs on the caller's thread, in registration order. A
//! listener that returns an error or panics is logged and skipped; it never
//! affects the other listeners or the caller.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use tracing::{debug, warn};

/// Error a listener may report from its callback
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ListenerError(pub String);

/// Receives the group's newly assigned local address
pub trait IpAddressListener: Send + Sync {
    /// Called after an address has been assigned to the group interface
    ///
    /// Runs inside the controller call that assigned the address. When the
    /// controller is shared behind a mutex that lock is held here, so the
    /// callback must not lock the controller; hand the address off instead.
    ///
    /// # Errors
    ///
    /// Errors are logged by the registry and otherwise ignored.
    fn on_ip_address_changed(&self, address: &str) -> Result<(), ListenerError>;
}

/// Token returned by [`ListenerRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct Entry {
    id: ListenerId,
    listener: Weak<dyn IpAddressListener>,
}

/// Ordered set of address listeners
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Vec<Entry>,
    next_id: u64,
}

impl ListenerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; notifications follow registration order
    pub fn register(&mut self, listener: &Arc<dyn IpAddressListener>) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.entries.push(Entry {
            id,
            listener: Arc::downgrade(listener),
        });
        debug!("Registered IP address listener {:?}", id);
        id
    }

    /// Remove a listener, returning whether it was registered
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    /// Number of listeners that are still alive
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.listener.strong_count() > 0)
            .count()
    }

    /// True if no live listener is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notify every live listener of `address`, returning how many were called
    pub fn notify_all(&mut self, address: &str) -> usize {
        self.entries.retain(|e| e.listener.strong_count() > 0);

        let mut delivered = 0;
        for entry in &self.entries {
            let Some(listener) = entry.listener.upgrade() else {
                continue;
            };
            delivered += 1;
            match catch_unwind(AssertUnwindSafe(|| listener.on_ip_address_changed(address))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("IP address listener {:?} failed: {}", entry.id, e),
                Err(_) => warn!("IP address listener {:?} panicked", entry.id),
            }
        }

        debug!("Notified {} listener(s) of address {}", delivered, address);
        delivered
    }
}
