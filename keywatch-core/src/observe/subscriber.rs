//! Subscriber types for the observation engine.
//!
//! An [`Emitter`] is the event primitive every observer (and the model-wide
//! change stream) is built from. A [`Subscription`] is what callers hold to
//! detach their callback again.
//!
//! # Re-entrancy
//!
//! The listener list is guarded by a `parking_lot::Mutex` that is never held
//! while a callback runs, so callbacks can subscribe, unsubscribe or `set`
//! further values from inside a notification.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::change::Change;
use crate::error::Result;

/// Unique identifier for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared change callback.
///
/// Returning an error aborts the notification round and propagates to the
/// caller of the `set` (or array mutation) that triggered it.
pub type Callback = Arc<dyn Fn(&Change) -> Result<()> + Send + Sync>;

/// Synchronous change emitter.
#[derive(Default)]
pub struct Emitter {
    listeners: Mutex<Vec<(ListenerId, Callback)>>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn on(&self, callback: Callback) -> ListenerId {
        let id = ListenerId::new();
        self.listeners.lock().push((id, callback));
        id
    }

    /// Remove exactly the listener registered under `id`.
    ///
    /// Returns whether anything was removed; removing twice is harmless.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Deliver `change` to every listener registered when the emission
    /// starts.
    ///
    /// A listener removed by an earlier callback in the same round is
    /// skipped. The first error stops the round.
    pub fn emit(&self, change: &Change) -> Result<()> {
        let snapshot: Vec<(ListenerId, Callback)> = self
            .listeners
            .lock()
            .iter()
            .map(|(id, cb)| (*id, Arc::clone(cb)))
            .collect();

        for (id, callback) in snapshot {
            if !self.contains(id) {
                continue;
            }
            callback(change)?;
        }
        Ok(())
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.listeners.lock().iter().any(|(lid, _)| *lid == id)
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by the `watch_*` methods of a [`Model`](crate::Model).
///
/// Dropping a subscription does not detach it; call
/// [`unsubscribe`](Subscription::unsubscribe).
pub struct Subscription {
    targets: Mutex<Vec<(Weak<Emitter>, ListenerId)>>,
}

impl Subscription {
    pub(crate) fn new(targets: Vec<(Weak<Emitter>, ListenerId)>) -> Self {
        Self {
            targets: Mutex::new(targets),
        }
    }

    /// Detach the callback from every emitter it was registered on.
    ///
    /// Takes effect immediately, including for an emission already in
    /// progress. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        let targets = std::mem::take(&mut *self.targets.lock());
        for (emitter, id) in targets {
            if let Some(emitter) = emitter.upgrade() {
                emitter.off(id);
            }
        }
    }

    /// Whether [`unsubscribe`](Subscription::unsubscribe) has not been called yet.
    pub fn is_active(&self) -> bool {
        !self.targets.lock().is_empty()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("targets", &self.targets.lock().len())
            .finish()
    }
}
