//! Path Observer Implementation
//!
//! A `PathObserver` watches the value at one keypath of a model.
//!
//! # How Observers Work
//!
//! 1. On creation the observer snapshots the current value at its path. It is
//!    live from then on and never shuts down, even while the path resolves to
//!    nothing; if the path is repopulated later, it fires again.
//!
//! 2. After every `set` that may affect the path, the model calls
//!    [`refresh`](PathObserver::refresh) with the new value. The observer
//!    dirty-checks it against the value it holds using deep equality and only
//!    notifies when they differ.
//!
//! 3. When the held value is an array, the observer owns the mutation bridge
//!    for that array instance. In-place edits are forwarded to subscribers as
//!    `Add`/`Remove`/`Sort` changes directly, without a dirty check. When the
//!    value moves to another instance, the old bridge is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::array::{ArrayEvent, BridgeBinding, MutationBridge};
use super::change::{Change, ChangeKind};
use super::subscriber::{Callback, Emitter, ListenerId};
use crate::error::Result;
use crate::keypath;
use crate::value::Value;

struct ObserverState {
    current: Option<Value>,
    previous: Option<Value>,
    binding: Option<BridgeBinding>,
}

/// Observer for a single keypath.
pub struct PathObserver {
    path: String,

    /// Path split into segments, cached for store lookups.
    segments: Vec<String>,

    state: Mutex<ObserverState>,

    emitter: Arc<Emitter>,

    /// Revision counter shared with the owning model.
    revisions: Arc<AtomicU64>,

    this: Weak<PathObserver>,
}

impl PathObserver {
    /// Create an observer seeded with `initial`, the value at `path` right now.
    pub(crate) fn new(
        path: &str,
        initial: Option<Value>,
        revisions: Arc<AtomicU64>,
    ) -> Result<Arc<Self>> {
        let segments = keypath::segments(path)?
            .iter()
            .map(|segment| segment.to_string())
            .collect();

        let observer = Arc::new_cyclic(|this: &Weak<PathObserver>| Self {
            path: path.to_string(),
            segments,
            state: Mutex::new(ObserverState {
                current: None,
                previous: None,
                binding: None,
            }),
            emitter: Arc::new(Emitter::new()),
            revisions,
            this: this.clone(),
        });

        {
            let mut state = observer.state.lock();
            state.binding = initial.as_ref().and_then(|value| observer.bind(value));
            state.current = initial;
        }

        tracing::trace!(path, "observer created");
        Ok(observer)
    }

    /// The observed keypath.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn segments(&self) -> Vec<&str> {
        self.segments.iter().map(String::as_str).collect()
    }

    /// The value this observer currently holds. Arrays are returned as the
    /// live instance.
    pub fn current_value(&self) -> Option<Value> {
        self.state.lock().current.clone()
    }

    /// Snapshot of the value before the most recent replacement.
    pub fn previous_value(&self) -> Option<Value> {
        self.state.lock().previous.clone()
    }

    /// Whether the held value is an array with this observer's bridge attached.
    pub fn is_bridged(&self) -> bool {
        self.state.lock().binding.is_some()
    }

    /// Register a callback for future changes at this path.
    pub fn subscribe(&self, callback: Callback) -> ListenerId {
        self.emitter.on(callback)
    }

    /// Remove a callback registered with [`subscribe`](PathObserver::subscribe).
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.emitter.off(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.emitter.len()
    }

    pub(crate) fn emitter(&self) -> &Arc<Emitter> {
        &self.emitter
    }

    /// Dirty-check `value` against the held value and notify subscribers if
    /// it changed.
    ///
    /// Returns whether a notification was sent.
    pub fn refresh(&self, value: Option<Value>, revision: u64) -> Result<bool> {
        let change = {
            let mut state = self.state.lock();

            if state.current == value {
                self.adopt_instance(&mut state, value);
                return Ok(false);
            }

            // Detach before swapping so the old array goes quiet.
            state.binding = None;
            let previous = state.current.take().map(|old| old.deep_clone());
            state.binding = value.as_ref().and_then(|new| self.bind(new));
            state.current = value.clone();
            state.previous = previous.clone();

            Change::set(&self.path, value, previous, revision)
        };

        tracing::trace!(path = %self.path, revision, "observer changed");
        self.emitter.emit(&change)?;
        Ok(true)
    }

    /// Equal content may still be a different array instance. Take the new
    /// instance so edits made through it keep reaching subscribers.
    fn adopt_instance(&self, state: &mut ObserverState, value: Option<Value>) {
        let (Some(Value::Array(held)), Some(Value::Array(next))) = (&state.current, &value) else {
            return;
        };
        if held.ptr_eq(next) {
            return;
        }
        state.binding = None;
        state.binding = value.as_ref().and_then(|new| self.bind(new));
        state.current = value;
    }

    fn bind(&self, value: &Value) -> Option<BridgeBinding> {
        let this = self.this.clone();
        MutationBridge::bind(value, move |event| match this.upgrade() {
            Some(observer) => observer.forward(event),
            None => Ok(()),
        })
    }

    /// Relay an array edit to subscribers.
    fn forward(&self, event: ArrayEvent) -> Result<()> {
        let kind = match event {
            ArrayEvent::Added(items) => ChangeKind::Add(items),
            ArrayEvent::Removed(items) => ChangeKind::Remove(items),
            ArrayEvent::Reordered => ChangeKind::Sort,
        };
        let revision = self.revisions.fetch_add(1, Ordering::SeqCst) + 1;
        let change = Change {
            path: self.path.clone(),
            kind,
            revision,
        };

        tracing::trace!(path = %self.path, revision, kind = change.kind_name(), "array mutation");
        self.emitter.emit(&change)
    }
}

impl std::fmt::Debug for PathObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathObserver")
            .field("path", &self.path)
            .field("current", &self.current_value())
            .field("bridged", &self.is_bridged())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
