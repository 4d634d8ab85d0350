//! Observable Arrays and the Mutation Bridge
//!
//! An [`ObservableArray`] is a shared, growable sequence. Its mutating methods
//! do the edit first and then report it as an [`ArrayEvent`] through the
//! array's bridge slot:
//!
//! | operation                               | event                    |
//! |-----------------------------------------|--------------------------|
//! | `push`, `extend`, `insert`, `unshift`   | `Added(items)`           |
//! | `pop`, `shift`, `remove`, `remove_item`, `truncate`, `clear` | `Removed(items)` |
//! | `splice`                                | `Removed`, then `Added`  |
//! | `sort`, `sort_by`, `reverse`            | `Reordered`              |
//!
//! Operations that change nothing (popping an empty array, truncating to a
//! longer length) report nothing.
//!
//! # Bridge slot
//!
//! Each array instance has a single slot. [`MutationBridge::bind`] fills it and
//! hands back a [`BridgeBinding`]; binding an already bound array is a no-op.
//! Dropping the binding empties the slot and the array goes back to silent
//! mutation. A path observer owns the binding for the array that is its
//! current value.
//!
//! # Locking
//!
//! Items sit behind a `parking_lot::RwLock` that is released before the event
//! fires. Element comparisons (`remove_item`, `sort`, `sort_by`) run against a
//! snapshot taken outside the lock, so the compared values and a `sort_by`
//! comparator may read the array itself.
//!
//! An array must not contain itself, directly or through nested values.
//! Equality, `deep_clone` and `Debug` walk the whole tree and would not
//! terminate.

use std::cmp::Ordering;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::subscriber::ListenerId;
use crate::error::{ObserveError, Result};
use crate::value::Value;

/// A structural edit reported by an [`ObservableArray`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayEvent {
    Added(Vec<Value>),
    Removed(Vec<Value>),
    Reordered,
}

/// Receiver of a bound array's events.
pub type ArraySink = Arc<dyn Fn(ArrayEvent) -> Result<()> + Send + Sync>;

struct BridgeSlot {
    id: ListenerId,
    sink: ArraySink,
}

struct ArrayInner {
    items: RwLock<Vec<Value>>,
    bridge: Mutex<Option<BridgeSlot>>,
}

/// A shared array whose in-place edits can be observed.
///
/// Cloning the handle shares the instance; use
/// [`Value::deep_clone`](crate::Value::deep_clone) for an independent copy.
#[derive(Clone)]
pub struct ObservableArray {
    inner: Arc<ArrayInner>,
}

impl ObservableArray {
    /// Create a new array instance.
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            inner: Arc::new(ArrayInner {
                items: RwLock::new(items),
                bridge: Mutex::new(None),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.read().is_empty()
    }

    /// A clone of the element at `index`.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.items.read().get(index).cloned()
    }

    /// A clone of every element.
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.read().clone()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.inner.items.read().iter().any(|item| item == value)
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &ObservableArray) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Element-wise deep equality.
    pub fn content_eq(&self, other: &ObservableArray) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let ours = self.inner.items.read();
        let theirs = other.inner.items.read();
        *ours == *theirs
    }

    /// Whether a bridge is currently attached.
    pub fn is_bound(&self) -> bool {
        self.inner.bridge.lock().is_some()
    }

    // ------------------------------------------------------------------
    // Additions
    // ------------------------------------------------------------------

    pub fn push(&self, value: Value) -> Result<()> {
        self.inner.items.write().push(value.clone());
        self.notify_added(vec![value])
    }

    pub fn extend(&self, values: impl IntoIterator<Item = Value>) -> Result<()> {
        let values: Vec<Value> = values.into_iter().collect();
        self.inner.items.write().extend(values.iter().cloned());
        self.notify_added(values)
    }

    /// Insert at `index`, shifting later elements. `index` may equal the length.
    pub fn insert(&self, index: usize, value: Value) -> Result<()> {
        {
            let mut items = self.inner.items.write();
            if index > items.len() {
                return Err(ObserveError::IndexOutOfBounds {
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, value.clone());
        }
        self.notify_added(vec![value])
    }

    pub fn unshift(&self, value: Value) -> Result<()> {
        self.insert(0, value)
    }

    // ------------------------------------------------------------------
    // Removals
    // ------------------------------------------------------------------

    pub fn pop(&self) -> Result<Option<Value>> {
        let popped = self.inner.items.write().pop();
        if let Some(value) = &popped {
            self.notify_removed(vec![value.clone()])?;
        }
        Ok(popped)
    }

    pub fn shift(&self) -> Result<Option<Value>> {
        let shifted = {
            let mut items = self.inner.items.write();
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        };
        if let Some(value) = &shifted {
            self.notify_removed(vec![value.clone()])?;
        }
        Ok(shifted)
    }

    pub fn remove(&self, index: usize) -> Result<Value> {
        let removed = {
            let mut items = self.inner.items.write();
            if index >= items.len() {
                return Err(ObserveError::IndexOutOfBounds {
                    index,
                    len: items.len(),
                });
            }
            items.remove(index)
        };
        self.notify_removed(vec![removed.clone()])?;
        Ok(removed)
    }

    /// Remove the first element equal to `value`. Returns whether one was found.
    pub fn remove_item(&self, value: &Value) -> Result<bool> {
        let Some(index) = self.to_vec().iter().position(|item| item == value) else {
            return Ok(false);
        };
        let removed = {
            let mut items = self.inner.items.write();
            (index < items.len()).then(|| items.remove(index))
        };
        match removed {
            Some(item) => {
                self.notify_removed(vec![item])?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn truncate(&self, len: usize) -> Result<()> {
        let removed = {
            let mut items = self.inner.items.write();
            if len >= items.len() {
                return Ok(());
            }
            items.split_off(len)
        };
        self.notify_removed(removed)
    }

    pub fn clear(&self) -> Result<()> {
        self.truncate(0)
    }

    /// Remove `delete_count` elements starting at `start` and insert `items`
    /// in their place. Both bounds are clamped to the array. Returns the
    /// removed elements.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = Value>,
    ) -> Result<Vec<Value>> {
        let inserted: Vec<Value> = items.into_iter().collect();
        let removed: Vec<Value> = {
            let mut current = self.inner.items.write();
            let start = start.min(current.len());
            let end = start.saturating_add(delete_count).min(current.len());
            let removed = current.splice(start..end, inserted.iter().cloned()).collect();
            removed
        };
        self.notify_removed(removed.clone())?;
        self.notify_added(inserted)?;
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Reordering
    // ------------------------------------------------------------------

    /// Sort by [`Value::total_cmp`](crate::Value::total_cmp).
    pub fn sort(&self) -> Result<()> {
        self.sort_by(Value::total_cmp)
    }

    pub fn sort_by<F>(&self, compare: F) -> Result<()>
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        let mut sorted = self.to_vec();
        sorted.sort_by(compare);
        *self.inner.items.write() = sorted;
        self.emit(ArrayEvent::Reordered)
    }

    pub fn reverse(&self) -> Result<()> {
        self.inner.items.write().reverse();
        self.emit(ArrayEvent::Reordered)
    }

    // ------------------------------------------------------------------
    // Bridge plumbing
    // ------------------------------------------------------------------

    fn notify_added(&self, items: Vec<Value>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        self.emit(ArrayEvent::Added(items))
    }

    fn notify_removed(&self, items: Vec<Value>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        self.emit(ArrayEvent::Removed(items))
    }

    fn emit(&self, event: ArrayEvent) -> Result<()> {
        let sink = self
            .inner
            .bridge
            .lock()
            .as_ref()
            .map(|slot| Arc::clone(&slot.sink));
        match sink {
            Some(sink) => sink(event),
            None => Ok(()),
        }
    }

    fn attach(&self, sink: ArraySink) -> Option<ListenerId> {
        let mut slot = self.inner.bridge.lock();
        if slot.is_some() {
            return None;
        }
        let id = ListenerId::new();
        *slot = Some(BridgeSlot { id, sink });
        Some(id)
    }

    fn detach(&self, id: ListenerId) {
        let mut slot = self.inner.bridge.lock();
        if slot.as_ref().is_some_and(|bound| bound.id == id) {
            *slot = None;
        }
    }
}

impl FromIterator<Value> for ObservableArray {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Default for ObservableArray {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl std::fmt::Debug for ObservableArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.inner.items.read().iter()).finish()
    }
}

/// Entry point for wiring arrays to observers.
pub struct MutationBridge;

impl MutationBridge {
    /// Route the events of the array in `value` to `sink`.
    ///
    /// Returns `None` without doing anything when `value` is not an array or
    /// the array already has a bridge.
    pub fn bind<F>(value: &Value, sink: F) -> Option<BridgeBinding>
    where
        F: Fn(ArrayEvent) -> Result<()> + Send + Sync + 'static,
    {
        let array = value.as_array()?;
        let id = array.attach(Arc::new(sink))?;
        Some(BridgeBinding {
            array: array.clone(),
            id,
        })
    }
}

/// An attached bridge. Dropping it detaches the bridge.
pub struct BridgeBinding {
    array: ObservableArray,
    id: ListenerId,
}

impl Drop for BridgeBinding {
    fn drop(&mut self) {
        self.array.detach(self.id);
    }
}

impl std::fmt::Debug for BridgeBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeBinding")
            .field("id", &self.id)
            .field("len", &self.array.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
