//! Observation Graph
//!
//! A [`Model`] owns a backing store (a root object [`Value`]) and the cache of
//! [`PathObserver`]s created for it.
//!
//! # How a `set` Cascades
//!
//! 1. The path is validated and checked for arrays it would have to write
//!    through. Then its observer is created if this is the first time the
//!    path is seen.
//!
//! 2. If the new value deep-equals the stored one, nothing else happens.
//!
//! 3. Otherwise the value is written, creating intermediate objects.
//!
//! 4. Cached observers that may have changed are refreshed, bottom-up:
//!    observers below the path (when `notify_descendants` is on), the path
//!    itself, then each ancestor up to the root. Each one dirty-checks the
//!    value it reads from the store at that moment, so a subscriber that calls
//!    `set` itself is seen by the observers refreshed after it.
//!
//! 5. The model-wide stream fires once with the path, new value and old value.
//!
//! Every step runs on the caller's stack. No lock is held while callbacks
//! run.

use std::cmp::Reverse;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use super::change::Change;
use super::context::{CascadeContext, DepthGuard};
use super::observer::PathObserver;
use super::subscriber::{Callback, Emitter, Subscription};
use crate::config::ModelConfig;
use crate::error::{ObserveError, Result};
use crate::graph::DependencyGraph;
use crate::keypath;
use crate::value::Value;

pub(crate) struct ModelInner {
    config: ModelConfig,

    /// The backing store. Always an object at the root.
    store: RwLock<Value>,

    /// One observer per keypath ever requested, in creation order.
    observers: RwLock<IndexMap<String, Arc<PathObserver>>>,

    /// Model-wide change stream.
    global: Arc<Emitter>,

    /// Source of revision numbers, shared with every observer.
    revisions: Arc<AtomicU64>,

    context: CascadeContext,

    graph: Mutex<DependencyGraph>,
}

/// An observable object addressed by keypaths.
///
/// Cloning a `Model` yields another handle to the same state.
///
/// # Example
///
/// ```rust
/// use keywatch_core::{Change, Model, Value};
///
/// let model = Model::new();
/// model.set("user.name", "Ada").unwrap();
///
/// let subscription = model
///     .watch_path("user", |change: &Change| {
///         println!("user changed: {:?}", change.value());
///         Ok(())
///     })
///     .unwrap();
///
/// model.set("user.name", "Grace").unwrap();
/// subscription.unsubscribe();
///
/// assert_eq!(model.get("user.name").unwrap(), Some(Value::from("Grace")));
/// ```
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

/// Non-owning handle held by callbacks the model installs on itself.
#[derive(Clone)]
pub(crate) struct WeakModel {
    inner: Weak<ModelInner>,
}

impl WeakModel {
    pub(crate) fn upgrade(&self) -> Option<Model> {
        self.inner.upgrade().map(|inner| Model { inner })
    }
}

impl Model {
    /// Create an empty model with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ModelConfig::default())
    }

    pub fn with_config(config: ModelConfig) -> Self {
        Self {
            inner: Arc::new(ModelInner {
                config,
                store: RwLock::new(Value::object()),
                observers: RwLock::new(IndexMap::new()),
                global: Arc::new(Emitter::new()),
                revisions: Arc::new(AtomicU64::new(0)),
                context: CascadeContext::new(),
                graph: Mutex::new(DependencyGraph::new()),
            }),
        }
    }

    /// Create a model and `set` every entry of `properties`, which must be a
    /// JSON object (or null for none).
    pub fn from_json(properties: serde_json::Value) -> Result<Self> {
        let model = Self::new();
        model.apply_json(properties)?;
        Ok(model)
    }

    /// Create a model from `defaults`, then apply `properties` over them.
    pub fn with_defaults(
        defaults: serde_json::Value,
        properties: serde_json::Value,
    ) -> Result<Self> {
        let model = Self::new();
        model.apply_json(defaults)?;
        model.apply_json(properties)?;
        Ok(model)
    }

    fn apply_json(&self, properties: serde_json::Value) -> Result<()> {
        match properties {
            serde_json::Value::Null => Ok(()),
            serde_json::Value::Object(map) => {
                self.set_many(map.into_iter().map(|(key, value)| (key, Value::from(value))))?;
                Ok(())
            }
            other => Err(ObserveError::InvalidProperties(
                Value::from(other).type_name(),
            )),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.inner.config
    }

    pub(crate) fn context(&self) -> &CascadeContext {
        &self.inner.context
    }

    pub(crate) fn graph(&self) -> &Mutex<DependencyGraph> {
        &self.inner.graph
    }

    pub(crate) fn downgrade(&self) -> WeakModel {
        WeakModel {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn next_revision(&self) -> u64 {
        self.inner.revisions.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------

    /// Read the value at `path`.
    ///
    /// Missing segments yield `None`. Reading never creates observers or
    /// structure.
    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        let segments = keypath::segments(path)?;
        Ok(self.inner.store.read().lookup(&segments))
    }

    /// Deep copy of the whole backing store.
    pub fn snapshot(&self) -> Value {
        self.inner.store.read().deep_clone()
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.inner.store.read().to_json()
    }

    /// Keypaths that have an observer, in creation order.
    pub fn observed_paths(&self) -> Vec<String> {
        self.inner.observers.read().keys().cloned().collect()
    }

    /// Computed property targets, each after the computed properties it
    /// reads from.
    pub fn computed_properties(&self) -> Vec<String> {
        self.inner.graph.lock().evaluation_order()
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    /// The observer for `path`, created and seeded from the store on first
    /// request.
    pub fn observer(&self, path: &str) -> Result<Arc<PathObserver>> {
        keypath::validate(path)?;
        if let Some(observer) = self.inner.observers.read().get(path) {
            return Ok(Arc::clone(observer));
        }

        let initial = self.get(path)?;
        let mut observers = self.inner.observers.write();
        if let Some(observer) = observers.get(path) {
            return Ok(Arc::clone(observer));
        }
        let observer = PathObserver::new(path, initial, Arc::clone(&self.inner.revisions))?;
        observers.insert(path.to_string(), Arc::clone(&observer));
        Ok(observer)
    }

    /// Observers a write to `path` may affect, deepest first.
    fn cascade_targets(&self, path: &str, ancestors: &[String]) -> Vec<Arc<PathObserver>> {
        let observers = self.inner.observers.read();
        let mut targets: Vec<Arc<PathObserver>> = Vec::new();

        if self.inner.config.notify_descendants {
            targets.extend(
                observers
                    .iter()
                    .filter(|(observed, _)| keypath::is_descendant(observed, path))
                    .map(|(_, observer)| Arc::clone(observer)),
            );
            targets.sort_by_key(|observer| Reverse(observer.path().matches(keypath::SEPARATOR).count()));
        }

        targets.extend(
            ancestors
                .iter()
                .rev()
                .filter_map(|ancestor| observers.get(ancestor.as_str()).cloned()),
        );
        targets
    }

    // ------------------------------------------------------------------
    // Writing
    // ------------------------------------------------------------------

    /// Write `value` at `path` and notify every affected observer.
    ///
    /// Returns `false` without notifying anyone when the stored value is
    /// already deep-equal to `value`.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        let segments = keypath::segments(path)?;
        let ancestors = keypath::resolve(path)?;
        let _depth = DepthGuard::enter(
            &self.inner.context,
            self.inner.config.max_cascade_depth,
            path,
        )?;

        // A write that cannot apply must not leave an observer behind.
        self.inner.store.read().check_assign(path, &segments)?;
        self.observer(path)?;

        let previous = {
            let mut store = self.inner.store.write();
            let previous = store.lookup(&segments);
            if previous.as_ref() == Some(&value) {
                tracing::trace!(path, "value unchanged");
                return Ok(false);
            }
            store.assign(path, &segments, value.clone())?;
            previous
        };

        let revision = self.next_revision();
        tracing::trace!(path, revision, "set");

        for observer in self.cascade_targets(path, &ancestors) {
            let current = self.inner.store.read().lookup(&observer.segments());
            observer.refresh(current, revision)?;
        }

        if !self.inner.global.is_empty() {
            let change = Change::set(
                path,
                Some(value),
                previous.map(|old| old.deep_clone()),
                revision,
            );
            self.inner.global.emit(&change)?;
        }
        Ok(true)
    }

    /// Apply each entry as its own `set`, in iteration order.
    ///
    /// Returns how many entries changed a value. Stops at the first error;
    /// entries before it stay applied.
    pub fn set_many<I, K, V>(&self, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut changed = 0;
        for (path, value) in entries {
            if self.set(path.as_ref(), value)? {
                changed += 1;
            }
        }
        Ok(changed)
    }

    // ------------------------------------------------------------------
    // Subscribing
    // ------------------------------------------------------------------

    /// Call `callback` on every future change at `path`.
    pub fn watch_path<F>(&self, path: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(&Change) -> Result<()> + Send + Sync + 'static,
    {
        self.watch_paths(&[path], callback)
    }

    /// Call `callback` on every future change at any of `paths`.
    ///
    /// One logical update that touches several of the paths (for example
    /// `set("foo", ..)` while watching `foo` and `foo.bar`) calls `callback`
    /// once.
    pub fn watch_paths<P, F>(&self, paths: &[P], callback: F) -> Result<Subscription>
    where
        P: AsRef<str>,
        F: Fn(&Change) -> Result<()> + Send + Sync + 'static,
    {
        for path in paths {
            keypath::validate(path.as_ref())?;
        }

        let last_revision = AtomicU64::new(0);
        let deduped: Callback = Arc::new(move |change: &Change| -> Result<()> {
            if last_revision.swap(change.revision, Ordering::SeqCst) == change.revision {
                return Ok(());
            }
            callback(change)
        });

        let mut targets = Vec::with_capacity(paths.len());
        for path in paths {
            let observer = self.observer(path.as_ref())?;
            let id = observer.subscribe(Arc::clone(&deduped));
            targets.push((Arc::downgrade(observer.emitter()), id));
        }
        Ok(Subscription::new(targets))
    }

    /// Call `callback` once for every effective `set` on this model.
    ///
    /// The change carries the written path, the new value and the old one.
    pub fn watch_all<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Change) -> Result<()> + Send + Sync + 'static,
    {
        let id = self.inner.global.on(Arc::new(callback));
        Subscription::new(vec![(Arc::downgrade(&self.inner.global), id)])
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("store", &*self.inner.store.read())
            .field("observers", &self.inner.observers.read().len())
            .field("depth", &self.inner.context.depth())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
