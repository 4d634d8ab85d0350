//! Computed Properties
//!
//! A computed property is a keypath whose value is derived from other
//! keypaths. It is evaluated once when bound, then again whenever one of its
//! dependencies changes, and the result is written back with an ordinary
//! `set`. Subscribers of the target therefore see computed values exactly like
//! any other write, and only when the result actually changes.
//!
//! Cycles are rejected when the binding is made (see
//! [`DependencyGraph`](crate::graph::DependencyGraph)). A recompute that still
//! re-enters its own target at runtime fails with
//! [`ObserveError::CyclicDependency`](crate::ObserveError::CyclicDependency).

use std::sync::Arc;

use super::context::ComputeGuard;
use super::model::Model;
use crate::error::Result;
use crate::keypath;
use crate::value::Value;

type ComputeFn = Box<dyn Fn(&[Option<Value>]) -> Value + Send + Sync>;

struct ComputedBinding {
    target: String,
    dependencies: Vec<String>,
    compute: ComputeFn,
}

impl ComputedBinding {
    fn recompute(&self, model: &Model) -> Result<()> {
        let _guard = ComputeGuard::enter(model.context(), &self.target)?;

        let inputs = self
            .dependencies
            .iter()
            .map(|dependency| model.get(dependency))
            .collect::<Result<Vec<_>>>()?;
        let value = (self.compute)(&inputs);

        tracing::debug!(computed = %self.target, "recomputed");
        model.set(&self.target, value)?;
        Ok(())
    }
}

impl Model {
    /// Bind `target` to the result of `compute` over `dependencies`.
    ///
    /// `compute` receives the current dependency values in the order given,
    /// with `None` for missing paths.
    ///
    /// If the first evaluation fails (for example because a subscriber of
    /// `target` returns an error), the binding is undone and `target` can be
    /// bound again. A value that evaluation already wrote stays in place.
    ///
    /// # Example
    ///
    /// ```rust
    /// use keywatch_core::{Model, Value};
    ///
    /// let model = Model::new();
    /// model.set("one", 1).unwrap();
    /// model.set("two", 2).unwrap();
    ///
    /// model
    ///     .computed("three", &["one", "two"], |values| {
    ///         let sum: i64 = values
    ///             .iter()
    ///             .map(|value| value.as_ref().and_then(Value::as_i64).unwrap_or(0))
    ///             .sum();
    ///         Value::from(sum)
    ///     })
    ///     .unwrap();
    ///
    /// model.set("one", 2).unwrap();
    /// assert_eq!(model.get("three").unwrap(), Some(Value::from(4)));
    /// ```
    pub fn computed<F>(&self, target: &str, dependencies: &[&str], compute: F) -> Result<()>
    where
        F: Fn(&[Option<Value>]) -> Value + Send + Sync + 'static,
    {
        keypath::validate(target)?;
        for dependency in dependencies {
            keypath::validate(dependency)?;
        }
        let dependencies: Vec<String> = dependencies.iter().map(|d| d.to_string()).collect();

        self.graph().lock().bind(target, &dependencies)?;
        tracing::debug!(computed = target, ?dependencies, "bound computed property");

        let binding = Arc::new(ComputedBinding {
            target: target.to_string(),
            dependencies,
            compute: Box::new(compute),
        });
        if let Err(err) = self.wire(&binding) {
            self.graph().lock().unbind(target);
            tracing::debug!(computed = target, error = %err, "computed binding rolled back");
            return Err(err);
        }
        Ok(())
    }

    /// Evaluate `binding` once, then recompute it on every dependency change.
    fn wire(&self, binding: &Arc<ComputedBinding>) -> Result<()> {
        binding.recompute(self)?;

        let model = self.downgrade();
        let handler = Arc::clone(binding);
        // The subscription lives as long as the dependency observers.
        self.watch_paths(binding.dependencies.as_slice(), move |_| match model.upgrade() {
            Some(model) => handler.recompute(&model),
            None => Ok(()),
        })?;
        Ok(())
    }
}
