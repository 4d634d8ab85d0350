//! Observation Primitives
//!
//! This module implements keypath observation: the model, the per-path
//! observers it caches, computed properties and observable arrays.
//!
//! # Concepts
//!
//! ## Model
//!
//! A [`Model`] holds a tree of [`Value`](crate::Value)s. Any keypath in it can
//! be read, written or watched, whether or not it exists yet.
//!
//! ## Path Observers
//!
//! A [`PathObserver`] holds the last value it saw at one keypath. After each
//! write the model asks every observer the write may have affected to compare
//! again, and only the ones whose value really changed notify. Writing
//! `foo.bar` can therefore notify watchers of `foo`, but writing the same
//! value twice notifies nobody.
//!
//! ## Observable Arrays
//!
//! Arrays are shared handles. Edits made in place through an
//! [`ObservableArray`] do not go through `set`; the observer holding the
//! array attaches a [`MutationBridge`] to it and reports the edits as
//! `add`, `remove` and `sort` changes.
//!
//! ## Computed Properties
//!
//! A computed property is a keypath derived from other keypaths and kept up
//! to date by the model. See [`Model::computed`].
//!
//! # Implementation Notes
//!
//! Everything is synchronous and runs on the caller's stack. Callbacks may
//! call back into the model; the [`CascadeContext`] bounds how deep that can
//! go.

mod array;
mod change;
mod computed;
mod context;
mod model;
mod observer;
mod subscriber;

pub use array::{ArrayEvent, ArraySink, BridgeBinding, MutationBridge, ObservableArray};
pub use change::{Change, ChangeKind};
pub use context::{CascadeContext, ComputeGuard, DepthGuard};
pub use model::Model;
pub use observer::PathObserver;
pub use subscriber::{Callback, Emitter, ListenerId, Subscription};
