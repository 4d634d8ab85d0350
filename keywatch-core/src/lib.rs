//! Keywatch Core
//!
//! This crate provides a keypath change-observation engine. It implements:
//!
//! - Observable models addressed by dot-separated keypaths
//! - Dirty-checked change propagation to a path and all its ancestors
//! - Computed properties derived from other keypaths
//! - Mutation events for arrays edited in place
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `keypath`: Keypath validation and ancestor resolution
//! - `value`: The dynamic value tree stored in a model
//! - `observe`: Models, path observers, observable arrays and subscriptions
//! - `graph`: Dependency graph used to reject cyclic computed properties
//! - `config`: Model configuration
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use std::sync::Arc;
//!
//! use keywatch_core::{Model, Value};
//!
//! let model = Model::new();
//! model.set("foo.bar", "baz").unwrap();
//!
//! let calls = Arc::new(AtomicI32::new(0));
//! let calls_clone = calls.clone();
//! model
//!     .watch_path("foo", move |_| {
//!         calls_clone.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! // Writing below `foo` notifies watchers of `foo`.
//! model.set("foo.bar", "qux").unwrap();
//! // Writing the same value again notifies nobody.
//! model.set("foo.bar", "qux").unwrap();
//!
//! assert_eq!(calls.load(Ordering::SeqCst), 1);
//! assert_eq!(model.get("foo.bar").unwrap(), Some(Value::from("qux")));
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod keypath;
pub mod observe;
pub mod value;

pub use config::ModelConfig;
pub use error::{ObserveError, Result};
pub use observe::{
    ArrayEvent, Change, ChangeKind, Model, ObservableArray, PathObserver, Subscription,
};
pub use value::{Map, Value};
