//! Cascade Context
//!
//! Notification is synchronous, so a subscriber that calls `set` re-enters the
//! cascade on the same stack. Two guards keep that re-entrancy bounded:
//!
//! - [`DepthGuard`] counts nested `set` calls and fails once the configured
//!   limit is exceeded.
//! - [`ComputeGuard`] keeps the stack of computed targets currently being
//!   recomputed. Re-entering a target that is already on the stack means the
//!   computed properties feed back into themselves.
//!
//! Both are RAII guards: the state is restored when the guard drops, including
//! when the cascade unwinds with an error.
//!
//! # Implementation
//!
//! Nesting only happens within one call stack, so the state lives in a
//! thread-local table keyed by context. Two threads writing to the same model
//! each see their own depth and their own recompute stack. A thread's entry is
//! removed once its last guard drops.

use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ObserveError, Result};

thread_local! {
    static FRAMES: RefCell<HashMap<u64, Frame>> = RefCell::new(HashMap::new());
}

/// Cascade state of one context on one thread.
#[derive(Debug, Default)]
struct Frame {
    depth: usize,
    computing: Vec<String>,
}

impl Frame {
    fn is_idle(&self) -> bool {
        self.depth == 0 && self.computing.is_empty()
    }
}

/// Per-model cascade bookkeeping.
#[derive(Debug)]
pub struct CascadeContext {
    id: u64,
}

impl CascadeContext {
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Current `set` nesting depth on this thread.
    pub fn depth(&self) -> usize {
        self.read(|frame| frame.depth)
    }

    /// Computed targets being recomputed on this thread, outermost first.
    pub fn computing(&self) -> Vec<String> {
        self.read(|frame| frame.computing.clone())
    }

    fn read<T>(&self, f: impl FnOnce(&Frame) -> T) -> T {
        FRAMES.with(|frames| {
            let frames = frames.borrow();
            match frames.get(&self.id) {
                Some(frame) => f(frame),
                None => f(&Frame::default()),
            }
        })
    }

    fn update<T>(&self, f: impl FnOnce(&mut Frame) -> T) -> T {
        FRAMES.with(|frames| {
            let mut frames = frames.borrow_mut();
            let frame = frames.entry(self.id).or_default();
            let result = f(frame);
            if frame.is_idle() {
                frames.remove(&self.id);
            }
            result
        })
    }
}

impl Default for CascadeContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for one level of `set` nesting.
pub struct DepthGuard<'a> {
    context: &'a CascadeContext,

    // Must drop on the thread that entered it.
    _not_send: PhantomData<*const ()>,
}

impl<'a> DepthGuard<'a> {
    /// Enter one more level, failing if that exceeds `limit`.
    pub fn enter(context: &'a CascadeContext, limit: usize, path: &str) -> Result<Self> {
        let entered = context.update(|frame| {
            if frame.depth >= limit {
                return false;
            }
            frame.depth += 1;
            true
        });
        if !entered {
            tracing::warn!(path, limit, "cascade depth limit exceeded");
            return Err(ObserveError::DepthLimit {
                limit,
                path: path.to_string(),
            });
        }
        Ok(Self {
            context,
            _not_send: PhantomData,
        })
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.context
            .update(|frame| frame.depth = frame.depth.saturating_sub(1));
    }
}

/// Guard marking a computed target as being recomputed.
pub struct ComputeGuard<'a> {
    context: &'a CascadeContext,
    target: String,
    _not_send: PhantomData<*const ()>,
}

impl<'a> ComputeGuard<'a> {
    /// Push `target` onto this thread's recompute stack.
    ///
    /// Fails with [`ObserveError::CyclicDependency`] if `target` is already
    /// being recomputed further up the same stack.
    pub fn enter(context: &'a CascadeContext, target: &str) -> Result<Self> {
        let cycle = context.update(|frame| {
            if frame.computing.iter().any(|entry| entry == target) {
                return Some(frame.computing.clone());
            }
            frame.computing.push(target.to_string());
            None
        });
        if let Some(stack) = cycle {
            tracing::warn!(computed = target, ?stack, "computed property re-entered itself");
            return Err(ObserveError::CyclicDependency {
                path: target.to_string(),
            });
        }
        Ok(Self {
            context,
            target: target.to_string(),
            _not_send: PhantomData,
        })
    }
}

impl Drop for ComputeGuard<'_> {
    fn drop(&mut self) {
        let popped = self.context.update(|frame| frame.computing.pop());

        // Guards are strictly nested, so the top must be ours.
        debug_assert_eq!(
            popped.as_deref(),
            Some(self.target.as_str()),
            "ComputeGuard mismatch"
        );
    }
}
