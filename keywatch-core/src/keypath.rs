//! Keypath Resolution
//!
//! A keypath is a dot-separated address into a nested value, e.g.
//! `"foo.bar.baz"`. Every keypath defines an ordered ancestor chain from the
//! root segment down to the full path:
//!
//! ```text
//! "a.b.c"  ->  ["a", "a.b", "a.b.c"]
//! ```
//!
//! The cascade in [`Model::set`](crate::Model::set) walks this chain to find
//! observers whose value may have changed.

use smallvec::SmallVec;

use crate::error::{ObserveError, Result};

/// Separator between keypath segments.
pub const SEPARATOR: char = '.';

/// Ancestor chain of a keypath, root first. Most keypaths are shallow, so the
/// chain lives inline.
pub type Ancestors = SmallVec<[String; 4]>;

/// Check that `path` is a usable keypath.
///
/// The empty string and paths with empty segments (`"a..b"`, `".a"`, `"a."`)
/// are rejected.
pub fn validate(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(ObserveError::invalid_keypath(path, "keypath is empty"));
    }
    if path.split(SEPARATOR).any(str::is_empty) {
        return Err(ObserveError::invalid_keypath(path, "keypath has an empty segment"));
    }
    Ok(())
}

/// Split a keypath into its segments.
pub fn segments(path: &str) -> Result<SmallVec<[&str; 4]>> {
    validate(path)?;
    Ok(path.split(SEPARATOR).collect())
}

/// Resolve a keypath into its ancestor chain, root first and inclusive of the
/// path itself.
pub fn resolve(path: &str) -> Result<Ancestors> {
    validate(path)?;

    let mut ancestors = Ancestors::new();
    for (idx, ch) in path.char_indices() {
        if ch == SEPARATOR {
            ancestors.push(path[..idx].to_string());
        }
    }
    ancestors.push(path.to_string());
    Ok(ancestors)
}

/// Whether `ancestor` is `path` or one of its ancestors.
pub fn is_ancestor(ancestor: &str, path: &str) -> bool {
    match path.strip_prefix(ancestor) {
        Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
        None => false,
    }
}

/// Whether `path` lies strictly below `ancestor`.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len() && is_ancestor(ancestor, path)
}

/// Whether either keypath is an ancestor of the other.
pub fn is_related(a: &str, b: &str) -> bool {
    is_ancestor(a, b) || is_ancestor(b, a)
}
