//! Change notifications delivered to subscribers.

use crate::value::Value;

/// One notification about one keypath.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Keypath whose observer emitted this change. For the model-wide stream
    /// this is the path that was `set`.
    pub path: String,

    /// What happened.
    pub kind: ChangeKind,

    /// Identifies the logical update (one `set` or one array mutation) that
    /// produced this change. Every notification caused by the same update
    /// carries the same revision.
    pub revision: u64,
}

/// The shape of a change.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
    /// The value at the path was replaced. `None` means the path does not
    /// resolve to anything.
    Set {
        value: Option<Value>,
        previous: Option<Value>,
    },

    /// Elements were added to the array at the path.
    Add(Vec<Value>),

    /// Elements were removed from the array at the path.
    Remove(Vec<Value>),

    /// The array at the path was reordered in place.
    Sort,
}

impl Change {
    pub(crate) fn set(
        path: &str,
        value: Option<Value>,
        previous: Option<Value>,
        revision: u64,
    ) -> Self {
        Self {
            path: path.to_string(),
            kind: ChangeKind::Set { value, previous },
            revision,
        }
    }

    /// The new value, for replacements.
    pub fn value(&self) -> Option<&Value> {
        match &self.kind {
            ChangeKind::Set { value, .. } => value.as_ref(),
            _ => None,
        }
    }

    /// The replaced value, for replacements.
    pub fn previous(&self) -> Option<&Value> {
        match &self.kind {
            ChangeKind::Set { previous, .. } => previous.as_ref(),
            _ => None,
        }
    }

    /// Elements carried by an `Add` or `Remove`.
    pub fn items(&self) -> &[Value] {
        match &self.kind {
            ChangeKind::Add(items) | ChangeKind::Remove(items) => items,
            _ => &[],
        }
    }

    /// Whether this is a structural array edit rather than a replacement.
    pub fn is_mutation(&self) -> bool {
        !matches!(self.kind, ChangeKind::Set { .. })
    }

    /// `"set"`, `"add"`, `"remove"` or `"sort"`.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ChangeKind::Set { .. } => "set",
            ChangeKind::Add(_) => "add",
            ChangeKind::Remove(_) => "remove",
            ChangeKind::Sort => "sort",
        }
    }
}
