//! Change tracking: the difference between an entry's current attributes
//! and the state last read from (or written to) the directory, and its
//! translation into modify operations.

use std::fmt;

use indexmap::IndexMap;
use unicase::UniCase;

use crate::attributes::{AttributeStore, AttributeValue};


/// The persisted and current values of one attribute. `None` means the
/// attribute was not present on that side.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Change {
    pub old: Option<Vec<AttributeValue>>,
    pub new: Option<Vec<AttributeValue>>,
}
impl Change {
    pub fn kind(&self) -> Option<ModifyKind> {
        classify(self.old.as_deref(), self.new.as_deref())
    }
}


/// Pending changes, keyed by attribute name, in the order they were detected.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Changes {
    changes: IndexMap<UniCase<String>, Change>,
}
impl Changes {
    pub fn get(&self, name: &str) -> Option<&Change> {
        self.changes.get(&UniCase::new(name.to_owned()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Change)> {
        self.changes.iter()
            .map(|(name, change)| (name.as_ref(), change))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.changes.keys()
            .map(|name| name.as_ref())
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ModifyKind {
    Add,
    Replace,
    Delete,
}
impl fmt::Display for ModifyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Replace => write!(f, "replace"),
            Self::Delete => write!(f, "delete"),
        }
    }
}


/// One attribute modification sent to the directory.
///
/// A `Delete` with no values removes the whole attribute.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ModifyOperation {
    pub kind: ModifyKind,
    pub attribute: String,
    pub values: Vec<AttributeValue>,
}


/// Compares `current` against `persisted`.
///
/// An absent attribute and one with an empty value list are equal, so
/// materialized defaults never show up as changes. Value lists are compared
/// in order.
pub fn compute_changes(current: &AttributeStore, persisted: &AttributeStore) -> Changes {
    let mut changes = IndexMap::new();

    let current_names = current.names();
    let persisted_only = persisted.names()
        .filter(|name| !current.contains(name));
    for name in current_names.chain(persisted_only) {
        let new = current.get_present(name);
        let old = persisted.get_present(name);
        if new.unwrap_or_default() == old.unwrap_or_default() {
            continue;
        }
        changes.insert(
            UniCase::new(name.to_owned()),
            Change {
                old: old.map(|values| values.to_vec()),
                new: new.map(|values| values.to_vec()),
            },
        );
    }

    Changes { changes }
}

/// Decides which operation turns `old` into `new`.
///
/// Returns `None` if both sides are absent or empty.
pub fn classify(old: Option<&[AttributeValue]>, new: Option<&[AttributeValue]>) -> Option<ModifyKind> {
    let had_values = old.is_some_and(|values| !values.is_empty());
    let has_values = new.is_some_and(|values| !values.is_empty());
    match (had_values, has_values) {
        (true, true) => Some(ModifyKind::Replace),
        (false, true) => Some(ModifyKind::Add),
        (true, false) => Some(ModifyKind::Delete),
        (false, false) => None,
    }
}

/// One operation per changed attribute, in the order of `changes`.
pub fn build_modify_operations(changes: &Changes) -> Vec<ModifyOperation> {
    changes.iter()
        .filter_map(|(name, change)| {
            let kind = change.kind()?;
            let values = match kind {
                ModifyKind::Add | ModifyKind::Replace => change.new.clone().unwrap_or_default(),
                ModifyKind::Delete => Vec::new(),
            };
            Some(ModifyOperation {
                kind,
                attribute: name.to_owned(),
                values,
            })
        })
        .collect()
}
