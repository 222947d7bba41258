//! Association reconciliation for many-to-many relations
//!
//! Every relation kind (role → capability, group → role, group → marking,
//! user → group) converges the same way: unassign what is linked but no longer
//! wanted, then resolve and assign what is wanted but not yet linked.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// A related entity as seen on the remote side
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Linked {
    pub id: String,
    pub name: String,
}

impl Linked {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// What to do with a desired name that matches no remote entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnresolvedPolicy {
    /// Abort with an unresolved reference error
    #[default]
    Fail,
    /// Drop the name from the result and carry on
    Ignore,
}

/// Pure set difference between linked and desired names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameDiff {
    /// Linked and still desired
    pub retained: BTreeSet<String>,
    /// Linked but no longer desired
    pub to_remove: BTreeSet<String>,
    /// Desired but not linked
    pub to_add: BTreeSet<String>,
}

impl NameDiff {
    /// Compute the difference between current and desired name sets
    pub fn compute<'a, C, D>(current: C, desired: D) -> Self
    where
        C: IntoIterator<Item = &'a str>,
        D: IntoIterator<Item = &'a str>,
    {
        let current: BTreeSet<&str> = current.into_iter().collect();
        let desired: BTreeSet<&str> = desired.into_iter().collect();

        Self {
            retained: owned(current.intersection(&desired)),
            to_remove: owned(current.difference(&desired)),
            to_add: owned(desired.difference(&current)),
        }
    }

    /// Check if nothing needs to change
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

fn owned<'a, 'b: 'a>(names: impl Iterator<Item = &'a &'b str>) -> BTreeSet<String> {
    names.map(|n| (*n).to_string()).collect()
}

/// Outcome of reconciling one relation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// Resulting linked names, sorted
    pub names: Vec<String>,
    /// Names newly assigned, sorted
    pub assigned: Vec<String>,
    /// Names unassigned, sorted
    pub unassigned: Vec<String>,
    /// Desired names that matched nothing, sorted
    pub unresolved: Vec<String>,
}

impl Reconciled {
    /// Number of assign and unassign calls issued
    pub fn changes(&self) -> usize {
        self.assigned.len() + self.unassigned.len()
    }
}

/// One relation of one entity, ready to be reconciled
///
/// `relation` is the human-readable name of the related kind ("capability",
/// "group", ...). It is used for logging and in unresolved reference errors.
pub struct Association<'a> {
    pub relation: &'a str,
    /// Entities currently linked, from an authoritative read
    pub current: &'a [Linked],
    /// Desired names from configuration
    pub desired: &'a [String],
    pub policy: UnresolvedPolicy,
}

impl Association<'_> {
    /// Converge the remote links to the desired names
    ///
    /// * `list_available` - full listing of the related kind, used to resolve
    ///   names to ids; only called when something needs to be added
    /// * `assign` - link one entity
    /// * `unassign` - unlink one entity
    ///
    /// Names are resolved before any link changes. After that, any callback
    /// error aborts immediately and links already changed stay changed.
    pub fn reconcile<L, A, U>(
        &self,
        list_available: L,
        mut assign: A,
        mut unassign: U,
    ) -> Result<Reconciled>
    where
        L: FnOnce() -> Result<Vec<Linked>>,
        A: FnMut(&Linked) -> Result<()>,
        U: FnMut(&Linked) -> Result<()>,
    {
        let diff = NameDiff::compute(
            self.current.iter().map(|l| l.name.as_str()),
            self.desired.iter().map(String::as_str),
        );

        let mut result = Reconciled::default();
        let mut names = diff.retained.clone();

        // Resolve before unlinking so a bad name leaves the links untouched
        let available = if diff.to_add.is_empty() {
            Vec::new()
        } else {
            list_available()?
        };
        let index: HashMap<&str, &Linked> =
            available.iter().map(|l| (l.name.as_str(), l)).collect();
        let unresolved: Vec<String> = diff
            .to_add
            .iter()
            .filter(|name| !index.contains_key(name.as_str()))
            .cloned()
            .collect();

        if !unresolved.is_empty() && self.policy == UnresolvedPolicy::Fail {
            return Err(Error::UnresolvedReference {
                relation: self.relation.to_string(),
                names: unresolved,
            });
        }

        for linked in self.current {
            if diff.to_remove.contains(&linked.name) {
                log::info!("Removing {}: {}", self.relation, linked.name);
                unassign(linked)?;
                result.unassigned.push(linked.name.clone());
            }
        }

        for name in &diff.to_add {
            if let Some(linked) = index.get(name.as_str()) {
                log::info!("Adding {}: {}", self.relation, name);
                assign(*linked)?;
                result.assigned.push(name.clone());
                names.insert(name.clone());
            } else {
                log::warn!("No {} named {:?} exists, skipping", self.relation, name);
            }
        }
        result.unresolved = unresolved;

        result.unassigned.sort();
        result.names = names.into_iter().collect();
        log::debug!("{} after reconciliation: {:?}", self.relation, result.names);
        Ok(result)
    }

    /// Check the names to add against a listing, before anything is changed
    ///
    /// Under [`UnresolvedPolicy::Fail`] this raises the error `reconcile` would
    /// raise, so a caller can validate references before creating the owning
    /// entity.
    pub fn preflight(&self, available: &[Linked]) -> Result<()> {
        if self.policy == UnresolvedPolicy::Ignore {
            return Ok(());
        }

        let known: BTreeSet<&str> = self
            .current
            .iter()
            .chain(available)
            .map(|l| l.name.as_str())
            .collect();
        let unresolved: BTreeSet<&str> = self
            .desired
            .iter()
            .map(String::as_str)
            .filter(|name| !known.contains(name))
            .collect();

        if unresolved.is_empty() {
            Ok(())
        } else {
            Err(Error::UnresolvedReference {
                relation: self.relation.to_string(),
                names: unresolved.into_iter().map(ToString::to_string).collect(),
            })
        }
    }
}

/// Flatten linked entities into a sorted name list
pub fn sorted_names(linked: &[Linked]) -> Vec<String> {
    let mut names: Vec<String> = linked.iter().map(|l| l.name.clone()).collect();
    names.sort();
    names
}
