use crate::id::ItemKindId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A set of allowed item kinds.
///
/// Used both for the immutable ingredient filter of a process and for the
/// mutable product/ingredient filters a player toggles on a fermenter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFilter {
    allowed: BTreeSet<ItemKindId>,
}

impl ItemFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allows(&self, kind: ItemKindId) -> bool {
        self.allowed.contains(&kind)
    }

    /// Allow or disallow a kind. Returns whether the filter changed.
    pub fn set_allowed(&mut self, kind: ItemKindId, allowed: bool) -> bool {
        if allowed {
            self.allowed.insert(kind)
        } else {
            self.allowed.remove(&kind)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    /// Allowed kinds in ascending id order.
    pub fn kinds(&self) -> impl Iterator<Item = ItemKindId> + '_ {
        self.allowed.iter().copied()
    }

    /// The lowest allowed kind, if any.
    pub fn first(&self) -> Option<ItemKindId> {
        self.allowed.first().copied()
    }

    pub fn is_subset_of(&self, other: &ItemFilter) -> bool {
        self.allowed.is_subset(&other.allowed)
    }

    pub fn union_with(&mut self, other: &ItemFilter) {
        self.allowed.extend(other.allowed.iter().copied());
    }

    pub fn intersection(&self, other: &ItemFilter) -> ItemFilter {
        ItemFilter {
            allowed: self.allowed.intersection(&other.allowed).copied().collect(),
        }
    }
}

impl FromIterator<ItemKindId> for ItemFilter {
    fn from_iter<I: IntoIterator<Item = ItemKindId>>(iter: I) -> Self {
        Self {
            allowed: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(ids: &[u32]) -> ItemFilter {
        ids.iter().map(|i| ItemKindId(*i)).collect()
    }

    #[test]
    fn set_allowed_reports_change() {
        let mut f = ItemFilter::new();
        assert!(f.set_allowed(ItemKindId(1), true));
        assert!(!f.set_allowed(ItemKindId(1), true));
        assert!(f.allows(ItemKindId(1)));
        assert!(f.set_allowed(ItemKindId(1), false));
        assert!(f.is_empty());
    }

    #[test]
    fn subset_and_intersection() {
        let a = filter(&[1, 2]);
        let b = filter(&[1, 2, 3]);
        assert!(a.is_subset_of(&b));
        assert!(!b.is_subset_of(&a));
        assert_eq!(b.intersection(&filter(&[2, 3, 9])), filter(&[2, 3]));
    }

    #[test]
    fn union_merges_kinds() {
        let mut a = filter(&[1]);
        a.union_with(&filter(&[4, 1]));
        assert_eq!(a.kinds().collect::<Vec<_>>(), vec![ItemKindId(1), ItemKindId(4)]);
        assert_eq!(a.first(), Some(ItemKindId(1)));
    }
}
