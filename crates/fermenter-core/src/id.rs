use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a progress record (batch) inside one fermenter.
    ///
    /// Keys are generational: a key for an extracted or reset batch never
    /// resolves again, even if its slot is reused.
    pub struct ProgressId;

    /// Identifies a fermenter registered with a [`crate::site::FermenterSite`].
    pub struct FermenterId;
}

/// Identifies an item kind in the catalog. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKindId(pub u32);

/// Identifies a process definition in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub u32);

/// Identifies a fermenter type (building template) in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FermenterTypeId(pub u32);

/// Opaque handle to a host-side item instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ThingId(pub u64);

impl ThingId {
    /// Stands in for items that have no host-side instance, e.g. stacks
    /// synthesized while migrating a legacy single-batch save.
    pub const SYNTHESIZED: ThingId = ThingId(u64::MAX);

    pub fn is_synthesized(self) -> bool {
        self == Self::SYNTHESIZED
    }
}
