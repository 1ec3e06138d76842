use crate::id::{ItemKindId, ProgressId};
use crate::item::Thing;

/// Why an ingredient could not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityReason {
    /// The resolved process has no room left.
    Full,
    /// Another batch's grouping mode forbids starting this one.
    Grouping,
    /// A single-batch process has already finished; take it out first.
    BatchFinished,
    /// A single-batch process has been ruined; clear it first.
    BatchRuined,
}

impl std::fmt::Display for CapacityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CapacityReason::Full => "no room left",
            CapacityReason::Grouping => "incompatible with a running batch",
            CapacityReason::BatchFinished => "batch already finished",
            CapacityReason::BatchRuined => "batch is ruined",
        };
        f.write_str(s)
    }
}

/// Errors from fermenter operations. None of them are fatal to the
/// simulation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FermenterError {
    #[error("no enabled process accepts {0:?}")]
    IncompatibleIngredient(ItemKindId),
    #[error("cannot add {kind:?}: {reason}")]
    CapacityExceeded { kind: ItemKindId, reason: CapacityReason },
    #[error("record {0:?} is not held by this fermenter")]
    InvalidRecordReference(ProgressId),
    #[error("record {0:?} is not ready to take out")]
    PrematureExtraction(ProgressId),
    #[error("record {0:?} would yield nothing")]
    ZeroYield(ProgressId),
}

/// A rejected ingredient, handed back so the caller decides whether to drop
/// or destroy it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{error}")]
pub struct Rejected {
    pub error: FermenterError,
    pub item: Thing,
}

impl Rejected {
    pub fn new(error: FermenterError, item: Thing) -> Self {
        Self { error, item }
    }

    pub fn into_item(self) -> Thing {
        self.item
    }
}
