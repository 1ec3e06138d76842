//! Simulation clock, cadences and advance results.
//!
//! The host drives fermenters at one or more fixed cadences. Each cadence
//! covers a fixed number of ticks; callers must not advance the same ticks at
//! two cadences.

use crate::fixed::Ticks;
use crate::id::{FermenterId, ProgressId};
use crate::item::Thing;

// ---------------------------------------------------------------------------
// Time constants
// ---------------------------------------------------------------------------

pub const TICKS_PER_HOUR: Ticks = 2_500;
pub const TICKS_PER_DAY: Ticks = 60_000;
pub const TICKS_PER_QUADRUM: Ticks = 900_000;

// ---------------------------------------------------------------------------
// Tick cadence
// ---------------------------------------------------------------------------

/// How often the host calls into the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TickCadence {
    /// Every tick.
    Normal,
    /// Every 250 ticks.
    Rare,
    /// Every 2 000 ticks.
    Long,
}

impl TickCadence {
    pub const fn ticks(self) -> Ticks {
        match self {
            TickCadence::Normal => 1,
            TickCadence::Rare => 250,
            TickCadence::Long => 2_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Site-wide clock.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimState {
    /// Ticks advanced so far across all cadences.
    pub tick: Ticks,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, ticks: Ticks) {
        self.tick = self.tick.saturating_add(ticks);
    }
}

// ---------------------------------------------------------------------------
// Advance result
// ---------------------------------------------------------------------------

/// What happened during one `FermenterState::advance` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvanceOutcome {
    /// Records that crossed their finish line this call.
    pub finished: Vec<ProgressId>,
    /// Records that became fully ruined this call.
    pub ruined: Vec<ProgressId>,
    /// True if a ruin triggered a full reset of the fermenter.
    pub reset: bool,
    /// Items the reset dropped back on the ground.
    pub dropped: Vec<Thing>,
}

impl AdvanceOutcome {
    pub fn is_quiet(&self) -> bool {
        self.finished.is_empty() && self.ruined.is_empty() && !self.reset
    }
}

/// What happened during one `FermenterSite::advance` call.
#[derive(Debug, Clone, Default)]
pub struct SiteAdvanceResult {
    pub ticks: Ticks,
    pub outcomes: Vec<(FermenterId, AdvanceOutcome)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_tick_counts() {
        assert_eq!(TickCadence::Normal.ticks(), 1);
        assert_eq!(TickCadence::Rare.ticks(), 250);
        assert_eq!(TickCadence::Long.ticks(), 2_000);
    }

    #[test]
    fn day_and_quadrum_are_whole_hours() {
        assert_eq!(TICKS_PER_DAY, TICKS_PER_HOUR * 24);
        assert_eq!(TICKS_PER_QUADRUM, TICKS_PER_DAY * 15);
        assert_eq!(TICKS_PER_DAY % TickCadence::Long.ticks(), 0);
    }

    #[test]
    fn sim_state_saturates() {
        let mut s = SimState { tick: Ticks::MAX - 1 };
        s.advance(10);
        assert_eq!(s.tick, Ticks::MAX);
    }

    #[test]
    fn empty_outcome_is_quiet() {
        assert!(AdvanceOutcome::default().is_quiet());
    }
}
