//! Fermenter Core -- the batch fermentation engine behind multi-process
//! fermenting buildings.
//!
//! A fermenter holds one or more in-flight batches. Each batch runs one
//! process definition, converting held ingredient stacks into a product
//! over simulated time. Speed depends on the ambient environment, heat
//! outside a safe band spoils the batch, and quality-aware processes can be
//! taken out early once they reach a target tier.
//!
//! # Tick Model
//!
//! The host calls [`site::FermenterSite::advance`] (or
//! [`fermenter::FermenterState::advance`] directly) at one of three
//! [`sim::TickCadence`]s. Each advance:
//!
//! 1. Samples the environment for the fermenter's location.
//! 2. Recomputes every batch's speed factors from the sample.
//! 3. Adds `ticks x speed` of elapsed time while fuel, power and the switch
//!    are all on.
//! 4. Accrues spoilage for heat outside the safe band, gates or not.
//! 5. Queues events for anything that finished or spoiled.
//!
//! # Key Types
//!
//! - [`registry::Catalog`] -- Immutable item kinds, processes and fermenter
//!   types, frozen at startup.
//! - [`process::ProcessDefinition`] -- One conversion recipe with its
//!   temperature, weather and quality parameters.
//! - [`progress::ProgressRecord`] -- One batch: elapsed time, spoilage,
//!   target quality, held items.
//! - [`fermenter::FermenterState`] -- All batches of one building with the
//!   ingestion, grouping and extraction rules.
//! - [`site::FermenterSite`] -- Every fermenter on a map plus the event bus.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`serialize`] -- Versioned snapshots via bitcode, with
//!   [`migration`] of legacy single-batch saves.

pub mod config;
pub mod environment;
pub mod error;
pub mod event;
pub mod fermenter;
pub mod filter;
pub mod fixed;
pub mod grouping;
pub mod id;
pub mod item;
pub mod migration;
pub mod process;
pub mod progress;
pub mod quality;
pub mod registry;
pub mod serialize;
pub mod sim;
pub mod site;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
