//! Every fermenter on a map, driven together at a tick cadence.
//!
//! The site owns each [`FermenterState`] with its location and operational
//! gates, samples the environment once per fermenter per advance, and
//! forwards the events fermenters queue to an [`EventBus`].

use std::sync::Arc;

use slotmap::SlotMap;

use crate::config::FermenterConfig;
use crate::environment::{EnvironmentSample, EnvironmentSampler, Location, OperationalGates};
use crate::event::{EventBus, SiteEvent};
use crate::fermenter::FermenterState;
use crate::fixed::Ticks;
use crate::id::{FermenterId, FermenterTypeId};
use crate::item::Thing;
use crate::registry::{Catalog, RegistryError};
use crate::sim::{AdvanceOutcome, SimState, SiteAdvanceResult, TickCadence};

/// A fermenter placed on the map.
#[derive(Debug, Clone)]
pub struct FermenterEntry {
    pub state: FermenterState,
    pub location: Location,
    pub gates: OperationalGates,
}

#[derive(Debug)]
pub struct FermenterSite {
    catalog: Arc<Catalog>,
    config: FermenterConfig,
    fermenters: SlotMap<FermenterId, FermenterEntry>,
    events: EventBus,
    sim: SimState,
}

impl FermenterSite {
    pub fn new(catalog: Arc<Catalog>, config: FermenterConfig) -> Self {
        let events = EventBus::new(config.event_buffer_capacity);
        Self {
            catalog,
            config,
            fermenters: SlotMap::with_key(),
            events,
            sim: SimState::new(),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &FermenterConfig {
        &self.config
    }

    pub fn sim_state(&self) -> &SimState {
        &self.sim
    }

    pub fn tick(&self) -> Ticks {
        self.sim.tick
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Place an empty fermenter of type `ty`.
    pub fn add_fermenter(
        &mut self,
        ty: FermenterTypeId,
        location: Location,
    ) -> Result<FermenterId, RegistryError> {
        let state = FermenterState::new(Arc::clone(&self.catalog), ty)?;
        Ok(self.insert(state, location))
    }

    /// Place an existing state, e.g. one restored from a snapshot.
    pub fn insert(&mut self, state: FermenterState, location: Location) -> FermenterId {
        let id = self.fermenters.insert(FermenterEntry {
            state,
            location,
            gates: OperationalGates::default(),
        });
        tracing::debug!(?id, x = location.x, z = location.z, "fermenter placed");
        id
    }

    /// Take a fermenter off the map. Its batches are reset; the retrievable
    /// items come back for the host to drop.
    pub fn remove(&mut self, id: FermenterId) -> Option<Vec<Thing>> {
        let mut entry = self.fermenters.remove(id)?;
        let dropped = if entry.state.is_empty() {
            Vec::new()
        } else {
            entry.state.reset()
        };
        let tick = self.sim.tick;
        for event in entry.state.drain_events() {
            self.events.emit(SiteEvent {
                fermenter: id,
                tick,
                event,
            });
        }
        tracing::debug!(?id, dropped = dropped.len(), "fermenter removed");
        Some(dropped)
    }

    pub fn get(&self, id: FermenterId) -> Option<&FermenterState> {
        self.fermenters.get(id).map(|e| &e.state)
    }

    /// Mutable access for fills and take-outs. Events those calls queue are
    /// forwarded on the next [`FermenterSite::flush_events`] or advance.
    pub fn get_mut(&mut self, id: FermenterId) -> Option<&mut FermenterState> {
        self.fermenters.get_mut(id).map(|e| &mut e.state)
    }

    pub fn entry(&self, id: FermenterId) -> Option<&FermenterEntry> {
        self.fermenters.get(id)
    }

    pub fn location(&self, id: FermenterId) -> Option<Location> {
        self.fermenters.get(id).map(|e| e.location)
    }

    pub fn gates(&self, id: FermenterId) -> Option<OperationalGates> {
        self.fermenters.get(id).map(|e| e.gates)
    }

    /// Update fuel, power and switch state. Returns false for unknown ids.
    pub fn set_gates(&mut self, id: FermenterId, gates: OperationalGates) -> bool {
        match self.fermenters.get_mut(id) {
            Some(e) => {
                e.gates = gates;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.fermenters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fermenters.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = FermenterId> + '_ {
        self.fermenters.keys()
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Move every queued fermenter event onto the bus and deliver.
    pub fn flush_events(&mut self) {
        let tick = self.sim.tick;
        for (id, entry) in self.fermenters.iter_mut() {
            for event in entry.state.drain_events() {
                self.events.emit(SiteEvent {
                    fermenter: id,
                    tick,
                    event,
                });
            }
        }
        self.events.deliver();
    }

    // -----------------------------------------------------------------------
    // Advancement
    // -----------------------------------------------------------------------

    /// Advance every fermenter by one step of `cadence`.
    ///
    /// Only fermenters where something happened appear in the result.
    pub fn advance<S>(&mut self, cadence: TickCadence, sampler: &S) -> SiteAdvanceResult
    where
        S: EnvironmentSampler + ?Sized,
    {
        let ticks = cadence.ticks();
        let samples: Vec<EnvironmentSample> = self
            .fermenters
            .values()
            .map(|e| sampler.sample(e.location))
            .collect();
        let config = &self.config;
        let entries: Vec<(FermenterId, &mut FermenterEntry)> = self.fermenters.iter_mut().collect();

        #[cfg(feature = "parallel")]
        let outcomes: Vec<(FermenterId, AdvanceOutcome)> = {
            use rayon::prelude::*;
            entries
                .into_par_iter()
                .zip(samples.into_par_iter())
                .map(|((id, e), sample)| (id, e.state.advance(ticks, &sample, e.gates, config)))
                .collect()
        };
        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<(FermenterId, AdvanceOutcome)> = entries
            .into_iter()
            .zip(samples)
            .map(|((id, e), sample)| (id, e.state.advance(ticks, &sample, e.gates, config)))
            .collect();

        self.sim.advance(ticks);
        let outcomes: Vec<_> = outcomes.into_iter().filter(|(_, o)| !o.is_quiet()).collect();
        if !outcomes.is_empty() {
            tracing::debug!(tick = self.sim.tick, changed = outcomes.len(), "site advanced");
        }
        self.flush_events();
        SiteAdvanceResult { ticks, outcomes }
    }
}
