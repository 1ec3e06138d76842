//! The per-building aggregate: batches, filters and the ingestion rules.
//!
//! A [`FermenterState`] owns zero or more [`ProgressRecord`]s keyed by
//! generational [`ProgressId`]s. Callers that hold an id across ticks must
//! expect it to go stale; every operation taking an id re-validates it.
//!
//! Aggregates (counts, space left, best quality) are recomputed on every
//! query. Record counts are tiny, so nothing is cached.

use std::sync::Arc;

use slotmap::SlotMap;

use crate::config::FermenterConfig;
use crate::environment::{EnvironmentSample, OperationalGates};
use crate::error::{CapacityReason, FermenterError, Rejected};
use crate::event::FermenterEvent;
use crate::filter::ItemFilter;
use crate::fixed::{Fixed64, Ticks};
use crate::grouping::can_start_batch;
use crate::id::{FermenterTypeId, ItemKindId, ProcessId, ProgressId, ThingId};
use crate::item::{ProductStack, Thing};
use crate::process::{GroupingMode, ProcessDefinition};
use crate::progress::ProgressRecord;
use crate::quality::QualityCategory;
use crate::registry::{Catalog, RegistryError};
use crate::sim::AdvanceOutcome;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of a successful `add_ingredient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub record: ProgressId,
    pub process: ProcessId,
    /// Units taken into the fermenter.
    pub accepted: u32,
    /// Units that did not fit, handed back to the caller.
    pub leftover: Option<Thing>,
    /// True when a new batch was started rather than topped up.
    pub new_batch: bool,
}

/// Filters and default target quality, copyable between fermenters of the
/// same type.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FermenterSettings {
    pub fermenter_type: FermenterTypeId,
    pub product_filter: ItemFilter,
    pub ingredient_filter: ItemFilter,
    pub target_quality: QualityCategory,
}

/// Where an incoming ingredient would go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Merge(ProgressId),
    NewBatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    process: ProcessId,
    placement: Placement,
    room: u32,
}

// ---------------------------------------------------------------------------
// FermenterState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FermenterState {
    catalog: Arc<Catalog>,
    fermenter_type: FermenterTypeId,
    records: SlotMap<ProgressId, ProgressRecord>,
    /// Record ids in insertion order.
    order: Vec<ProgressId>,
    product_filter: ItemFilter,
    ingredient_filter: ItemFilter,
    target_quality: QualityCategory,
    events: Vec<FermenterEvent>,
}

impl FermenterState {
    /// An empty fermenter of the given type with its default filters.
    pub fn new(catalog: Arc<Catalog>, fermenter_type: FermenterTypeId) -> Result<Self, RegistryError> {
        let ty = catalog
            .get_fermenter(fermenter_type)
            .ok_or(RegistryError::InvalidFermenterRef(fermenter_type))?;
        let all_products = catalog.products_of(fermenter_type);
        let product_filter = match &ty.default_product_filter {
            Some(defaults) => defaults.intersection(&all_products),
            None => all_products,
        };
        let ingredient_filter = catalog.ingredients_of(fermenter_type);
        Ok(Self {
            catalog,
            fermenter_type,
            records: SlotMap::with_key(),
            order: Vec::new(),
            product_filter,
            ingredient_filter,
            target_quality: QualityCategory::Normal,
            events: Vec::new(),
        })
    }

    /// Rebuild a fermenter from persisted parts. Filters are clipped to the
    /// type's supersets.
    pub(crate) fn restore(
        catalog: Arc<Catalog>,
        fermenter_type: FermenterTypeId,
        records: Vec<ProgressRecord>,
        product_filter: ItemFilter,
        ingredient_filter: ItemFilter,
        target_quality: QualityCategory,
    ) -> Result<Self, RegistryError> {
        let mut state = Self::new(catalog, fermenter_type)?;
        state.product_filter = product_filter.intersection(&state.catalog.products_of(fermenter_type));
        state.ingredient_filter =
            ingredient_filter.intersection(&state.catalog.ingredients_of(fermenter_type));
        state.target_quality = target_quality;
        for record in records {
            let id = state.records.insert(record);
            state.order.push(id);
        }
        Ok(state)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn fermenter_type(&self) -> FermenterTypeId {
        self.fermenter_type
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    /// Records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = (ProgressId, &ProgressRecord)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.records.get(*id).map(|r| (*id, r)))
    }

    pub fn record(&self, id: ProgressId) -> Option<&ProgressRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: ProgressId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The definition a record runs under.
    pub fn process_of(&self, id: ProgressId) -> Option<&ProcessDefinition> {
        let record = self.records.get(id)?;
        self.catalog.get_process(record.process())
    }

    /// The record holding a given host item.
    pub fn record_for_thing(&self, thing: ThingId) -> Option<ProgressId> {
        self.records()
            .find(|(_, r)| r.held().contains(thing))
            .map(|(id, _)| id)
    }

    /// First record, in insertion order, that may be taken out now.
    pub fn next_extractable(&self) -> Option<ProgressId> {
        self.records()
            .find(|(_, r)| {
                self.catalog
                    .get_process(r.process())
                    .is_some_and(|def| r.is_extractable(def))
            })
            .map(|(id, _)| id)
    }

    // -----------------------------------------------------------------------
    // Filters and settings
    // -----------------------------------------------------------------------

    pub fn product_filter(&self) -> &ItemFilter {
        &self.product_filter
    }

    pub fn ingredient_filter(&self) -> &ItemFilter {
        &self.ingredient_filter
    }

    /// Enable or disable a product. Kinds this fermenter cannot make are
    /// ignored. Returns whether the filter changed.
    pub fn set_product_allowed(&mut self, kind: ItemKindId, allowed: bool) -> bool {
        if !self.catalog.products_of(self.fermenter_type).allows(kind) {
            tracing::warn!(?kind, "product is not made by this fermenter, ignoring");
            return false;
        }
        self.product_filter.set_allowed(kind, allowed)
    }

    /// Enable or disable an ingredient. Kinds no process accepts are ignored.
    /// Returns whether the filter changed.
    pub fn set_ingredient_allowed(&mut self, kind: ItemKindId, allowed: bool) -> bool {
        if !self.catalog.ingredients_of(self.fermenter_type).allows(kind) {
            tracing::warn!(?kind, "ingredient is not used by this fermenter, ignoring");
            return false;
        }
        self.ingredient_filter.set_allowed(kind, allowed)
    }

    /// Processes whose product is enabled, in definition order.
    pub fn enabled_processes(&self) -> impl Iterator<Item = (ProcessId, &ProcessDefinition)> + '_ {
        self.catalog
            .processes_of(self.fermenter_type)
            .filter(|(_, p)| self.product_filter.allows(p.product))
    }

    /// Every ingredient an enabled process accepts that is also enabled.
    pub fn combined_ingredient_filter(&self) -> ItemFilter {
        let mut all = ItemFilter::new();
        for (_, p) in self.enabled_processes() {
            all.union_with(&p.ingredient_filter);
        }
        all.intersection(&self.ingredient_filter)
    }

    /// Default target quality for new batches.
    pub fn target_quality(&self) -> QualityCategory {
        self.target_quality
    }

    pub fn set_target_quality(&mut self, q: QualityCategory) {
        self.target_quality = q;
    }

    /// Change one record's target. Ignored for processes without quality.
    pub fn set_record_target_quality(
        &mut self,
        id: ProgressId,
        q: QualityCategory,
    ) -> Result<bool, FermenterError> {
        let catalog = Arc::clone(&self.catalog);
        let record = self.records.get_mut(id).ok_or_else(|| {
            tracing::warn!(?id, "target quality change for unknown record");
            FermenterError::InvalidRecordReference(id)
        })?;
        match catalog.get_process(record.process()) {
            Some(def) => Ok(record.set_target_quality(def, q)),
            None => Ok(false),
        }
    }

    pub fn settings(&self) -> FermenterSettings {
        FermenterSettings {
            fermenter_type: self.fermenter_type,
            product_filter: self.product_filter.clone(),
            ingredient_filter: self.ingredient_filter.clone(),
            target_quality: self.target_quality,
        }
    }

    /// Paste settings copied from another fermenter. Returns false (and
    /// changes nothing) when they came from a different fermenter type.
    pub fn apply_settings(&mut self, settings: &FermenterSettings) -> bool {
        if settings.fermenter_type != self.fermenter_type {
            tracing::warn!(
                from = ?settings.fermenter_type,
                to = ?self.fermenter_type,
                "settings belong to another fermenter type"
            );
            return false;
        }
        self.product_filter = settings
            .product_filter
            .intersection(&self.catalog.products_of(self.fermenter_type));
        self.ingredient_filter = settings
            .ingredient_filter
            .intersection(&self.catalog.ingredients_of(self.fermenter_type));
        self.target_quality = settings.target_quality;
        true
    }

    // -----------------------------------------------------------------------
    // Aggregates
    // -----------------------------------------------------------------------

    pub fn total_ingredient_count(&self) -> u32 {
        self.records.values().map(|r| r.ingredient_count()).sum()
    }

    /// Most units any enabled process could still take right now.
    pub fn space_left(&self) -> u32 {
        self.enabled_processes()
            .filter_map(|(pid, _)| self.slot_for_process(pid).ok())
            .map(|s| s.room)
            .max()
            .unwrap_or(0)
    }

    /// Units of `kind` that would be accepted right now.
    pub fn space_left_for(&self, kind: ItemKindId) -> u32 {
        self.resolve(kind).map(|s| s.room).unwrap_or(0)
    }

    pub fn any_finished(&self) -> bool {
        self.records().any(|(_, r)| {
            !r.is_ruined()
                && self
                    .catalog
                    .get_process(r.process())
                    .is_some_and(|def| r.is_finished(def))
        })
    }

    pub fn any_ruined(&self) -> bool {
        self.records.values().any(|r| r.is_ruined())
    }

    /// Best quality reached by any intact batch.
    pub fn best_quality(&self) -> Option<QualityCategory> {
        self.records()
            .filter(|(_, r)| !r.is_ruined())
            .filter_map(|(_, r)| {
                let def = self.catalog.get_process(r.process())?;
                r.current_quality(def)
            })
            .max()
    }

    /// Whether some enabled process keeps batches safe at `temperature`.
    pub fn temperature_ok(&self, temperature: Fixed64) -> bool {
        self.enabled_processes()
            .any(|(_, p)| p.temperature_safe_at(temperature))
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Take an ingredient stack in. Units beyond the available room come
    /// back in [`AddOutcome::leftover`]; a stack that cannot go in at all
    /// comes back inside the error.
    pub fn add_ingredient(&mut self, mut item: Thing) -> Result<AddOutcome, Rejected> {
        let slot = match self.resolve(item.kind) {
            Ok(slot) => slot,
            Err(error) => {
                tracing::warn!(kind = ?item.kind, count = item.stack_count, %error, "ingredient rejected");
                return Err(Rejected::new(error, item));
            }
        };
        if item.stack_count == 0 {
            let error = FermenterError::CapacityExceeded {
                kind: item.kind,
                reason: CapacityReason::Full,
            };
            tracing::warn!(kind = ?item.kind, "empty stack rejected");
            return Err(Rejected::new(error, item));
        }

        let accepted = item.stack_count.min(slot.room);
        let leftover = if accepted < item.stack_count {
            let taken = item.split_off(accepted);
            Some(std::mem::replace(&mut item, taken))
        } else {
            None
        };

        let was_empty = self.is_empty();
        let (record, new_batch) = match slot.placement {
            Placement::Merge(id) => {
                if let Some(r) = self.records.get_mut(id) {
                    r.merge(item);
                }
                self.events.push(FermenterEvent::IngredientAdded {
                    record: id,
                    process: slot.process,
                    count: accepted,
                });
                (id, false)
            }
            Placement::NewBatch => {
                let id = self
                    .records
                    .insert(ProgressRecord::new(slot.process, self.target_quality, item));
                self.order.push(id);
                self.events.push(FermenterEvent::BatchStarted {
                    record: id,
                    process: slot.process,
                    count: accepted,
                });
                (id, true)
            }
        };
        if was_empty {
            self.events.push(FermenterEvent::Filled);
        }
        tracing::debug!(?record, process = ?slot.process, accepted, new_batch, "ingredient added");

        Ok(AddOutcome {
            record,
            process: slot.process,
            accepted,
            leftover,
            new_batch,
        })
    }

    /// Pick the process and placement for a kind. Processes that already
    /// have a batch are preferred, then definition order.
    fn resolve(&self, kind: ItemKindId) -> Result<Slot, FermenterError> {
        if !self.ingredient_filter.allows(kind) {
            return Err(FermenterError::IncompatibleIngredient(kind));
        }
        let candidates: Vec<ProcessId> = self
            .enabled_processes()
            .filter(|(_, p)| p.accepts(kind))
            .map(|(pid, _)| pid)
            .collect();
        if candidates.is_empty() {
            return Err(FermenterError::IncompatibleIngredient(kind));
        }

        let (running, idle): (Vec<ProcessId>, Vec<ProcessId>) = candidates
            .into_iter()
            .partition(|pid| self.records.values().any(|r| r.process() == *pid));

        let mut first_err = None;
        for pid in running.into_iter().chain(idle) {
            match self.slot_for_process(pid) {
                Ok(slot) => return Ok(slot),
                Err(reason) => {
                    first_err.get_or_insert(reason);
                }
            }
        }
        Err(FermenterError::CapacityExceeded {
            kind,
            reason: first_err.unwrap_or(CapacityReason::Grouping),
        })
    }

    /// Where a new unit of `process` would go, applying the grouping and
    /// capacity rules.
    fn slot_for_process(&self, process: ProcessId) -> Result<Slot, CapacityReason> {
        let Some(def) = self.catalog.get_process(process) else {
            return Err(CapacityReason::Grouping);
        };
        let room = def.max_capacity.saturating_sub(self.total_ingredient_count());
        let latest_same = self
            .records()
            .filter(|(_, r)| r.process() == process)
            .last();

        if def.grouping == GroupingMode::Single {
            if let Some((id, r)) = latest_same {
                if r.is_ruined() {
                    return Err(CapacityReason::BatchRuined);
                }
                if r.is_finished(def) {
                    return Err(CapacityReason::BatchFinished);
                }
                if room == 0 {
                    return Err(CapacityReason::Full);
                }
                return Ok(Slot {
                    process,
                    placement: Placement::Merge(id),
                    room,
                });
            }
        }

        let existing = self.records.values().filter_map(|r| {
            self.catalog
                .get_process(r.process())
                .map(|p| (r.process(), p.grouping))
        });
        if !can_start_batch(existing, process, def.grouping) {
            return Err(CapacityReason::Grouping);
        }
        if room == 0 {
            return Err(CapacityReason::Full);
        }

        // Top up the newest batch of this process while it has not started.
        let placement = match latest_same {
            Some((id, r)) if !r.is_ruined() && r.elapsed_ticks() == 0 => Placement::Merge(id),
            _ => Placement::NewBatch,
        };
        Ok(Slot {
            process,
            placement,
            room,
        })
    }

    // -----------------------------------------------------------------------
    // Advancement
    // -----------------------------------------------------------------------

    /// Advance every batch by `ticks`, in insertion order.
    pub fn advance(
        &mut self,
        ticks: Ticks,
        sample: &EnvironmentSample,
        gates: OperationalGates,
        config: &FermenterConfig,
    ) -> AdvanceOutcome {
        let catalog = Arc::clone(&self.catalog);
        let mut outcome = AdvanceOutcome::default();
        for id in self.order.clone() {
            let Some(record) = self.records.get_mut(id) else {
                continue;
            };
            let Some(def) = catalog.get_process(record.process()) else {
                continue;
            };
            let step = record.advance(def, ticks, sample, gates, &config.weather);
            if step.became_finished {
                outcome.finished.push(id);
                self.events.push(FermenterEvent::BatchFinished {
                    record: id,
                    process: record.process(),
                });
            }
            if step.became_ruined {
                outcome.ruined.push(id);
                self.events.push(FermenterEvent::RuinedByTemperature {
                    record: id,
                    process: record.process(),
                });
            }
        }
        if config.reset_on_ruin && !outcome.ruined.is_empty() {
            outcome.dropped = self.reset();
            outcome.reset = true;
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Extraction
    // -----------------------------------------------------------------------

    /// Take a batch out. Ruined batches are cleared without output.
    pub fn take_out(&mut self, id: ProgressId) -> Result<Option<ProductStack>, FermenterError> {
        let catalog = Arc::clone(&self.catalog);
        let Some(record) = self.records.get(id) else {
            tracing::warn!(?id, "take-out of a record this fermenter does not hold");
            return Err(FermenterError::InvalidRecordReference(id));
        };
        let process = record.process();
        let Some(def) = catalog.get_process(process) else {
            return Err(FermenterError::InvalidRecordReference(id));
        };
        if !record.is_extractable(def) {
            tracing::warn!(?id, process = %def.name, "take-out before the batch is ready");
            return Err(FermenterError::PrematureExtraction(id));
        }

        if record.is_ruined() {
            self.remove_record(id);
            self.events.push(FermenterEvent::WreckageCleared { record: id, process });
            tracing::debug!(?id, process = %def.name, "wreckage cleared");
            self.push_emptied_if_empty();
            return Ok(None);
        }

        let count = def.yield_for(record.ingredient_count());
        if count == 0 {
            tracing::warn!(
                ?id,
                process = %def.name,
                held = record.ingredient_count(),
                efficiency = %def.efficiency,
                "batch would yield nothing"
            );
            return Err(FermenterError::ZeroYield(id));
        }
        let quality = def
            .uses_quality
            .then(|| record.current_quality(def).unwrap_or(QualityCategory::Awful));
        let product = ProductStack {
            kind: def.product,
            count,
            quality,
            ingredients: record.held().ingredient_kinds(),
            label: def.product_label().map(str::to_string),
        };

        self.remove_record(id);
        self.events.push(FermenterEvent::ProductTakenOut {
            record: id,
            process,
            product: product.kind,
            count,
            quality,
        });
        tracing::debug!(?id, process = %def.name, count, ?quality, "product taken out");
        self.push_emptied_if_empty();
        Ok(Some(product))
    }

    /// Clear every batch. Held units of retrievable kinds are returned for
    /// the host to drop; the rest are destroyed.
    pub fn reset(&mut self) -> Vec<Thing> {
        let was_empty = self.is_empty();
        let mut dropped = Vec::new();
        let mut destroyed = 0u32;
        for id in std::mem::take(&mut self.order) {
            let Some(mut record) = self.records.remove(id) else {
                continue;
            };
            for thing in record.take_held() {
                if self.catalog.retrievable_when_incomplete(thing.kind) {
                    dropped.push(thing);
                } else {
                    destroyed = destroyed.saturating_add(thing.stack_count);
                }
            }
        }
        self.records.clear();
        let dropped_units = dropped.iter().map(|t| t.stack_count).sum();
        self.events.push(FermenterEvent::Reset {
            dropped: dropped_units,
            destroyed,
        });
        if !was_empty {
            self.events.push(FermenterEvent::Emptied);
        }
        tracing::debug!(dropped = dropped_units, destroyed, "fermenter reset");
        dropped
    }

    fn remove_record(&mut self, id: ProgressId) {
        self.records.remove(id);
        self.order.retain(|o| *o != id);
    }

    fn push_emptied_if_empty(&mut self) {
        if self.is_empty() {
            self.events.push(FermenterEvent::Emptied);
        }
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Take every event queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<FermenterEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn pending_event_count(&self) -> usize {
        self.events.len()
    }

    // -----------------------------------------------------------------------
    // Debug operations
    // -----------------------------------------------------------------------

    /// Jump every intact batch to its finish line, in insertion order.
    pub fn debug_finish_all(&mut self) {
        let catalog = Arc::clone(&self.catalog);
        for &id in &self.order {
            let Some(record) = self.records.get_mut(id) else {
                continue;
            };
            if record.is_ruined() {
                continue;
            }
            if let Some(def) = catalog.get_process(record.process())
                && !record.is_finished(def)
            {
                record.force_finish(def);
                self.events.push(FermenterEvent::BatchFinished {
                    record: id,
                    process: record.process(),
                });
            }
        }
    }

    /// Add raw elapsed ticks to every intact batch, in insertion order.
    /// Batches pushed over their finish line report it like an advance does.
    pub fn debug_progress_all(&mut self, ticks: Ticks) {
        let catalog = Arc::clone(&self.catalog);
        for &id in &self.order {
            let Some(record) = self.records.get_mut(id) else {
                continue;
            };
            let Some(def) = catalog.get_process(record.process()) else {
                continue;
            };
            let was_finished = record.is_finished(def);
            record.add_elapsed(ticks);
            if !was_finished && !record.is_ruined() && record.is_finished(def) {
                self.events.push(FermenterEvent::BatchFinished {
                    record: id,
                    process: record.process(),
                });
            }
        }
    }

    /// Take out every extractable intact batch, in insertion order.
    pub fn debug_take_out_finished(&mut self) -> Vec<ProductStack> {
        let ready: Vec<ProgressId> = self
            .records()
            .filter(|(_, r)| !r.is_ruined())
            .filter(|(_, r)| {
                self.catalog
                    .get_process(r.process())
                    .is_some_and(|def| r.is_extractable(def))
            })
            .map(|(id, _)| id)
            .collect();
        ready
            .into_iter()
            .filter_map(|id| self.take_out(id).ok().flatten())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::f64_to_fixed64;
    use crate::quality::QualityThresholds;
    use crate::registry::CatalogBuilder;
    use crate::sim::TICKS_PER_DAY;

    fn fx(v: f64) -> Fixed64 {
        f64_to_fixed64(v)
    }

    struct Kit {
        catalog: Arc<Catalog>,
        vat: FermenterTypeId,
        wort: ItemKindId,
        must: ItemKindId,
        wood: ItemKindId,
        beer: ItemKindId,
    }

    fn kit(beer_mode: GroupingMode, wine_mode: GroupingMode) -> Kit {
        let mut b = CatalogBuilder::new();
        let wort = b.register_item("wort", true);
        let must = b.register_item("must", false);
        let wood = b.register_item("wood", false);
        let beer = b.register_item("beer", false);
        let wine = b.register_item("wine", false);
        let mut brew = ProcessDefinition::new("brew", beer, [wort].into_iter().collect());
        brew.grouping = beer_mode;
        let mut vint = ProcessDefinition::new("vint", wine, [must].into_iter().collect());
        vint.grouping = wine_mode;
        vint.uses_quality = true;
        vint.quality_thresholds = QualityThresholds::new([
            fx(1.0), fx(2.0), fx(3.0), fx(4.0), fx(5.0), fx(6.0), fx(7.0),
        ]);
        let p1 = b.register_process(brew);
        let p2 = b.register_process(vint);
        let vat = b.register_fermenter("vat", vec![p1, p2], None);
        Kit {
            catalog: Arc::new(b.build().unwrap()),
            vat,
            wort,
            must,
            wood,
            beer,
        }
    }

    fn state(k: &Kit) -> FermenterState {
        FermenterState::new(Arc::clone(&k.catalog), k.vat).unwrap()
    }

    fn thing(id: u64, kind: ItemKindId, n: u32) -> Thing {
        Thing::new(ThingId(id), kind, n)
    }

    fn ideal() -> EnvironmentSample {
        EnvironmentSample::indoors(fx(20.0))
    }

    fn run(s: &mut FermenterState, ticks: Ticks) -> AdvanceOutcome {
        s.advance(ticks, &ideal(), OperationalGates::default(), &FermenterConfig::default())
    }

    #[test]
    fn unknown_fermenter_type_fails() {
        let k = kit(GroupingMode::Single, GroupingMode::Single);
        assert!(matches!(
            FermenterState::new(Arc::clone(&k.catalog), FermenterTypeId(9)),
            Err(RegistryError::InvalidFermenterRef(_))
        ));
    }

    #[test]
    fn incompatible_ingredient_is_handed_back() {
        let k = kit(GroupingMode::Single, GroupingMode::Single);
        let mut s = state(&k);
        let err = s.add_ingredient(thing(1, k.wood, 5)).unwrap_err();
        assert_eq!(err.error, FermenterError::IncompatibleIngredient(k.wood));
        assert_eq!(err.item.stack_count, 5);
        assert!(s.is_empty());
        assert_eq!(s.space_left_for(k.wood), 0);
    }

    #[test]
    fn first_ingredient_starts_a_batch_and_fills() {
        let k = kit(GroupingMode::Single, GroupingMode::Single);
        let mut s = state(&k);
        let out = s.add_ingredient(thing(1, k.wort, 10)).unwrap();
        assert!(out.new_batch);
        assert_eq!(out.accepted, 10);
        assert_eq!(out.leftover, None);
        assert_eq!(s.total_ingredient_count(), 10);
        assert_eq!(s.space_left_for(k.wort), 15);
        assert_eq!(s.record_for_thing(ThingId(1)), Some(out.record));
        let events = s.drain_events();
        assert!(events.contains(&FermenterEvent::Filled));
        assert_eq!(s.pending_event_count(), 0);
    }

    #[test]
    fn single_merges_with_weighted_elapsed() {
        let k = kit(GroupingMode::Single, GroupingMode::Single);
        let mut s = state(&k);
        let first = s.add_ingredient(thing(1, k.wort, 10)).unwrap().record;
        run(&mut s, 1_000);
        let out = s.add_ingredient(thing(2, k.wort, 10)).unwrap();
        assert_eq!(out.record, first);
        assert!(!out.new_batch);
        assert_eq!(s.len(), 1);
        assert_eq!(s.record(first).unwrap().elapsed_ticks(), 500);
    }

    #[test]
    fn overflow_is_returned_as_leftover() {
        let k = kit(GroupingMode::Single, GroupingMode::Single);
        let mut s = state(&k);
        s.add_ingredient(thing(1, k.wort, 20)).unwrap();
        let out = s.add_ingredient(thing(2, k.wort, 10)).unwrap();
        assert_eq!(out.accepted, 5);
        assert_eq!(out.leftover.as_ref().map(|t| t.stack_count), Some(5));
        assert_eq!(s.total_ingredient_count(), 25);

        let err = s.add_ingredient(thing(3, k.wort, 1)).unwrap_err();
        assert_eq!(
            err.error,
            FermenterError::CapacityExceeded {
                kind: k.wort,
                reason: CapacityReason::Full
            }
        );
        assert_eq!(s.space_left(), 0);
    }

    #[test]
    fn single_batch_blocks_other_processes() {
        let k = kit(GroupingMode::Single, GroupingMode::MultipleMixed);
        let mut s = state(&k);
        s.add_ingredient(thing(1, k.wort, 5)).unwrap();
        let err = s.add_ingredient(thing(2, k.must, 5)).unwrap_err();
        assert_eq!(
            err.error,
            FermenterError::CapacityExceeded {
                kind: k.must,
                reason: CapacityReason::Grouping
            }
        );
        assert_eq!(s.len(), 1);
        assert_eq!(s.total_ingredient_count(), 5);
        assert_eq!(s.space_left_for(k.must), 0);
    }

    #[test]
    fn finished_single_batch_cannot_be_topped_up() {
        let k = kit(GroupingMode::Single, GroupingMode::Single);
        let mut s = state(&k);
        s.add_ingredient(thing(1, k.wort, 5)).unwrap();
        run(&mut s, 6 * TICKS_PER_DAY);
        assert!(s.any_finished());
        let err = s.add_ingredient(thing(2, k.wort, 5)).unwrap_err();
        assert!(matches!(
            err.error,
            FermenterError::CapacityExceeded {
                reason: CapacityReason::BatchFinished,
                ..
            }
        ));
    }

    #[test]
    fn multiple_tops_up_until_started_then_stacks() {
        let k = kit(GroupingMode::Multiple, GroupingMode::Single);
        let mut s = state(&k);
        let a = s.add_ingredient(thing(1, k.wort, 5)).unwrap();
        let b = s.add_ingredient(thing(2, k.wort, 5)).unwrap();
        assert_eq!(a.record, b.record);
        run(&mut s, 100);
        let c = s.add_ingredient(thing(3, k.wort, 5)).unwrap();
        assert!(c.new_batch);
        assert_ne!(c.record, a.record);
        assert_eq!(s.len(), 2);
        assert_eq!(s.record(c.record).unwrap().elapsed_ticks(), 0);
        assert_eq!(s.record(a.record).unwrap().elapsed_ticks(), 100);
    }

    #[test]
    fn multiple_blocks_a_different_process() {
        let k = kit(GroupingMode::Multiple, GroupingMode::MultipleMixed);
        let mut s = state(&k);
        s.add_ingredient(thing(1, k.wort, 5)).unwrap();
        assert!(s.add_ingredient(thing(2, k.must, 5)).is_err());
    }

    #[test]
    fn mixed_processes_share_capacity() {
        let k = kit(GroupingMode::MultipleMixed, GroupingMode::MultipleMixed);
        let mut s = state(&k);
        s.add_ingredient(thing(1, k.wort, 15)).unwrap();
        let out = s.add_ingredient(thing(2, k.must, 15)).unwrap();
        assert_eq!(out.accepted, 10);
        assert_eq!(s.len(), 2);
        assert_eq!(s.space_left(), 0);
    }

    #[test]
    fn disabled_product_disables_its_ingredients() {
        let k = kit(GroupingMode::Single, GroupingMode::Single);
        let mut s = state(&k);
        assert!(s.set_product_allowed(k.beer, false));
        assert!(!s.combined_ingredient_filter().allows(k.wort));
        assert!(matches!(
            s.add_ingredient(thing(1, k.wort, 5)).unwrap_err().error,
            FermenterError::IncompatibleIngredient(_)
        ));
    }

    #[test]
    fn filter_changes_outside_superset_are_ignored() {
        let k = kit(GroupingMode::Single, GroupingMode::Single);
        let mut s = state(&k);
        assert!(!s.set_product_allowed(k.wood, true));
        assert!(!s.set_ingredient_allowed(k.wood, true));
        assert!(!s.product_filter().allows(k.wood));
        assert!(s.set_ingredient_allowed(k.wort, false));
        assert_eq!(s.space_left_for(k.wort), 0);
    }

    #[test]
    fn take_out_finished_batch() {
        let k = kit(GroupingMode::Single, GroupingMode::Single);
        let mut s = state(&k);
        let id = s.add_ingredient(thing(1, k.wort, 25)).unwrap().record;
        assert_eq!(s.take_out(id), Err(FermenterError::PrematureExtraction(id)));
        let outcome = run(&mut s, 6 * TICKS_PER_DAY);
        assert_eq!(outcome.finished, vec![id]);
        assert_eq!(s.next_extractable(), Some(id));

        let product = s.take_out(id).unwrap().unwrap();
        assert_eq!(product.kind, k.beer);
        assert_eq!(product.count, 25);
        assert_eq!(product.quality, None);
        assert_eq!(product.ingredients, vec![k.wort]);
        assert!(s.is_empty());
        assert_eq!(s.take_out(id), Err(FermenterError::InvalidRecordReference(id)));
        assert_eq!(s.drain_events().last(), Some(&FermenterEvent::Emptied));
    }

    #[test]
    fn quality_batch_comes_out_at_target() {
        let k = kit(GroupingMode::Single, GroupingMode::Single);
        let mut s = state(&k);
        s.set_target_quality(QualityCategory::Poor);
        let id = s.add_ingredient(thing(1, k.must, 10)).unwrap().record;
        run(&mut s, 2 * TICKS_PER_DAY);
        let product = s.take_out(id).unwrap().unwrap();
        assert_eq!(product.quality, Some(QualityCategory::Poor));
    }

    #[test]
    fn ruined_batch_is_cleared_without_output() {
        let k = kit(GroupingMode::Single, GroupingMode::Single);
        let mut s = state(&k);
        let id = s.add_ingredient(thing(1, k.wort, 10)).unwrap().record;
        // 40 degrees over the stock 32 safe max at 2.5 %/degree/hour.
        let hot = EnvironmentSample::indoors(fx(72.0));
        let outcome = s.advance(
            TICKS_PER_DAY,
            &hot,
            OperationalGates::default(),
            &FermenterConfig::default(),
        );
        assert_eq!(outcome.ruined, vec![id]);
        assert!(!outcome.reset);
        assert!(s.any_ruined());
        assert_eq!(s.take_out(id), Ok(None));
        assert!(s.is_empty());
    }

    #[test]
    fn reset_on_ruin_drops_retrievable_items() {
        let k = kit(GroupingMode::Single, GroupingMode::Single);
        let mut s = state(&k);
        s.add_ingredient(thing(1, k.wort, 10)).unwrap();
        let config = FermenterConfig {
            reset_on_ruin: true,
            ..Default::default()
        };
        let hot = EnvironmentSample::indoors(fx(72.0));
        let outcome = s.advance(TICKS_PER_DAY, &hot, OperationalGates::default(), &config);
        assert!(outcome.reset);
        assert_eq!(outcome.dropped, vec![thing(1, k.wort, 10)]);
        assert!(s.is_empty());
    }

    #[test]
    fn reset_destroys_non_retrievable_items() {
        let k = kit(GroupingMode::Single, GroupingMode::Single);
        let mut s = state(&k);
        s.add_ingredient(thing(1, k.must, 10)).unwrap();
        s.drain_events();
        assert!(s.reset().is_empty());
        assert_eq!(
            s.drain_events(),
            vec![
                FermenterEvent::Reset {
                    dropped: 0,
                    destroyed: 10
                },
                FermenterEvent::Emptied
            ]
        );
    }

    #[test]
    fn zero_yield_keeps_the_batch() {
        let mut b = CatalogBuilder::new();
        let seed = b.register_item("seed", false);
        let oil = b.register_item("oil", false);
        let mut press = ProcessDefinition::new("press", oil, [seed].into_iter().collect());
        press.efficiency = fx(0.1);
        let pid = b.register_process(press);
        let ty = b.register_fermenter("press", vec![pid], None);
        let mut s = FermenterState::new(Arc::new(b.build().unwrap()), ty).unwrap();
        let id = s.add_ingredient(thing(1, seed, 2)).unwrap().record;
        s.debug_finish_all();
        assert_eq!(s.take_out(id), Err(FermenterError::ZeroYield(id)));
        assert!(s.contains(id));
    }

    #[test]
    fn settings_copy_between_same_type() {
        let k = kit(GroupingMode::Single, GroupingMode::Single);
        let mut a = state(&k);
        a.set_product_allowed(k.beer, false);
        a.set_target_quality(QualityCategory::Excellent);
        let mut b = state(&k);
        assert!(b.apply_settings(&a.settings()));
        assert!(!b.product_filter().allows(k.beer));
        assert_eq!(b.target_quality(), QualityCategory::Excellent);
    }

    #[test]
    fn temperature_ok_checks_enabled_processes() {
        let k = kit(GroupingMode::Single, GroupingMode::Single);
        let mut s = state(&k);
        assert!(s.temperature_ok(fx(20.0)));
        assert!(!s.temperature_ok(fx(50.0)));
        s.set_product_allowed(k.beer, false);
        let wine = k.catalog.item_id("wine").unwrap();
        s.set_product_allowed(wine, false);
        assert!(!s.temperature_ok(fx(20.0)));
    }

    #[test]
    fn debug_operations() {
        let k = kit(GroupingMode::Single, GroupingMode::Single);
        let mut s = state(&k);
        let id = s.add_ingredient(thing(1, k.wort, 4)).unwrap().record;
        s.debug_progress_all(TICKS_PER_DAY);
        assert_eq!(s.record(id).unwrap().elapsed_ticks(), TICKS_PER_DAY);
        s.debug_finish_all();
        let out = s.debug_take_out_finished();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].count, 4);
        assert!(s.is_empty());
    }

    #[test]
    fn debug_progress_past_the_finish_line_reports_once() {
        let k = kit(GroupingMode::Single, GroupingMode::Single);
        let mut s = state(&k);
        let id = s.add_ingredient(thing(1, k.wort, 4)).unwrap().record;
        s.drain_events();
        s.debug_progress_all(6 * TICKS_PER_DAY);
        assert_eq!(
            s.drain_events(),
            vec![FermenterEvent::BatchFinished {
                record: id,
                process: s.record(id).unwrap().process(),
            }]
        );
        s.debug_progress_all(TICKS_PER_DAY);
        assert!(run(&mut s, 100).finished.is_empty());
        s.debug_finish_all();
        assert_eq!(s.pending_event_count(), 0);
    }

    #[test]
    fn debug_finish_all_follows_insertion_order() {
        let k = kit(GroupingMode::Multiple, GroupingMode::Single);
        let mut s = state(&k);
        let first = s.add_ingredient(thing(1, k.wort, 5)).unwrap().record;
        run(&mut s, 100);
        let older = s.add_ingredient(thing(2, k.wort, 5)).unwrap().record;
        run(&mut s, 6 * TICKS_PER_DAY - 100);
        s.take_out(first).unwrap();
        // Reuses the freed slot but sits after `older`.
        let newer = s.add_ingredient(thing(3, k.wort, 5)).unwrap().record;
        assert!(s.record(older).is_some() && s.record(newer).is_some());
        s.drain_events();

        s.debug_finish_all();
        let finished: Vec<ProgressId> = s
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                FermenterEvent::BatchFinished { record, .. } => Some(record),
                _ => None,
            })
            .collect();
        assert_eq!(finished, vec![older, newer]);
    }
}
