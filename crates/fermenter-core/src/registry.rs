use crate::filter::ItemFilter;
use crate::fixed::Fixed64;
use crate::id::*;
use crate::process::ProcessDefinition;
use std::collections::HashMap;

/// An item kind definition in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemKindDef {
    pub name: String,
    /// Held units of this kind are dropped back on the ground, not destroyed,
    /// when a fermenter is reset.
    pub retrievable_when_incomplete: bool,
}

/// A fermenter building template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FermenterTypeDef {
    pub name: String,
    /// Processes this fermenter can run, in priority order. A batch persists
    /// its process as an index into this list.
    pub processes: Vec<ProcessId>,
    /// Products enabled on a freshly built fermenter. All products when unset.
    pub default_product_filter: Option<ItemFilter>,
}

/// Builder for constructing an immutable [`Catalog`].
/// Three-phase lifecycle: registration -> mutation -> finalization.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    items: Vec<ItemKindDef>,
    item_name_to_id: HashMap<String, ItemKindId>,
    processes: Vec<ProcessDefinition>,
    process_name_to_id: HashMap<String, ProcessId>,
    fermenters: Vec<FermenterTypeDef>,
    fermenter_name_to_id: HashMap<String, FermenterTypeId>,
    duplicates: Vec<String>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 1: Register an item kind. Returns its ID.
    pub fn register_item(&mut self, name: &str, retrievable_when_incomplete: bool) -> ItemKindId {
        let id = ItemKindId(self.items.len() as u32);
        self.items.push(ItemKindDef {
            name: name.to_string(),
            retrievable_when_incomplete,
        });
        if self.item_name_to_id.insert(name.to_string(), id).is_some() {
            self.duplicates.push(name.to_string());
        }
        id
    }

    /// Phase 1: Register a process definition. Returns its ID.
    pub fn register_process(&mut self, def: ProcessDefinition) -> ProcessId {
        let id = ProcessId(self.processes.len() as u32);
        if self.process_name_to_id.insert(def.name.clone(), id).is_some() {
            self.duplicates.push(def.name.clone());
        }
        self.processes.push(def);
        id
    }

    /// Phase 1: Register a fermenter type. Returns its ID.
    pub fn register_fermenter(
        &mut self,
        name: &str,
        processes: Vec<ProcessId>,
        default_product_filter: Option<ItemFilter>,
    ) -> FermenterTypeId {
        let id = FermenterTypeId(self.fermenters.len() as u32);
        self.fermenters.push(FermenterTypeDef {
            name: name.to_string(),
            processes,
            default_product_filter,
        });
        if self.fermenter_name_to_id.insert(name.to_string(), id).is_some() {
            self.duplicates.push(name.to_string());
        }
        id
    }

    /// Phase 2: Mutate an existing process by name.
    pub fn mutate_process<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut ProcessDefinition),
    {
        let id = self
            .process_name_to_id
            .get(name)
            .ok_or(RegistryError::NotFound(name.to_string()))?;
        f(&mut self.processes[id.0 as usize]);
        Ok(())
    }

    /// Phase 2: Mutate an existing fermenter type by name.
    pub fn mutate_fermenter<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut FermenterTypeDef),
    {
        let id = self
            .fermenter_name_to_id
            .get(name)
            .ok_or(RegistryError::NotFound(name.to_string()))?;
        f(&mut self.fermenters[id.0 as usize]);
        Ok(())
    }

    pub fn item_id(&self, name: &str) -> Option<ItemKindId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn process_id(&self, name: &str) -> Option<ProcessId> {
        self.process_name_to_id.get(name).copied()
    }

    /// Phase 3: Validate and build the immutable catalog.
    pub fn build(self) -> Result<Catalog, RegistryError> {
        if let Some(name) = self.duplicates.first() {
            return Err(RegistryError::DuplicateName(name.clone()));
        }

        let item_ok = |id: ItemKindId| (id.0 as usize) < self.items.len();

        for p in &self.processes {
            if !item_ok(p.product) {
                return Err(RegistryError::InvalidItemRef(p.product));
            }
            if p.ingredient_filter.is_empty() {
                return Err(RegistryError::EmptyIngredientFilter(p.name.clone()));
            }
            if let Some(bad) = p.ingredient_filter.kinds().find(|k| !item_ok(*k)) {
                return Err(RegistryError::InvalidItemRef(bad));
            }
            if p.uses_temperature && !p.temperature_safe.contains_range(&p.temperature_ideal) {
                return Err(RegistryError::IdealOutsideSafe(p.name.clone()));
            }
            if p.uses_quality && !p.quality_thresholds.is_non_decreasing() {
                return Err(RegistryError::DecreasingQualityThresholds(p.name.clone()));
            }
            if p.max_capacity == 0 {
                return Err(RegistryError::ZeroCapacity(p.name.clone()));
            }
            if p.efficiency < Fixed64::ZERO {
                return Err(RegistryError::NegativeEfficiency(p.name.clone()));
            }
        }

        for f in &self.fermenters {
            if f.processes.is_empty() {
                return Err(RegistryError::NoProcesses(f.name.clone()));
            }
            if let Some(bad) = f
                .processes
                .iter()
                .find(|pid| (pid.0 as usize) >= self.processes.len())
            {
                return Err(RegistryError::InvalidProcessRef(*bad));
            }
            let bad_default = f
                .default_product_filter
                .as_ref()
                .and_then(|filter| filter.kinds().find(|k| !item_ok(*k)));
            if let Some(bad) = bad_default {
                return Err(RegistryError::InvalidItemRef(bad));
            }
        }

        tracing::debug!(
            items = self.items.len(),
            processes = self.processes.len(),
            fermenters = self.fermenters.len(),
            "catalog built"
        );

        Ok(Catalog {
            items: self.items,
            item_name_to_id: self.item_name_to_id,
            processes: self.processes,
            process_name_to_id: self.process_name_to_id,
            fermenters: self.fermenters,
            fermenter_name_to_id: self.fermenter_name_to_id,
        })
    }
}

/// Immutable catalog. Frozen after build(). Thread-safe to share.
#[derive(Debug)]
pub struct Catalog {
    items: Vec<ItemKindDef>,
    item_name_to_id: HashMap<String, ItemKindId>,
    processes: Vec<ProcessDefinition>,
    process_name_to_id: HashMap<String, ProcessId>,
    fermenters: Vec<FermenterTypeDef>,
    fermenter_name_to_id: HashMap<String, FermenterTypeId>,
}

impl Catalog {
    pub fn get_item(&self, id: ItemKindId) -> Option<&ItemKindDef> {
        self.items.get(id.0 as usize)
    }

    pub fn get_process(&self, id: ProcessId) -> Option<&ProcessDefinition> {
        self.processes.get(id.0 as usize)
    }

    pub fn get_fermenter(&self, id: FermenterTypeId) -> Option<&FermenterTypeDef> {
        self.fermenters.get(id.0 as usize)
    }

    pub fn item_id(&self, name: &str) -> Option<ItemKindId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn process_id(&self, name: &str) -> Option<ProcessId> {
        self.process_name_to_id.get(name).copied()
    }

    pub fn fermenter_id(&self, name: &str) -> Option<FermenterTypeId> {
        self.fermenter_name_to_id.get(name).copied()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn fermenter_count(&self) -> usize {
        self.fermenters.len()
    }

    pub fn retrievable_when_incomplete(&self, id: ItemKindId) -> bool {
        self.get_item(id)
            .map(|item| item.retrievable_when_incomplete)
            .unwrap_or(false)
    }

    /// The processes of a fermenter type with their definitions, in order.
    pub fn processes_of(
        &self,
        ty: FermenterTypeId,
    ) -> impl Iterator<Item = (ProcessId, &ProcessDefinition)> + '_ {
        self.get_fermenter(ty)
            .into_iter()
            .flat_map(|f| f.processes.iter())
            .filter_map(|pid| self.get_process(*pid).map(|p| (*pid, p)))
    }

    /// Every product a fermenter type can make.
    pub fn products_of(&self, ty: FermenterTypeId) -> ItemFilter {
        self.processes_of(ty).map(|(_, p)| p.product).collect()
    }

    /// Every ingredient a fermenter type can accept.
    pub fn ingredients_of(&self, ty: FermenterTypeId) -> ItemFilter {
        let mut all = ItemFilter::new();
        for (_, p) in self.processes_of(ty) {
            all.union_with(&p.ingredient_filter);
        }
        all
    }

    /// Position of a process in a fermenter type's process list.
    pub fn process_index(&self, ty: FermenterTypeId, process: ProcessId) -> Option<usize> {
        self.get_fermenter(ty)?
            .processes
            .iter()
            .position(|p| *p == process)
    }

    /// The process at a position in a fermenter type's process list.
    pub fn process_at(&self, ty: FermenterTypeId, index: usize) -> Option<ProcessId> {
        self.get_fermenter(ty)?.processes.get(index).copied()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("invalid item reference: {0:?}")]
    InvalidItemRef(ItemKindId),
    #[error("invalid process reference: {0:?}")]
    InvalidProcessRef(ProcessId),
    #[error("invalid fermenter type reference: {0:?}")]
    InvalidFermenterRef(FermenterTypeId),
    #[error("process {0} accepts no ingredients")]
    EmptyIngredientFilter(String),
    #[error("process {0}: ideal temperature range is not inside the safe range")]
    IdealOutsideSafe(String),
    #[error("process {0}: quality thresholds decrease")]
    DecreasingQualityThresholds(String),
    #[error("process {0}: max capacity is zero")]
    ZeroCapacity(String),
    #[error("process {0}: efficiency is negative")]
    NegativeEfficiency(String),
    #[error("fermenter {0} has no processes")]
    NoProcesses(String),
}
