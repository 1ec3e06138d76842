//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use std::sync::Arc;

use crate::environment::EnvironmentSample;
use crate::fermenter::FermenterState;
use crate::filter::ItemFilter;
use crate::fixed::Fixed64;
use crate::id::*;
use crate::item::Thing;
use crate::process::{GroupingMode, ProcessDefinition};
use crate::quality::QualityThresholds;
use crate::registry::{Catalog, CatalogBuilder};

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Fixture catalog
// ===========================================================================

/// A small catalog with two fermenter types.
///
/// - `barrel` runs `brew` (wort -> beer, six days, no quality) and `vint`
///   (must -> wine, quality thresholds 1..=7 days), both `Single`.
/// - `vat` runs `curdle` (milk -> cheese, four days) and `pickle`
///   (cucumber -> pickles, three days), both `MultipleMixed`, capacity 30.
///
/// Wort and milk are retrievable when a batch is reset; must and cucumber
/// are not.
pub struct Brewery {
    pub catalog: Arc<Catalog>,
    pub barrel: FermenterTypeId,
    pub vat: FermenterTypeId,
    pub wort: ItemKindId,
    pub must: ItemKindId,
    pub milk: ItemKindId,
    pub cucumber: ItemKindId,
    pub beer: ItemKindId,
    pub wine: ItemKindId,
    pub cheese: ItemKindId,
    pub pickles: ItemKindId,
    pub brew: ProcessId,
    pub vint: ProcessId,
    pub curdle: ProcessId,
    pub pickle: ProcessId,
}

pub fn only(kind: ItemKindId) -> ItemFilter {
    [kind].into_iter().collect()
}

pub fn brewery_builder() -> CatalogBuilder {
    let mut b = CatalogBuilder::new();
    let wort = b.register_item("wort", true);
    let must = b.register_item("must", false);
    let milk = b.register_item("milk", true);
    let cucumber = b.register_item("cucumber", false);
    let beer = b.register_item("beer", false);
    let wine = b.register_item("wine", false);
    let cheese = b.register_item("cheese", false);
    let pickles = b.register_item("pickles", false);

    let brew = b.register_process(ProcessDefinition::new("brew", beer, only(wort)));

    let mut vint = ProcessDefinition::new("vint", wine, only(must));
    vint.uses_quality = true;
    vint.quality_thresholds = QualityThresholds::new([
        fixed(1.0),
        fixed(2.0),
        fixed(3.0),
        fixed(4.0),
        fixed(5.0),
        fixed(6.0),
        fixed(7.0),
    ]);
    let vint = b.register_process(vint);

    let mut curdle = ProcessDefinition::new("curdle", cheese, only(milk));
    curdle.total_days = fixed(4.0);
    curdle.max_capacity = 30;
    curdle.grouping = GroupingMode::MultipleMixed;
    let curdle = b.register_process(curdle);

    let mut pickle = ProcessDefinition::new("pickle", pickles, only(cucumber));
    pickle.total_days = fixed(3.0);
    pickle.max_capacity = 30;
    pickle.grouping = GroupingMode::MultipleMixed;
    let pickle = b.register_process(pickle);

    b.register_fermenter("barrel", vec![brew, vint], None);
    b.register_fermenter("vat", vec![curdle, pickle], None);
    b
}

pub fn brewery() -> Brewery {
    let builder = brewery_builder();
    let catalog = match builder.build() {
        Ok(c) => Arc::new(c),
        Err(e) => panic!("fixture catalog is invalid: {e}"),
    };
    let item = |name: &str| catalog.item_id(name).unwrap_or(ItemKindId(u32::MAX));
    let process = |name: &str| catalog.process_id(name).unwrap_or(ProcessId(u32::MAX));
    Brewery {
        barrel: catalog.fermenter_id("barrel").unwrap_or(FermenterTypeId(u32::MAX)),
        vat: catalog.fermenter_id("vat").unwrap_or(FermenterTypeId(u32::MAX)),
        wort: item("wort"),
        must: item("must"),
        milk: item("milk"),
        cucumber: item("cucumber"),
        beer: item("beer"),
        wine: item("wine"),
        cheese: item("cheese"),
        pickles: item("pickles"),
        brew: process("brew"),
        vint: process("vint"),
        curdle: process("curdle"),
        pickle: process("pickle"),
        catalog: Arc::clone(&catalog),
    }
}

impl Brewery {
    pub fn new_barrel(&self) -> FermenterState {
        self.new_fermenter(self.barrel)
    }

    pub fn new_vat(&self) -> FermenterState {
        self.new_fermenter(self.vat)
    }

    fn new_fermenter(&self, ty: FermenterTypeId) -> FermenterState {
        match FermenterState::new(Arc::clone(&self.catalog), ty) {
            Ok(s) => s,
            Err(e) => panic!("fixture fermenter type is invalid: {e}"),
        }
    }
}

// ===========================================================================
// Items and environment
// ===========================================================================

pub fn thing(id: u64, kind: ItemKindId, count: u32) -> Thing {
    Thing::new(ThingId(id), kind, count)
}

/// Indoors at 20 °C: inside every fixture process's ideal range.
pub fn ideal_sample() -> EnvironmentSample {
    EnvironmentSample::indoors(fixed(20.0))
}

pub fn sample_at(temperature: f64) -> EnvironmentSample {
    EnvironmentSample::indoors(fixed(temperature))
}
