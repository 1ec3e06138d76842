//! Save/load example: snapshots and the legacy single-batch format.
//!
//! Fills a barrel, runs it two days, saves it and loads it back. Then loads
//! a snapshot in the old single-batch format through the built-in migration.
//!
//! Run with: `cargo run -p fermenter-core --example save_load`

use std::sync::Arc;

use fermenter_core::config::FermenterConfig;
use fermenter_core::environment::{EnvironmentSample, OperationalGates};
use fermenter_core::fermenter::FermenterState;
use fermenter_core::filter::ItemFilter;
use fermenter_core::fixed::Fixed64;
use fermenter_core::id::ThingId;
use fermenter_core::item::Thing;
use fermenter_core::migration::MigrationRegistry;
use fermenter_core::process::ProcessDefinition;
use fermenter_core::registry::CatalogBuilder;
use fermenter_core::serialize::{LegacyPayload, read_snapshot_header};
use fermenter_core::sim::TICKS_PER_DAY;

fn main() {
    let mut builder = CatalogBuilder::new();
    let mash = builder.register_item("mash", true);
    let whisky = builder.register_item("whisky", false);
    let distill = builder.register_process(ProcessDefinition::new(
        "age",
        whisky,
        ItemFilter::from_iter([mash]),
    ));
    let cask = builder.register_fermenter("cask", vec![distill], None);
    let catalog = Arc::new(builder.build().expect("catalog is valid"));

    // Save a running batch.
    let mut state = FermenterState::new(Arc::clone(&catalog), cask).unwrap();
    state.add_ingredient(Thing::new(ThingId(7), mash, 15)).unwrap();
    state.advance(
        2 * TICKS_PER_DAY,
        &EnvironmentSample::indoors(Fixed64::from_num(18)),
        OperationalGates::default(),
        &FermenterConfig::default(),
    );
    let bytes = state.serialize(2 * TICKS_PER_DAY).unwrap();
    let header = read_snapshot_header(&bytes).unwrap();
    println!("saved {} bytes, format v{} at tick {}", bytes.len(), header.version, header.tick);

    let loaded = FermenterState::deserialize(Arc::clone(&catalog), cask, &bytes).unwrap();
    for (_, r) in loaded.records() {
        println!("  restored batch: {} ticks, {} units", r.elapsed_ticks(), r.ingredient_count());
    }

    // An old save held a single implicit batch.
    let legacy = LegacyPayload {
        ruined_percent: Fixed64::ZERO,
        ingredient_count: 9,
        progress_ticks: 3 * TICKS_PER_DAY,
        current_process_index: 0,
        queued_process_index: 0,
        target_quality: 2,
        ingredient_labels: vec!["mash".into()],
    };
    let old = legacy.encode(0).unwrap();
    let migrated = FermenterState::deserialize_with_migrations(
        Arc::clone(&catalog),
        cask,
        &old,
        &MigrationRegistry::builtin(),
    )
    .unwrap();
    for (_, r) in migrated.records() {
        println!(
            "  migrated batch: {} ticks, {} units, synthesized={}",
            r.elapsed_ticks(),
            r.ingredient_count(),
            r.held().iter().all(|t| t.id.is_synthesized()),
        );
    }
}
