//! Cellar example: a site with an outdoor vat and an indoor barrel.
//!
//! Registers a small catalog, places two fermenters, fills them, and runs
//! four days at the long cadence under a day/night temperature swing. Events
//! are printed as they are delivered.
//!
//! Run with: `cargo run -p fermenter-core --example cellar`

use std::sync::Arc;

use fermenter_core::config::FermenterConfig;
use fermenter_core::environment::{EnvironmentSample, Location};
use fermenter_core::event::{EventKind, SiteEvent};
use fermenter_core::filter::ItemFilter;
use fermenter_core::fixed::{Fixed64, fixed64_to_f64};
use fermenter_core::id::ThingId;
use fermenter_core::item::Thing;
use fermenter_core::process::{FactorRange, GroupingMode, ProcessDefinition};
use fermenter_core::registry::CatalogBuilder;
use fermenter_core::sim::{TICKS_PER_DAY, TickCadence};
use fermenter_core::site::FermenterSite;

fn main() {
    let mut builder = CatalogBuilder::new();
    let wort = builder.register_item("wort", true);
    let beer = builder.register_item("beer", false);
    let cabbage = builder.register_item("cabbage", false);
    let kraut = builder.register_item("sauerkraut", false);

    let brew = builder.register_process(ProcessDefinition::new(
        "brew",
        beer,
        ItemFilter::from_iter([wort]),
    ));
    let mut sour = ProcessDefinition::new("sour", kraut, ItemFilter::from_iter([cabbage]));
    sour.total_days = Fixed64::from_num(3);
    sour.grouping = GroupingMode::Multiple;
    // Sun speeds souring up to 1.5x; rain slows it to half.
    sour.sun_factor = FactorRange::new(Fixed64::ONE, Fixed64::from_num(1.5));
    sour.rain_factor = FactorRange::new(Fixed64::ONE, Fixed64::from_num(0.5));
    let sour = builder.register_process(sour);

    let barrel = builder.register_fermenter("barrel", vec![brew], None);
    let crock = builder.register_fermenter("crock", vec![sour], None);
    let catalog = Arc::new(builder.build().expect("catalog is valid"));

    let mut site = FermenterSite::new(Arc::clone(&catalog), FermenterConfig::default());
    for kind in [EventKind::BatchFinished, EventKind::RuinedByTemperature] {
        site.events_mut().on_passive(
            kind,
            Box::new(|e: &SiteEvent| println!("  tick {:>7}: {:?}", e.tick, e.event)),
        );
    }

    let cellar = site.add_fermenter(barrel, Location::new(0, 0)).unwrap();
    let yard = site.add_fermenter(crock, Location::new(20, 5)).unwrap();
    site.get_mut(cellar)
        .unwrap()
        .add_ingredient(Thing::new(ThingId(1), wort, 20))
        .unwrap();
    site.get_mut(yard)
        .unwrap()
        .add_ingredient(Thing::new(ThingId(2), cabbage, 12))
        .unwrap();
    site.flush_events();

    // The cellar stays at 12 C; the yard swings between 8 and 24 C and gets
    // sun during the day.
    let weather = |tick: u64| {
        move |loc: Location| {
            if loc.x < 10 {
                return EnvironmentSample::indoors(Fixed64::from_num(12));
            }
            let day = (tick % TICKS_PER_DAY) < TICKS_PER_DAY / 2;
            let mut s = EnvironmentSample::outdoors(Fixed64::from_num(if day { 24 } else { 8 }));
            s.sun_glow = if day { Fixed64::ONE } else { Fixed64::ZERO };
            s
        }
    };

    for day in 1..=6 {
        for _ in 0..TICKS_PER_DAY / TickCadence::Long.ticks() {
            let sampler = weather(site.tick());
            site.advance(TickCadence::Long, &sampler);
        }
        println!("after day {day}:");
        for id in [cellar, yard] {
            let state = site.get(id).unwrap();
            for (_, r) in state.records() {
                let def = catalog.get_process(r.process()).unwrap();
                println!(
                    "  {:<5} {:>5.1}% done, speed {:.2}",
                    def.name,
                    fixed64_to_f64(r.progress_fraction(def)) * 100.0,
                    fixed64_to_f64(r.speed_factor()),
                );
            }
        }
    }

    for id in [cellar, yard] {
        let state = site.get_mut(id).unwrap();
        while let Some(record) = state.next_extractable() {
            if let Ok(Some(product)) = state.take_out(record) {
                let name = &catalog.get_item(product.kind).unwrap().name;
                println!("took out {} x {name}", product.count);
            }
        }
    }
    site.flush_events();
}
