//! Property-based tests for speed factors, quality, spoilage and ingestion.

use fermenter_core::config::{FermenterConfig, WeatherDomains};
use fermenter_core::environment::{EnvironmentSample, OperationalGates};
use fermenter_core::fixed::Fixed64;
use fermenter_core::id::ItemKindId;
use fermenter_core::process::{FactorRange, ProcessDefinition};
use fermenter_core::progress::ProgressRecord;
use fermenter_core::quality::QualityCategory;
use fermenter_core::sim::TICKS_PER_DAY;
use fermenter_core::test_utils::*;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

fn arb_sample() -> impl Strategy<Value = EnvironmentSample> {
    (
        -80.0..80.0f64,
        -2.0..3.0f64,
        -2.0..3.0f64,
        -2.0..3.0f64,
        -2.0..5.0f64,
        0.0..=1.0f64,
    )
        .prop_map(|(t, sun, rain, snow, wind, roof)| EnvironmentSample {
            temperature: fixed(t),
            sun_glow: fixed(sun),
            rain_rate: fixed(rain),
            snow_rate: fixed(snow),
            wind_speed: fixed(wind),
            roof_fraction: fixed(roof),
        })
}

fn arb_factor() -> impl Strategy<Value = FactorRange> {
    (0.0..2.0f64, 0.0..2.0f64).prop_map(|(a, b)| FactorRange::new(fixed(a), fixed(b)))
}

fn arb_process() -> impl Strategy<Value = ProcessDefinition> {
    (
        0.0..1.0f64,
        0.0..3.0f64,
        arb_factor(),
        arb_factor(),
        arb_factor(),
        arb_factor(),
    )
        .prop_map(|(below, above, sun, rain, snow, wind)| {
            let mut p = ProcessDefinition::new("p", ItemKindId(1), only(ItemKindId(0)));
            p.speed_below_safe = fixed(below);
            p.speed_above_safe = fixed(above);
            p.sun_factor = sun;
            p.rain_factor = rain;
            p.snow_factor = snow;
            p.wind_factor = wind;
            p
        })
}

#[derive(Debug, Clone)]
enum Op {
    Add { milk: bool, count: u32 },
    Advance { ticks: u64, temperature: f64 },
    TakeOutFirst,
    Reset,
}

fn arb_ops(max_ops: usize) -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(
        prop_oneof![
            (any::<bool>(), 0..20u32).prop_map(|(milk, count)| Op::Add { milk, count }),
            (0..TICKS_PER_DAY, -20.0..60.0f64)
                .prop_map(|(ticks, temperature)| Op::Advance { ticks, temperature }),
            Just(Op::TakeOutFirst),
            Just(Op::Reset),
        ],
        1..=max_ops,
    )
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The combined speed never goes negative nor above the best multiplier.
    #[test]
    fn speed_factor_is_bounded(p in arb_process(), sample in arb_sample()) {
        let speed = p.speed_factor(&sample, &WeatherDomains::default());
        let mut cap = p.speed_above_safe.max(Fixed64::ONE);
        for f in [p.sun_factor, p.rain_factor, p.snow_factor, p.wind_factor] {
            cap = cap.saturating_mul(f.min.max(f.max).max(Fixed64::ONE));
        }
        prop_assert!(speed >= Fixed64::ZERO);
        prop_assert!(speed <= cap, "speed {} above cap {}", speed, cap);
    }

    /// Quality never drops as days pass.
    #[test]
    fn quality_is_monotonic(d1 in 0.0..10.0f64, d2 in 0.0..10.0f64) {
        let b = brewery();
        let vint = b.catalog.get_process(b.vint).unwrap();
        let (lo, hi) = if d1 <= d2 { (d1, d2) } else { (d2, d1) };
        prop_assert!(vint.quality_for_days(fixed(lo)) <= vint.quality_for_days(fixed(hi)));
    }

    /// Spoilage saturates at exactly one.
    #[test]
    fn ruin_clamps_at_one(start in 0.9..1.0f64, ticks in 1..100_000u64, t in 33.0..200.0f64) {
        let b = brewery();
        let brew = b.catalog.get_process(b.brew).unwrap();
        let mut held = fermenter_core::item::HeldItems::new();
        held.push(thing(1, b.wort, 1));
        let mut r = ProgressRecord::from_parts(b.brew, 0, fixed(start), QualityCategory::Normal, held);
        r.advance(brew, ticks, &sample_at(t), OperationalGates::default(), &WeatherDomains::default());
        prop_assert!(r.ruined_percent() <= Fixed64::ONE);
        prop_assert!(r.ruined_percent() >= fixed(start));
    }

    /// Merging dilutes elapsed time by the unit-weighted mean.
    #[test]
    fn merge_weights_by_count(n in 1..1000u32, c in 1..1000u32, e in 0..10_000_000u64) {
        let b = brewery();
        let mut r = ProgressRecord::from_parts(
            b.brew,
            e,
            Fixed64::ZERO,
            QualityCategory::Normal,
            vec![thing(1, b.wort, n)].into(),
        );
        r.merge(thing(2, b.wort, c));
        let exact = e as f64 * f64::from(n) / f64::from(n + c);
        prop_assert!((r.elapsed_ticks() as f64 - exact).abs() <= 0.5);
        prop_assert_eq!(r.ingredient_count(), n + c);
    }

    /// Batches in one vat advance exactly as they would alone.
    #[test]
    fn batches_advance_independently(
        milk in 1..15u32,
        cucumber in 1..15u32,
        steps in proptest::collection::vec((0..TICKS_PER_DAY, -10.0..50.0f64), 1..8),
    ) {
        let b = brewery();
        let config = FermenterConfig::default();
        let mut both = b.new_vat();
        let mut alone_milk = b.new_vat();
        let mut alone_cucumber = b.new_vat();
        both.add_ingredient(thing(1, b.milk, milk)).unwrap();
        both.add_ingredient(thing(2, b.cucumber, cucumber)).unwrap();
        alone_milk.add_ingredient(thing(1, b.milk, milk)).unwrap();
        alone_cucumber.add_ingredient(thing(2, b.cucumber, cucumber)).unwrap();

        for (ticks, t) in steps {
            let sample = sample_at(t);
            for s in [&mut both, &mut alone_milk, &mut alone_cucumber] {
                s.advance(ticks, &sample, OperationalGates::default(), &config);
            }
        }

        let together: Vec<_> = both.records().map(|(_, r)| (r.elapsed_ticks(), r.ruined_percent())).collect();
        let apart: Vec<_> = alone_milk
            .records()
            .chain(alone_cucumber.records())
            .map(|(_, r)| (r.elapsed_ticks(), r.ruined_percent()))
            .collect();
        prop_assert_eq!(together, apart);
    }

    /// No operation sequence overfills a vat or loses track of held units.
    #[test]
    fn capacity_is_never_exceeded(ops in arb_ops(40)) {
        let b = brewery();
        let mut vat = b.new_vat();
        let config = FermenterConfig::default();
        let mut next = 0u64;
        for op in ops {
            match op {
                Op::Add { milk, count } => {
                    next += 1;
                    let kind = if milk { b.milk } else { b.cucumber };
                    let before = vat.total_ingredient_count();
                    match vat.add_ingredient(thing(next, kind, count)) {
                        Ok(out) => {
                            let back = out.leftover.map(|t| t.stack_count).unwrap_or(0);
                            prop_assert_eq!(out.accepted + back, count);
                            prop_assert_eq!(vat.total_ingredient_count(), before + out.accepted);
                        }
                        Err(rejected) => {
                            prop_assert_eq!(rejected.item.stack_count, count);
                            prop_assert_eq!(vat.total_ingredient_count(), before);
                        }
                    }
                }
                Op::Advance { ticks, temperature } => {
                    vat.advance(ticks, &sample_at(temperature), OperationalGates::default(), &config);
                }
                Op::TakeOutFirst => {
                    if let Some(id) = vat.next_extractable() {
                        prop_assert!(vat.take_out(id).is_ok());
                        prop_assert!(!vat.contains(id));
                    }
                }
                Op::Reset => {
                    vat.reset();
                    prop_assert!(vat.is_empty());
                }
            }
            prop_assert!(vat.total_ingredient_count() <= 30);
        }
    }
}
