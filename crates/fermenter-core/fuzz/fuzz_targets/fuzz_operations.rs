#![no_main]
use arbitrary::Arbitrary;
use fermenter_core::config::FermenterConfig;
use fermenter_core::environment::OperationalGates;
use fermenter_core::id::ProgressId;
use fermenter_core::test_utils::*;
use libfuzzer_sys::fuzz_target;

/// A structured operation against one vat.
#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Add { kind: u8, count: u8 },
    Advance { ticks: u16, temperature: i8, powered: bool },
    TakeOut { index: u8 },
    Reset,
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    ops: Vec<FuzzOp>,
}

fuzz_target!(|input: FuzzInput| {
    let b = brewery();
    let mut vat = b.new_vat();
    let kinds = [b.milk, b.cucumber, b.wort];
    let config = FermenterConfig::default();
    let mut next_id = 0u64;

    // Limit operations to prevent timeouts.
    let max_ops = input.ops.len().min(200);

    for op in &input.ops[..max_ops] {
        match op {
            FuzzOp::Add { kind, count } => {
                next_id += 1;
                let kind = kinds[*kind as usize % kinds.len()];
                let _ = vat.add_ingredient(thing(next_id, kind, u32::from(*count)));
            }
            FuzzOp::Advance { ticks, temperature, powered } => {
                let gates = OperationalGates { powered: *powered, ..Default::default() };
                vat.advance(u64::from(*ticks), &sample_at(f64::from(*temperature)), gates, &config);
            }
            FuzzOp::TakeOut { index } => {
                let ids: Vec<ProgressId> = vat.records().map(|(id, _)| id).collect();
                if !ids.is_empty() {
                    let _ = vat.take_out(ids[*index as usize % ids.len()]);
                }
            }
            FuzzOp::Reset => {
                vat.reset();
            }
        }
        // Shared capacity is never exceeded.
        assert!(vat.total_ingredient_count() <= 30);
    }
});
