#![no_main]
use fermenter_core::fermenter::FermenterState;
use fermenter_core::migration::MigrationRegistry;
use fermenter_core::test_utils::brewery;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must come back as an error, never a panic.
    let b = brewery();
    let migrations = MigrationRegistry::builtin();
    for ty in [b.barrel, b.vat] {
        let _ = FermenterState::deserialize_with_migrations(b.catalog.clone(), ty, data, &migrations);
    }
});
