//! Versioned binary snapshots of a fermenter.
//!
//! A snapshot is a bitcode envelope holding a [`SnapshotHeader`] and an
//! opaque payload. The header is decoded first so older payloads can be
//! routed through [`MigrationRegistry`] before the payload is parsed.
//!
//! Records are stored by their position in the fermenter type's process
//! list, so a snapshot is only meaningful against the same catalog. The
//! fermenter type itself is supplied by the host on load.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::fermenter::FermenterState;
use crate::filter::ItemFilter;
use crate::fixed::{Fixed64, Ticks};
use crate::id::{FermenterTypeId, ItemKindId, ThingId};
use crate::item::{HeldItems, Thing};
use crate::migration::{MigrationContext, MigrationError, MigrationRegistry};
use crate::progress::ProgressRecord;
use crate::quality::QualityCategory;
use crate::registry::Catalog;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a fermenter snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0xFE4D_0001;

/// Current format version. Increment when breaking the payload format.
pub const FORMAT_VERSION: u32 = 2;

/// The pre-multi-batch format: one implicit batch per fermenter.
pub const LEGACY_FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("record runs a process outside the fermenter type")]
    ForeignProcess,
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("process index {0} is out of range for the fermenter type")]
    InvalidProcessIndex(u32),
    #[error("unknown fermenter type {0:?}")]
    UnknownFermenterType(FermenterTypeId),
    #[error("migration failed: {0}")]
    Migration(String),
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Site tick at the time the snapshot was taken.
    pub tick: Ticks,
}

impl SnapshotHeader {
    pub fn new(tick: Ticks) -> Self {
        Self::with_version(FORMAT_VERSION, tick)
    }

    fn with_version(version: u32, tick: Ticks) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version,
            tick,
        }
    }

    /// Check magic and version. Older versions need migrating first.
    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope {
    header: SnapshotHeader,
    payload: Vec<u8>,
}

fn decode_envelope(data: &[u8]) -> Result<SnapshotEnvelope, DeserializeError> {
    bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))
}

fn encode_envelope(header: SnapshotHeader, payload: Vec<u8>) -> Result<Vec<u8>, SerializeError> {
    bitcode::serialize(&SnapshotEnvelope { header, payload })
        .map_err(|e| SerializeError::Encode(e.to_string()))
}

/// Read only the header, to decide whether a snapshot needs migrating.
pub fn read_snapshot_header(data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
    Ok(decode_envelope(data)?.header)
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Persisted fields of one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RecordPayload {
    process_index: u32,
    elapsed_ticks: Ticks,
    ruined_percent: Fixed64,
    target_quality: u8,
    held: Vec<Thing>,
}

/// Persisted fields of one fermenter, current version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FermenterPayload {
    target_quality: u8,
    product_filter: ItemFilter,
    ingredient_filter: ItemFilter,
    records: Vec<RecordPayload>,
}

/// Scalar fields of a pre-multi-batch fermenter.
///
/// Hosts importing old saves fill this in from their stored fields and
/// encode it with [`LegacyPayload::encode`]; loading it through
/// [`FermenterState::deserialize_with_migrations`] yields at most one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyPayload {
    pub ruined_percent: Fixed64,
    pub ingredient_count: u32,
    pub progress_ticks: Ticks,
    pub current_process_index: u32,
    pub queued_process_index: u32,
    pub target_quality: u8,
    /// Names of the ingredient kinds that went in, for provenance.
    pub ingredient_labels: Vec<String>,
}

impl LegacyPayload {
    /// Wrap in a version-1 envelope.
    pub fn encode(&self, tick: Ticks) -> Result<Vec<u8>, SerializeError> {
        let payload =
            bitcode::serialize(self).map_err(|e| SerializeError::Encode(e.to_string()))?;
        encode_envelope(SnapshotHeader::with_version(LEGACY_FORMAT_VERSION, tick), payload)
    }
}

fn step_failed(reason: impl Into<String>) -> MigrationError {
    MigrationError::MigrationFailed {
        from: LEGACY_FORMAT_VERSION,
        to: LEGACY_FORMAT_VERSION + 1,
        reason: reason.into(),
    }
}

/// Turn the single implicit batch of a legacy fermenter into a record.
///
/// The held units are synthesized as one stack of the process's first
/// accepted ingredient. The queued process becomes the only enabled product.
pub(crate) fn migrate_v1_to_v2(
    ctx: &MigrationContext<'_>,
    data: &[u8],
) -> Result<Vec<u8>, MigrationError> {
    let legacy: LegacyPayload =
        bitcode::deserialize(data).map_err(|e| step_failed(e.to_string()))?;
    let catalog = ctx.catalog;
    let ty = ctx.fermenter_type;
    if catalog.get_fermenter(ty).is_none() {
        return Err(DeserializeError::UnknownFermenterType(ty).into());
    }

    let current = catalog
        .process_at(ty, legacy.current_process_index as usize)
        .and_then(|pid| catalog.get_process(pid))
        .ok_or(DeserializeError::InvalidProcessIndex(legacy.current_process_index))?;
    let queued = catalog
        .process_at(ty, legacy.queued_process_index as usize)
        .and_then(|pid| catalog.get_process(pid))
        .ok_or(DeserializeError::InvalidProcessIndex(legacy.queued_process_index))?;

    let mut records = Vec::new();
    if legacy.ingredient_count > 0 {
        let kind = current
            .ingredient_filter
            .first()
            .ok_or_else(|| step_failed(format!("process {} accepts nothing", current.name)))?;
        let provenance: Vec<ItemKindId> = legacy
            .ingredient_labels
            .iter()
            .filter_map(|label| {
                let id = catalog.item_id(label);
                if id.is_none() {
                    tracing::warn!(%label, "dropping unknown ingredient label from legacy batch");
                }
                id
            })
            .collect();
        let item = Thing::new(ThingId::SYNTHESIZED, kind, legacy.ingredient_count)
            .with_ingredients(provenance);
        records.push(RecordPayload {
            process_index: legacy.current_process_index,
            elapsed_ticks: legacy.progress_ticks,
            ruined_percent: legacy.ruined_percent,
            target_quality: legacy.target_quality,
            held: vec![item],
        });
    }

    let payload = FermenterPayload {
        target_quality: legacy.target_quality,
        product_filter: [queued.product].into_iter().collect(),
        ingredient_filter: catalog.ingredients_of(ty),
        records,
    };
    bitcode::serialize(&payload).map_err(|e| step_failed(e.to_string()))
}

// ---------------------------------------------------------------------------
// FermenterState snapshots
// ---------------------------------------------------------------------------

impl FermenterState {
    /// Encode this fermenter. Events still pending are not persisted.
    pub fn serialize(&self, tick: Ticks) -> Result<Vec<u8>, SerializeError> {
        let catalog = self.catalog();
        let ty = self.fermenter_type();
        let records = self
            .records()
            .map(|(_, r)| {
                let index = catalog
                    .process_index(ty, r.process())
                    .ok_or(SerializeError::ForeignProcess)?;
                Ok(RecordPayload {
                    process_index: index as u32,
                    elapsed_ticks: r.elapsed_ticks(),
                    ruined_percent: r.ruined_percent(),
                    target_quality: r.stored_target_quality().ordinal(),
                    held: r.held().iter().cloned().collect(),
                })
            })
            .collect::<Result<Vec<_>, SerializeError>>()?;
        let payload = FermenterPayload {
            target_quality: self.target_quality().ordinal(),
            product_filter: self.product_filter().clone(),
            ingredient_filter: self.ingredient_filter().clone(),
            records,
        };
        let bytes =
            bitcode::serialize(&payload).map_err(|e| SerializeError::Encode(e.to_string()))?;
        encode_envelope(SnapshotHeader::new(tick), bytes)
    }

    /// Decode a current-version snapshot for a fermenter of type `ty`.
    ///
    /// Record ids are freshly allocated; ids held from before the save are
    /// stale afterwards.
    pub fn deserialize(
        catalog: Arc<Catalog>,
        ty: FermenterTypeId,
        data: &[u8],
    ) -> Result<Self, DeserializeError> {
        let envelope = decode_envelope(data)?;
        envelope.header.validate()?;
        decode_payload(catalog, ty, &envelope.payload)
    }

    /// Like [`FermenterState::deserialize`], migrating older snapshots first.
    pub fn deserialize_with_migrations(
        catalog: Arc<Catalog>,
        ty: FermenterTypeId,
        data: &[u8],
        migrations: &MigrationRegistry,
    ) -> Result<Self, DeserializeError> {
        let envelope = decode_envelope(data)?;
        match envelope.header.validate() {
            Ok(()) => decode_payload(catalog, ty, &envelope.payload),
            Err(DeserializeError::UnsupportedVersion(old)) => {
                let ctx = MigrationContext {
                    catalog: &catalog,
                    fermenter_type: ty,
                };
                let migrated = migrations
                    .migrate(&ctx, &envelope.payload, old, FORMAT_VERSION)
                    .map_err(|e| DeserializeError::Migration(e.to_string()))?;
                decode_payload(catalog, ty, &migrated)
            }
            Err(other) => Err(other),
        }
    }
}

fn decode_payload(
    catalog: Arc<Catalog>,
    ty: FermenterTypeId,
    bytes: &[u8],
) -> Result<FermenterState, DeserializeError> {
    let payload: FermenterPayload =
        bitcode::deserialize(bytes).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    if catalog.get_fermenter(ty).is_none() {
        return Err(DeserializeError::UnknownFermenterType(ty));
    }
    let records = payload
        .records
        .into_iter()
        .map(|r| {
            let process = catalog
                .process_at(ty, r.process_index as usize)
                .ok_or(DeserializeError::InvalidProcessIndex(r.process_index))?;
            Ok(ProgressRecord::from_parts(
                process,
                r.elapsed_ticks,
                r.ruined_percent,
                QualityCategory::from_ordinal(r.target_quality),
                HeldItems::from(r.held),
            ))
        })
        .collect::<Result<Vec<_>, DeserializeError>>()?;
    FermenterState::restore(
        catalog,
        ty,
        records,
        payload.product_filter,
        payload.ingredient_filter,
        QualityCategory::from_ordinal(payload.target_quality),
    )
    .map_err(|_| DeserializeError::UnknownFermenterType(ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::OperationalGates;
    use crate::config::FermenterConfig;
    use crate::sim::TICKS_PER_DAY;
    use crate::test_utils::*;

    fn legacy(count: u32) -> LegacyPayload {
        LegacyPayload {
            ruined_percent: fixed(0.25),
            ingredient_count: count,
            progress_ticks: 12_345,
            current_process_index: 0,
            queued_process_index: 1,
            target_quality: QualityCategory::Good.ordinal(),
            ingredient_labels: vec!["wort".into(), "ghost".into()],
        }
    }

    #[test]
    fn round_trip_keeps_record_fields() {
        let b = brewery();
        let mut s = FermenterState::new(b.catalog.clone(), b.vat).unwrap();
        s.add_ingredient(thing(1, b.milk, 10)).unwrap();
        s.advance(5 * TICKS_PER_DAY, &ideal_sample(), OperationalGates::default(), &FermenterConfig::default());
        s.add_ingredient(thing(2, b.cucumber, 4)).unwrap();
        s.advance(TICKS_PER_DAY, &ideal_sample(), OperationalGates::default(), &FermenterConfig::default());

        let bytes = s.serialize(42).unwrap();
        assert_eq!(read_snapshot_header(&bytes).unwrap(), SnapshotHeader::new(42));
        let back = FermenterState::deserialize(b.catalog.clone(), b.vat, &bytes).unwrap();

        let before: Vec<_> = s.records().map(|(_, r)| r).collect();
        let after: Vec<_> = back.records().map(|(_, r)| r).collect();
        assert_eq!(before.len(), 2);
        assert_eq!(before.len(), after.len());
        for (x, y) in before.iter().zip(&after) {
            assert_eq!(x.process(), y.process());
            assert_eq!(x.elapsed_ticks(), y.elapsed_ticks());
            assert_eq!(x.ruined_percent(), y.ruined_percent());
            assert_eq!(x.held(), y.held());
        }
        assert_eq!(back.settings(), s.settings());
    }

    #[test]
    fn wrong_magic_and_future_version_are_rejected() {
        let b = brewery();
        let bad = encode_envelope(
            SnapshotHeader {
                magic: 0xDEAD_BEEF,
                version: FORMAT_VERSION,
                tick: 0,
            },
            Vec::new(),
        )
        .unwrap();
        assert!(matches!(
            FermenterState::deserialize(b.catalog.clone(), b.barrel, &bad),
            Err(DeserializeError::InvalidMagic(0xDEAD_BEEF))
        ));
        let future =
            encode_envelope(SnapshotHeader::with_version(FORMAT_VERSION + 1, 0), Vec::new())
                .unwrap();
        assert!(matches!(
            FermenterState::deserialize_with_migrations(
                b.catalog.clone(),
                b.barrel,
                &future,
                &MigrationRegistry::builtin()
            ),
            Err(DeserializeError::FutureVersion(_))
        ));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let b = brewery();
        assert!(matches!(
            FermenterState::deserialize(b.catalog.clone(), b.barrel, &[]),
            Err(DeserializeError::Decode(_))
        ));
        assert!(read_snapshot_header(&[0xFF; 3]).is_err());
    }

    #[test]
    fn legacy_snapshot_needs_migration() {
        let b = brewery();
        let bytes = legacy(8).encode(7).unwrap();
        assert!(matches!(
            FermenterState::deserialize(b.catalog.clone(), b.barrel, &bytes),
            Err(DeserializeError::UnsupportedVersion(1))
        ));
    }

    #[test]
    fn legacy_batch_becomes_one_record() {
        let b = brewery();
        let bytes = legacy(8).encode(7).unwrap();
        let s = FermenterState::deserialize_with_migrations(
            b.catalog.clone(),
            b.barrel,
            &bytes,
            &MigrationRegistry::builtin(),
        )
        .unwrap();
        let records: Vec<_> = s.records().map(|(_, r)| r).collect();
        assert_eq!(records.len(), 1);
        let r = records[0];
        assert_eq!(r.process(), b.brew);
        assert_eq!(r.elapsed_ticks(), 12_345);
        assert_eq!(r.ruined_percent(), fixed(0.25));
        assert_eq!(r.stored_target_quality(), QualityCategory::Good);
        let held: Vec<_> = r.held().iter().collect();
        assert_eq!(held.len(), 1);
        assert!(held[0].id.is_synthesized());
        assert_eq!(held[0].kind, b.wort);
        assert_eq!(held[0].stack_count, 8);
        assert_eq!(held[0].ingredients, vec![b.wort]);
        // The queued process is the only enabled product.
        assert!(s.product_filter().allows(b.wine));
        assert!(!s.product_filter().allows(b.beer));
    }

    #[test]
    fn empty_legacy_fermenter_has_no_records() {
        let b = brewery();
        let bytes = legacy(0).encode(0).unwrap();
        let s = FermenterState::deserialize_with_migrations(
            b.catalog.clone(),
            b.barrel,
            &bytes,
            &MigrationRegistry::builtin(),
        )
        .unwrap();
        assert!(s.is_empty());
    }

    #[test]
    fn legacy_process_index_out_of_range_fails() {
        let b = brewery();
        let mut fields = legacy(3);
        fields.current_process_index = 9;
        let bytes = fields.encode(0).unwrap();
        assert!(matches!(
            FermenterState::deserialize_with_migrations(
                b.catalog.clone(),
                b.barrel,
                &bytes,
                &MigrationRegistry::builtin()
            ),
            Err(DeserializeError::Migration(_))
        ));
    }

    #[test]
    fn unknown_quality_ordinal_falls_back_to_normal() {
        let b = brewery();
        let mut fields = legacy(3);
        fields.target_quality = 200;
        let bytes = fields.encode(0).unwrap();
        let s = FermenterState::deserialize_with_migrations(
            b.catalog.clone(),
            b.barrel,
            &bytes,
            &MigrationRegistry::builtin(),
        )
        .unwrap();
        assert_eq!(s.target_quality(), QualityCategory::Normal);
    }
}
