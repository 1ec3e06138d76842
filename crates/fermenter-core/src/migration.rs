//! Snapshot payload migrations between format versions.
//!
//! Each registered step rewrites a payload from version `N` to `N + 1`. The
//! registry chains steps so an old save loads in one call. Steps may consult
//! the catalog and the fermenter type being restored, since older payloads
//! carry less than the current one.

use std::collections::BTreeMap;

use crate::id::FermenterTypeId;
use crate::registry::Catalog;
use crate::serialize::{DeserializeError, migrate_v1_to_v2};

/// Errors that can occur during migration.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("no migration path from version {from} to version {to}")]
    NoMigrationPath { from: u32, to: u32 },
    #[error("migration from version {from} to version {to} failed: {reason}")]
    MigrationFailed { from: u32, to: u32, reason: String },
    #[error("deserialization error: {0}")]
    DeserializeError(#[from] DeserializeError),
}

/// What a migration step may read besides the payload bytes.
#[derive(Debug, Clone, Copy)]
pub struct MigrationContext<'a> {
    pub catalog: &'a Catalog,
    pub fermenter_type: FermenterTypeId,
}

/// A function that rewrites a payload from one version to the next.
pub type MigrationFn = fn(&MigrationContext<'_>, &[u8]) -> Result<Vec<u8>, MigrationError>;

/// Registry of migration steps keyed by source version.
pub struct MigrationRegistry {
    migrations: BTreeMap<u32, MigrationFn>,
}

impl MigrationRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            migrations: BTreeMap::new(),
        }
    }

    /// A registry with every step this crate knows about.
    pub fn builtin() -> Self {
        let mut reg = Self::new();
        reg.register(1, migrate_v1_to_v2);
        reg
    }

    /// Register a step from `from_version` to `from_version + 1`.
    pub fn register(&mut self, from_version: u32, migrate: MigrationFn) {
        self.migrations.insert(from_version, migrate);
    }

    /// Check whether a complete migration path exists from `from` to `to`.
    pub fn can_migrate(&self, from: u32, to: u32) -> bool {
        if from >= to {
            return from == to;
        }
        (from..to).all(|v| self.migrations.contains_key(&v))
    }

    /// Rewrite `data` from version `from` to version `to`.
    ///
    /// Returns the data unchanged if `from == to`.
    pub fn migrate(
        &self,
        ctx: &MigrationContext<'_>,
        data: &[u8],
        from: u32,
        to: u32,
    ) -> Result<Vec<u8>, MigrationError> {
        if from == to {
            return Ok(data.to_vec());
        }
        if from > to {
            return Err(MigrationError::NoMigrationPath { from, to });
        }

        let mut current = data.to_vec();
        for version in from..to {
            let step = self
                .migrations
                .get(&version)
                .ok_or(MigrationError::NoMigrationPath { from, to })?;
            current = step(ctx, &current)?;
            tracing::warn!(from = version, to = version + 1, "migrated fermenter snapshot");
        }
        Ok(current)
    }

    /// Number of registered steps.
    pub fn step_count(&self) -> usize {
        self.migrations.len()
    }
}

impl Default for MigrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
