//! Creates and evolves profile-store tables
//!
//! Two jobs: scaffold the six fixed entities at startup, and grow the
//! per-type fact tables as new aggregate and value columns are first seen.
//! All DDL for one table runs under that table's keyed lock, so concurrent
//! tasks discovering the same new type cannot race the create, and a column
//! added by a sibling task is observed rather than re-added.

use crate::locks::KeyedLocks;
use std::sync::Arc;
use tableprof_core::{validate_identifier, ColumnSpec, IdentifierCasing, ProfileResult, FIXED_ENTITIES};
use tableprof_store::RelationalStore;

/// Ensures profile-store tables exist and only ever grow
#[derive(Clone)]
pub struct SchemaSynthesizer {
    store: Arc<dyn RelationalStore>,
    casing: IdentifierCasing,
    ddl_locks: KeyedLocks,
}

impl SchemaSynthesizer {
    pub fn new(store: Arc<dyn RelationalStore>, casing: IdentifierCasing) -> Self {
        Self {
            store,
            casing,
            ddl_locks: KeyedLocks::new(),
        }
    }

    /// Idempotent create-if-absent of the six fixed entities
    pub async fn scaffold(&self) -> ProfileResult<()> {
        for entity in FIXED_ENTITIES {
            let table = self.casing.apply(entity.table);
            let columns: Vec<ColumnSpec> = entity
                .columns
                .iter()
                .map(|descriptor| ColumnSpec {
                    name: self.casing.apply(descriptor.name),
                    sql_type: descriptor.sql_type,
                    identity: descriptor.identity,
                })
                .collect();
            self.ensure_table(&table, &columns).await?;
        }
        Ok(())
    }

    /// Ensure a fact table exists with at least the given columns
    ///
    /// Creates the table outright when absent; otherwise adds each missing
    /// column in place. Columns are never removed or retyped, so the
    /// declared set stays a superset of everything ever written.
    pub async fn ensure_fact_table(
        &self,
        table: &str,
        columns: &[ColumnSpec],
    ) -> ProfileResult<()> {
        self.ensure_table(table, columns).await
    }

    async fn ensure_table(&self, table: &str, columns: &[ColumnSpec]) -> ProfileResult<()> {
        validate_identifier(table)?;
        for column in columns {
            validate_identifier(&column.name)?;
        }

        let _guard = self.ddl_locks.acquire(table).await;

        if !self.store.table_exists(table).await? {
            tracing::debug!(table, "creating profile table");
            return self.store.create_table(table, columns).await;
        }

        for column in columns.iter().filter(|c| !c.identity) {
            if !self.store.column_exists(table, &column.name).await? {
                tracing::debug!(table, column = %column.name, "adding profile column");
                self.store.add_column(table, column).await?;
            }
        }
        Ok(())
    }
}
