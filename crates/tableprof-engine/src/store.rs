//! Profile store facade: dimension registration and fact persistence
//!
//! Wraps one relational store handle with the registry and the synthesizer,
//! applying the configured identifier casing exactly once on the way in.

use crate::mapper::resolve_sql_type;
use crate::registry::DimensionRegistry;
use crate::synthesizer::SchemaSynthesizer;
use chrono::Utc;
use std::sync::Arc;
use tableprof_core::schema;
use tableprof_core::{
    ColumnMeta, ColumnSpec, IdentifierCasing, ProfileResult, ScanKind, SqlType, SqlValue,
};
use tableprof_store::RelationalStore;

/// One aggregate result destined for a fact row
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfileValue {
    /// Result column alias; becomes the fact column name
    pub name: String,
    pub value: SqlValue,
    pub scan_kind: Option<ScanKind>,
}

/// Persists dimensions and facts into the profile store
#[derive(Clone)]
pub struct ProfileStore {
    store: Arc<dyn RelationalStore>,
    casing: IdentifierCasing,
    registry: DimensionRegistry,
    synthesizer: SchemaSynthesizer,
}

impl ProfileStore {
    pub fn new(store: Arc<dyn RelationalStore>, casing: IdentifierCasing) -> Self {
        Self {
            registry: DimensionRegistry::new(Arc::clone(&store)),
            synthesizer: SchemaSynthesizer::new(Arc::clone(&store), casing),
            store,
            casing,
        }
    }

    /// Create the fixed dimension and fact tables when absent
    pub async fn scaffold(&self) -> ProfileResult<()> {
        self.synthesizer.scaffold().await
    }

    /// Open a new profile run stamped with the current time
    pub async fn open_run(&self) -> ProfileResult<i64> {
        self.get_or_create(
            schema::PROFILE_RECORDS.table,
            vec![(schema::PROFILE_DATE, SqlValue::Timestamp(Utc::now()))],
        )
        .await
    }

    pub async fn register_table(&self, table_name: &str) -> ProfileResult<i64> {
        self.get_or_create(
            schema::TABLE_NAMES.table,
            vec![(schema::TABLE_NAME, SqlValue::from(table_name))],
        )
        .await
    }

    /// Register a driver type name, shared across all tables in a run
    pub async fn register_column_type(&self, type_name: &str) -> ProfileResult<i64> {
        self.get_or_create(
            schema::TABLE_COLUMN_TYPES.table,
            vec![(schema::TABLE_COLUMN_TYPE, SqlValue::from(type_name))],
        )
        .await
    }

    pub async fn register_table_column(
        &self,
        table_id: i64,
        type_id: i64,
        column_name: &str,
    ) -> ProfileResult<i64> {
        self.get_or_create(
            schema::TABLE_COLUMN_NAMES.table,
            vec![
                (schema::TABLE_NAME_ID, SqlValue::Int(table_id)),
                (schema::TABLE_COLUMN_NAME, SqlValue::from(column_name)),
                (schema::TABLE_COLUMN_TYPE_ID, SqlValue::Int(type_id)),
            ],
        )
        .await
    }

    /// Custom columns key on the raw definition too, so the same alias with
    /// a changed expression registers as a new dimension row
    pub async fn register_custom_column(
        &self,
        table_id: i64,
        type_id: i64,
        column_name: &str,
        definition: &str,
    ) -> ProfileResult<i64> {
        self.get_or_create(
            schema::TABLE_CUSTOM_COLUMN_NAMES.table,
            vec![
                (schema::TABLE_NAME_ID, SqlValue::Int(table_id)),
                (schema::TABLE_COLUMN_NAME, SqlValue::from(column_name)),
                (schema::TABLE_COLUMN_TYPE_ID, SqlValue::Int(type_id)),
                (
                    schema::TABLE_CUSTOM_COLUMN_DEFINITION,
                    SqlValue::from(definition),
                ),
            ],
        )
        .await
    }

    /// Record the row-count fact for one (table, run)
    pub async fn record_table_profile(
        &self,
        table_id: i64,
        row_count: i64,
        run_id: i64,
    ) -> ProfileResult<i64> {
        self.get_or_create(
            schema::TABLE_PROFILES.table,
            vec![
                (schema::TABLE_NAME_ID, SqlValue::Int(table_id)),
                (schema::TABLE_ROW_COUNT, SqlValue::Int(row_count)),
                (schema::PROFILE_RECORD_ID, SqlValue::Int(run_id)),
            ],
        )
        .await
    }

    async fn get_or_create(
        &self,
        table: &str,
        values: Vec<(&'static str, SqlValue)>,
    ) -> ProfileResult<i64> {
        let table = self.casing.apply(table);

        let mut natural_key = Vec::with_capacity(values.len());
        for (column, value) in values {
            natural_key.push((self.casing.apply(column), value));
        }

        self.registry.get_or_create(&table, &natural_key).await
    }

    /// Write one aggregate fact row for a plain column, growing that type's
    /// fact table as needed
    pub async fn store_column_profile(
        &self,
        column_id: i64,
        type_name: &str,
        run_id: i64,
        results: &[ColumnProfileValue],
    ) -> ProfileResult<()> {
        let table = self.casing.apply(&schema::column_profile_table(type_name));
        self.store_fact_row(
            &table,
            schema::TABLE_COLUMN_NAME_ID,
            column_id,
            run_id,
            results,
        )
        .await
    }

    /// Write the sampled raw value fact row for a custom column
    pub async fn store_custom_column_profile(
        &self,
        custom_column_id: i64,
        meta: &ColumnMeta,
        run_id: i64,
        value: SqlValue,
    ) -> ProfileResult<()> {
        let table = self
            .casing
            .apply(&schema::custom_column_profile_table(&meta.type_name));
        let results = [ColumnProfileValue {
            name: schema::CUSTOM_VALUE_COLUMN.to_string(),
            value,
            scan_kind: meta.scan_kind,
        }];
        self.store_fact_row(
            &table,
            schema::TABLE_CUSTOM_COLUMN_NAME_ID,
            custom_column_id,
            run_id,
            &results,
        )
        .await
    }

    async fn store_fact_row(
        &self,
        table: &str,
        dimension_column: &str,
        dimension_id: i64,
        run_id: i64,
        results: &[ColumnProfileValue],
    ) -> ProfileResult<()> {
        let dimension_column = self.casing.apply(dimension_column);
        let run_column = self.casing.apply(schema::PROFILE_RECORD_ID);

        let mut columns = vec![
            ColumnSpec::identity(self.casing.apply(schema::ID_COLUMN)),
            ColumnSpec::new(dimension_column.clone(), SqlType::Int),
            ColumnSpec::new(run_column.clone(), SqlType::Int),
        ];
        let mut values = vec![
            (dimension_column, SqlValue::Int(dimension_id)),
            (run_column, SqlValue::Int(run_id)),
        ];

        for result in results {
            let column = self.casing.apply(&result.name);
            let sql_type = resolve_sql_type(&result.value, result.scan_kind)?;
            columns.push(ColumnSpec::new(column.clone(), sql_type));
            values.push((column, result.value.clone()));
        }

        self.synthesizer.ensure_fact_table(table, &columns).await?;
        self.store.insert_returning_id(table, &values).await?;
        Ok(())
    }
}
