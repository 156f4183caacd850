//! Relational store capability surface used by the profiler
//!
//! Both sides of the system speak this trait: the target database being
//! profiled (samples, aggregates, row counts) and the profile store being
//! written to (dimension lookups, inserts, DDL). Values are always bound as
//! parameters; identifiers are validated by the engine before they reach an
//! implementation.

use tableprof_core::{ColumnMeta, ColumnSpec, ProfileResult, SqlValue};

/// Rows plus their declared column metadata
///
/// Metadata is available even when a query produced zero rows, which is how
/// a one-row sample of an empty table still reports its column types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryOutput {
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { columns, rows }
    }

    /// Convenience constructor for a single-row result
    pub fn single_row(columns: Vec<ColumnMeta>, values: Vec<SqlValue>) -> Self {
        Self {
            columns,
            rows: vec![values],
        }
    }

    /// The first row, when the query produced one
    pub fn first_row(&self) -> Option<&[SqlValue]> {
        self.rows.first().map(|row| row.as_slice())
    }
}

/// Capability surface of a relational database
///
/// Implementations must be safe for concurrent use - every profiling task
/// shares one store handle.
#[async_trait::async_trait]
pub trait RelationalStore: Send + Sync {
    /// Adapter name (e.g. "PostgreSQL")
    fn name(&self) -> &'static str;

    /// Probe the connection before starting real work
    async fn test_connection(&self) -> ProfileResult<()>;

    /// One-row sample with explicit select expressions
    async fn select_single(&self, table: &str, selects: &[String]) -> ProfileResult<QueryOutput>;

    /// One-row sample across all declared columns
    async fn select_all_single(&self, table: &str) -> ProfileResult<QueryOutput>;

    /// Whole-table select with explicit select expressions (aggregates)
    async fn select_rows(&self, table: &str, selects: &[String]) -> ProfileResult<QueryOutput>;

    /// Ids of rows matching equality on every (column, value) pair
    async fn select_ids_where(
        &self,
        table: &str,
        wheres: &[(String, SqlValue)],
    ) -> ProfileResult<Vec<i64>>;

    /// Insert one row and return the generated id
    async fn insert_returning_id(
        &self,
        table: &str,
        values: &[(String, SqlValue)],
    ) -> ProfileResult<i64>;

    async fn table_exists(&self, table: &str) -> ProfileResult<bool>;

    async fn column_exists(&self, table: &str, column: &str) -> ProfileResult<bool>;

    /// Create a table from the given columns; the identity column is
    /// rendered as a generated primary key
    async fn create_table(&self, table: &str, columns: &[ColumnSpec]) -> ProfileResult<()>;

    /// Add one column to an existing table
    async fn add_column(&self, table: &str, column: &ColumnSpec) -> ProfileResult<()>;

    async fn table_row_count(&self, table: &str) -> ProfileResult<i64>;
}
