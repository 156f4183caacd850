//! In-memory relational store for testing
//!
//! Plays both roles the profiler needs without a running database:
//! - target side: stubbed query results and row counts, keyed by the
//!   rendered select, so tests control exactly what a sample or aggregate
//!   query returns
//! - profile-store side: real create/alter/insert/select-where semantics
//!   over in-memory tables, with DDL calls recorded for assertions
//!
//! ## Usage
//!
//! ```rust,ignore
//! let target = MockStore::new();
//! target
//!     .stub_query(
//!         "orders",
//!         &["*"],
//!         QueryOutput::single_row(
//!             vec![ColumnMeta::new("id", "INT4", Some(ScanKind::Int))],
//!             vec![SqlValue::Int(1)],
//!         ),
//!     )
//!     .await;
//! target.stub_row_count("orders", 10).await;
//!
//! // Simulate a connection failure
//! let broken = MockStore::new().with_connection_failure();
//! assert!(broken.test_connection().await.is_err());
//! ```

use crate::adapter::{QueryOutput, RelationalStore};
use std::collections::HashMap;
use std::sync::Arc;
use tableprof_core::{ColumnSpec, ProfileError, ProfileResult, SqlValue};
use tokio::sync::RwLock;

#[derive(Default)]
struct MockTable {
    columns: Vec<ColumnSpec>,
    rows: Vec<HashMap<String, SqlValue>>,
    next_id: i64,
}

#[derive(Default)]
struct MockState {
    tables: HashMap<String, MockTable>,
    stubbed_queries: HashMap<String, QueryOutput>,
    stubbed_row_counts: HashMap<String, i64>,
    create_table_calls: Vec<String>,
    add_column_calls: Vec<(String, String)>,
}

/// In-memory [`RelationalStore`] double
///
/// Clones share state, so a test can hand the store to the profiler and
/// keep a handle for assertions.
pub struct MockStore {
    state: Arc<RwLock<MockState>>,
    fail_connection: bool,
    latency_ms: u64,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState::default())),
            fail_connection: false,
            latency_ms: 0,
        }
    }

    /// Fail every connection test
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Delay every operation, for testing interleavings and timeouts
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    fn query_key(table: &str, selects: &[&str]) -> String {
        format!("select {} from {}", selects.join(", "), table)
    }

    /// Stub the result of a select over `table` with these expressions
    pub async fn stub_query(&self, table: &str, selects: &[&str], output: QueryOutput) {
        let key = Self::query_key(table, selects);
        self.state.write().await.stubbed_queries.insert(key, output);
    }

    /// Stub the row count reported for a target table
    pub async fn stub_row_count(&self, table: &str, count: i64) {
        self.state
            .write()
            .await
            .stubbed_row_counts
            .insert(table.to_string(), count);
    }

    /// Whether a table has been created on the profile-store side
    pub async fn has_table(&self, table: &str) -> bool {
        self.state.read().await.tables.contains_key(table)
    }

    /// Declared column names of a created table, in order
    pub async fn table_columns(&self, table: &str) -> Vec<String> {
        self.state
            .read()
            .await
            .tables
            .get(table)
            .map(|t| t.columns.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    /// All rows of a created table
    pub async fn table_rows(&self, table: &str) -> Vec<HashMap<String, SqlValue>> {
        self.state
            .read()
            .await
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// How many times `create_table` was invoked for this name
    pub async fn create_calls_for(&self, table: &str) -> usize {
        self.state
            .read()
            .await
            .create_table_calls
            .iter()
            .filter(|name| name.as_str() == table)
            .count()
    }

    /// Column names passed to `add_column` for this table, in call order
    pub async fn add_column_calls_for(&self, table: &str) -> Vec<String> {
        self.state
            .read()
            .await
            .add_column_calls
            .iter()
            .filter(|(name, _)| name == table)
            .map(|(_, column)| column.clone())
            .collect()
    }

    async fn pause(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
    }

    async fn stubbed(&self, table: &str, selects: &[String]) -> ProfileResult<QueryOutput> {
        let refs: Vec<&str> = selects.iter().map(String::as_str).collect();
        let key = Self::query_key(table, &refs);
        self.state
            .read()
            .await
            .stubbed_queries
            .get(&key)
            .cloned()
            .ok_or_else(|| relation_missing(table))
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockStore {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            fail_connection: self.fail_connection,
            latency_ms: self.latency_ms,
        }
    }
}

fn relation_missing(table: &str) -> ProfileError {
    ProfileError::Query(format!("relation \"{table}\" does not exist"))
}

#[async_trait::async_trait]
impl RelationalStore for MockStore {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn test_connection(&self) -> ProfileResult<()> {
        self.pause().await;
        if self.fail_connection {
            Err(ProfileError::Connection(
                "simulated connection failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    async fn select_single(&self, table: &str, selects: &[String]) -> ProfileResult<QueryOutput> {
        self.pause().await;
        let mut output = self.stubbed(table, selects).await?;
        output.rows.truncate(1);
        Ok(output)
    }

    async fn select_all_single(&self, table: &str) -> ProfileResult<QueryOutput> {
        self.pause().await;
        let mut output = self.stubbed(table, &["*".to_string()]).await?;
        output.rows.truncate(1);
        Ok(output)
    }

    async fn select_rows(&self, table: &str, selects: &[String]) -> ProfileResult<QueryOutput> {
        self.pause().await;
        self.stubbed(table, selects).await
    }

    async fn select_ids_where(
        &self,
        table: &str,
        wheres: &[(String, SqlValue)],
    ) -> ProfileResult<Vec<i64>> {
        self.pause().await;
        let state = self.state.read().await;
        let mock_table = state.tables.get(table).ok_or_else(|| relation_missing(table))?;

        let ids = mock_table
            .rows
            .iter()
            .filter(|row| {
                wheres.iter().all(|(column, value)| {
                    row.get(column).cloned().unwrap_or(SqlValue::Null) == *value
                })
            })
            .filter_map(|row| match row.get("id") {
                Some(SqlValue::Int(id)) => Some(*id),
                _ => None,
            })
            .collect();

        Ok(ids)
    }

    async fn insert_returning_id(
        &self,
        table: &str,
        values: &[(String, SqlValue)],
    ) -> ProfileResult<i64> {
        self.pause().await;
        let mut state = self.state.write().await;
        let mock_table = state
            .tables
            .get_mut(table)
            .ok_or_else(|| relation_missing(table))?;

        for (column, _) in values {
            if !mock_table.columns.iter().any(|c| &c.name == column) {
                return Err(ProfileError::Query(format!(
                    "column \"{column}\" of relation \"{table}\" does not exist"
                )));
            }
        }

        mock_table.next_id += 1;
        let id = mock_table.next_id;

        let mut row = HashMap::new();
        row.insert("id".to_string(), SqlValue::Int(id));
        for (column, value) in values {
            row.insert(column.clone(), value.clone());
        }
        mock_table.rows.push(row);

        Ok(id)
    }

    async fn table_exists(&self, table: &str) -> ProfileResult<bool> {
        self.pause().await;
        Ok(self.state.read().await.tables.contains_key(table))
    }

    async fn column_exists(&self, table: &str, column: &str) -> ProfileResult<bool> {
        self.pause().await;
        Ok(self
            .state
            .read()
            .await
            .tables
            .get(table)
            .is_some_and(|t| t.columns.iter().any(|c| c.name == column)))
    }

    async fn create_table(&self, table: &str, columns: &[ColumnSpec]) -> ProfileResult<()> {
        self.pause().await;
        let mut state = self.state.write().await;
        state.create_table_calls.push(table.to_string());

        if state.tables.contains_key(table) {
            return Err(ProfileError::Schema(format!(
                "relation \"{table}\" already exists"
            )));
        }

        state.tables.insert(
            table.to_string(),
            MockTable {
                columns: columns.to_vec(),
                rows: Vec::new(),
                next_id: 0,
            },
        );
        Ok(())
    }

    async fn add_column(&self, table: &str, column: &ColumnSpec) -> ProfileResult<()> {
        self.pause().await;
        let mut state = self.state.write().await;
        state
            .add_column_calls
            .push((table.to_string(), column.name.clone()));

        let mock_table = state
            .tables
            .get_mut(table)
            .ok_or_else(|| ProfileError::Schema(format!("relation \"{table}\" does not exist")))?;

        if mock_table.columns.iter().any(|c| c.name == column.name) {
            return Err(ProfileError::Schema(format!(
                "column \"{}\" of relation \"{table}\" already exists",
                column.name
            )));
        }

        mock_table.columns.push(column.clone());
        Ok(())
    }

    async fn table_row_count(&self, table: &str) -> ProfileResult<i64> {
        self.pause().await;
        self.state
            .read()
            .await
            .stubbed_row_counts
            .get(table)
            .copied()
            .ok_or_else(|| relation_missing(table))
    }
}
