//! Concurrent profiling orchestrator
//!
//! One task per table (and per custom table definition), fanned out on the
//! runtime and gated by a semaphore, then joined by draining every outcome.
//! The first error becomes the run result; sibling tasks still run to
//! completion, so whatever they committed stays committed.

use crate::aggregates;
use crate::store::{ColumnProfileValue, ProfileStore};
use std::sync::Arc;
use tableprof_core::{
    validate_identifier, ColumnMeta, CustomColumnDefinition, IdentifierCasing, ProfileDefinition,
    ProfileError, ProfileResult, TableDefinition,
};
use tableprof_store::RelationalStore;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

/// Construction-time options, immutable afterwards
#[derive(Debug, Clone)]
pub struct ProfilerOptions {
    /// Casing applied to every identifier the profile store emits
    pub casing: IdentifierCasing,

    /// Upper bound on concurrently running table tasks
    pub max_concurrency: usize,
}

impl Default for ProfilerOptions {
    fn default() -> Self {
        Self {
            casing: IdentifierCasing::default(),
            max_concurrency: 8,
        }
    }
}

/// Profiles target tables and persists the results into the profile store
pub struct Profiler {
    target: Arc<dyn RelationalStore>,
    store: ProfileStore,
    semaphore: Arc<Semaphore>,
    cancel_tx: watch::Sender<bool>,
}

impl Profiler {
    /// Wrap the two store handles and scaffold the fixed profile tables
    pub async fn new(
        target: Arc<dyn RelationalStore>,
        profile_store: Arc<dyn RelationalStore>,
        options: ProfilerOptions,
    ) -> ProfileResult<Self> {
        let store = ProfileStore::new(profile_store, options.casing);
        store.scaffold().await?;

        let (cancel_tx, _) = watch::channel(false);

        Ok(Self {
            target,
            store,
            semaphore: Arc::new(Semaphore::new(options.max_concurrency.max(1))),
            cancel_tx,
        })
    }

    /// Abort the in-flight run
    ///
    /// Every task observes the flag before its next store round-trip and
    /// bails out with [`ProfileError::Cancelled`].
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Profile every table named in the definition concurrently
    pub async fn run_profile(&self, definition: &ProfileDefinition) -> ProfileResult<()> {
        let run_id = self.store.open_run().await?;
        tracing::info!(run_id, tasks = definition.task_count(), "starting profile run");

        let mut tasks: JoinSet<ProfileResult<()>> = JoinSet::new();

        for table in definition.full_profile_tables.clone() {
            let task = self.table_task(run_id);
            tasks.spawn(async move {
                let _permit = task.acquire_slot().await?;
                task.profile_table(&table).await
            });
        }

        for table_def in definition.custom_profile_tables.clone() {
            let task = self.table_task(run_id);
            tasks.spawn(async move {
                let _permit = task.acquire_slot().await?;
                task.profile_custom_table(&table_def).await
            });
        }

        // Drain every outcome so no task is abandoned mid-flight; the first
        // error wins, later ones are logged and dropped.
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.unwrap_or_else(|e| {
                Err(ProfileError::Query(format!(
                    "profiling task aborted: {e}"
                )))
            });

            if let Err(error) = outcome {
                tracing::warn!(%error, "table task failed");
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => {
                tracing::info!(run_id, "profile run complete");
                Ok(())
            }
        }
    }

    fn table_task(&self, run_id: i64) -> TableTask {
        TableTask {
            target: Arc::clone(&self.target),
            store: self.store.clone(),
            semaphore: Arc::clone(&self.semaphore),
            cancel: self.cancel_tx.subscribe(),
            run_id,
        }
    }
}

/// Per-table profiling worker, cheap to clone into a spawned task
struct TableTask {
    target: Arc<dyn RelationalStore>,
    store: ProfileStore,
    semaphore: Arc<Semaphore>,
    cancel: watch::Receiver<bool>,
    run_id: i64,
}

impl TableTask {
    async fn acquire_slot(&self) -> ProfileResult<OwnedSemaphorePermit> {
        self.ensure_active()?;
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ProfileError::Cancelled)
    }

    fn ensure_active(&self) -> ProfileResult<()> {
        if *self.cancel.borrow() {
            Err(ProfileError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Full profile: sample the declared columns, record the row count,
    /// then profile each column
    async fn profile_table(&self, table: &str) -> ProfileResult<()> {
        validate_identifier(table)?;

        self.ensure_active()?;
        let sample = self.target.select_all_single(table).await?;

        self.profile_table_with_columns(table, &sample.columns).await
    }

    async fn profile_table_with_columns(
        &self,
        table: &str,
        columns: &[ColumnMeta],
    ) -> ProfileResult<()> {
        self.ensure_active()?;
        let table_id = self.store.register_table(table).await?;
        self.record_row_count(table, table_id).await?;

        for meta in columns {
            self.profile_column(table, table_id, meta).await?;
        }
        Ok(())
    }

    async fn record_row_count(&self, table: &str, table_id: i64) -> ProfileResult<()> {
        self.ensure_active()?;
        let row_count = self.target.table_row_count(table).await?;

        self.ensure_active()?;
        self.store
            .record_table_profile(table_id, row_count, self.run_id)
            .await?;
        Ok(())
    }

    /// Register the column's dimensions and write its aggregate fact row
    ///
    /// All aggregates for one column go out in a single query, so the fact
    /// row is one consistent snapshot of that computation.
    async fn profile_column(
        &self,
        table: &str,
        table_id: i64,
        meta: &ColumnMeta,
    ) -> ProfileResult<()> {
        validate_identifier(&meta.name)?;

        self.ensure_active()?;
        let type_id = self.store.register_column_type(&meta.type_name).await?;
        let column_id = self
            .store
            .register_table_column(table_id, type_id, &meta.name)
            .await?;

        let set = aggregates::aggregate_set(&meta.type_name);
        if set.is_empty() {
            // dimension registered; no profile defined for this type
            return Ok(());
        }

        let quoted = format!("\"{}\"", meta.name);
        let selects: Vec<String> = set.iter().map(|a| a.render(&quoted)).collect();

        self.ensure_active()?;
        let output = self.target.select_rows(table, &selects).await?;
        let row = output.first_row().ok_or_else(|| {
            ProfileError::Query(format!("aggregate query over {table} returned no rows"))
        })?;

        let results: Vec<ColumnProfileValue> = output
            .columns
            .iter()
            .zip(row.iter())
            .map(|(column, value)| ColumnProfileValue {
                name: column.name.clone(),
                value: value.clone(),
                scan_kind: column.scan_kind,
            })
            .collect();

        self.ensure_active()?;
        self.store
            .store_column_profile(column_id, &meta.type_name, self.run_id, &results)
            .await
    }

    /// Custom profile: sample each raw expression once, store the raw
    /// values, then run the aggregate flow over any plain columns listed
    async fn profile_custom_table(&self, table_def: &TableDefinition) -> ProfileResult<()> {
        validate_identifier(&table_def.table_name)?;

        self.ensure_active()?;
        let table_id = self.store.register_table(&table_def.table_name).await?;

        if !table_def.custom_columns.is_empty() {
            self.profile_custom_columns(table_def, table_id).await?;
        }

        if !table_def.columns.is_empty() {
            self.profile_defined_columns(&table_def.table_name, &table_def.columns)
                .await?;
        }
        Ok(())
    }

    async fn profile_custom_columns(
        &self,
        table_def: &TableDefinition,
        table_id: i64,
    ) -> ProfileResult<()> {
        // aliases are identifiers; the definitions themselves are trusted
        // raw SQL from the profile definition
        for custom in &table_def.custom_columns {
            validate_identifier(&custom.column_name)?;
        }

        let selects: Vec<String> = table_def
            .custom_columns
            .iter()
            .map(|c| format!("{} as \"{}\"", c.column_definition, c.column_name))
            .collect();

        self.ensure_active()?;
        let output = self
            .target
            .select_single(&table_def.table_name, &selects)
            .await?;
        let row = output.first_row().ok_or_else(|| {
            ProfileError::Query(format!(
                "sample query over {} returned no rows",
                table_def.table_name
            ))
        })?;

        for (idx, meta) in output.columns.iter().enumerate() {
            self.ensure_active()?;
            let type_id = self.store.register_column_type(&meta.type_name).await?;

            let definition = find_definition(&table_def.custom_columns, &meta.name);
            let custom_id = self
                .store
                .register_custom_column(table_id, type_id, &meta.name, definition)
                .await?;

            let value = row.get(idx).cloned().unwrap_or(tableprof_core::SqlValue::Null);
            self.store
                .store_custom_column_profile(custom_id, meta, self.run_id, value)
                .await?;
        }
        Ok(())
    }

    /// Aggregate flow restricted to the listed columns
    async fn profile_defined_columns(&self, table: &str, columns: &[String]) -> ProfileResult<()> {
        for column in columns {
            validate_identifier(column)?;
        }
        let selects: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();

        self.ensure_active()?;
        let sample = self.target.select_single(table, &selects).await?;

        self.profile_table_with_columns(table, &sample.columns).await
    }
}

/// The raw expression that produced a result column, matched by alias
fn find_definition<'a>(custom_columns: &'a [CustomColumnDefinition], name: &str) -> &'a str {
    custom_columns
        .iter()
        .find(|c| c.column_name.eq_ignore_ascii_case(name))
        .map(|c| c.column_definition.as_str())
        .unwrap_or_default()
}
