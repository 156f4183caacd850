//! Lookup-or-insert dimension registration

use crate::locks::KeyedLocks;
use std::sync::Arc;
use tableprof_core::{ProfileError, ProfileResult, SqlValue};
use tableprof_store::RelationalStore;

/// Registers dimension rows by natural key, returning surrogate ids
///
/// The select-then-insert window is closed by a keyed mutex per
/// (table, natural-key values), applied uniformly to every dimension -
/// two tasks registering the same new key agree on one row, while
/// unrelated keys proceed in parallel.
#[derive(Clone)]
pub struct DimensionRegistry {
    store: Arc<dyn RelationalStore>,
    locks: KeyedLocks,
}

impl DimensionRegistry {
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Return the id of the row matching `natural_key`, inserting it first
    /// if no match exists
    ///
    /// Observing more than one matching row means an earlier writer raced
    /// the registration outside this registry; that surfaces as the
    /// retryable [`ProfileError::DuplicateDimensionRace`] rather than an
    /// arbitrary pick.
    pub async fn get_or_create(
        &self,
        table: &str,
        natural_key: &[(String, SqlValue)],
    ) -> ProfileResult<i64> {
        let key = lock_key(table, natural_key);
        let _guard = self.locks.acquire(&key).await;

        let ids = self.store.select_ids_where(table, natural_key).await?;
        match ids.as_slice() {
            [] => self.store.insert_returning_id(table, natural_key).await,
            [id] => Ok(*id),
            _ => Err(ProfileError::DuplicateDimensionRace(describe(
                table,
                natural_key,
            ))),
        }
    }
}

fn lock_key(table: &str, natural_key: &[(String, SqlValue)]) -> String {
    let mut key = table.to_string();
    for (column, value) in natural_key {
        key.push('|');
        key.push_str(column);
        key.push('=');
        key.push_str(&value.key_repr());
    }
    key
}

fn describe(table: &str, natural_key: &[(String, SqlValue)]) -> String {
    let pairs: Vec<String> = natural_key
        .iter()
        .map(|(column, value)| format!("{column}={}", value.key_repr()))
        .collect();
    format!("{table}({})", pairs.join(", "))
}
