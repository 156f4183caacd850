//! Integration tests for store adapters
//!
//! The mock tests run without credentials. Live PostgreSQL tests are marked
//! `#[ignore]` and expect a scratch database:
//!
//! ```bash
//! # Mock only
//! cargo test -p tableprof-store --test integration_tests
//!
//! # Against a real server
//! TABLEPROF_TEST_DB="host=localhost port=5432 dbname=scratch user=postgres password=pass" \
//! cargo test -p tableprof-store --features postgres --test integration_tests -- --ignored
//! ```

use tableprof_core::{ColumnMeta, ColumnSpec, ProfileError, ScanKind, SqlType, SqlValue};
use tableprof_store::{MockStore, QueryOutput, RelationalStore};

#[tokio::test]
async fn test_mock_profile_store_workflow() {
    let store = MockStore::new();

    // scaffold one dimension table and register a couple of rows
    store
        .create_table(
            "table_column_types",
            &[
                ColumnSpec::identity("id"),
                ColumnSpec::new("table_column_type", SqlType::Text),
            ],
        )
        .await
        .unwrap();

    let first = store
        .insert_returning_id(
            "table_column_types",
            &[("table_column_type".to_string(), SqlValue::from("INT4"))],
        )
        .await
        .unwrap();
    let second = store
        .insert_returning_id(
            "table_column_types",
            &[("table_column_type".to_string(), SqlValue::from("NUMERIC"))],
        )
        .await
        .unwrap();
    assert_ne!(first, second);

    let found = store
        .select_ids_where(
            "table_column_types",
            &[("table_column_type".to_string(), SqlValue::from("NUMERIC"))],
        )
        .await
        .unwrap();
    assert_eq!(found, vec![second]);
}

#[tokio::test]
async fn test_mock_target_side_stubs() {
    let store = MockStore::new();
    store
        .stub_query(
            "orders",
            &["max(\"total\") as \"maximum\""],
            QueryOutput::single_row(
                vec![ColumnMeta::new("maximum", "NUMERIC", Some(ScanKind::Bytes))],
                vec![SqlValue::Bytes(vec![0x2a])],
            ),
        )
        .await;

    let output = store
        .select_rows("orders", &["max(\"total\") as \"maximum\"".to_string()])
        .await
        .unwrap();
    assert_eq!(output.columns[0].name, "maximum");
    assert_eq!(output.first_row(), Some(&[SqlValue::Bytes(vec![0x2a])][..]));

    let err = store
        .select_rows("orders", &["min(\"total\") as \"minimum\"".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, ProfileError::Query(_)));
}

#[tokio::test]
async fn test_mock_schema_evolution_is_observable() {
    let store = MockStore::new();
    store
        .create_table(
            "table_column_profiles_numeric",
            &[
                ColumnSpec::identity("id"),
                ColumnSpec::new("table_column_name_id", SqlType::Int),
                ColumnSpec::new("profile_record_id", SqlType::Int),
            ],
        )
        .await
        .unwrap();

    store
        .add_column(
            "table_column_profiles_numeric",
            &ColumnSpec::new("maximum", SqlType::Numeric),
        )
        .await
        .unwrap();

    assert_eq!(store.create_calls_for("table_column_profiles_numeric").await, 1);
    assert_eq!(
        store
            .add_column_calls_for("table_column_profiles_numeric")
            .await,
        vec!["maximum"]
    );
}

#[cfg(feature = "postgres")]
mod live_postgres {
    use super::*;
    use tableprof_store::PostgresStore;

    fn test_conn_string() -> Option<String> {
        std::env::var("TABLEPROF_TEST_DB").ok()
    }

    #[tokio::test]
    #[ignore = "requires TABLEPROF_TEST_DB pointing at a scratch database"]
    async fn test_connect_and_probe() {
        let Some(conn) = test_conn_string() else {
            eprintln!("TABLEPROF_TEST_DB not set, skipping");
            return;
        };

        let store = PostgresStore::connect(&conn).await.unwrap();
        store.test_connection().await.unwrap();
        assert_eq!(store.name(), "PostgreSQL");
    }

    #[tokio::test]
    #[ignore = "requires TABLEPROF_TEST_DB pointing at a scratch database"]
    async fn test_create_insert_and_count_round_trip() {
        let Some(conn) = test_conn_string() else {
            eprintln!("TABLEPROF_TEST_DB not set, skipping");
            return;
        };

        let store = PostgresStore::connect(&conn).await.unwrap();
        let table = "tableprof_it_scratch";

        if !store.table_exists(table).await.unwrap() {
            store
                .create_table(
                    table,
                    &[
                        ColumnSpec::identity("id"),
                        ColumnSpec::new("table_name", SqlType::Text),
                    ],
                )
                .await
                .unwrap();
        }

        let id = store
            .insert_returning_id(
                table,
                &[("table_name".to_string(), SqlValue::from("orders"))],
            )
            .await
            .unwrap();
        let ids = store
            .select_ids_where(
                table,
                &[("table_name".to_string(), SqlValue::from("orders"))],
            )
            .await
            .unwrap();
        assert!(ids.contains(&id));

        let count = store.table_row_count(table).await.unwrap();
        assert!(count >= 1);
    }
}
