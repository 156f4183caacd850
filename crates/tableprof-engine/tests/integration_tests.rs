//! End-to-end profiling runs against in-memory stores
//!
//! Each test wires a stubbed target store and an empty profile store into
//! the profiler and asserts on the dimension and fact rows that land on the
//! profile side. No database credentials required.

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tableprof_core::{
    ColumnMeta, CustomColumnDefinition, IdentifierCasing, ProfileDefinition, ProfileError,
    ScanKind, SqlValue, TableDefinition,
};
use tableprof_engine::{Profiler, ProfilerOptions};
use tableprof_store::{MockStore, QueryOutput};

fn meta(name: &str, type_name: &str, kind: ScanKind) -> ColumnMeta {
    ColumnMeta::new(name, type_name, Some(kind))
}

fn ts(secs: i64) -> SqlValue {
    SqlValue::Timestamp(Utc.timestamp_opt(secs, 0).unwrap())
}

async fn profiler_over(target: &MockStore, profile: &MockStore) -> Profiler {
    Profiler::new(
        Arc::new(target.clone()),
        Arc::new(profile.clone()),
        ProfilerOptions::default(),
    )
    .await
    .unwrap()
}

/// Stub `orders(id int4, total numeric, created_at timestamptz)` with ten
/// rows' worth of aggregate answers
async fn stub_orders(target: &MockStore) {
    target
        .stub_query(
            "orders",
            &["*"],
            QueryOutput::single_row(
                vec![
                    meta("id", "INT4", ScanKind::Int),
                    meta("total", "NUMERIC", ScanKind::Bytes),
                    meta("created_at", "TIMESTAMPTZ", ScanKind::Timestamp),
                ],
                vec![SqlValue::Int(1), SqlValue::Bytes(vec![0x10]), ts(1_700_000_000)],
            ),
        )
        .await;
    target.stub_row_count("orders", 10).await;

    target
        .stub_query(
            "orders",
            &[
                "max(\"id\") as \"maximum\"",
                "min(\"id\") as \"minimum\"",
                "avg(\"id\") as \"average\"",
            ],
            QueryOutput::single_row(
                vec![
                    meta("maximum", "INT4", ScanKind::Int),
                    meta("minimum", "INT4", ScanKind::Int),
                    meta("average", "NUMERIC", ScanKind::Bytes),
                ],
                vec![
                    SqlValue::Int(10),
                    SqlValue::Int(1),
                    SqlValue::Bytes(vec![0x05]),
                ],
            ),
        )
        .await;

    target
        .stub_query(
            "orders",
            &[
                "max(\"total\") as \"maximum\"",
                "min(\"total\") as \"minimum\"",
                "avg(\"total\") as \"average\"",
            ],
            QueryOutput::single_row(
                vec![
                    meta("maximum", "NUMERIC", ScanKind::Bytes),
                    meta("minimum", "NUMERIC", ScanKind::Bytes),
                    meta("average", "NUMERIC", ScanKind::Bytes),
                ],
                vec![
                    SqlValue::Bytes(vec![0x99]),
                    SqlValue::Bytes(vec![0x01]),
                    SqlValue::Bytes(vec![0x42]),
                ],
            ),
        )
        .await;

    target
        .stub_query(
            "orders",
            &[
                "max(\"created_at\") as \"maximum\"",
                "min(\"created_at\") as \"minimum\"",
            ],
            QueryOutput::single_row(
                vec![
                    meta("maximum", "TIMESTAMPTZ", ScanKind::Timestamp),
                    meta("minimum", "TIMESTAMPTZ", ScanKind::Timestamp),
                ],
                vec![ts(1_700_000_009), ts(1_700_000_000)],
            ),
        )
        .await;
}

#[tokio::test]
async fn test_full_profile_of_orders() {
    let target = MockStore::new();
    let profile = MockStore::new();
    stub_orders(&target).await;

    let profiler = profiler_over(&target, &profile).await;
    let definition = ProfileDefinition {
        full_profile_tables: vec!["orders".to_string()],
        custom_profile_tables: vec![],
    };
    profiler.run_profile(&definition).await.unwrap();

    // one row-count fact for the run
    let table_profiles = profile.table_rows("table_profiles").await;
    assert_eq!(table_profiles.len(), 1);
    assert_eq!(table_profiles[0]["table_row_count"], SqlValue::Int(10));
    assert_eq!(table_profiles[0]["profile_record_id"], SqlValue::Int(1));

    // three column dimensions, three type dimensions
    assert_eq!(profile.table_rows("table_column_names").await.len(), 3);
    let types = profile.table_rows("table_column_types").await;
    assert_eq!(types.len(), 3);

    // numeric facts carry maximum/minimum/average
    let numeric_columns = profile.table_columns("table_column_profiles_numeric").await;
    for column in ["maximum", "minimum", "average"] {
        assert!(numeric_columns.contains(&column.to_string()), "{column}");
    }
    let numeric_rows = profile.table_rows("table_column_profiles_numeric").await;
    assert_eq!(numeric_rows.len(), 1);
    assert_eq!(numeric_rows[0]["maximum"], SqlValue::Bytes(vec![0x99]));

    // timestamptz facts carry maximum/minimum only
    let time_columns = profile
        .table_columns("table_column_profiles_timestamptz")
        .await;
    assert!(time_columns.contains(&"maximum".to_string()));
    assert!(time_columns.contains(&"minimum".to_string()));
    assert!(!time_columns.contains(&"average".to_string()));
    assert_eq!(
        profile
            .table_rows("table_column_profiles_timestamptz")
            .await
            .len(),
        1
    );

    // the int4 column gets its own fact table
    assert_eq!(
        profile.table_rows("table_column_profiles_int4").await.len(),
        1
    );
}

#[tokio::test]
async fn test_custom_column_profile() {
    let target = MockStore::new();
    let profile = MockStore::new();

    target
        .stub_query(
            "orders",
            &["tax/total as \"tax_ratio\""],
            QueryOutput::single_row(
                vec![meta("tax_ratio", "NUMERIC", ScanKind::Bytes)],
                vec![SqlValue::Bytes(vec![0x07, 0x2c])],
            ),
        )
        .await;

    let profiler = profiler_over(&target, &profile).await;
    let definition = ProfileDefinition {
        full_profile_tables: vec![],
        custom_profile_tables: vec![TableDefinition {
            table_name: "orders".to_string(),
            columns: vec![],
            custom_columns: vec![CustomColumnDefinition {
                column_name: "tax_ratio".to_string(),
                column_definition: "tax/total".to_string(),
            }],
        }],
    };
    profiler.run_profile(&definition).await.unwrap();

    let dimensions = profile.table_rows("table_custom_column_names").await;
    assert_eq!(dimensions.len(), 1);
    assert_eq!(
        dimensions[0]["table_column_name"],
        SqlValue::from("tax_ratio")
    );
    assert_eq!(
        dimensions[0]["table_custom_column_definition"],
        SqlValue::from("tax/total")
    );

    let facts = profile
        .table_rows("table_custom_column_profiles_numeric")
        .await;
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0]["value"], SqlValue::Bytes(vec![0x07, 0x2c]));
    assert_eq!(facts[0]["table_custom_column_name_id"], SqlValue::Int(1));
}

#[tokio::test]
async fn test_custom_definition_with_plain_columns_runs_the_aggregate_flow() {
    let target = MockStore::new();
    let profile = MockStore::new();
    stub_orders(&target).await;

    target
        .stub_query(
            "orders",
            &["tax/total as \"tax_ratio\""],
            QueryOutput::single_row(
                vec![meta("tax_ratio", "NUMERIC", ScanKind::Bytes)],
                vec![SqlValue::Bytes(vec![0x01])],
            ),
        )
        .await;
    target
        .stub_query(
            "orders",
            &["\"total\""],
            QueryOutput::single_row(
                vec![meta("total", "NUMERIC", ScanKind::Bytes)],
                vec![SqlValue::Bytes(vec![0x10])],
            ),
        )
        .await;

    let profiler = profiler_over(&target, &profile).await;
    let definition = ProfileDefinition {
        full_profile_tables: vec![],
        custom_profile_tables: vec![TableDefinition {
            table_name: "orders".to_string(),
            columns: vec!["total".to_string()],
            custom_columns: vec![CustomColumnDefinition {
                column_name: "tax_ratio".to_string(),
                column_definition: "tax/total".to_string(),
            }],
        }],
    };
    profiler.run_profile(&definition).await.unwrap();

    // custom fact plus the plain column's aggregate fact and row count
    assert_eq!(
        profile
            .table_rows("table_custom_column_profiles_numeric")
            .await
            .len(),
        1
    );
    assert_eq!(
        profile
            .table_rows("table_column_profiles_numeric")
            .await
            .len(),
        1
    );
    let table_profiles = profile.table_rows("table_profiles").await;
    assert_eq!(table_profiles.len(), 1);
    assert_eq!(table_profiles[0]["table_row_count"], SqlValue::Int(10));
}

#[tokio::test]
async fn test_shared_new_type_registers_once_across_tables() {
    let target = MockStore::new();
    let profile = MockStore::new();

    for (table, column) in [("t1", "a"), ("t2", "b")] {
        target
            .stub_query(
                table,
                &["*"],
                QueryOutput::single_row(
                    vec![meta(column, "NUMERIC", ScanKind::Bytes)],
                    vec![SqlValue::Bytes(vec![0x01])],
                ),
            )
            .await;
        target.stub_row_count(table, 1).await;
        let maximum = format!("max(\"{column}\") as \"maximum\"");
        let minimum = format!("min(\"{column}\") as \"minimum\"");
        let average = format!("avg(\"{column}\") as \"average\"");
        target
            .stub_query(
                table,
                &[maximum.as_str(), minimum.as_str(), average.as_str()],
                QueryOutput::single_row(
                    vec![
                        meta("maximum", "NUMERIC", ScanKind::Bytes),
                        meta("minimum", "NUMERIC", ScanKind::Bytes),
                        meta("average", "NUMERIC", ScanKind::Bytes),
                    ],
                    vec![
                        SqlValue::Bytes(vec![0x09]),
                        SqlValue::Bytes(vec![0x01]),
                        SqlValue::Bytes(vec![0x05]),
                    ],
                ),
            )
            .await;
    }

    let profiler = profiler_over(&target, &profile).await;
    let definition = ProfileDefinition {
        full_profile_tables: vec!["t1".to_string(), "t2".to_string()],
        custom_profile_tables: vec![],
    };
    profiler.run_profile(&definition).await.unwrap();

    // exactly one type dimension row, regardless of interleaving
    let types = profile.table_rows("table_column_types").await;
    let numeric_rows = types
        .iter()
        .filter(|row| row["table_column_type"] == SqlValue::from("NUMERIC"))
        .count();
    assert_eq!(numeric_rows, 1);
    assert_eq!(types.len(), 1);

    // and exactly one creation of the shared fact table
    assert_eq!(
        profile
            .create_calls_for("table_column_profiles_numeric")
            .await,
        1
    );
    assert_eq!(
        profile
            .table_rows("table_column_profiles_numeric")
            .await
            .len(),
        2
    );
}

#[tokio::test]
async fn test_missing_table_fails_its_task_while_siblings_commit() {
    let target = MockStore::new();
    let profile = MockStore::new();
    stub_orders(&target).await;

    let profiler = profiler_over(&target, &profile).await;
    let definition = ProfileDefinition {
        full_profile_tables: vec!["orders".to_string(), "missing_table".to_string()],
        custom_profile_tables: vec![],
    };

    let err = profiler.run_profile(&definition).await.unwrap_err();
    match err {
        ProfileError::Query(message) => assert!(message.contains("missing_table")),
        other => panic!("expected a query error, got {other:?}"),
    }

    // the healthy sibling's data is committed
    let table_profiles = profile.table_rows("table_profiles").await;
    assert_eq!(table_profiles.len(), 1);
    assert_eq!(table_profiles[0]["table_row_count"], SqlValue::Int(10));
    assert_eq!(
        profile
            .table_rows("table_column_profiles_numeric")
            .await
            .len(),
        1
    );
}

#[tokio::test]
async fn test_unprofiled_type_registers_dimension_without_facts() {
    let target = MockStore::new();
    let profile = MockStore::new();

    target
        .stub_query(
            "flags",
            &["*"],
            QueryOutput::single_row(
                vec![meta("active", "BOOL", ScanKind::Bool)],
                vec![SqlValue::Bool(true)],
            ),
        )
        .await;
    target.stub_row_count("flags", 5).await;

    let profiler = profiler_over(&target, &profile).await;
    let definition = ProfileDefinition {
        full_profile_tables: vec!["flags".to_string()],
        custom_profile_tables: vec![],
    };
    profiler.run_profile(&definition).await.unwrap();

    assert_eq!(profile.table_rows("table_column_names").await.len(), 1);
    assert_eq!(profile.table_rows("table_column_types").await.len(), 1);
    assert!(!profile.has_table("table_column_profiles_bool").await);
}

#[tokio::test]
async fn test_cancelled_run_stops_before_store_calls() {
    let target = MockStore::new();
    let profile = MockStore::new();
    stub_orders(&target).await;

    let profiler = profiler_over(&target, &profile).await;
    profiler.cancel();

    let definition = ProfileDefinition {
        full_profile_tables: vec!["orders".to_string()],
        custom_profile_tables: vec![],
    };
    let err = profiler.run_profile(&definition).await.unwrap_err();
    assert_eq!(err, ProfileError::Cancelled);

    // the run record exists, but no table was registered
    assert_eq!(profile.table_rows("profile_records").await.len(), 1);
    assert!(profile.table_rows("table_names").await.is_empty());
}

#[tokio::test]
async fn test_pascal_casing_applies_to_every_synthesized_identifier() {
    let target = MockStore::new();
    let profile = MockStore::new();

    target
        .stub_query(
            "events",
            &["*"],
            QueryOutput::single_row(
                vec![meta("seen_at", "TIMESTAMPTZ", ScanKind::Timestamp)],
                vec![ts(1_700_000_000)],
            ),
        )
        .await;
    target.stub_row_count("events", 3).await;
    target
        .stub_query(
            "events",
            &[
                "max(\"seen_at\") as \"maximum\"",
                "min(\"seen_at\") as \"minimum\"",
            ],
            QueryOutput::single_row(
                vec![
                    meta("maximum", "TIMESTAMPTZ", ScanKind::Timestamp),
                    meta("minimum", "TIMESTAMPTZ", ScanKind::Timestamp),
                ],
                vec![ts(1_700_000_002), ts(1_700_000_000)],
            ),
        )
        .await;

    let profiler = Profiler::new(
        Arc::new(target.clone()),
        Arc::new(profile.clone()),
        ProfilerOptions {
            casing: IdentifierCasing::Pascal,
            ..ProfilerOptions::default()
        },
    )
    .await
    .unwrap();

    let definition = ProfileDefinition {
        full_profile_tables: vec!["events".to_string()],
        custom_profile_tables: vec![],
    };
    profiler.run_profile(&definition).await.unwrap();

    assert!(profile.has_table("ProfileRecords").await);
    assert!(profile.has_table("TableNames").await);
    assert!(profile.has_table("TableColumnProfilesTimestamptz").await);

    let fact_columns = profile
        .table_columns("TableColumnProfilesTimestamptz")
        .await;
    assert!(fact_columns.contains(&"TableColumnNameId".to_string()));
    assert!(fact_columns.contains(&"ProfileRecordId".to_string()));
    // single-word aliases have no separator to convert
    assert!(fact_columns.contains(&"maximum".to_string()));
}
