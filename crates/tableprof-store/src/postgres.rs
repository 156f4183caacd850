//! PostgreSQL store adapter
//!
//! Talks to PostgreSQL over tokio-postgres. Queries are prepared before
//! execution so column metadata is available even for zero-row results,
//! matching what the profiler needs from a one-row sample of an empty table.
//!
//! Arbitrary-precision `numeric` values are scanned (and written back) as
//! their raw wire bytes rather than converted through a lossy float - the
//! type mapper relies on this to classify them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! // Plain connection
//! let store = PostgresStore::connect(
//!     "host=localhost port=5432 dbname=mydb user=postgres password=secret"
//! ).await?;
//!
//! // TLS connection
//! let store = PostgresStore::connect_with_tls(
//!     "host=db.example.com port=5432 dbname=mydb user=postgres password=secret"
//! ).await?;
//! ```

use crate::adapter::{QueryOutput, RelationalStore};
use bytes::BytesMut;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tableprof_core::{ColumnMeta, ColumnSpec, ProfileError, ProfileResult, ScanKind, SqlValue};
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use tokio_postgres::{Client, Config as PgConfig, NoTls, Row};

/// PostgreSQL implementation of [`RelationalStore`]
pub struct PostgresStore {
    client: Client,
    database: String,
}

impl PostgresStore {
    /// Connect using a PostgreSQL connection string
    ///
    /// Standard key/value format:
    /// `host=localhost port=5432 dbname=mydb user=postgres password=secret`
    pub async fn connect(conn_str: &str) -> ProfileResult<Self> {
        let database = database_name(conn_str)?;

        let (client, connection) = tokio_postgres::connect(conn_str, NoTls)
            .await
            .map_err(connect_err)?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "postgres connection error");
            }
        });

        Ok(Self { client, database })
    }

    /// Connect using a PostgreSQL connection string over TLS
    pub async fn connect_with_tls(conn_str: &str) -> ProfileResult<Self> {
        let database = database_name(conn_str)?;

        let connector = TlsConnector::builder()
            .build()
            .map_err(|e| ProfileError::Connection(format!("failed to build TLS connector: {e}")))?;
        let tls = MakeTlsConnector::new(connector);

        let (client, connection) = tokio_postgres::connect(conn_str, tls)
            .await
            .map_err(connect_err)?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "postgres TLS connection error");
            }
        });

        Ok(Self { client, database })
    }

    /// The connected database name
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Prepare and run a select, capturing metadata and decoded rows
    async fn run_select(&self, sql: &str) -> ProfileResult<QueryOutput> {
        let statement = self.client.prepare(sql).await.map_err(query_err)?;

        let columns: Vec<ColumnMeta> = statement
            .columns()
            .iter()
            .map(|c| ColumnMeta::new(c.name(), driver_type_name(c.type_()), scan_kind(c.type_())))
            .collect();

        let rows = self.client.query(&statement, &[]).await.map_err(query_err)?;

        let mut decoded = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(columns.len());
            for idx in 0..row.len() {
                values.push(decode_value(row, idx)?);
            }
            decoded.push(values);
        }

        Ok(QueryOutput::new(columns, decoded))
    }
}

#[async_trait::async_trait]
impl RelationalStore for PostgresStore {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    async fn test_connection(&self) -> ProfileResult<()> {
        self.client
            .query("SELECT 1", &[])
            .await
            .map_err(|e| ProfileError::Connection(format!("connection test failed: {e}")))?;
        Ok(())
    }

    async fn select_single(&self, table: &str, selects: &[String]) -> ProfileResult<QueryOutput> {
        let sql = format!(
            "select {} from {} limit 1",
            selects.join(", "),
            quote_table(table)
        );
        self.run_select(&sql).await
    }

    async fn select_all_single(&self, table: &str) -> ProfileResult<QueryOutput> {
        let sql = format!("select * from {} limit 1", quote_table(table));
        self.run_select(&sql).await
    }

    async fn select_rows(&self, table: &str, selects: &[String]) -> ProfileResult<QueryOutput> {
        let sql = format!("select {} from {}", selects.join(", "), quote_table(table));
        self.run_select(&sql).await
    }

    async fn select_ids_where(
        &self,
        table: &str,
        wheres: &[(String, SqlValue)],
    ) -> ProfileResult<Vec<i64>> {
        let clauses: Vec<String> = wheres
            .iter()
            .enumerate()
            .map(|(idx, (column, _))| format!("{} = ${}", quote_ident(column), idx + 1))
            .collect();

        let mut sql = format!("select id from {}", quote_table(table));
        if !clauses.is_empty() {
            sql = format!("{} where {}", sql, clauses.join(" and "));
        }

        let params: Vec<PgParam<'_>> = wheres.iter().map(|(_, value)| PgParam(value)).collect();
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let rows = self
            .client
            .query(sql.as_str(), &param_refs)
            .await
            .map_err(query_err)?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: i32 = row.try_get(0).map_err(query_err)?;
            ids.push(i64::from(id));
        }
        Ok(ids)
    }

    async fn insert_returning_id(
        &self,
        table: &str,
        values: &[(String, SqlValue)],
    ) -> ProfileResult<i64> {
        let columns: Vec<String> = values
            .iter()
            .map(|(column, _)| quote_ident(column))
            .collect();
        let placeholders: Vec<String> = (1..=values.len()).map(|idx| format!("${idx}")).collect();

        let sql = format!(
            "insert into {} ({}) values ({}) returning id",
            quote_table(table),
            columns.join(", "),
            placeholders.join(", ")
        );

        let params: Vec<PgParam<'_>> = values.iter().map(|(_, value)| PgParam(value)).collect();
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let row = self
            .client
            .query_one(sql.as_str(), &param_refs)
            .await
            .map_err(query_err)?;
        let id: i32 = row.try_get(0).map_err(query_err)?;
        Ok(i64::from(id))
    }

    async fn table_exists(&self, table: &str) -> ProfileResult<bool> {
        let row = self
            .client
            .query_opt(
                "select 1 from information_schema.tables \
                 where table_schema = current_schema() and table_name = $1",
                &[&table],
            )
            .await
            .map_err(query_err)?;
        Ok(row.is_some())
    }

    async fn column_exists(&self, table: &str, column: &str) -> ProfileResult<bool> {
        let row = self
            .client
            .query_opt(
                "select 1 from information_schema.columns \
                 where table_schema = current_schema() and table_name = $1 and column_name = $2",
                &[&table, &column],
            )
            .await
            .map_err(query_err)?;
        Ok(row.is_some())
    }

    async fn create_table(&self, table: &str, columns: &[ColumnSpec]) -> ProfileResult<()> {
        let items: Vec<String> = columns
            .iter()
            .map(|column| {
                if column.identity {
                    format!("{} serial primary key", quote_ident(&column.name))
                } else {
                    format!("{} {}", quote_ident(&column.name), column.sql_type.as_sql())
                }
            })
            .collect();

        let sql = format!("create table {} ({})", quote_table(table), items.join(", "));
        self.client
            .execute(sql.as_str(), &[])
            .await
            .map_err(schema_err)?;
        Ok(())
    }

    async fn add_column(&self, table: &str, column: &ColumnSpec) -> ProfileResult<()> {
        let sql = format!(
            "alter table {} add column {} {}",
            quote_table(table),
            quote_ident(&column.name),
            column.sql_type.as_sql()
        );
        self.client
            .execute(sql.as_str(), &[])
            .await
            .map_err(schema_err)?;
        Ok(())
    }

    async fn table_row_count(&self, table: &str) -> ProfileResult<i64> {
        let sql = format!("select count(*) from {}", quote_table(table));
        let row = self
            .client
            .query_one(sql.as_str(), &[])
            .await
            .map_err(query_err)?;
        row.try_get(0).map_err(query_err)
    }
}

/// Quote a bare identifier
fn quote_ident(name: &str) -> String {
    format!("\"{name}\"")
}

/// Quote a possibly schema-qualified table name
fn quote_table(name: &str) -> String {
    name.split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

/// Driver type names are reported upper-cased (`INT4`, `NUMERIC`, ...)
fn driver_type_name(ty: &Type) -> String {
    ty.name().to_uppercase()
}

/// The runtime kind a column of this type scans into, when known
fn scan_kind(ty: &Type) -> Option<ScanKind> {
    match ty.name() {
        "int2" | "int4" | "int8" => Some(ScanKind::Int),
        "float4" | "float8" => Some(ScanKind::Float),
        "bool" => Some(ScanKind::Bool),
        "text" | "varchar" | "bpchar" | "name" => Some(ScanKind::Text),
        "timestamp" | "timestamptz" | "date" => Some(ScanKind::Timestamp),
        "numeric" => Some(ScanKind::Bytes),
        _ => None,
    }
}

fn decode_value(row: &Row, idx: usize) -> ProfileResult<SqlValue> {
    let ty = row.columns()[idx].type_().clone();

    let value = match ty.name() {
        "int2" => row
            .try_get::<_, Option<i16>>(idx)
            .map_err(query_err)?
            .map(|v| SqlValue::Int(i64::from(v))),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)
            .map_err(query_err)?
            .map(|v| SqlValue::Int(i64::from(v))),
        "int8" => row
            .try_get::<_, Option<i64>>(idx)
            .map_err(query_err)?
            .map(SqlValue::Int),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)
            .map_err(query_err)?
            .map(|v| SqlValue::Float(f64::from(v))),
        "float8" => row
            .try_get::<_, Option<f64>>(idx)
            .map_err(query_err)?
            .map(SqlValue::Float),
        "bool" => row
            .try_get::<_, Option<bool>>(idx)
            .map_err(query_err)?
            .map(SqlValue::Bool),
        "text" | "varchar" | "bpchar" | "name" => row
            .try_get::<_, Option<String>>(idx)
            .map_err(query_err)?
            .map(SqlValue::Text),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .map_err(query_err)?
            .map(SqlValue::Timestamp),
        "timestamp" => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .map_err(query_err)?
            .map(|v| SqlValue::Timestamp(chrono::DateTime::from_naive_utc_and_offset(v, chrono::Utc))),
        "date" => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)
            .map_err(query_err)?
            .map(|v| {
                SqlValue::Timestamp(chrono::DateTime::from_naive_utc_and_offset(
                    v.and_time(chrono::NaiveTime::MIN),
                    chrono::Utc,
                ))
            }),
        // numeric and anything unclassified arrives as raw wire bytes
        _ => row
            .try_get::<_, Option<RawValue>>(idx)
            .map_err(query_err)?
            .map(|raw| SqlValue::Bytes(raw.0)),
    };

    Ok(value.unwrap_or(SqlValue::Null))
}

/// Captures any column's raw wire representation
#[derive(Debug)]
struct RawValue(Vec<u8>);

impl<'a> FromSql<'a> for RawValue {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(RawValue(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Binds an [`SqlValue`] as a query parameter
///
/// Integers narrow to the column's declared width; raw bytes are written
/// back verbatim, round-tripping numeric values untouched.
#[derive(Debug)]
struct PgParam<'a>(&'a SqlValue);

impl ToSql for PgParam<'_> {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self.0 {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Int(v) => match ty.name() {
                "int2" => (*v as i16).to_sql(ty, out),
                "int4" => (*v as i32).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            SqlValue::Float(v) => v.to_sql(ty, out),
            SqlValue::Bool(v) => v.to_sql(ty, out),
            SqlValue::Text(v) => v.to_sql(ty, out),
            SqlValue::Timestamp(v) => v.to_sql(ty, out),
            SqlValue::Bytes(v) => {
                out.extend_from_slice(v);
                Ok(IsNull::No)
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn database_name(conn_str: &str) -> ProfileResult<String> {
    let config: PgConfig = conn_str
        .parse()
        .map_err(|e| ProfileError::Connection(format!("invalid connection string: {e}")))?;
    Ok(config.get_dbname().unwrap_or("postgres").to_string())
}

fn connect_err(e: tokio_postgres::Error) -> ProfileError {
    ProfileError::Connection(format!("failed to connect to PostgreSQL: {e}"))
}

fn query_err(e: tokio_postgres::Error) -> ProfileError {
    ProfileError::Query(e.to_string())
}

fn schema_err(e: tokio_postgres::Error) -> ProfileError {
    ProfileError::Schema(e.to_string())
}
