//! Maps observed runtime values to portable SQL column types

use tableprof_core::{ProfileError, ProfileResult, ScanKind, SqlType, SqlValue};

/// Resolve the SQL column type for an observed value
///
/// A non-null value classifies by its own runtime kind; a null value falls
/// back to the driver-reported scan kind. Called while fact-table column
/// definitions are built - never per data row.
pub fn resolve_sql_type(value: &SqlValue, fallback: Option<ScanKind>) -> ProfileResult<SqlType> {
    let kind = match value.kind().or(fallback) {
        Some(kind) => kind,
        None => {
            return Err(ProfileError::UnsupportedType(
                "null value with no declared scan kind".to_string(),
            ))
        }
    };

    sql_type_for(kind)
}

// Raw byte sequences map to numeric on purpose: the driver returns
// arbitrary-precision numeric columns as raw bytes, and those bytes belong
// in a numeric column on the profile side.
fn sql_type_for(kind: ScanKind) -> ProfileResult<SqlType> {
    match kind {
        ScanKind::Int => Ok(SqlType::Int),
        ScanKind::Text => Ok(SqlType::Text),
        ScanKind::Timestamp => Ok(SqlType::Timestamptz),
        ScanKind::Bytes => Ok(SqlType::Numeric),
        ScanKind::Float | ScanKind::Bool => Err(ProfileError::UnsupportedType(format!(
            "no sql type defined for {kind:?} values"
        ))),
    }
}
