//! Profile definition: which tables and expressions to profile
//!
//! The definition file is a trusted input channel. Custom column definitions
//! are raw SQL expressions written by the definition's author and are
//! evaluated verbatim against the target database; they are not sandboxed.
//! Table and plain column names, in contrast, are validated against the
//! identifier allowlist before use.

use crate::error::{ProfileError, ProfileResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level profile specification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileDefinition {
    /// Tables profiled across all of their declared columns
    #[serde(rename = "FullProfileTables", default)]
    pub full_profile_tables: Vec<String>,

    /// Tables profiled through explicit column lists and custom expressions
    #[serde(rename = "CustomProfileTables", default)]
    pub custom_profile_tables: Vec<TableDefinition>,
}

/// Custom profiling entry for one table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    #[serde(rename = "TableName")]
    pub table_name: String,

    /// Plain columns profiled with the full aggregate flow
    #[serde(rename = "Columns", default)]
    pub columns: Vec<String>,

    /// Raw SQL expressions sampled from one row
    #[serde(rename = "CustomColumns", default)]
    pub custom_columns: Vec<CustomColumnDefinition>,
}

/// A named raw SQL expression
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomColumnDefinition {
    #[serde(rename = "ColumnName")]
    pub column_name: String,

    #[serde(rename = "ColumnDefinition")]
    pub column_definition: String,
}

impl ProfileDefinition {
    /// Parse a definition from its JSON text
    pub fn from_json(json: &str) -> ProfileResult<Self> {
        serde_json::from_str(json).map_err(|e| ProfileError::Definition(e.to_string()))
    }

    /// Read and parse a definition file
    pub fn from_file(path: impl AsRef<Path>) -> ProfileResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProfileError::Definition(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    /// Total number of profiling tasks this definition fans out to
    pub fn task_count(&self) -> usize {
        self.full_profile_tables.len() + self.custom_profile_tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.task_count() == 0
    }
}
