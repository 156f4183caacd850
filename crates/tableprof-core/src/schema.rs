//! Static schema descriptors for the fixed profile-store entities
//!
//! Every entity declares an ordered list of (column name, type, identity)
//! tuples consumed by the schema synthesizer. The identity column is rendered
//! as `serial primary key` and excluded from inserts. No runtime type
//! inspection is involved - the descriptors are the single source of truth
//! for the fixed tables.

use crate::value::SqlType;

/// One column of a fixed profile-store entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub identity: bool,
}

/// A fixed profile-store entity: table name plus ordered columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub table: &'static str,
    pub columns: &'static [ColumnDescriptor],
}

impl EntityDescriptor {
    /// Columns that participate in inserts (identity excluded)
    pub fn insert_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| !c.identity)
    }
}

const fn col(name: &'static str, sql_type: SqlType) -> ColumnDescriptor {
    ColumnDescriptor {
        name,
        sql_type,
        identity: false,
    }
}

const ID: ColumnDescriptor = ColumnDescriptor {
    name: ID_COLUMN,
    sql_type: SqlType::Int,
    identity: true,
};

pub const ID_COLUMN: &str = "id";
pub const PROFILE_DATE: &str = "profile_date";
pub const TABLE_NAME: &str = "table_name";
pub const TABLE_NAME_ID: &str = "table_name_id";
pub const TABLE_ROW_COUNT: &str = "table_row_count";
pub const PROFILE_RECORD_ID: &str = "profile_record_id";
pub const TABLE_COLUMN_NAME: &str = "table_column_name";
pub const TABLE_COLUMN_NAME_ID: &str = "table_column_name_id";
pub const TABLE_COLUMN_TYPE: &str = "table_column_type";
pub const TABLE_COLUMN_TYPE_ID: &str = "table_column_type_id";
pub const TABLE_CUSTOM_COLUMN_NAME_ID: &str = "table_custom_column_name_id";
pub const TABLE_CUSTOM_COLUMN_DEFINITION: &str = "table_custom_column_definition";

/// Measurement column of the custom-column fact tables
pub const CUSTOM_VALUE_COLUMN: &str = "value";

/// One row per profiling run
pub const PROFILE_RECORDS: EntityDescriptor = EntityDescriptor {
    table: "profile_records",
    columns: &[ID, col(PROFILE_DATE, SqlType::Timestamptz)],
};

/// Profiled table dimension, unique by name
pub const TABLE_NAMES: EntityDescriptor = EntityDescriptor {
    table: "table_names",
    columns: &[ID, col(TABLE_NAME, SqlType::Text)],
};

/// Row-count fact, one per (table, run)
pub const TABLE_PROFILES: EntityDescriptor = EntityDescriptor {
    table: "table_profiles",
    columns: &[
        ID,
        col(TABLE_NAME_ID, SqlType::Int),
        col(TABLE_ROW_COUNT, SqlType::Int),
        col(PROFILE_RECORD_ID, SqlType::Int),
    ],
};

/// Column dimension scoped to a table
pub const TABLE_COLUMN_NAMES: EntityDescriptor = EntityDescriptor {
    table: "table_column_names",
    columns: &[
        ID,
        col(TABLE_NAME_ID, SqlType::Int),
        col(TABLE_COLUMN_NAME, SqlType::Text),
        col(TABLE_COLUMN_TYPE_ID, SqlType::Int),
    ],
};

/// Custom column dimension, keyed on the raw definition as well
pub const TABLE_CUSTOM_COLUMN_NAMES: EntityDescriptor = EntityDescriptor {
    table: "table_custom_column_names",
    columns: &[
        ID,
        col(TABLE_NAME_ID, SqlType::Int),
        col(TABLE_COLUMN_NAME, SqlType::Text),
        col(TABLE_COLUMN_TYPE_ID, SqlType::Int),
        col(TABLE_CUSTOM_COLUMN_DEFINITION, SqlType::Text),
    ],
};

/// Driver type name dimension, unique by name
pub const TABLE_COLUMN_TYPES: EntityDescriptor = EntityDescriptor {
    table: "table_column_types",
    columns: &[ID, col(TABLE_COLUMN_TYPE, SqlType::Text)],
};

/// The six fixed entities, scaffolded at startup in this order
pub const FIXED_ENTITIES: &[&EntityDescriptor] = &[
    &PROFILE_RECORDS,
    &TABLE_NAMES,
    &TABLE_PROFILES,
    &TABLE_COLUMN_NAMES,
    &TABLE_CUSTOM_COLUMN_NAMES,
    &TABLE_COLUMN_TYPES,
];

pub const COLUMN_PROFILE_TABLE_PREFIX: &str = "table_column_profiles_";
pub const CUSTOM_COLUMN_PROFILE_TABLE_PREFIX: &str = "table_custom_column_profiles_";

/// Fact table name for plain column profiles of one driver type
pub fn column_profile_table(type_name: &str) -> String {
    format!("{}{}", COLUMN_PROFILE_TABLE_PREFIX, type_name.to_lowercase())
}

/// Fact table name for custom column profiles of one driver type
pub fn custom_column_profile_table(type_name: &str) -> String {
    format!(
        "{}{}",
        CUSTOM_COLUMN_PROFILE_TABLE_PREFIX,
        type_name.to_lowercase()
    )
}

/// Runtime column definition handed to DDL generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub sql_type: SqlType,
    pub identity: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            identity: false,
        }
    }

    /// The generated-id column of a synthesized table
    pub fn identity(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: SqlType::Int,
            identity: true,
        }
    }
}

impl From<&ColumnDescriptor> for ColumnSpec {
    fn from(d: &ColumnDescriptor) -> Self {
        Self {
            name: d.name.to_string(),
            sql_type: d.sql_type,
            identity: d.identity,
        }
    }
}
