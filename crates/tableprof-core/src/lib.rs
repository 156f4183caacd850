//! Tableprof Core
//!
//! Core domain model shared by the store adapters and the profiling engine.
//! Persisted table and column names are part of the profile-store contract -
//! never rename them.

pub mod definition;
pub mod error;
pub mod naming;
pub mod schema;
pub mod value;

pub use definition::{CustomColumnDefinition, ProfileDefinition, TableDefinition};
pub use error::{ProfileError, ProfileResult};
pub use naming::{validate_identifier, IdentifierCasing};
pub use schema::{ColumnDescriptor, ColumnSpec, EntityDescriptor, FIXED_ENTITIES};
pub use value::{ColumnMeta, ScanKind, SqlType, SqlValue};
