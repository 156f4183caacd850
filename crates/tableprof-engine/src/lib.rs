//! Tableprof Engine
//!
//! The profiling core: type mapping, dimension registration, schema
//! synthesis, aggregate computation, and the concurrent orchestrator that
//! ties them together.
//!
//! Trust boundary: custom column definitions in a profile definition are raw
//! SQL expressions evaluated verbatim against the target database. The
//! definition file is a trusted input channel. Identifiers, in contrast, are
//! validated against an allowlist before SQL generation, and values are
//! always bound as parameters.

pub mod aggregates;
pub mod locks;
pub mod mapper;
pub mod profiler;
pub mod registry;
pub mod store;
pub mod synthesizer;

pub use aggregates::{aggregate_set, AggregateExpr};
pub use mapper::resolve_sql_type;
pub use profiler::{Profiler, ProfilerOptions};
pub use registry::DimensionRegistry;
pub use store::{ColumnProfileValue, ProfileStore};
pub use synthesizer::SchemaSynthesizer;
