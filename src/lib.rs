// tablescout - DDL to table registry for natural-language table selection
//!
//! Turns a SQL DDL script into a schema map, a registry of per-table
//! metadata and an inverted token index, and layers enrichment (aliases,
//! sample queries, join hints) onto the registry without index drift.

pub mod config;
pub mod database;
pub mod ddl;
pub mod enrich;
pub mod error;
pub mod health;
pub mod index;
pub mod pipeline;
pub mod registry;
pub mod selector;
pub mod workspace;

#[cfg(test)]
pub mod tests;

// Re-export common types
pub use config::RegistryConfig;
pub use ddl::{SchemaStore, TableSchema, extract_schema, scan};
pub use enrich::{Addition, Merger};
pub use error::{RegistryError, Result};
pub use index::{TokenIndex, tokenize};
pub use pipeline::{Pipeline, PipelineReport};
pub use registry::{Registry, RegistryBuilder, RegistryEntry, SampleQuery};
pub use workspace::{EnrichmentRequest, RegistryWorkspace};
