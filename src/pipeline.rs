//! Full pipeline: DDL text -> schema store -> registry -> token index.
//!
//! Re-running over a changed script reconciles with the registry already in
//! the output directory so enrichment accumulated there survives.

use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::ddl::{ExtractionReport, extract_schema};
use crate::database::IndexDatabase;
use crate::error::{RegistryError, Result};
use crate::registry::{AliasStrategy, Registry, RegistryBuilder, RegistryEntry};
use crate::workspace::{
    INDEX_DB_FILE_NAME, REGISTRY_FILE_NAME, RegistryWorkspace, WRITE_ATTEMPTS, persist,
};

/// What a pipeline run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub extraction: ExtractionReport,
    /// Number of registry entries written
    pub entries: usize,
    #[serde(flatten)]
    pub reconcile: ReconcileSummary,
    pub alias_associations: usize,
    pub column_associations: usize,
    pub registry_version: u64,
}

impl PipelineReport {
    pub fn skipped(&self) -> usize {
        self.extraction.skipped.len()
    }
}

/// How a freshly built registry was combined with the previous one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Tables with no previous entry
    pub new_tables: Vec<String>,
    /// Tables whose signature changed
    pub changed_tables: Vec<String>,
    /// Enriched tables no longer in the DDL, kept
    pub retained_tables: Vec<String>,
    /// Unenriched tables no longer in the DDL, removed
    pub dropped_tables: Vec<String>,
}

pub struct Pipeline {
    config: RegistryConfig,
    builder: RegistryBuilder,
}

impl Pipeline {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            builder: RegistryBuilder::new(&config),
            config,
        }
    }

    pub fn run_file(&self, sql_path: &Path, out_dir: &Path) -> Result<PipelineReport> {
        info!("Reading DDL from {}", sql_path.display());
        let ddl = fs::read_to_string(sql_path)?;
        self.run(&ddl, out_dir)
    }

    /// Run every stage over `ddl` and write the artifacts into `out_dir`
    pub fn run(&self, ddl: &str, out_dir: &Path) -> Result<PipelineReport> {
        let (schema, extraction) = extract_schema(ddl);
        info!(
            "Extracted {} tables from {} statements ({} skipped)",
            extraction.tables,
            extraction.statements,
            extraction.skipped.len()
        );

        let fresh = self.builder.build(&schema);

        let mut attempt = 1;
        let (workspace, reconcile) = loop {
            // version first: a registry newer than it is caught by `create`
            let expected = self.current_version(out_dir)?;
            let (registry, summary) = match self.previous_registry(out_dir)? {
                Some(previous) => reconcile(fresh.clone(), &previous, self.builder.alias_strategy()),
                None => (fresh.clone(), ReconcileSummary::default()),
            };

            match RegistryWorkspace::create(
                out_dir,
                self.config.clone(),
                schema.clone(),
                registry,
                expected,
            ) {
                Err(RegistryError::StaleRegistry { expected, found }) if attempt < WRITE_ATTEMPTS => {
                    warn!(
                        "Registry moved from version {} to {} while reconciling, retrying",
                        expected, found
                    );
                    attempt += 1;
                }
                result => break (result?, summary),
            }
        };
        let index = workspace.expected_index();

        let report = PipelineReport {
            extraction,
            entries: workspace.registry().len(),
            reconcile,
            alias_associations: index.alias_len(),
            column_associations: index.column_len(),
            registry_version: workspace.version()?,
        };
        info!(
            "Wrote {} registry entries to {} (version {})",
            report.entries,
            out_dir.display(),
            report.registry_version
        );
        Ok(report)
    }
}

impl Pipeline {
    fn current_version(&self, out_dir: &Path) -> Result<Option<u64>> {
        let db_path = out_dir.join(INDEX_DB_FILE_NAME);
        if !db_path.exists() {
            return Ok(None);
        }
        IndexDatabase::new(&db_path)?.registry_version().map(Some)
    }

    fn previous_registry(&self, out_dir: &Path) -> Result<Option<Registry>> {
        let registry_path = out_dir.join(REGISTRY_FILE_NAME);
        if !registry_path.exists() {
            return Ok(None);
        }
        debug!("Reconciling with {}", registry_path.display());
        persist::read_registry(&registry_path).map(Some)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

/// Combine a freshly built registry with the previous one.
///
/// Tables present in both take the fresh signature and columns and keep the
/// previous enrichment. Tables only in the previous registry are kept when
/// enrichment touched them and dropped otherwise.
pub fn reconcile(
    fresh: Registry,
    previous: &Registry,
    aliases: &dyn AliasStrategy,
) -> (Registry, ReconcileSummary) {
    let mut summary = ReconcileSummary::default();
    let mut merged = Registry::new();

    for entry in fresh.iter() {
        match previous.get(&entry.table) {
            None => {
                summary.new_tables.push(entry.table.clone());
                merged.upsert(entry.clone());
            }
            Some(old) => {
                if old.sig != entry.sig {
                    debug!("Signature of '{}' changed: {} -> {}", entry.table, old.sig, entry.sig);
                    summary.changed_tables.push(entry.table.clone());
                }
                merged.upsert(carry_enrichment(entry, old));
            }
        }
    }

    for old in previous.iter() {
        if fresh.contains(&old.table) {
            continue;
        }
        if is_enriched(old, aliases) {
            warn!(
                "Table '{}' is no longer in the DDL but carries enrichment, keeping it",
                old.table
            );
            summary.retained_tables.push(old.table.clone());
            merged.upsert(old.clone());
        } else {
            info!("Dropping table '{}', no longer in the DDL", old.table);
            summary.dropped_tables.push(old.table.clone());
        }
    }

    (merged, summary)
}

fn carry_enrichment(fresh: &RegistryEntry, old: &RegistryEntry) -> RegistryEntry {
    let mut entry = fresh.clone();
    entry.aliases.extend(old.aliases.iter().cloned());
    entry.sample_queries = old.sample_queries.clone();
    entry.neighbors = old.neighbors.clone();
    entry.sensitivity = entry.sensitivity.max(old.sensitivity);
    entry
}

fn is_enriched(entry: &RegistryEntry, aliases: &dyn AliasStrategy) -> bool {
    if !entry.sample_queries.is_empty() || !entry.neighbors.is_empty() {
        return true;
    }
    let derived = aliases.derive(&entry.table);
    entry.aliases.iter().any(|alias| !derived.contains(alias))
}
