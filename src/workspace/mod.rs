//! Registry workspace: the artifact directory and the operations on it.
//!
//! A workspace directory holds the pipeline's persisted artifacts:
//! - `schema.json` - schema map (table -> ordered columns)
//! - `registry.ndjson` - one registry entry per line
//! - `registry.db` - SQLite token index
//! - `tablescout.toml` - optional configuration
//!
//! [`RegistryWorkspace`] is the explicit handle every read and write goes
//! through. Writes merge in memory, then persist the registry file and the
//! index delta as one unit: the file is replaced by rename inside the index
//! transaction, and a failed rename rolls the transaction back.

pub mod persist;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::database::IndexDatabase;
use crate::ddl::SchemaStore;
use crate::enrich::{Addition, MergeOutcome, Merger};
use crate::error::{RegistryError, Result};
use crate::health::{ConsistencyChecker, ConsistencyReport};
use crate::index::{ColumnRef, IndexDelta, TokenIndex, Tokenizer, alias_tokens};
use crate::registry::{JoinHint, Registry, RegistryEntry};

pub const SCHEMA_FILE_NAME: &str = "schema.json";
pub const REGISTRY_FILE_NAME: &str = "registry.ndjson";
pub const INDEX_DB_FILE_NAME: &str = "registry.db";

/// How many times a write is re-merged after losing a race to another handle
pub(crate) const WRITE_ATTEMPTS: usize = 3;

/// One item of a batch enrichment request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    pub table: String,
    #[serde(flatten)]
    pub addition: Addition,
}

/// What [`RegistryWorkspace::seed_templates`] added
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub sample_queries: usize,
    pub aliases: usize,
}

impl SeedReport {
    pub fn total(&self) -> usize {
        self.sample_queries + self.aliases
    }
}

impl EnrichmentRequest {
    pub fn new(table: impl Into<String>, addition: Addition) -> Self {
        Self {
            table: table.into(),
            addition,
        }
    }
}

pub struct RegistryWorkspace {
    /// Artifact directory
    pub root: PathBuf,
    config: RegistryConfig,
    schema: SchemaStore,
    registry: Registry,
    db: IndexDatabase,
    merger: Merger,
    tokenizer: Tokenizer,
    /// Index version the in-memory registry corresponds to
    loaded_version: u64,
}

impl RegistryWorkspace {
    /// Open an existing workspace, reading `tablescout.toml` if present
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let config = RegistryConfig::load_or_default(root)?;
        Self::open_with_config(root, config)
    }

    pub fn open_with_config(root: impl AsRef<Path>, config: RegistryConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let schema = persist::read_schema(&root.join(SCHEMA_FILE_NAME))?;
        let registry = persist::read_registry(&root.join(REGISTRY_FILE_NAME))?;
        let db = IndexDatabase::new(root.join(INDEX_DB_FILE_NAME))?;
        let loaded_version = db.registry_version()?;

        info!(
            "Opened registry workspace at {} ({} tables, version {})",
            root.display(),
            registry.len(),
            loaded_version
        );

        Ok(Self {
            merger: Merger::new(&config),
            tokenizer: Tokenizer::from_config(&config),
            root,
            config,
            schema,
            registry,
            db,
            loaded_version,
        })
    }

    /// Write a complete set of artifacts into `root`, replacing whatever was
    /// there, and return a handle on them.
    ///
    /// The index is rebuilt from scratch; the schema map and registry files
    /// are replaced inside the rebuild transaction.
    ///
    /// With `expected` set, the write is refused with
    /// [`RegistryError::StaleRegistry`] if the existing index has moved past
    /// that version.
    pub fn create(
        root: impl AsRef<Path>,
        config: RegistryConfig,
        schema: SchemaStore,
        registry: Registry,
        expected: Option<u64>,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let tokenizer = Tokenizer::from_config(&config);
        let index = TokenIndex::build(&schema, &registry, &tokenizer);

        let mut db = IndexDatabase::new(root.join(INDEX_DB_FILE_NAME))?;
        let schema_path = root.join(SCHEMA_FILE_NAME);
        let registry_path = root.join(REGISTRY_FILE_NAME);
        let loaded_version = db.rebuild_with(expected, &index, || {
            persist::write_schema(&schema_path, &schema)?;
            persist::write_registry(&registry_path, &registry)
        })?;

        Ok(Self {
            merger: Merger::new(&config),
            tokenizer,
            root,
            config,
            schema,
            registry,
            db,
            loaded_version,
        })
    }

    pub fn schema_path(&self) -> PathBuf {
        self.root.join(SCHEMA_FILE_NAME)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE_NAME)
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(INDEX_DB_FILE_NAME)
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn schema(&self) -> &SchemaStore {
        &self.schema
    }

    pub fn database(&self) -> &IndexDatabase {
        &self.db
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn version(&self) -> Result<u64> {
        self.db.registry_version()
    }

    // ---- consumer-facing reads ----

    pub fn find_tables_by_token(&self, token: &str) -> Result<BTreeSet<String>> {
        self.db.find_tables_by_token(token)
    }

    pub fn find_columns_by_token(&self, token: &str) -> Result<BTreeSet<ColumnRef>> {
        self.db.find_columns_by_token(token)
    }

    pub fn load_entry(&self, table: &str) -> Result<RegistryEntry> {
        self.registry
            .get(table)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownTable(table.to_string()))
    }

    /// Ordered columns of `table`. Tables kept in the registry after leaving
    /// the DDL answer with their stored top columns.
    pub fn load_schema(&self, table: &str) -> Result<Vec<String>> {
        if let Some(columns) = self.schema.columns(table) {
            return Ok(columns.to_vec());
        }
        match self.registry.get(table) {
            Some(entry) => Ok(entry.top_columns.clone()),
            None => Err(RegistryError::UnknownTable(table.to_string())),
        }
    }

    /// The index the current schema and registry imply
    pub fn expected_index(&self) -> TokenIndex {
        TokenIndex::build(&self.schema, &self.registry, &self.tokenizer)
    }

    // ---- producer-facing writes ----

    /// Merge one addition into `table` and persist it.
    ///
    /// Returns the updated entry. An addition that is already present
    /// returns the entry unchanged without writing anything.
    pub fn submit_enrichment(&mut self, table: &str, addition: &Addition) -> Result<RegistryEntry> {
        self.write_with_retry(|workspace| {
            let entry = workspace.load_entry(table)?;
            let outcome = workspace.merger.merge(&entry, addition)?;

            if !outcome.changed {
                debug!("{} addition for '{}' already present", addition.kind(), table);
                return Ok(outcome.entry);
            }

            info!("Merged {} addition into '{}'", addition.kind(), table);
            workspace.commit(outcome)
        })
    }

    /// Apply each request independently and persist once.
    ///
    /// A rejected item (unknown table, invalid addition) does not stop the
    /// others; its error is returned in its slot.
    pub fn submit_batch(&mut self, requests: &[EnrichmentRequest]) -> Result<Vec<Result<RegistryEntry>>> {
        let batch = self.write_with_retry(|workspace| workspace.apply_batch(requests))?;
        Ok(batch.results)
    }

    /// Remove a sample query from `table`
    pub fn retract_sample_query(
        &mut self,
        table: &str,
        query: &str,
        joins: &[JoinHint],
    ) -> Result<RegistryEntry> {
        self.write_with_retry(|workspace| {
            let entry = workspace.load_entry(table)?;
            let outcome = workspace.merger.retract_sample_query(&entry, query, joins)?;

            if !outcome.changed {
                debug!("No matching sample query on '{}' to retract", table);
                return Ok(outcome.entry);
            }

            info!("Retracted sample query from '{}'", table);
            workspace.commit(outcome)
        })
    }

    /// Add generated starter queries and column-word aliases to every entry.
    /// Items already present are not counted.
    pub fn seed_templates(&mut self) -> Result<SeedReport> {
        let (requests, batch) = self.write_with_retry(|workspace| {
            let requests: Vec<EnrichmentRequest> = workspace
                .registry
                .iter()
                .flat_map(|entry| {
                    workspace
                        .merger
                        .seed_templates(entry)
                        .into_iter()
                        .map(|addition| EnrichmentRequest::new(entry.table.clone(), addition))
                })
                .collect();
            let batch = workspace.apply_batch(&requests)?;
            Ok((requests, batch))
        })?;

        let mut report = SeedReport::default();
        for (request, changed) in requests.iter().zip(&batch.changed) {
            if !changed {
                continue;
            }
            match request.addition {
                Addition::SampleQuery(_) => report.sample_queries += 1,
                Addition::Alias { .. } => report.aliases += 1,
                Addition::Neighbor { .. } => {}
            }
        }
        Ok(report)
    }

    // ---- validation ----

    /// Compare the persisted index with the one the registry implies
    pub fn check_consistency(&self) -> Result<ConsistencyReport> {
        let actual = self.db.load_index()?;
        Ok(ConsistencyChecker::compare(&self.expected_index(), &actual, &self.registry))
    }

    /// Validation pass: fails with `IndexInconsistency` on any difference
    pub fn validate(&self) -> Result<ConsistencyReport> {
        let actual = self.db.load_index()?;
        ConsistencyChecker::check(&self.expected_index(), &actual, &self.registry)
    }

    /// Rebuild the persisted index from the registry
    pub fn repair(&mut self) -> Result<u64> {
        let version = self.write_with_retry(|workspace| {
            let index = workspace.expected_index();
            let expected = workspace.loaded_version;
            workspace.db.rebuild_with(Some(expected), &index, || Ok(()))
        })?;
        self.loaded_version = version;
        info!("Repaired token index for {}", self.root.display());
        Ok(version)
    }

    /// Run `attempt` against a fresh view of the artifacts. When another
    /// handle commits between the refresh and the write, the write is refused
    /// inside its transaction and `attempt` runs again on the reloaded state.
    fn write_with_retry<T>(&mut self, mut attempt: impl FnMut(&mut Self) -> Result<T>) -> Result<T> {
        let mut tries = 1;
        loop {
            self.refresh_if_stale()?;
            match attempt(self) {
                Err(RegistryError::StaleRegistry { expected, found }) if tries < WRITE_ATTEMPTS => {
                    warn!(
                        "Registry moved from version {} to {} during a write, retrying",
                        expected, found
                    );
                    tries += 1;
                }
                result => return result,
            }
        }
    }

    fn apply_batch(&mut self, requests: &[EnrichmentRequest]) -> Result<BatchOutcome> {
        let mut working = self.registry.clone();
        let mut originals: BTreeMap<String, RegistryEntry> = BTreeMap::new();
        let mut results = Vec::with_capacity(requests.len());
        let mut changed = Vec::with_capacity(requests.len());

        for request in requests {
            let mut item_changed = false;
            let result = match working.get(&request.table).cloned() {
                None => Err(RegistryError::UnknownTable(request.table.clone())),
                Some(entry) => match self.merger.merge(&entry, &request.addition) {
                    Ok(outcome) if outcome.changed => {
                        item_changed = true;
                        working.upsert(outcome.entry.clone());
                        originals.entry(request.table.clone()).or_insert(entry);
                        Ok(outcome.entry)
                    }
                    Ok(outcome) => Ok(outcome.entry),
                    Err(e) => Err(e),
                },
            };
            if let Err(e) = &result {
                warn!("Rejected enrichment for '{}': {}", request.table, e);
            }
            results.push(result);
            changed.push(item_changed);
        }

        if originals.is_empty() {
            return Ok(BatchOutcome { results, changed });
        }

        let mut delta = IndexDelta::default();
        for (table, before) in &originals {
            if let Some(after) = working.get(table) {
                delta.merge(IndexDelta::for_alias_tokens(
                    table,
                    &alias_tokens(before, &self.tokenizer),
                    &alias_tokens(after, &self.tokenizer),
                ));
            }
        }

        self.persist(working, &delta)?;
        info!(
            "Applied batch of {} enrichment requests touching {} tables",
            requests.len(),
            originals.len()
        );
        Ok(BatchOutcome { results, changed })
    }

    fn commit(&mut self, outcome: MergeOutcome) -> Result<RegistryEntry> {
        let mut working = self.registry.clone();
        working.upsert(outcome.entry.clone());
        self.persist(working, &outcome.delta)?;
        Ok(outcome.entry)
    }

    fn persist(&mut self, working: Registry, delta: &IndexDelta) -> Result<()> {
        let registry_path = self.registry_path();
        let version = self.db.apply_delta_with(Some(self.loaded_version), delta, || {
            persist::write_registry(&registry_path, &working)
        })?;
        self.registry = working;
        self.loaded_version = version;
        Ok(())
    }

    /// Reload the artifacts when another handle has written since we loaded
    fn refresh_if_stale(&mut self) -> Result<()> {
        let current = self.db.registry_version()?;
        if current == self.loaded_version {
            return Ok(());
        }
        debug!(
            "Registry version moved from {} to {}, reloading",
            self.loaded_version, current
        );
        self.schema = persist::read_schema(&self.schema_path())?;
        self.registry = persist::read_registry(&self.registry_path())?;
        self.loaded_version = current;
        Ok(())
    }
}

struct BatchOutcome {
    results: Vec<Result<RegistryEntry>>,
    /// Per request: whether it altered the registry
    changed: Vec<bool>,
}
