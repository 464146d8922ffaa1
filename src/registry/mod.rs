//! Registry entries: per-table metadata used for table selection.

pub mod aliases;
pub mod builder;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

use crate::error::{RegistryError, Result};

pub use aliases::{AffixAliasStrategy, AliasStrategy};
pub use builder::{RegistryBuilder, signature};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    #[default]
    Low,
    Medium,
    High,
}

/// A related table and the clause joining it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinHint {
    pub table: String,
    pub on: String,
}

/// A manually authored example question for a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SampleQueryRepr")]
pub struct SampleQuery {
    pub query: String,
    pub intent: Option<String>,
    pub confidence: f64,
    pub joins: Vec<JoinHint>,
}

impl SampleQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            intent: None,
            confidence: 1.0,
            joins: Vec::new(),
        }
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_join(mut self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.joins.push(JoinHint {
            table: table.into(),
            on: on.into(),
        });
        self
    }

    /// Two sample queries are duplicates when query text and joins match
    pub fn same_as(&self, other: &SampleQuery) -> bool {
        self.query == other.query && self.joins == other.joins
    }
}

/// Older registries store sample queries as bare strings
#[derive(Deserialize)]
#[serde(untagged)]
enum SampleQueryRepr {
    Text(String),
    Full {
        query: String,
        #[serde(default)]
        intent: Option<String>,
        #[serde(default = "default_confidence")]
        confidence: f64,
        #[serde(default)]
        joins: Vec<JoinHint>,
    },
}

fn default_confidence() -> f64 {
    1.0
}

impl From<SampleQueryRepr> for SampleQuery {
    fn from(repr: SampleQueryRepr) -> Self {
        match repr {
            SampleQueryRepr::Text(query) => SampleQuery::new(query),
            SampleQueryRepr::Full {
                query,
                intent,
                confidence,
                joins,
            } => SampleQuery {
                query,
                intent,
                confidence,
                joins,
            },
        }
    }
}

/// One registry line. Field order is the NDJSON wire order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryEntry {
    pub table: String,
    pub sig: String,
    #[serde(default)]
    pub top_columns: Vec<String>,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    #[serde(default)]
    pub sample_queries: Vec<SampleQuery>,
    #[serde(default)]
    pub neighbors: Vec<String>,
    #[serde(default)]
    pub sensitivity: Sensitivity,
}

impl RegistryEntry {
    /// Check the invariants a loaded entry must satisfy, repairing the ones
    /// that can be repaired without guessing.
    fn validated(mut self, line: usize) -> Result<Self> {
        if self.table.trim().is_empty() {
            return Err(RegistryError::MalformedEntry {
                line,
                source: serde::de::Error::custom("empty table name"),
            });
        }
        if !self.aliases.contains(&self.table) {
            warn!(
                "Registry entry '{}' did not list its own name as an alias, adding it",
                self.table
            );
            self.aliases.insert(self.table.clone());
        }
        let mut unique: Vec<SampleQuery> = Vec::with_capacity(self.sample_queries.len());
        for sample in self.sample_queries.drain(..) {
            if !unique.iter().any(|s| s.same_as(&sample)) {
                unique.push(sample);
            }
        }
        self.sample_queries = unique;
        Ok(self)
    }

    pub fn has_sample_query(&self, sample: &SampleQuery) -> bool {
        self.sample_queries.iter().any(|s| s.same_as(sample))
    }
}

/// Ordered collection of registry entries keyed by table name
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
    positions: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `entry.table`, keeping its position
    pub fn upsert(&mut self, entry: RegistryEntry) -> Option<RegistryEntry> {
        match self.positions.get(&entry.table) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos], entry)),
            None => {
                self.positions.insert(entry.table.clone(), self.entries.len());
                self.entries.push(entry);
                None
            }
        }
    }

    pub fn get(&self, table: &str) -> Option<&RegistryEntry> {
        self.positions.get(table).map(|&pos| &self.entries[pos])
    }

    pub fn contains(&self, table: &str) -> bool {
        self.positions.contains_key(table)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.table.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize as newline-delimited JSON, one entry per line
    pub fn to_ndjson(&self) -> Result<String> {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Parse newline-delimited JSON. Blank lines are ignored; any malformed
    /// line rejects the whole registry.
    pub fn from_ndjson(text: &str) -> Result<Self> {
        let mut registry = Registry::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: RegistryEntry = serde_json::from_str(line)
                .map_err(|source| RegistryError::MalformedEntry { line: i + 1, source })?;
            let entry = entry.validated(i + 1)?;
            if registry.upsert(entry).is_some() {
                warn!("Registry line {} repeats a table, keeping the later line", i + 1);
            }
        }
        Ok(registry)
    }
}

impl FromIterator<RegistryEntry> for Registry {
    fn from_iter<I: IntoIterator<Item = RegistryEntry>>(iter: I) -> Self {
        let mut registry = Registry::new();
        for entry in iter {
            registry.upsert(entry);
        }
        registry
    }
}
