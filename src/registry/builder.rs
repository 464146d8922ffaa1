//! Registry Builder: derives one base entry per table in a schema store.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

use super::aliases::{AffixAliasStrategy, AliasStrategy};
use super::{Registry, RegistryEntry, Sensitivity};
use crate::config::RegistryConfig;
use crate::ddl::{SchemaStore, TableSchema};
use crate::index::tokenizer::identifier_words;

/// Unit separator: cannot appear in an identifier, so `("ab", ["c"])` and
/// `("a", ["bc"])` hash differently
const FIELD_SEPARATOR: u8 = 0x1f;

/// Stable table signature: `tbl:<table>|h:<hash8>`.
///
/// The hash covers the table name and the ordered column list, so adding,
/// removing or reordering a column changes it.
pub fn signature(table: &str, columns: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(table.as_bytes());
    for column in columns {
        hasher.update([FIELD_SEPARATOR]);
        hasher.update(column.as_bytes());
    }
    let hash = hasher.finalize();

    let hash_str = format!("{:x}", hash);
    format!("tbl:{}|h:{}", table, &hash_str[..8])
}

#[derive(Clone)]
pub struct RegistryBuilder {
    top_columns: usize,
    sensitive_terms: Vec<Vec<String>>,
    alias_strategy: Arc<dyn AliasStrategy>,
}

impl RegistryBuilder {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            top_columns: config.top_columns,
            sensitive_terms: config
                .sensitive_terms
                .iter()
                .map(|term| identifier_words(term))
                .filter(|words| !words.is_empty())
                .collect(),
            alias_strategy: Arc::new(AffixAliasStrategy::from_config(config)),
        }
    }

    pub fn with_alias_strategy(mut self, strategy: impl AliasStrategy + 'static) -> Self {
        self.alias_strategy = Arc::new(strategy);
        self
    }

    pub fn alias_strategy(&self) -> &dyn AliasStrategy {
        self.alias_strategy.as_ref()
    }

    /// One entry per table, in schema order. Pure function of `schema`.
    pub fn build(&self, schema: &SchemaStore) -> Registry {
        let registry: Registry = schema.iter().map(|table| self.build_entry(table)).collect();
        debug!("Built {} registry entries", registry.len());
        registry
    }

    pub fn build_entry(&self, table: &TableSchema) -> RegistryEntry {
        let mut aliases = self.alias_strategy.derive(&table.name);
        aliases.insert(table.name.clone());

        RegistryEntry {
            table: table.name.clone(),
            sig: signature(&table.name, &table.columns),
            top_columns: table.columns.iter().take(self.top_columns).cloned().collect(),
            aliases,
            sample_queries: Vec::new(),
            neighbors: Vec::new(),
            sensitivity: self.sensitivity(table),
        }
    }

    /// `High` when the table name or any column contains a sensitive term as
    /// a whole-word sequence, `Low` otherwise
    pub fn sensitivity(&self, table: &TableSchema) -> Sensitivity {
        let sensitive = std::iter::once(&table.name)
            .chain(table.columns.iter())
            .any(|name| self.is_sensitive(name));
        if sensitive {
            Sensitivity::High
        } else {
            Sensitivity::Low
        }
    }

    fn is_sensitive(&self, identifier: &str) -> bool {
        let words = identifier_words(identifier);
        self.sensitive_terms.iter().any(|term| {
            words
                .windows(term.len())
                .any(|window| window == term.as_slice())
        })
    }
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("top_columns", &self.top_columns)
            .field("sensitive_terms", &self.sensitive_terms)
            .finish_non_exhaustive()
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new(&RegistryConfig::default())
    }
}
