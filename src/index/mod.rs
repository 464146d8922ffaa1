//! Inverted token index over the registry.
//!
//! Two mappings are kept: alias token -> tables, and column token ->
//! (table, column). The index is derived data; [`TokenIndex::build`]
//! reconstructs it from the schema store and registry, and [`IndexDelta`]
//! carries incremental changes produced by enrichment.

pub mod tokenizer;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::ddl::SchemaStore;
use crate::registry::{Registry, RegistryEntry};

pub use tokenizer::{Tokenizer, Tokens, normalize_identifier, normalize_needle, tokenize};

/// A `(table, column)` pair
pub type ColumnRef = (String, String);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenIndex {
    aliases: BTreeMap<String, BTreeSet<String>>,
    columns: BTreeMap<String, BTreeSet<ColumnRef>>,
}

/// Token associations to add to and remove from an index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexDelta {
    pub added_aliases: Vec<(String, String)>,
    pub added_columns: Vec<(String, String, String)>,
    pub removed_aliases: Vec<(String, String)>,
    pub removed_columns: Vec<(String, String, String)>,
}

impl IndexDelta {
    pub fn is_empty(&self) -> bool {
        self.added_aliases.is_empty()
            && self.added_columns.is_empty()
            && self.removed_aliases.is_empty()
            && self.removed_columns.is_empty()
    }

    /// Delta that turns the alias tokens `before` into `after` for `table`
    pub fn for_alias_tokens(table: &str, before: &BTreeSet<String>, after: &BTreeSet<String>) -> Self {
        Self {
            added_aliases: after
                .difference(before)
                .map(|t| (t.clone(), table.to_string()))
                .collect(),
            removed_aliases: before
                .difference(after)
                .map(|t| (t.clone(), table.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    pub fn merge(&mut self, other: IndexDelta) {
        self.added_aliases.extend(other.added_aliases);
        self.added_columns.extend(other.added_columns);
        self.removed_aliases.extend(other.removed_aliases);
        self.removed_columns.extend(other.removed_columns);
    }
}

/// Alias-side tokens of one entry: its aliases, sample query text and join
/// clauses. Free text is indexed against the owning table.
pub fn alias_tokens(entry: &RegistryEntry, tokenizer: &Tokenizer) -> BTreeSet<String> {
    let mut tokens: BTreeSet<String> = entry
        .aliases
        .iter()
        .flat_map(|alias| tokenizer.tokenize(alias))
        .collect();
    for sample in &entry.sample_queries {
        tokens.extend(tokenizer.tokenize_text(&sample.query));
        for join in &sample.joins {
            tokens.extend(tokenizer.tokenize_text(&join.on));
        }
    }
    tokens
}

/// Column-side tokens of one table
pub fn column_tokens<'a>(
    table: &'a str,
    columns: &'a [String],
    tokenizer: &'a Tokenizer,
) -> impl Iterator<Item = (String, String, String)> + 'a {
    columns.iter().flat_map(move |column| {
        tokenizer
            .tokenize(column)
            .map(move |token| (token, table.to_string(), column.clone()))
    })
}

impl TokenIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the full index from the schema store and registry.
    ///
    /// Column tokens come from the schema store; tables kept in the registry
    /// without a schema fall back to their `top_columns`.
    pub fn build(schema: &SchemaStore, registry: &Registry, tokenizer: &Tokenizer) -> Self {
        let mut index = Self::new();
        for entry in registry.iter() {
            for token in alias_tokens(entry, tokenizer) {
                index.insert_alias(&token, &entry.table);
            }
            let columns = schema
                .columns(&entry.table)
                .unwrap_or(entry.top_columns.as_slice());
            for (token, table, column) in column_tokens(&entry.table, columns, tokenizer) {
                index.insert_column(&token, &table, &column);
            }
        }
        index
    }

    /// Returns true when the association was not present before
    pub fn insert_alias(&mut self, token: &str, table: &str) -> bool {
        self.aliases
            .entry(token.to_string())
            .or_default()
            .insert(table.to_string())
    }

    pub fn insert_column(&mut self, token: &str, table: &str, column: &str) -> bool {
        self.columns
            .entry(token.to_string())
            .or_default()
            .insert((table.to_string(), column.to_string()))
    }

    pub fn remove_alias(&mut self, token: &str, table: &str) -> bool {
        let Some(tables) = self.aliases.get_mut(token) else {
            return false;
        };
        let removed = tables.remove(table);
        if tables.is_empty() {
            self.aliases.remove(token);
        }
        removed
    }

    pub fn remove_column(&mut self, token: &str, table: &str, column: &str) -> bool {
        let Some(pairs) = self.columns.get_mut(token) else {
            return false;
        };
        let removed = pairs.remove(&(table.to_string(), column.to_string()));
        if pairs.is_empty() {
            self.columns.remove(token);
        }
        removed
    }

    /// Tables whose alias tokens contain `token` (exact or substring match)
    pub fn lookup_tables(&self, token: &str) -> BTreeSet<String> {
        let needle = normalize_needle(token);
        if needle.is_empty() {
            return BTreeSet::new();
        }
        self.aliases
            .iter()
            .filter(|(key, _)| key.contains(&needle))
            .flat_map(|(_, tables)| tables.iter().cloned())
            .collect()
    }

    /// `(table, column)` pairs whose column tokens contain `token`
    pub fn lookup_columns(&self, token: &str) -> BTreeSet<ColumnRef> {
        let needle = normalize_needle(token);
        if needle.is_empty() {
            return BTreeSet::new();
        }
        self.columns
            .iter()
            .filter(|(key, _)| key.contains(&needle))
            .flat_map(|(_, pairs)| pairs.iter().cloned())
            .collect()
    }

    pub fn alias_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().flat_map(|(token, tables)| {
            tables.iter().map(move |table| (token.as_str(), table.as_str()))
        })
    }

    pub fn column_triples(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.columns.iter().flat_map(|(token, pairs)| {
            pairs
                .iter()
                .map(move |(table, column)| (token.as_str(), table.as_str(), column.as_str()))
        })
    }

    /// Every table referenced anywhere in the index
    pub fn tables(&self) -> BTreeSet<&str> {
        self.alias_pairs()
            .map(|(_, table)| table)
            .chain(self.column_triples().map(|(_, table, _)| table))
            .collect()
    }

    pub fn alias_len(&self) -> usize {
        self.aliases.values().map(BTreeSet::len).sum()
    }

    pub fn column_len(&self) -> usize {
        self.columns.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty() && self.columns.is_empty()
    }
}
