//! Table selection for a natural-language question by token overlap.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::Result;
use crate::registry::Sensitivity;
use crate::workspace::RegistryWorkspace;

/// Weight of a token matched against a table's alias side
const ALIAS_WEIGHT: u32 = 2;
/// Weight of a token matched against one of a table's columns
const COLUMN_WEIGHT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableCandidate {
    pub table: String,
    pub score: u32,
    pub matched_tokens: Vec<String>,
    pub matched_columns: Vec<String>,
    pub top_columns: Vec<String>,
    pub aliases: Vec<String>,
    pub sample_queries: Vec<String>,
    pub neighbors: Vec<String>,
    pub sensitivity: Sensitivity,
}

#[derive(Default)]
struct Tally {
    score: u32,
    tokens: BTreeSet<String>,
    columns: BTreeSet<String>,
}

pub struct TableSelector<'a> {
    workspace: &'a RegistryWorkspace,
}

impl<'a> TableSelector<'a> {
    pub fn new(workspace: &'a RegistryWorkspace) -> Self {
        Self { workspace }
    }

    /// Rank tables by how many distinct question tokens hit them.
    ///
    /// A token scores once per table on the alias side and once per table on
    /// the column side. Ties are broken by table name.
    pub fn select(&self, question: &str, limit: usize) -> Result<Vec<TableCandidate>> {
        let tokens: Vec<String> = self.workspace.tokenizer().tokenize_text(question).collect();
        debug!("Selecting tables for {} question tokens", tokens.len());

        let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();
        for token in &tokens {
            for table in self.workspace.find_tables_by_token(token)? {
                let tally = tallies.entry(table).or_default();
                tally.score += ALIAS_WEIGHT;
                tally.tokens.insert(token.clone());
            }

            let mut column_hits: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
            for (table, column) in self.workspace.find_columns_by_token(token)? {
                column_hits.entry(table).or_default().insert(column);
            }
            for (table, columns) in column_hits {
                let tally = tallies.entry(table).or_default();
                tally.score += COLUMN_WEIGHT;
                tally.tokens.insert(token.clone());
                tally.columns.extend(columns);
            }
        }

        let mut candidates: Vec<TableCandidate> = tallies
            .into_iter()
            .filter_map(|(table, tally)| {
                let entry = self.workspace.registry().get(&table)?;
                Some(TableCandidate {
                    score: tally.score,
                    matched_tokens: tally.tokens.into_iter().collect(),
                    matched_columns: tally.columns.into_iter().collect(),
                    top_columns: entry.top_columns.clone(),
                    aliases: entry.aliases.iter().cloned().collect(),
                    sample_queries: entry.sample_queries.iter().map(|s| s.query.clone()).collect(),
                    neighbors: entry.neighbors.clone(),
                    sensitivity: entry.sensitivity,
                    table,
                })
            })
            .collect();

        candidates.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.table.cmp(&b.table)));
        candidates.truncate(limit);
        Ok(candidates)
    }
}
