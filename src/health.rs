// Registry / token index consistency checks
//
// The token index is derived data. Validation derives the index the registry
// implies and compares it with what is persisted; any difference is an
// inconsistency that a full rebuild repairs.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::error::{RegistryError, Result};
use crate::index::TokenIndex;
use crate::registry::Registry;

/// Differences between the expected and the persisted index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    /// Expected `(token, table)` pairs absent from the persisted index
    pub missing_aliases: Vec<(String, String)>,
    /// Persisted `(token, table)` pairs the registry does not produce
    pub stale_aliases: Vec<(String, String)>,
    pub missing_columns: Vec<(String, String, String)>,
    pub stale_columns: Vec<(String, String, String)>,
    /// Tables referenced by the persisted index but absent from the registry
    pub unknown_tables: Vec<String>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.missing() == 0 && self.stale() == 0
    }

    pub fn missing(&self) -> usize {
        self.missing_aliases.len() + self.missing_columns.len()
    }

    pub fn stale(&self) -> usize {
        self.stale_aliases.len() + self.stale_columns.len()
    }

    /// Fail with [`RegistryError::IndexInconsistency`] unless consistent
    pub fn into_result(self) -> Result<Self> {
        if self.is_consistent() {
            Ok(self)
        } else {
            Err(RegistryError::IndexInconsistency {
                missing: self.missing(),
                stale: self.stale(),
            })
        }
    }
}

pub struct ConsistencyChecker;

impl ConsistencyChecker {
    /// Compare `actual` against the `expected` index derived from `registry`
    pub fn compare(expected: &TokenIndex, actual: &TokenIndex, registry: &Registry) -> ConsistencyReport {
        let expected_aliases: BTreeSet<(&str, &str)> = expected.alias_pairs().collect();
        let actual_aliases: BTreeSet<(&str, &str)> = actual.alias_pairs().collect();
        let expected_columns: BTreeSet<(&str, &str, &str)> = expected.column_triples().collect();
        let actual_columns: BTreeSet<(&str, &str, &str)> = actual.column_triples().collect();

        let report = ConsistencyReport {
            missing_aliases: owned_pairs(expected_aliases.difference(&actual_aliases)),
            stale_aliases: owned_pairs(actual_aliases.difference(&expected_aliases)),
            missing_columns: owned_triples(expected_columns.difference(&actual_columns)),
            stale_columns: owned_triples(actual_columns.difference(&expected_columns)),
            unknown_tables: actual
                .tables()
                .into_iter()
                .filter(|table| !registry.contains(table))
                .map(str::to_string)
                .collect(),
        };

        if report.is_consistent() {
            debug!(
                "Token index consistent with registry ({} alias, {} column associations)",
                actual.alias_len(),
                actual.column_len()
            );
        } else {
            warn!(
                "Token index inconsistent: {} missing, {} stale, {} unknown tables",
                report.missing(),
                report.stale(),
                report.unknown_tables.len()
            );
        }
        report
    }

    /// Like [`compare`](Self::compare) but fails on any difference
    pub fn check(expected: &TokenIndex, actual: &TokenIndex, registry: &Registry) -> Result<ConsistencyReport> {
        Self::compare(expected, actual, registry).into_result()
    }
}

fn owned_pairs<'a>(pairs: impl Iterator<Item = &'a (&'a str, &'a str)>) -> Vec<(String, String)> {
    pairs
        .map(|(token, table)| (token.to_string(), table.to_string()))
        .collect()
}

fn owned_triples<'a>(
    triples: impl Iterator<Item = &'a (&'a str, &'a str, &'a str)>,
) -> Vec<(String, String, String)> {
    triples
        .map(|(token, table, column)| (token.to_string(), table.to_string(), column.to_string()))
        .collect()
}
