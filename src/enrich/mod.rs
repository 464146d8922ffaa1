//! Enrichment Merger.
//!
//! Layers externally authored additions onto registry entries. Merging is a
//! pure function: it returns the updated entry together with the
//! [`IndexDelta`] that keeps the token index in step, and performs no I/O.
//! Re-applying an addition that is already present yields an unchanged entry
//! and an empty delta.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::index::tokenizer::identifier_words;
use crate::index::{IndexDelta, Tokenizer, alias_tokens};
use crate::registry::{JoinHint, RegistryEntry, SampleQuery};

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^<>]*>").expect("valid tag pattern"));
static WHITESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Confidence given to generated starter queries
pub const TEMPLATE_CONFIDENCE: f64 = 0.5;

/// Key-like endings dropped from column names before they become aliases
const ID_SUFFIXES: &[&str] = &["_id", "_no", "id", "no"];

/// One enrichment item for a single table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Addition {
    Alias { alias: String },
    SampleQuery(SampleQuery),
    Neighbor { neighbor: String },
}

impl Addition {
    pub fn alias(alias: impl Into<String>) -> Self {
        Addition::Alias {
            alias: alias.into(),
        }
    }

    pub fn neighbor(table: impl Into<String>) -> Self {
        Addition::Neighbor {
            neighbor: table.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Addition::Alias { .. } => "alias",
            Addition::SampleQuery(_) => "sample_query",
            Addition::Neighbor { .. } => "neighbor",
        }
    }
}

/// Result of merging one addition into an entry
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub entry: RegistryEntry,
    pub delta: IndexDelta,
    /// False when the addition was already present
    pub changed: bool,
}

impl MergeOutcome {
    fn unchanged(entry: &RegistryEntry) -> Self {
        Self {
            entry: entry.clone(),
            delta: IndexDelta::default(),
            changed: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Merger {
    tokenizer: Tokenizer,
    max_query_len: usize,
}

impl Merger {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            tokenizer: Tokenizer::from_config(config),
            max_query_len: config.max_query_len,
        }
    }

    /// Apply `addition` to `entry`.
    ///
    /// Inputs are sanitized first, so an addition that differs from an
    /// existing item only by markup or spacing is treated as a duplicate.
    pub fn merge(&self, entry: &RegistryEntry, addition: &Addition) -> Result<MergeOutcome> {
        let mut updated = entry.clone();

        let changed = match addition {
            Addition::Alias { alias } => {
                let alias = self.clean(alias).to_lowercase();
                if alias.is_empty() {
                    return Err(RegistryError::invalid(&entry.table, "alias is empty"));
                }
                updated.aliases.insert(alias)
            }
            Addition::SampleQuery(sample) => {
                let sample = self.normalize_sample(&entry.table, sample)?;
                if updated.has_sample_query(&sample) {
                    false
                } else {
                    updated.sample_queries.push(sample);
                    true
                }
            }
            Addition::Neighbor { neighbor } => {
                let neighbor = neighbor.trim().to_lowercase();
                if neighbor.is_empty() {
                    return Err(RegistryError::invalid(&entry.table, "neighbor table is empty"));
                }
                if neighbor == entry.table {
                    return Err(RegistryError::invalid(
                        &entry.table,
                        "a table cannot be its own neighbor",
                    ));
                }
                if updated.neighbors.contains(&neighbor) {
                    false
                } else {
                    updated.neighbors.push(neighbor);
                    true
                }
            }
        };

        if !changed {
            return Ok(MergeOutcome::unchanged(entry));
        }
        Ok(self.outcome(entry, updated))
    }

    /// Remove one sample query. Tokens that no other alias or sample query of
    /// the entry still produces are removed from the index.
    pub fn retract_sample_query(
        &self,
        entry: &RegistryEntry,
        query: &str,
        joins: &[JoinHint],
    ) -> Result<MergeOutcome> {
        let raw = SampleQuery {
            joins: joins.to_vec(),
            ..SampleQuery::new(query)
        };
        let target = self.normalize_sample(&entry.table, &raw)?;

        let mut updated = entry.clone();
        let before = updated.sample_queries.len();
        updated.sample_queries.retain(|s| !s.same_as(&target));
        if updated.sample_queries.len() == before {
            return Ok(MergeOutcome::unchanged(entry));
        }
        Ok(self.outcome(entry, updated))
    }

    /// Deterministic starter enrichment for an entry, to be applied with
    /// [`merge`](Self::merge): a lookup query on the first column, a range
    /// query on a date-like column (or an equality filter on the second
    /// column when there is none), then the words of each top column as
    /// aliases.
    pub fn seed_templates(&self, entry: &RegistryEntry) -> Vec<Addition> {
        let mut seeds = Vec::new();
        let table = &entry.table;

        if let Some(first) = entry.top_columns.first() {
            seeds.push(Addition::SampleQuery(
                SampleQuery::new(format!("Get {} by {}", table, first))
                    .with_intent("lookup")
                    .with_confidence(TEMPLATE_CONFIDENCE),
            ));
        }

        if let Some(date_column) = entry.top_columns.iter().find(|c| is_date_like(c)) {
            seeds.push(Addition::SampleQuery(
                SampleQuery::new(format!(
                    "List {} where {} between {{start_date}} and {{end_date}}",
                    table, date_column
                ))
                .with_intent("range")
                .with_confidence(TEMPLATE_CONFIDENCE),
            ));
        } else if let Some(filter_column) = entry.top_columns.get(1) {
            seeds.push(Addition::SampleQuery(
                SampleQuery::new(format!("List {} where {} = {{value}}", table, filter_column))
                    .with_intent("filter")
                    .with_confidence(TEMPLATE_CONFIDENCE),
            ));
        }

        let mut words: Vec<String> = Vec::new();
        for column in &entry.top_columns {
            for word in self.tokenizer.tokenize_text(strip_id_suffix(column)) {
                if !words.contains(&word) {
                    words.push(word);
                }
            }
        }
        seeds.extend(words.into_iter().map(Addition::alias));

        seeds
    }

    fn outcome(&self, before: &RegistryEntry, after: RegistryEntry) -> MergeOutcome {
        let delta = IndexDelta::for_alias_tokens(
            &after.table,
            &alias_tokens(before, &self.tokenizer),
            &alias_tokens(&after, &self.tokenizer),
        );
        MergeOutcome {
            entry: after,
            delta,
            changed: true,
        }
    }

    fn normalize_sample(&self, table: &str, sample: &SampleQuery) -> Result<SampleQuery> {
        let query = self.clean(&sample.query);
        if query.is_empty() {
            return Err(RegistryError::invalid(table, "sample query text is empty"));
        }
        if !sample.confidence.is_finite() || !(0.0..=1.0).contains(&sample.confidence) {
            return Err(RegistryError::invalid(
                table,
                format!("confidence {} is outside [0, 1]", sample.confidence),
            ));
        }

        let intent = sample
            .intent
            .as_deref()
            .map(|i| self.clean(i))
            .filter(|i| !i.is_empty());

        let mut joins = Vec::with_capacity(sample.joins.len());
        for join in &sample.joins {
            let join_table = join.table.trim().to_lowercase();
            if join_table.is_empty() {
                return Err(RegistryError::invalid(table, "join table is empty"));
            }
            joins.push(JoinHint {
                table: join_table,
                on: self.clean(&join.on),
            });
        }

        Ok(SampleQuery {
            query,
            intent,
            confidence: sample.confidence,
            joins,
        })
    }

    fn clean(&self, text: &str) -> String {
        sanitize_text(text, self.max_query_len)
    }
}

impl Default for Merger {
    fn default() -> Self {
        Self::new(&RegistryConfig::default())
    }
}

/// Strip angle-bracket markup, collapse whitespace and cap the length at
/// `max_len` characters
pub fn sanitize_text(text: &str, max_len: usize) -> String {
    let stripped = TAG_PATTERN.replace_all(text, " ");
    let collapsed = WHITESPACE_PATTERN.replace_all(&stripped, " ");
    let trimmed = collapsed.trim();
    match trimmed.char_indices().nth(max_len) {
        Some((cut, _)) => trimmed[..cut].trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

/// `pol_policyno` -> `pol_policy`, `CustomerID` -> `Customer`
fn strip_id_suffix(column: &str) -> &str {
    ID_SUFFIXES
        .iter()
        .find_map(|suffix| {
            let cut = column.len().checked_sub(suffix.len()).filter(|&cut| cut > 0)?;
            column
                .get(cut..)?
                .eq_ignore_ascii_case(suffix)
                .then(|| &column[..cut])
        })
        .unwrap_or(column)
}

fn is_date_like(column: &str) -> bool {
    let words = identifier_words(column);
    words
        .iter()
        .any(|w| matches!(w.as_str(), "date" | "dt" | "timestamp"))
        || words.last().is_some_and(|w| w == "at" || w == "on")
}
