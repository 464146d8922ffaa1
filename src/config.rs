//! Registry configuration stored as `tablescout.toml` next to the artifacts.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::Result;

pub const CONFIG_FILE_NAME: &str = "tablescout.toml";

/// Tunables for the registry builder, the tokenizer and enrichment sanitation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Number of leading columns kept in `top_columns`
    pub top_columns: usize,

    /// Tokens shorter than this are never indexed
    pub min_token_len: usize,

    /// Also split identifiers on lowercase -> uppercase transitions
    pub split_camel_case: bool,

    /// Table or column words that mark a table as high sensitivity
    pub sensitive_terms: Vec<String>,

    /// Prefixes stripped from table names when deriving aliases
    pub strip_prefixes: Vec<String>,

    /// Words dropped from free text (sample queries, join clauses)
    pub stop_words: Vec<String>,

    /// Sample query text is truncated to this many characters
    pub max_query_len: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            top_columns: 8,
            min_token_len: 2,
            split_camel_case: true,
            sensitive_terms: [
                "ssn",
                "password",
                "passwd",
                "secret",
                "credit_card",
                "card_number",
                "cvv",
                "salary",
                "tax_id",
                "date_of_birth",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            strip_prefixes: ["tbl_", "tb_", "t_", "dim_", "fact_", "stg_"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            stop_words: [
                "the", "and", "for", "by", "of", "in", "to", "on", "at", "is", "are", "with",
                "from", "where", "all", "an", "or", "as",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_query_len: 500,
        }
    }
}

impl RegistryConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: RegistryConfig = toml::from_str(&content)?;
        info!("Loaded registry config from {}", path.display());
        Ok(config)
    }

    /// Load `tablescout.toml` from the artifact directory, falling back to defaults
    pub fn load_or_default(out_dir: &Path) -> Result<Self> {
        let path = out_dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load(&path)
        } else {
            debug!("No {} in {}, using defaults", CONFIG_FILE_NAME, out_dir.display());
            Ok(Self::default())
        }
    }
}
