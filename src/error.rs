use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Invalid enrichment for table '{table}': {reason}")]
    InvalidAddition { table: String, reason: String },

    #[error("Token index inconsistent with registry: {missing} missing, {stale} stale associations")]
    IndexInconsistency { missing: usize, stale: usize },

    #[error("Registry changed underneath this handle: expected version {expected}, found {found}")]
    StaleRegistry { expected: u64, found: u64 },

    #[error("Malformed registry entry on line {line}: {source}")]
    MalformedEntry {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl RegistryError {
    pub fn invalid(table: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAddition {
            table: table.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
