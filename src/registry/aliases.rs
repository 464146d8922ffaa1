//! Alias derivation for table names.
//!
//! The derivation rules are a policy, so they sit behind [`AliasStrategy`];
//! the registry builder only relies on the contract that the literal table
//! name is always part of the result and that the result is deterministic.

use std::collections::BTreeSet;

use crate::config::RegistryConfig;
use crate::index::normalize_identifier;

pub trait AliasStrategy: Send + Sync {
    /// Aliases for `table`. Must contain `table` itself.
    fn derive(&self, table: &str) -> BTreeSet<String>;
}

/// Default strategy: normalized name, configured prefixes stripped, and the
/// singular and plural forms of the last word of each variant.
///
/// `tbl_policies` -> `tbl_policies`, `tbl_policy`, `policies`, `policy`
#[derive(Debug, Clone, Default)]
pub struct AffixAliasStrategy {
    strip_prefixes: Vec<String>,
}

impl AffixAliasStrategy {
    pub fn new(strip_prefixes: Vec<String>) -> Self {
        Self { strip_prefixes }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(config.strip_prefixes.clone())
    }
}

impl AliasStrategy for AffixAliasStrategy {
    fn derive(&self, table: &str) -> BTreeSet<String> {
        let mut aliases = BTreeSet::new();
        aliases.insert(table.to_string());

        let normalized = normalize_identifier(table);
        if normalized.is_empty() {
            return aliases;
        }

        let mut bases = vec![normalized.clone()];
        for prefix in &self.strip_prefixes {
            if let Some(rest) = normalized.strip_prefix(prefix.as_str()) {
                if rest.len() >= 2 {
                    bases.push(rest.to_string());
                }
            }
        }

        for base in bases {
            let singular = map_last_word(&base, singularize);
            let plural = map_last_word(&singular, pluralize);
            aliases.insert(base);
            aliases.insert(singular);
            aliases.insert(plural);
        }
        aliases
    }
}

fn map_last_word(name: &str, f: fn(&str) -> String) -> String {
    match name.rsplit_once('_') {
        Some((head, last)) => format!("{}_{}", head, f(last)),
        None => f(name),
    }
}

/// English singular of a lowercase word; words that do not look plural are
/// returned unchanged
pub fn singularize(word: &str) -> String {
    if word.len() < 3 {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix("ies") {
        if stem.len() >= 2 {
            return format!("{}y", stem);
        }
    }
    for suffix in ["sses", "xes", "ches", "shes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    // statuses, bonuses; but not houses, courses
    if word.len() >= 6 && word.ends_with("uses") {
        let bytes = word.as_bytes();
        let consonant = bytes[bytes.len() - 5];
        let vowel = bytes[bytes.len() - 6];
        if !is_vowel(consonant) && is_vowel(vowel) && vowel != b'u' {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    match word.strip_suffix('s') {
        Some(stem) => stem.to_string(),
        None => word.to_string(),
    }
}

/// English plural of a lowercase singular word
pub fn pluralize(word: &str) -> String {
    if word.len() < 3 || word.chars().all(|c| c.is_ascii_digit()) {
        return word.to_string();
    }
    let bytes = word.as_bytes();
    let last = bytes[bytes.len() - 1];
    let before = bytes[bytes.len() - 2];
    if last == b'y' && !is_vowel(before) {
        return format!("{}ies", &word[..word.len() - 1]);
    }
    if matches!(last, b's' | b'x' | b'z') || word.ends_with("ch") || word.ends_with("sh") {
        return format!("{}es", word);
    }
    format!("{}s", word)
}

fn is_vowel(b: u8) -> bool {
    matches!(b, b'a' | b'e' | b'i' | b'o' | b'u')
}
