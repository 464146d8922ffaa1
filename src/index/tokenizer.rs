//! Identifier-aware tokenization for the token index.
//!
//! Understands the naming conventions found in schemas:
//! - Splits snake_case and other separator-delimited names into words
//! - Splits CamelCase into component words (optional)
//! - Keeps the whole normalized identifier for exact matching
//! - Drops short tokens and pure digits

use std::collections::HashSet;
use std::sync::LazyLock;

use crate::config::RegistryConfig;

static DEFAULT_TOKENIZER: LazyLock<Tokenizer> =
    LazyLock::new(|| Tokenizer::from_config(&RegistryConfig::default()));

/// Tokenize an identifier with the default settings
pub fn tokenize(identifier: &str) -> Tokens<'_> {
    DEFAULT_TOKENIZER.tokenize(identifier)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenizer {
    min_len: usize,
    split_camel_case: bool,
    stop_words: Vec<String>,
}

impl Tokenizer {
    pub fn new(min_len: usize, split_camel_case: bool) -> Self {
        Self {
            min_len,
            split_camel_case,
            stop_words: Vec::new(),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self {
            min_len: config.min_token_len,
            split_camel_case: config.split_camel_case,
            stop_words: config.stop_words.clone(),
        }
    }

    /// Tokens of an identifier: the whole normalized identifier followed by
    /// its words. Each token is produced once.
    pub fn tokenize<'a>(&'a self, identifier: &'a str) -> Tokens<'a> {
        Tokens {
            tokenizer: self,
            whole: Some(normalize_identifier(identifier)),
            words: identifier.split(is_separator as fn(char) -> bool),
            pending: Vec::new().into_iter(),
            seen: HashSet::new(),
            skip_stop_words: false,
        }
    }

    /// Tokens of free text such as a sample query: words only, stop words removed
    pub fn tokenize_text<'a>(&'a self, text: &'a str) -> Tokens<'a> {
        Tokens {
            tokenizer: self,
            whole: None,
            words: text.split(is_separator as fn(char) -> bool),
            pending: Vec::new().into_iter(),
            seen: HashSet::new(),
            skip_stop_words: true,
        }
    }

    fn accepts(&self, token: &str) -> bool {
        token.chars().count() >= self.min_len && !token.chars().all(|c| c.is_ascii_digit())
    }

    fn split_word(&self, word: &str) -> Vec<String> {
        let mut parts = vec![word.to_lowercase()];
        if self.split_camel_case
            && word.chars().any(|c| c.is_uppercase())
            && word.chars().any(|c| c.is_lowercase())
        {
            parts.extend(split_camel_case(word).into_iter().map(|p| p.to_lowercase()));
        }
        parts
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        DEFAULT_TOKENIZER.clone()
    }
}

/// Lazy token sequence produced by [`Tokenizer::tokenize`]
pub struct Tokens<'a> {
    tokenizer: &'a Tokenizer,
    whole: Option<String>,
    words: std::str::Split<'a, fn(char) -> bool>,
    pending: std::vec::IntoIter<String>,
    seen: HashSet<String>,
    skip_stop_words: bool,
}

impl Iterator for Tokens<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let candidate = if let Some(whole) = self.whole.take() {
                whole
            } else if let Some(part) = self.pending.next() {
                part
            } else {
                let word = self.words.next()?;
                if !word.is_empty() {
                    self.pending = self.tokenizer.split_word(word).into_iter();
                }
                continue;
            };

            if !self.tokenizer.accepts(&candidate) {
                continue;
            }
            if self.skip_stop_words && self.tokenizer.stop_words.contains(&candidate) {
                continue;
            }
            if self.seen.insert(candidate.clone()) {
                return Some(candidate);
            }
        }
    }
}

fn is_separator(c: char) -> bool {
    !c.is_alphanumeric()
}

/// Lowercase, map separators to `_` and trim leading/trailing `_`
pub fn normalize_identifier(s: &str) -> String {
    let mapped: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .to_lowercase();
    mapped.trim_matches('_').to_string()
}

/// Normalize a lookup needle the way identifiers are normalized
pub fn normalize_needle(token: &str) -> String {
    token.trim().to_lowercase().replace(' ', "_")
}

/// All words of an identifier, lowercased, without any filtering
pub fn identifier_words(s: &str) -> Vec<String> {
    s.split(is_separator)
        .filter(|w| !w.is_empty())
        .flat_map(split_camel_case)
        .map(|w| w.to_lowercase())
        .collect()
}

/// Split a CamelCase or PascalCase identifier into words.
///
/// Handles transitions like:
/// - `PolicyHolder` -> `["Policy", "Holder"]`
/// - `XMLImport` -> `["XML", "Import"]`
/// - `getHTTPStatus` -> `["get", "HTTP", "Status"]`
pub fn split_camel_case(s: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut start = 0;
    let chars: Vec<char> = s.chars().collect();

    for i in 1..chars.len() {
        let prev = chars[i - 1];
        let curr = chars[i];
        let split_before_upper = prev.is_lowercase() && curr.is_uppercase();
        let split_acronym =
            i >= 2 && chars[i - 2].is_uppercase() && prev.is_uppercase() && curr.is_lowercase();

        if split_before_upper || split_acronym {
            let split_pos = if split_acronym { i - 1 } else { i };
            if split_pos > start {
                let byte_start: usize = chars[..start].iter().map(|c| c.len_utf8()).sum();
                let byte_end: usize = chars[..split_pos].iter().map(|c| c.len_utf8()).sum();
                result.push(&s[byte_start..byte_end]);
                start = split_pos;
            }
        }
    }

    if start < chars.len() {
        let byte_start: usize = chars[..start].iter().map(|c| c.len_utf8()).sum();
        result.push(&s[byte_start..]);
    }

    result
}
