//! `CREATE TABLE` column extraction.
//!
//! Works on the comment-free statement text produced by the scanner and keeps
//! its own nesting and quote tracking, so commas inside type parameters such
//! as `NUMERIC(12,2)` never split a column definition.

use tracing::debug;

use super::scanner::{Statement, backslash_escape};
use super::schema::TableSchema;

/// Leading keywords of table-level constraint entries
const CONSTRAINT_KEYWORDS: &[&str] = &[
    "PRIMARY",
    "FOREIGN",
    "UNIQUE",
    "CHECK",
    "CONSTRAINT",
    "KEY",
    "INDEX",
    "EXCLUDE",
    "LIKE",
    "FULLTEXT",
    "SPATIAL",
    "PERIOD",
];

/// Extract the table schema from a `TABLE_DEF` statement. Any other kind of
/// statement, or a table definition without a column list, yields `None`.
pub fn extract(statement: &Statement<'_>) -> Option<TableSchema> {
    if !statement.is_table_def() {
        return None;
    }
    let table = parse_create_table(&statement.text);
    if table.is_none() {
        debug!(
            "Statement {} looks like CREATE TABLE but has no parsable column list",
            statement.index
        );
    }
    table
}

/// Parse `CREATE [modifiers] TABLE [IF NOT EXISTS] name ( ... )`
pub fn parse_create_table(text: &str) -> Option<TableSchema> {
    let mut cursor = Cursor::new(text);
    if !cursor.eat_keyword("CREATE") {
        return None;
    }
    // OR REPLACE, TEMPORARY, UNLOGGED, GLOBAL, ...
    let mut guard = 0;
    while !cursor.eat_keyword("TABLE") {
        cursor.read_word()?;
        guard += 1;
        if guard > 6 {
            return None;
        }
    }
    if cursor.eat_keyword("IF") && !(cursor.eat_keyword("NOT") && cursor.eat_keyword("EXISTS")) {
        return None;
    }

    let name = cursor.read_qualified_name()?;
    cursor.skip_ws();
    if cursor.peek() != Some(b'(') {
        // CREATE TABLE ... AS SELECT, PARTITION OF, ...
        return None;
    }
    cursor.pos += 1;

    let body = cursor.rest();
    let entries = split_column_list(body)?;
    let mut columns: Vec<String> = Vec::new();
    for entry in entries {
        if let Some(column) = column_name(entry) {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
    }

    Some(TableSchema::new(name, columns))
}

/// Split the body following the list's opening parenthesis into its
/// top-level comma separated entries. Returns `None` when the closing
/// parenthesis is missing.
fn split_column_list(body: &str) -> Option<Vec<&str>> {
    let bytes = body.as_bytes();
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut e_string = false;
    let mut entry_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(close) = quote {
            if b == b'\\' && close == b'\'' && (e_string || backslash_escape(bytes, i)) {
                i += 2;
                continue;
            }
            if b == close {
                if bytes.get(i + 1) == Some(&close) {
                    i += 2;
                    continue;
                }
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' => {
                e_string = i > 0
                    && matches!(bytes[i - 1], b'E' | b'e')
                    && (i == 1 || !(bytes[i - 2].is_ascii_alphanumeric() || bytes[i - 2] == b'_'));
                quote = Some(b);
            }
            b'"' | b'`' => quote = Some(b),
            b'[' => quote = Some(b']'),
            b'(' => depth += 1,
            b')' if depth == 0 => {
                entries.push(&body[entry_start..i]);
                return Some(entries);
            }
            b')' => depth -= 1,
            b',' if depth == 0 => {
                entries.push(&body[entry_start..i]);
                entry_start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Column name of one list entry, or `None` for constraints and blanks
fn column_name(entry: &str) -> Option<String> {
    let mut cursor = Cursor::new(entry);
    cursor.skip_ws();
    match cursor.peek()? {
        b'"' | b'`' | b'[' => cursor.read_identifier(),
        _ => {
            let word = cursor.read_word()?;
            if CONSTRAINT_KEYWORDS
                .iter()
                .any(|kw| word.eq_ignore_ascii_case(kw))
            {
                None
            } else {
                Some(word.to_lowercase())
            }
        }
    }
}

/// Strip surrounding quotes or brackets and collapse doubled closers
pub fn unquote_identifier(raw: &str) -> String {
    let raw = raw.trim();
    let (open, close) = match raw.as_bytes().first() {
        Some(b'"') => ('"', '"'),
        Some(b'`') => ('`', '`'),
        Some(b'[') => ('[', ']'),
        _ => return raw.to_string(),
    };
    let inner = raw.strip_prefix(open).unwrap_or(raw);
    let inner = inner.strip_suffix(close).unwrap_or(inner);
    let doubled: String = [close, close].iter().collect();
    inner.replace(&doubled, &close.to_string())
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn rest(&self) -> &'a str {
        let src: &'a str = self.src;
        &src[self.pos..]
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Read a bare word (letters, digits, `_`, `$` and non-ASCII)
    fn read_word(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80)
        {
            self.pos += 1;
        }
        let src: &'a str = self.src;
        let end = self.pos;
        (end > start).then(|| &src[start..end])
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let saved = self.pos;
        match self.read_word() {
            Some(word) if word.eq_ignore_ascii_case(keyword) => true,
            _ => {
                self.pos = saved;
                false
            }
        }
    }

    /// Read one identifier part: bare, "quoted", `backticked` or [bracketed]
    fn read_identifier(&mut self) -> Option<String> {
        self.skip_ws();
        let close = match self.peek()? {
            b'"' => b'"',
            b'`' => b'`',
            b'[' => b']',
            _ => return self.read_word().map(|w| w.to_lowercase()),
        };
        let start = self.pos;
        let bytes = self.src.as_bytes();
        let mut i = self.pos + 1;
        while i < bytes.len() {
            if bytes[i] == close {
                if bytes.get(i + 1) == Some(&close) {
                    i += 2;
                    continue;
                }
                self.pos = i + 1;
                let name = unquote_identifier(&self.src[start..self.pos]);
                return (!name.is_empty()).then(|| name.to_lowercase());
            }
            i += 1;
        }
        None
    }

    /// Read `schema.table` style names, keeping only the last part
    fn read_qualified_name(&mut self) -> Option<String> {
        let mut name = self.read_identifier()?;
        loop {
            self.skip_ws();
            if self.peek() != Some(b'.') {
                return Some(name);
            }
            self.pos += 1;
            name = self.read_identifier()?;
        }
    }
}
