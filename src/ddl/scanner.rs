//! Top-level statement scanner for DDL scripts.
//!
//! Splits a script into statements on semicolons that sit outside of quotes,
//! dollar-quoted bodies and parentheses. Comments are stripped from the
//! statement text handed to the extractor, except inside dollar-quoted
//! bodies, which are opaque. The scanner is total: every byte of the input
//! belongs to exactly one statement, and malformed tails become a single
//! `Skipped` statement instead of an error.

use serde::Serialize;
use std::ops::Range;

/// Why a statement was set aside instead of being parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `CREATE FUNCTION` / `CREATE PROCEDURE` / `CREATE TRIGGER` and its body
    Routine,
    /// Input ended inside a `$tag$ ... $tag$` block
    UnterminatedDollarQuote,
    /// Input ended inside a quoted string or identifier
    UnterminatedQuote,
    /// Input ended with open parentheses, or a `)` had no matching `(`
    UnbalancedParens,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    TableDef,
    Other,
    Skipped(SkipReason),
}

/// One top-level statement of a script
#[derive(Debug, Clone)]
pub struct Statement<'a> {
    /// Position of the statement in the script, starting at 0
    pub index: usize,
    /// Byte range in the original script, terminator included
    pub span: Range<usize>,
    /// The original text covered by `span`
    pub raw: &'a str,
    /// Statement text with comments replaced by a space, terminator excluded
    pub text: String,
    pub kind: StatementKind,
}

impl Statement<'_> {
    pub fn is_table_def(&self) -> bool {
        self.kind == StatementKind::TableDef
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self.kind {
            StatementKind::Skipped(reason) => Some(reason),
            _ => None,
        }
    }

    /// True when the statement holds nothing but whitespace and comments
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Scan `text` into statements. The returned iterator is lazy, finite and
/// can be cloned to restart from its current position.
pub fn scan(text: &str) -> Scanner<'_> {
    Scanner {
        src: text,
        pos: 0,
        index: 0,
    }
}

#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    index: usize,
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Statement<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.src.len() {
            return None;
        }
        let statement = StatementScan::new(self.src, self.pos).run(self.index);
        debug_assert!(statement.span.end > self.pos);
        self.pos = statement.span.end;
        self.index += 1;
        Some(statement)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Code,
    SingleQuote { escapes: bool },
    DoubleQuote,
    Backtick,
    Bracket,
    LineComment,
    BlockComment(usize),
    /// Inside a dollar-quoted body; the range locates the opening `$tag$`
    Dollar(Range<usize>),
}

/// What the leading keywords say about the statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Head {
    Unknown,
    Create,
    Table,
    Routine,
    Other,
}

const HEAD_WORD_LIMIT: usize = 8;

const ROUTINE_OBJECTS: &[&str] = &["FUNCTION", "PROCEDURE", "PROC", "TRIGGER"];

const OTHER_OBJECTS: &[&str] = &[
    "VIEW",
    "INDEX",
    "SEQUENCE",
    "TYPE",
    "SCHEMA",
    "EXTENSION",
    "DATABASE",
    "DOMAIN",
    "MATERIALIZED",
    "ROLE",
    "USER",
    "POLICY",
    "RULE",
    "AGGREGATE",
    "OPERATOR",
    "CAST",
    "SERVER",
    "PUBLICATION",
    "SUBSCRIPTION",
];

/// Words after `END` that close a construct other than a `BEGIN`/`CASE` block
const END_QUALIFIERS: &[&str] = &["IF", "LOOP", "WHILE", "REPEAT", "FOR"];

/// Scanning state for a single statement
struct StatementScan<'a> {
    src: &'a str,
    bytes: &'a [u8],
    start: usize,
    mode: Mode,
    depth: usize,
    stray_close: bool,
    head: Head,
    head_words: usize,
    block_depth: usize,
    /// The previous word of a routine was `END`
    after_end: bool,
    text: String,
    segment_start: usize,
}

impl<'a> StatementScan<'a> {
    fn new(src: &'a str, start: usize) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            start,
            mode: Mode::Code,
            depth: 0,
            stray_close: false,
            head: Head::Unknown,
            head_words: 0,
            block_depth: 0,
            after_end: false,
            text: String::new(),
            segment_start: start,
        }
    }

    fn run(mut self, index: usize) -> Statement<'a> {
        let len = self.bytes.len();
        let mut i = self.start;

        while i < len {
            let mode = std::mem::replace(&mut self.mode, Mode::Code);
            match mode {
                Mode::Code => match self.step_code(i) {
                    Step::Advance(next) => i = next,
                    Step::Terminate { text_end, span_end } => {
                        self.flush(text_end);
                        return self.finish(index, span_end, true);
                    }
                },
                Mode::SingleQuote { escapes } => {
                    i = self.step_quote(i, b'\'', escapes, Mode::SingleQuote { escapes })
                }
                Mode::DoubleQuote => i = self.step_quote(i, b'"', false, Mode::DoubleQuote),
                Mode::Backtick => i = self.step_quote(i, b'`', false, Mode::Backtick),
                Mode::Bracket => i = self.step_quote(i, b']', false, Mode::Bracket),
                Mode::LineComment => match self.src[i..].find('\n') {
                    Some(offset) => {
                        i += offset;
                        self.segment_start = i;
                    }
                    None => {
                        self.mode = Mode::LineComment;
                        i = len;
                    }
                },
                Mode::BlockComment(nesting) => {
                    if self.bytes[i] == b'*' && self.peek(i + 1) == Some(b'/') {
                        i += 2;
                        if nesting == 1 {
                            self.segment_start = i;
                        } else {
                            self.mode = Mode::BlockComment(nesting - 1);
                        }
                    } else if self.bytes[i] == b'/' && self.peek(i + 1) == Some(b'*') {
                        self.mode = Mode::BlockComment(nesting + 1);
                        i += 2;
                    } else {
                        self.mode = Mode::BlockComment(nesting);
                        i += 1;
                    }
                }
                Mode::Dollar(tag) => {
                    let src: &'a str = self.src;
                    let delimiter = &src[tag.clone()];
                    match src[i..].find(delimiter) {
                        Some(offset) => i += offset + delimiter.len(),
                        None => {
                            self.mode = Mode::Dollar(tag);
                            i = len;
                        }
                    }
                }
            }
        }

        if !matches!(self.mode, Mode::LineComment | Mode::BlockComment(_)) {
            self.flush(len);
        }
        self.finish(index, len, false)
    }

    fn step_code(&mut self, i: usize) -> Step {
        let b = self.bytes[i];
        match b {
            b'\'' => {
                let escapes = i > self.start
                    && matches!(self.bytes[i - 1], b'E' | b'e')
                    && (i - 1 == self.start || !is_word_byte(self.bytes[i - 2]));
                self.mode = Mode::SingleQuote { escapes };
                Step::Advance(i + 1)
            }
            b'"' => {
                self.mode = Mode::DoubleQuote;
                Step::Advance(i + 1)
            }
            b'`' => {
                self.mode = Mode::Backtick;
                Step::Advance(i + 1)
            }
            b'[' => {
                self.mode = Mode::Bracket;
                Step::Advance(i + 1)
            }
            b'-' if self.peek(i + 1) == Some(b'-') => {
                self.flush(i);
                self.text.push(' ');
                self.mode = Mode::LineComment;
                Step::Advance(i + 2)
            }
            b'/' if self.peek(i + 1) == Some(b'*') => {
                self.flush(i);
                self.text.push(' ');
                self.mode = Mode::BlockComment(1);
                Step::Advance(i + 2)
            }
            b'$' => match self.dollar_tag(i) {
                Some(end) => {
                    self.mode = Mode::Dollar(i..end);
                    Step::Advance(end)
                }
                None => Step::Advance(i + 1),
            },
            b'(' => {
                self.depth += 1;
                Step::Advance(i + 1)
            }
            b')' => {
                if self.depth == 0 {
                    self.stray_close = true;
                } else {
                    self.depth -= 1;
                }
                Step::Advance(i + 1)
            }
            b';' if self.depth == 0 && self.block_depth == 0 => Step::Terminate {
                text_end: i,
                span_end: i + 1,
            },
            _ if is_word_start(b) && (i == self.start || !is_word_byte(self.bytes[i - 1])) => {
                let src = self.src;
                let end = self.word_end(i);
                let word = &src[i..end];
                if word.eq_ignore_ascii_case("GO") && self.depth == 0 && self.is_batch_separator(i, end) {
                    let span_end = match self.src[end..].find('\n') {
                        Some(offset) => end + offset + 1,
                        None => self.bytes.len(),
                    };
                    return Step::Terminate {
                        text_end: i,
                        span_end,
                    };
                }
                self.note_word(word, end);
                Step::Advance(end)
            }
            _ => Step::Advance(i + 1),
        }
    }

    /// Advance inside a quoted string or identifier closed by `close`.
    /// A doubled closing character is an escaped literal, not a close.
    fn step_quote(&mut self, i: usize, close: u8, escapes: bool, current: Mode) -> usize {
        let b = self.bytes[i];
        if b == b'\\' && close == b'\'' && (escapes || backslash_escape(self.bytes, i)) {
            self.mode = current;
            return (i + 2).min(self.bytes.len());
        }
        if b == close {
            if self.peek(i + 1) == Some(close) {
                self.mode = current;
                return i + 2;
            }
            return i + 1;
        }
        self.mode = current;
        i + 1
    }

    /// Recognize an opening `$tag$` at `i`, returning the index just past it
    fn dollar_tag(&self, i: usize) -> Option<usize> {
        if i > self.start && is_word_byte(self.bytes[i - 1]) {
            return None;
        }
        let mut j = i + 1;
        match self.peek(j) {
            Some(b'$') => return Some(j + 1),
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => {}
            _ => return None,
        }
        while let Some(c) = self.peek(j) {
            if c.is_ascii_alphanumeric() || c == b'_' {
                j += 1;
            } else {
                break;
            }
        }
        (self.peek(j) == Some(b'$')).then_some(j + 1)
    }

    fn word_end(&self, i: usize) -> usize {
        let mut end = i;
        while end < self.bytes.len() && is_word_byte(self.bytes[end]) {
            end += 1;
        }
        end
    }

    fn next_word(&self, from: usize) -> Option<&'a str> {
        let src: &'a str = self.src;
        let i = self.skip_ws(from);
        if i < self.bytes.len() && is_word_start(self.bytes[i]) {
            Some(&src[i..self.word_end(i)])
        } else {
            None
        }
    }

    /// `GO` only separates batches when it stands alone on its line
    fn is_batch_separator(&self, start: usize, end: usize) -> bool {
        let line_before = self.src[..start]
            .rsplit('\n')
            .next()
            .unwrap_or_default();
        let line_after = self.src[end..].split('\n').next().unwrap_or_default();
        line_before.trim().is_empty() && line_after.trim().is_empty()
    }

    fn note_word(&mut self, word: &str, end: usize) {
        match self.head {
            Head::Unknown => {
                self.head = if word.eq_ignore_ascii_case("CREATE") {
                    Head::Create
                } else {
                    Head::Other
                };
            }
            Head::Create => {
                let upper = word.to_ascii_uppercase();
                if upper == "TABLE" {
                    self.head = Head::Table;
                } else if ROUTINE_OBJECTS.contains(&upper.as_str()) {
                    self.head = Head::Routine;
                } else if OTHER_OBJECTS.contains(&upper.as_str())
                    || self.head_words >= HEAD_WORD_LIMIT
                {
                    self.head = Head::Other;
                }
            }
            Head::Routine => self.track_block(word, end),
            Head::Table | Head::Other => {}
        }
        self.head_words += 1;
    }

    /// Keep `BEGIN ... END` routine bodies in one statement
    fn track_block(&mut self, word: &str, end: usize) {
        if word.eq_ignore_ascii_case("BEGIN") {
            let opens_transaction = self.next_word(end).is_some_and(|next| {
                ["TRANSACTION", "TRAN", "WORK"]
                    .iter()
                    .any(|kw| next.eq_ignore_ascii_case(kw))
            });
            if !opens_transaction {
                self.block_depth += 1;
            }
        } else if word.eq_ignore_ascii_case("CASE") {
            // `END CASE` closes the block the END already counted
            if !self.after_end {
                self.block_depth += 1;
            }
        } else if word.eq_ignore_ascii_case("END") {
            if !self.closes_construct(end) {
                self.block_depth = self.block_depth.saturating_sub(1);
            }
        }
        self.after_end = word.eq_ignore_ascii_case("END");
    }

    /// `END IF;`, `END LOOP label;` and friends close a construct that never
    /// opened a block. The qualifier only counts when the statement ends
    /// right after it, so T-SQL's `END` followed by a fresh `IF` still closes.
    fn closes_construct(&self, end: usize) -> bool {
        let Some(qualifier) = self.next_word(end) else {
            return false;
        };
        if !END_QUALIFIERS.iter().any(|kw| qualifier.eq_ignore_ascii_case(kw)) {
            return false;
        }
        let mut i = self.skip_ws(end) + qualifier.len();
        if let Some(label) = self.next_word(i) {
            i = self.skip_ws(i) + label.len();
        }
        let i = self.skip_ws(i);
        i >= self.bytes.len() || self.bytes[i] == b';'
    }

    fn skip_ws(&self, from: usize) -> usize {
        let mut i = from;
        while i < self.bytes.len() && self.bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    }

    fn flush(&mut self, end: usize) {
        if end > self.segment_start {
            self.text.push_str(&self.src[self.segment_start..end]);
        }
        self.segment_start = end;
    }

    fn finish(self, index: usize, span_end: usize, terminated: bool) -> Statement<'a> {
        let src: &'a str = self.src;
        let unterminated = if terminated {
            None
        } else {
            match self.mode {
                Mode::Dollar(_) => Some(SkipReason::UnterminatedDollarQuote),
                Mode::SingleQuote { .. } | Mode::DoubleQuote | Mode::Backtick | Mode::Bracket => {
                    Some(SkipReason::UnterminatedQuote)
                }
                _ if self.depth > 0 => Some(SkipReason::UnbalancedParens),
                _ => None,
            }
        };

        let kind = match (unterminated, self.head) {
            (Some(reason), _) => StatementKind::Skipped(reason),
            (None, Head::Routine) => StatementKind::Skipped(SkipReason::Routine),
            (None, _) if self.stray_close || self.depth > 0 => {
                StatementKind::Skipped(SkipReason::UnbalancedParens)
            }
            (None, Head::Table) => StatementKind::TableDef,
            (None, _) => StatementKind::Other,
        };

        Statement {
            index,
            span: self.start..span_end,
            raw: &src[self.start..span_end],
            text: self.text,
            kind,
        }
    }

    fn peek(&self, i: usize) -> Option<u8> {
        self.bytes.get(i).copied()
    }
}

enum Step {
    Advance(usize),
    Terminate { text_end: usize, span_end: usize },
}

/// MySQL-style `\'` inside a plain single-quoted string.
///
/// `i` points at a backslash. `\\` is always consumed as a pair. `\'` is an
/// escaped quote unless the quote is followed by whitespace, a delimiter or
/// the end of input, in which case the backslash is a literal character and
/// the quote closes the string (`'C:\'`).
pub(crate) fn backslash_escape(bytes: &[u8], i: usize) -> bool {
    match bytes.get(i + 1) {
        Some(b'\\') => true,
        Some(b'\'') => !matches!(
            bytes.get(i + 2),
            None | Some(b',' | b')' | b';') | Some(b' ' | b'\t' | b'\r' | b'\n')
        ),
        _ => false,
    }
}

fn is_word_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}
