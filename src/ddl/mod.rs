//! DDL processing: statement scanning, table extraction and the schema store.

pub mod extractor;
pub mod scanner;
pub mod schema;

use serde::Serialize;
use std::ops::Range;
use tracing::{debug, warn};

pub use extractor::{extract, parse_create_table};
pub use scanner::{scan, Scanner, SkipReason, Statement, StatementKind};
pub use schema::{SchemaStore, TableSchema};

/// A statement that was recorded and set aside during extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedStatement {
    pub index: usize,
    pub span: Range<usize>,
    pub reason: SkipReason,
}

/// Outcome of running scanner + extractor over a whole script
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionReport {
    pub statements: usize,
    pub tables: usize,
    pub skipped: Vec<SkippedStatement>,
    /// Table names defined more than once; the last definition was kept
    pub duplicates: Vec<String>,
    /// `TABLE_DEF` statements that had no usable column list
    pub unparsed_tables: usize,
}

/// Scan `ddl` and collect every `CREATE TABLE` into a schema store
pub fn extract_schema(ddl: &str) -> (SchemaStore, ExtractionReport) {
    let mut store = SchemaStore::new();
    let mut report = ExtractionReport::default();

    for statement in scan(ddl) {
        if statement.is_blank() && statement.skip_reason().is_none() {
            continue;
        }
        report.statements += 1;

        if let Some(reason) = statement.skip_reason() {
            if reason == SkipReason::Routine {
                debug!("Skipping routine body at statement {}", statement.index);
            } else {
                warn!(
                    "Skipping statement {} (bytes {}..{}): {:?}",
                    statement.index, statement.span.start, statement.span.end, reason
                );
            }
            report.skipped.push(SkippedStatement {
                index: statement.index,
                span: statement.span.clone(),
                reason,
            });
            continue;
        }

        if !statement.is_table_def() {
            continue;
        }

        match extract(&statement) {
            Some(table) => {
                let name = table.name.clone();
                if store.insert(table).is_some() {
                    warn!("Table '{}' defined more than once, keeping the last definition", name);
                    if !report.duplicates.contains(&name) {
                        report.duplicates.push(name);
                    }
                }
            }
            None => report.unparsed_tables += 1,
        }
    }

    report.tables = store.len();
    (store, report)
}
