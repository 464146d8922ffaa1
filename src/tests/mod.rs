// tablescout test infrastructure
//
// Each file holds one `#[cfg(test)] mod tests` block, grouped by the module
// it exercises. Fixtures live under `fixtures/` at the crate root.


// ============================================================================
// DDL - scanning, extraction, schema store
// ============================================================================
pub mod ddl {
    pub mod extractor_tests;
    pub mod scanner_tests;
    pub mod schema_tests;
}


// ============================================================================
// PERSISTENCE + ENRICHMENT - SQLite store, merger, workspace handle
// ============================================================================
pub mod database_tests;

pub mod selector_tests;
