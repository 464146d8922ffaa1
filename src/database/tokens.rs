// Token association storage, lookup and transactional updates

use super::*;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::error::RegistryError;
use crate::index::{ColumnRef, IndexDelta, TokenIndex, normalize_needle};

/// Escape `%`, `_` and `\` so a needle matches literally inside a LIKE pattern
pub fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl IndexDatabase {
    /// Tables whose alias tokens contain `token`
    pub fn find_tables_by_token(&self, token: &str) -> Result<BTreeSet<String>> {
        let needle = normalize_needle(token);
        if needle.is_empty() {
            return Ok(BTreeSet::new());
        }

        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT table_name FROM alias_index
             WHERE token LIKE '%' || ?1 || '%' ESCAPE '\\'",
        )?;
        let rows = stmt.query_map([escape_like(&needle)], |row| row.get::<_, String>(0))?;

        let mut tables = BTreeSet::new();
        for row in rows {
            tables.insert(row?);
        }
        Ok(tables)
    }

    /// `(table, column)` pairs whose column tokens contain `token`
    pub fn find_columns_by_token(&self, token: &str) -> Result<BTreeSet<ColumnRef>> {
        let needle = normalize_needle(token);
        if needle.is_empty() {
            return Ok(BTreeSet::new());
        }

        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT table_name, column_name FROM column_index
             WHERE token LIKE '%' || ?1 || '%' ESCAPE '\\'",
        )?;
        let rows = stmt.query_map([escape_like(&needle)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut pairs = BTreeSet::new();
        for row in rows {
            pairs.insert(row?);
        }
        Ok(pairs)
    }

    /// Read the whole persisted index back into memory
    pub fn load_index(&self) -> Result<TokenIndex> {
        let mut index = TokenIndex::new();

        let mut stmt = self
            .conn
            .prepare("SELECT token, table_name FROM alias_index")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (token, table) = row?;
            index.insert_alias(&token, &table);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT token, table_name, column_name FROM column_index")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (token, table, column) = row?;
            index.insert_column(&token, &table, &column);
        }

        Ok(index)
    }

    pub fn registry_version(&self) -> Result<u64> {
        read_version(&self.conn)
    }

    /// Apply `delta` and run `persist` inside one transaction.
    ///
    /// `persist` writes the registry file the delta belongs to. If it fails the
    /// transaction is rolled back, so the index never runs ahead of the
    /// registry. With `expected` set, the write is refused with
    /// [`RegistryError::StaleRegistry`] when another writer has moved the
    /// version since the caller loaded its registry. Returns the new version.
    pub fn apply_delta_with<F>(
        &mut self,
        expected: Option<u64>,
        delta: &IndexDelta,
        persist: F,
    ) -> Result<u64>
    where
        F: FnOnce() -> Result<()>,
    {
        let tx = self.begin_write(expected)?;

        write_delta(&tx, delta)?;
        let version = bump_version(&tx)?;
        persist()?;

        tx.commit()?;
        debug!(
            "Applied index delta (+{} -{} alias, +{} -{} column) at version {}",
            delta.added_aliases.len(),
            delta.removed_aliases.len(),
            delta.added_columns.len(),
            delta.removed_columns.len(),
            version
        );
        Ok(version)
    }

    /// Replace the stored index with `index`, running `persist` and checking
    /// `expected` the same way [`apply_delta_with`](Self::apply_delta_with) does
    pub fn rebuild_with<F>(
        &mut self,
        expected: Option<u64>,
        index: &TokenIndex,
        persist: F,
    ) -> Result<u64>
    where
        F: FnOnce() -> Result<()>,
    {
        let tx = self.begin_write(expected)?;

        tx.execute("DELETE FROM alias_index", [])?;
        tx.execute("DELETE FROM column_index", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO alias_index (token, table_name) VALUES (?1, ?2)",
            )?;
            for (token, table) in index.alias_pairs() {
                stmt.execute(params![token, table])?;
            }

            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO column_index (token, table_name, column_name)
                 VALUES (?1, ?2, ?3)",
            )?;
            for (token, table, column) in index.column_triples() {
                stmt.execute(params![token, table, column])?;
            }
        }
        let version = bump_version(&tx)?;
        persist()?;

        tx.commit()?;
        info!(
            "Rebuilt token index: {} alias and {} column associations (version {})",
            index.alias_len(),
            index.column_len(),
            version
        );
        Ok(version)
    }
}

impl IndexDatabase {
    /// Take the write lock up front so the version check and the write see
    /// the same state
    fn begin_write(&mut self, expected: Option<u64>) -> Result<Transaction<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Some(expected) = expected {
            let found = read_version(&tx)?;
            if found != expected {
                debug!(
                    "Refusing index write: version moved from {} to {}",
                    expected, found
                );
                return Err(RegistryError::StaleRegistry { expected, found });
            }
        }
        Ok(tx)
    }
}

fn read_version(conn: &Connection) -> Result<u64> {
    let version: Option<i64> = conn
        .query_row(
            "SELECT value FROM registry_meta WHERE key = ?1",
            [REGISTRY_VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version.unwrap_or(0).max(0) as u64)
}

fn write_delta(tx: &Transaction<'_>, delta: &IndexDelta) -> Result<()> {
    let mut stmt = tx.prepare_cached("DELETE FROM alias_index WHERE token = ?1 AND table_name = ?2")?;
    for (token, table) in &delta.removed_aliases {
        stmt.execute(params![token, table])?;
    }

    let mut stmt = tx.prepare_cached(
        "DELETE FROM column_index WHERE token = ?1 AND table_name = ?2 AND column_name = ?3",
    )?;
    for (token, table, column) in &delta.removed_columns {
        stmt.execute(params![token, table, column])?;
    }

    let mut stmt =
        tx.prepare_cached("INSERT OR IGNORE INTO alias_index (token, table_name) VALUES (?1, ?2)")?;
    for (token, table) in &delta.added_aliases {
        stmt.execute(params![token, table])?;
    }

    let mut stmt = tx.prepare_cached(
        "INSERT OR IGNORE INTO column_index (token, table_name, column_name) VALUES (?1, ?2, ?3)",
    )?;
    for (token, table, column) in &delta.added_columns {
        stmt.execute(params![token, table, column])?;
    }

    Ok(())
}

fn bump_version(tx: &Transaction<'_>) -> Result<u64> {
    tx.execute(
        "UPDATE registry_meta SET value = value + 1 WHERE key = ?1",
        [REGISTRY_VERSION_KEY],
    )?;
    let version: i64 = tx.query_row(
        "SELECT value FROM registry_meta WHERE key = ?1",
        [REGISTRY_VERSION_KEY],
        |row| row.get(0),
    )?;
    Ok(version.max(0) as u64)
}
