// Token index schema creation

use super::*;
use tracing::debug;

impl IndexDatabase {
    pub(super) fn initialize_schema(&mut self) -> Result<()> {
        debug!("Creating token index schema");

        self.create_alias_index_table()?;
        self.create_column_index_table()?;
        self.create_registry_meta_table()?;

        debug!("Token index schema created successfully");
        Ok(())
    }

    fn create_alias_index_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS alias_index (
                token TEXT NOT NULL,
                table_name TEXT NOT NULL,
                UNIQUE(token, table_name)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_alias_index_token ON alias_index(token)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_alias_index_table ON alias_index(table_name)",
            [],
        )?;

        debug!("Created alias_index table and indexes");
        Ok(())
    }

    fn create_column_index_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS column_index (
                token TEXT NOT NULL,
                table_name TEXT NOT NULL,
                column_name TEXT NOT NULL,
                UNIQUE(token, table_name, column_name)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_column_index_token ON column_index(token)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_column_index_table ON column_index(table_name)",
            [],
        )?;

        debug!("Created column_index table and indexes");
        Ok(())
    }

    fn create_registry_meta_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS registry_meta (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO registry_meta (key, value) VALUES (?1, 0)",
            [REGISTRY_VERSION_KEY],
        )?;

        Ok(())
    }
}
