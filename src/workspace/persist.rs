// Artifact file I/O with atomic replacement

use std::fs;
use std::path::Path;
use tracing::debug;

use crate::ddl::SchemaStore;
use crate::error::Result;
use crate::registry::Registry;

/// Write `contents` to `<path>.tmp`, then rename over `path`
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let temp_path = path.with_extension(temp_extension(path));
    fs::write(&temp_path, contents)?;

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    debug!("Wrote {} ({} bytes)", path.display(), contents.len());
    Ok(())
}

fn temp_extension(path: &Path) -> String {
    match path.extension() {
        Some(ext) => format!("{}.tmp", ext.to_string_lossy()),
        None => "tmp".to_string(),
    }
}

pub fn write_schema(path: &Path, schema: &SchemaStore) -> Result<()> {
    let mut contents = serde_json::to_string_pretty(schema)?;
    contents.push('\n');
    write_atomic(path, &contents)
}

pub fn write_registry(path: &Path, registry: &Registry) -> Result<()> {
    write_atomic(path, &registry.to_ndjson()?)
}

/// A missing schema map reads as an empty store
pub fn read_schema(path: &Path) -> Result<SchemaStore> {
    if !path.exists() {
        return Ok(SchemaStore::new());
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn read_registry(path: &Path) -> Result<Registry> {
    let contents = fs::read_to_string(path)?;
    Registry::from_ndjson(&contents)
}
