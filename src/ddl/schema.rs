// Schema store: ordered table -> columns mapping produced by the extractor

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// A table and its columns in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }
}

/// Ordered mapping from table name to schema.
///
/// Insertion order is preserved; re-inserting an existing name replaces the
/// schema in place (last definition wins, first position kept).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaStore {
    tables: Vec<TableSchema>,
    positions: HashMap<String, usize>,
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a table, returning the schema it replaced, if any
    pub fn insert(&mut self, table: TableSchema) -> Option<TableSchema> {
        match self.positions.get(&table.name) {
            Some(&pos) => Some(std::mem::replace(&mut self.tables[pos], table)),
            None => {
                self.positions.insert(table.name.clone(), self.tables.len());
                self.tables.push(table);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.positions.get(name).map(|&pos| &self.tables[pos])
    }

    pub fn columns(&self, name: &str) -> Option<&[String]> {
        self.get(name).map(|t| t.columns.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl FromIterator<TableSchema> for SchemaStore {
    fn from_iter<I: IntoIterator<Item = TableSchema>>(iter: I) -> Self {
        let mut store = SchemaStore::new();
        for table in iter {
            store.insert(table);
        }
        store
    }
}

// The schema map is persisted as a JSON object whose key order is the
// extractor order, so (de)serialization goes through the ordered Vec.

impl Serialize for SchemaStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.tables.len()))?;
        for table in &self.tables {
            map.serialize_entry(&table.name, &table.columns)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SchemaStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SchemaMapVisitor;

        impl<'de> Visitor<'de> for SchemaMapVisitor {
            type Value = SchemaStore;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of table name to column names")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<SchemaStore, M::Error> {
                let mut store = SchemaStore::new();
                while let Some((name, columns)) = access.next_entry::<String, Vec<String>>()? {
                    store.insert(TableSchema { name, columns });
                }
                Ok(store)
            }
        }

        deserializer.deserialize_map(SchemaMapVisitor)
    }
}
