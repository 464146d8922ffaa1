//! Tests for the schema store (src/ddl/schema.rs).

#[cfg(test)]
mod tests {
    use crate::ddl::{SchemaStore, TableSchema};

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_schema_map_json_keeps_extractor_order() {
        let store: SchemaStore = [
            TableSchema::new("zeta", cols(&["z1", "z2"])),
            TableSchema::new("alpha", cols(&["a1"])),
            TableSchema::new("mid", Vec::new()),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&store).unwrap();
        assert_eq!(json, r#"{"zeta":["z1","z2"],"alpha":["a1"],"mid":[]}"#);

        let back: SchemaStore = serde_json::from_str(&json).unwrap();
        let names: Vec<&str> = back.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(back, store);
    }

    #[test]
    fn test_reinsert_replaces_in_place() {
        let mut store = SchemaStore::new();
        assert!(store.insert(TableSchema::new("a", cols(&["x"]))).is_none());
        store.insert(TableSchema::new("b", cols(&["y"])));

        let replaced = store.insert(TableSchema::new("a", cols(&["x", "w"]))).unwrap();
        assert_eq!(replaced.columns, cols(&["x"]));
        assert_eq!(store.len(), 2);
        assert_eq!(store.iter().next().unwrap().columns, cols(&["x", "w"]));
    }

    #[test]
    fn test_schema_map_rejects_non_map_json() {
        assert!(serde_json::from_str::<SchemaStore>(r#"["a", "b"]"#).is_err());
    }
}
