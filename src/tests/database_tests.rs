//! Tests for the SQLite token index store (src/database/).

#[cfg(test)]
mod tests {
    use crate::database::{IndexDatabase, escape_like};
    use crate::error::RegistryError;
    use crate::index::{IndexDelta, TokenIndex};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn sample_index() -> TokenIndex {
        let mut index = TokenIndex::new();
        index.insert_alias("policies", "policies");
        index.insert_alias("policy", "policies");
        index.insert_alias("claims", "claims");
        index.insert_column("pol_insurerid", "policies", "pol_insurerid");
        index.insert_column("insurerid", "policies", "pol_insurerid");
        index.insert_column("clm_claimid", "claims", "clm_claimid");
        index
    }

    fn rebuild(db: &mut IndexDatabase, index: &TokenIndex) -> u64 {
        db.rebuild_with(None, index, || Ok(())).unwrap()
    }

    fn apply(db: &mut IndexDatabase, delta: &IndexDelta) -> u64 {
        db.apply_delta_with(None, delta, || Ok(())).unwrap()
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("pol_id"), "pol\\_id");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_new_database_starts_empty_at_version_zero() {
        let db = IndexDatabase::open_in_memory().unwrap();
        assert_eq!(db.registry_version().unwrap(), 0);
        assert!(db.load_index().unwrap().is_empty());
        assert!(db.find_tables_by_token("policy").unwrap().is_empty());
    }

    #[test]
    fn test_rebuild_then_load_round_trips() {
        let mut db = IndexDatabase::open_in_memory().unwrap();
        let index = sample_index();
        let version = rebuild(&mut db, &index);
        assert_eq!(version, 1);
        assert_eq!(db.load_index().unwrap(), index);
    }

    #[test]
    fn test_find_by_substring() {
        let mut db = IndexDatabase::open_in_memory().unwrap();
        rebuild(&mut db, &sample_index());

        assert_eq!(
            db.find_tables_by_token("polic").unwrap(),
            BTreeSet::from(["policies".to_string()])
        );
        assert_eq!(
            db.find_columns_by_token("InsurerId").unwrap(),
            BTreeSet::from([("policies".to_string(), "pol_insurerid".to_string())])
        );
        assert!(db.find_tables_by_token("").unwrap().is_empty());
    }

    #[test]
    fn test_underscore_in_needle_is_literal() {
        let mut db = IndexDatabase::open_in_memory().unwrap();
        let mut index = TokenIndex::new();
        index.insert_column("polxid", "policies", "polxid");
        index.insert_column("pol_id", "policies", "pol_id");
        rebuild(&mut db, &index);

        let hits = db.find_columns_by_token("pol_id").unwrap();
        assert_eq!(hits, BTreeSet::from([("policies".to_string(), "pol_id".to_string())]));
        assert!(db.find_tables_by_token("%").unwrap().is_empty());
    }

    #[test]
    fn test_apply_delta_is_idempotent() {
        let mut db = IndexDatabase::open_in_memory().unwrap();
        rebuild(&mut db, &sample_index());

        let delta = IndexDelta {
            added_aliases: vec![("coverage".to_string(), "policies".to_string())],
            ..Default::default()
        };
        apply(&mut db, &delta);
        let once = db.load_index().unwrap();
        apply(&mut db, &delta);
        assert_eq!(db.load_index().unwrap(), once);
        assert!(db.find_tables_by_token("coverage").unwrap().contains("policies"));
    }

    #[test]
    fn test_apply_delta_removes_and_bumps_version() {
        let mut db = IndexDatabase::open_in_memory().unwrap();
        rebuild(&mut db, &sample_index());

        let delta = IndexDelta {
            removed_aliases: vec![("claims".to_string(), "claims".to_string())],
            removed_columns: vec![(
                "clm_claimid".to_string(),
                "claims".to_string(),
                "clm_claimid".to_string(),
            )],
            ..Default::default()
        };
        assert_eq!(apply(&mut db, &delta), 2);
        assert!(db.find_tables_by_token("claims").unwrap().is_empty());
        assert!(db.find_columns_by_token("clm").unwrap().is_empty());
        assert_eq!(db.registry_version().unwrap(), 2);
    }

    #[test]
    fn test_failed_persist_rolls_back() {
        let mut db = IndexDatabase::open_in_memory().unwrap();
        rebuild(&mut db, &sample_index());
        let before = db.load_index().unwrap();

        let delta = IndexDelta {
            added_aliases: vec![("coverage".to_string(), "policies".to_string())],
            ..Default::default()
        };
        let result = db.apply_delta_with(None, &delta, || {
            Err(RegistryError::Io(std::io::Error::other("disk full")))
        });
        assert!(matches!(result, Err(RegistryError::Io(_))));
        assert_eq!(db.load_index().unwrap(), before);
        assert_eq!(db.registry_version().unwrap(), 1);

        let result = db.rebuild_with(None, &TokenIndex::new(), || {
            Err(RegistryError::Io(std::io::Error::other("disk full")))
        });
        assert!(result.is_err());
        assert_eq!(db.load_index().unwrap(), before);
    }

    #[test]
    fn test_write_against_moved_version_is_refused() {
        let mut db = IndexDatabase::open_in_memory().unwrap();
        rebuild(&mut db, &sample_index());
        let before = db.load_index().unwrap();

        let delta = IndexDelta {
            added_aliases: vec![("coverage".to_string(), "policies".to_string())],
            ..Default::default()
        };
        let err = db.apply_delta_with(Some(0), &delta, || Ok(())).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::StaleRegistry { expected: 0, found: 1 }
        ));
        assert!(matches!(
            db.rebuild_with(Some(5), &TokenIndex::new(), || Ok(())),
            Err(RegistryError::StaleRegistry { expected: 5, found: 1 })
        ));
        assert_eq!(db.load_index().unwrap(), before);
        assert_eq!(db.registry_version().unwrap(), 1);

        assert_eq!(db.apply_delta_with(Some(1), &delta, || Ok(())).unwrap(), 2);
        assert!(db.find_tables_by_token("coverage").unwrap().contains("policies"));
    }

    #[test]
    fn test_file_database_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.db");
        {
            let mut db = IndexDatabase::new(&path).unwrap();
            rebuild(&mut db, &sample_index());
            assert_eq!(db.file_path(), path.as_path());
        }
        let db = IndexDatabase::new(&path).unwrap();
        assert_eq!(db.registry_version().unwrap(), 1);
        assert_eq!(db.load_index().unwrap(), sample_index());
    }
}
