//! Tests for CREATE TABLE extraction (src/ddl/extractor.rs, src/ddl/mod.rs).

#[cfg(test)]
mod tests {
    use crate::ddl::extractor::unquote_identifier;
    use crate::ddl::{SkipReason, TableSchema, extract, extract_schema, parse_create_table, scan};
    use crate::tests::test_utils::insurance_ddl;

    fn columns(ddl: &str) -> Vec<String> {
        parse_create_table(ddl).unwrap().columns
    }

    #[test]
    fn test_primary_key_clause_contributes_no_column() {
        let table = parse_create_table("CREATE TABLE t (a INT, b TEXT, PRIMARY KEY(a))").unwrap();
        assert_eq!(table, TableSchema::new("t", vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_nested_parens_do_not_split_columns() {
        assert_eq!(
            columns("CREATE TABLE t (x NUMERIC(12,2), y VARCHAR(50))"),
            vec!["x", "y"]
        );
    }

    #[test]
    fn test_all_constraint_keywords_are_skipped() {
        let ddl = "CREATE TABLE t (
            id INT,
            ref_id INT,
            CONSTRAINT pk_t PRIMARY KEY (id),
            FOREIGN KEY (ref_id) REFERENCES other (id),
            UNIQUE (ref_id),
            check (id > 0),
            KEY idx_ref (ref_id),
            INDEX idx_id (id)
        )";
        assert_eq!(columns(ddl), vec!["id", "ref_id"]);
    }

    #[test]
    fn test_names_are_lowercased_and_unquoted() {
        let table = parse_create_table(
            r#"CREATE TABLE "Policy Holders" ("HolderId" INT, `Email` TEXT, [Phone No] TEXT, Name TEXT)"#,
        )
        .unwrap();
        assert_eq!(table.name, "policy holders");
        assert_eq!(table.columns, vec!["holderid", "email", "phone no", "name"]);
    }

    #[test]
    fn test_quoted_column_named_like_a_keyword_is_a_column() {
        assert_eq!(
            columns(r#"CREATE TABLE t ("key" TEXT, "check" BOOLEAN)"#),
            vec!["key", "check"]
        );
    }

    #[test]
    fn test_if_not_exists_and_modifiers() {
        let table =
            parse_create_table("CREATE GLOBAL TEMPORARY TABLE IF NOT EXISTS s.audit_log (id INT)")
                .unwrap();
        assert_eq!(table.name, "audit_log");
        assert_eq!(table.columns, vec!["id"]);
    }

    #[test]
    fn test_schema_qualified_bracketed_name_keeps_last_part() {
        let table = parse_create_table("CREATE TABLE [dbo].[Claims] ([ClaimId] INT)").unwrap();
        assert_eq!(table.name, "claims");
        assert_eq!(table.columns, vec!["claimid"]);
    }

    #[test]
    fn test_commas_inside_defaults_and_checks() {
        let ddl = "CREATE TABLE t (a TEXT DEFAULT 'x, y', b INT CHECK (b IN (1, 2, 3)), c ENUM('p','q'))";
        assert_eq!(columns(ddl), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_duplicate_column_keeps_first() {
        assert_eq!(columns("CREATE TABLE t (a INT, b INT, a TEXT)"), vec!["a", "b"]);
    }

    #[test]
    fn test_zero_column_table_is_valid() {
        let table = parse_create_table("CREATE TABLE empty ()").unwrap();
        assert_eq!(table.name, "empty");
        assert!(table.columns.is_empty());
    }

    #[test]
    fn test_create_table_as_select_has_no_column_list() {
        assert!(parse_create_table("CREATE TABLE copy AS SELECT * FROM t").is_none());
    }

    #[test]
    fn test_extract_ignores_non_table_statements() {
        let statement = scan("CREATE INDEX i ON t (a);").next().unwrap();
        assert!(extract(&statement).is_none());
    }

    #[test]
    fn test_unquote_identifier() {
        assert_eq!(unquote_identifier(r#""a""b""#), r#"a"b"#);
        assert_eq!(unquote_identifier("[x]"), "x");
        assert_eq!(unquote_identifier("`y`"), "y");
        assert_eq!(unquote_identifier("plain"), "plain");
    }

    // -----------------------------------------------------------------------
    // Whole-script extraction
    // -----------------------------------------------------------------------

    #[test]
    fn test_routine_with_embedded_create_table_yields_no_tables() {
        let ddl = "CREATE OR REPLACE FUNCTION f() RETURNS void AS $$\n\
                   BEGIN\n\
                       CREATE TABLE fake (a INT, b TEXT);\n\
                   END;\n\
                   $$ LANGUAGE plpgsql;";
        let (store, report) = extract_schema(ddl);
        assert!(store.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].reason, SkipReason::Routine);
    }

    #[test]
    fn test_duplicate_table_last_definition_wins() {
        let ddl = "CREATE TABLE a (x INT); CREATE TABLE b (y INT); CREATE TABLE A (z INT, w INT);";
        let (store, report) = extract_schema(ddl);
        let names: Vec<&str> = store.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(store.columns("a").unwrap(), ["z", "w"]);
        assert_eq!(report.duplicates, vec!["a"]);
    }

    #[test]
    fn test_mysql_escaped_quote_in_column_comment() {
        let ddl = "CREATE TABLE m (a VARCHAR(10) COMMENT 'it\\'s, really', b INT); \
                   CREATE TABLE n (c INT);";
        let (store, report) = extract_schema(ddl);
        assert!(report.skipped.is_empty());
        assert_eq!(store.columns("m").unwrap(), ["a", "b"]);
        assert_eq!(store.columns("n").unwrap(), ["c"]);
    }

    #[test]
    fn test_escape_string_default_does_not_split_columns() {
        assert_eq!(
            columns("CREATE TABLE t (a TEXT DEFAULT E'x\\', y', b INT)"),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_insurance_fixture_extraction() {
        let (store, report) = extract_schema(&insurance_ddl());

        let names: Vec<&str> = store.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["insurers", "customers", "tbl_policy_statuses", "policies", "claims"]
        );
        assert_eq!(
            store.columns("policies").unwrap(),
            [
                "pol_policyid",
                "pol_policyno",
                "pol_customerid",
                "pol_insurerid",
                "pol_statuskey",
                "pol_effective_date",
                "pol_expiry_date",
            ]
        );
        assert_eq!(
            store.columns("claims").unwrap(),
            ["clm_claimid", "clm_policyid", "clm_amount", "clm_status", "clm_filed_at"]
        );
        assert!(!store.contains("fake"));
        assert!(!store.contains("fake_cache"));
        assert!(!store.contains("commented_out"));

        assert_eq!(report.statements, 11);
        assert_eq!(report.tables, 5);
        assert_eq!(report.skipped.len(), 3);
        assert!(report.skipped.iter().all(|s| s.reason == SkipReason::Routine));
        assert!(report.duplicates.is_empty());
    }
}
