//! Tests for the DDL statement scanner (src/ddl/scanner.rs).

#[cfg(test)]
mod tests {
    use crate::ddl::{SkipReason, Statement, StatementKind, scan};

    fn kinds(text: &str) -> Vec<StatementKind> {
        scan(text)
            .filter(|s| !s.is_blank() || s.skip_reason().is_some())
            .map(|s| s.kind)
            .collect()
    }

    fn assert_covers(text: &str, statements: &[Statement<'_>]) {
        let mut expected_start = 0;
        for statement in statements {
            assert_eq!(
                statement.span.start, expected_start,
                "gap or overlap before statement {} of {:?}",
                statement.index, text
            );
            assert!(statement.span.end > statement.span.start);
            assert_eq!(statement.raw, &text[statement.span.clone()]);
            expected_start = statement.span.end;
        }
        assert_eq!(expected_start, text.len(), "input tail not covered: {:?}", text);
    }

    // -----------------------------------------------------------------------
    // Totality
    // -----------------------------------------------------------------------

    #[test]
    fn test_scan_covers_arbitrary_input_without_gaps() {
        let inputs = [
            "",
            "   \n\t",
            "CREATE TABLE t (a INT);",
            "CREATE TABLE t (a INT);\n\n",
            "CREATE FUNCTION f() RETURNS void AS $$ BEGIN; ",
            "CREATE TABLE t (a INT",
            "SELECT 'unterminated",
            ")))",
            "a;b;;c",
            "-- only a comment",
            "/* unterminated block comment",
            "CREATE TABLE ü (ä INT); SELECT 'ß;';",
            "$tag",
            "$$",
            "E'\\'",
            "[",
            "GO",
            "x\nGO\ny",
        ];

        for input in inputs {
            let statements: Vec<_> = scan(input).collect();
            assert_covers(input, &statements);
        }
    }

    #[test]
    fn test_scan_empty_input_yields_nothing() {
        assert_eq!(scan("").count(), 0);
    }

    #[test]
    fn test_scan_is_restartable() {
        let text = "CREATE TABLE a (x INT); CREATE TABLE b (y INT); SELECT 1;";
        let first: Vec<_> = scan(text).map(|s| s.span).collect();
        let second: Vec<_> = scan(text).map(|s| s.span).collect();
        assert_eq!(first, second);

        let mut scanner = scan(text);
        scanner.next();
        let resumed = scanner.clone();
        let rest: Vec<_> = scanner.map(|s| s.span).collect();
        let rest_again: Vec<_> = resumed.map(|s| s.span).collect();
        assert_eq!(rest, rest_again);
        assert_eq!(rest, first[1..].to_vec());
    }

    // -----------------------------------------------------------------------
    // Terminators
    // -----------------------------------------------------------------------

    #[test]
    fn test_semicolons_inside_parens_and_quotes_do_not_split() {
        let text = "CREATE TABLE t (a NUMERIC(12,2) DEFAULT ';', b TEXT); SELECT 1;";
        assert_eq!(kinds(text), vec![StatementKind::TableDef, StatementKind::Other]);
    }

    #[test]
    fn test_bracket_and_backtick_identifiers_are_quoting_contexts() {
        let text = "CREATE TABLE [dbo].[odd;name] ([a;b] INT, `c;d` INT);";
        assert_eq!(kinds(text), vec![StatementKind::TableDef]);
    }

    #[test]
    fn test_escape_string_backslash_quote() {
        let text = "SELECT E'it\\'s; fine'; SELECT 2;";
        assert_eq!(kinds(text), vec![StatementKind::Other, StatementKind::Other]);
    }

    #[test]
    fn test_mysql_backslash_quote_in_plain_string() {
        let text = "CREATE TABLE m (a VARCHAR(10) COMMENT 'it\\'s', b INT); CREATE TABLE n (c INT);";
        assert_eq!(kinds(text), vec![StatementKind::TableDef, StatementKind::TableDef]);
    }

    #[test]
    fn test_trailing_backslash_before_closing_quote_is_literal() {
        let text = "INSERT INTO paths VALUES ('C:\\', 'D:\\'); SELECT 2;";
        assert_eq!(kinds(text), vec![StatementKind::Other, StatementKind::Other]);
    }

    #[test]
    fn test_doubled_quote_is_not_a_close() {
        let text = "INSERT INTO t VALUES ('it''s; fine'); SELECT 2;";
        assert_eq!(kinds(text), vec![StatementKind::Other, StatementKind::Other]);
    }

    // -----------------------------------------------------------------------
    // Dollar quoting
    // -----------------------------------------------------------------------

    #[test]
    fn test_dollar_quoted_body_is_opaque() {
        let text = "CREATE FUNCTION f() RETURNS void AS $$ CREATE TABLE fake (a INT); $$ LANGUAGE plpgsql;\
                    CREATE TABLE real_one (b INT);";
        assert_eq!(
            kinds(text),
            vec![
                StatementKind::Skipped(SkipReason::Routine),
                StatementKind::TableDef
            ]
        );
    }

    #[test]
    fn test_tagged_dollar_quote_ignores_other_tags() {
        let text = "DO $outer$ SELECT $$;$$; $outer$; SELECT 1;";
        let statements: Vec<_> = scan(text).collect();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].raw, "DO $outer$ SELECT $$;$$; $outer$;");
        assert_eq!(statements[0].kind, StatementKind::Other);
    }

    #[test]
    fn test_dollar_inside_identifier_is_not_a_quote() {
        let text = "CREATE TABLE t (price$usd INT, a$b$ INT); SELECT 1;";
        assert_eq!(kinds(text), vec![StatementKind::TableDef, StatementKind::Other]);
    }

    #[test]
    fn test_comments_inside_dollar_body_are_kept() {
        let text = "CREATE FUNCTION f() AS $$ -- keep me\n SELECT 1; $$ LANGUAGE sql;";
        let statement = scan(text).next().unwrap();
        assert!(statement.text.contains("-- keep me"));
        assert_eq!(statement.kind, StatementKind::Skipped(SkipReason::Routine));
    }

    // -----------------------------------------------------------------------
    // Failure modes become SKIPPED statements
    // -----------------------------------------------------------------------

    #[test]
    fn test_unterminated_dollar_quote_skips_remainder() {
        let text = "CREATE TABLE a (x INT); CREATE FUNCTION f() AS $$ BEGIN SELECT 1;";
        let statements: Vec<_> = scan(text).collect();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].kind, StatementKind::TableDef);
        assert_eq!(
            statements[1].kind,
            StatementKind::Skipped(SkipReason::UnterminatedDollarQuote)
        );
        assert_eq!(statements[1].span.end, text.len());
    }

    #[test]
    fn test_unbalanced_parens_at_end_of_input() {
        let text = "CREATE TABLE t (a INT, b NUMERIC(12,2)";
        assert_eq!(
            kinds(text),
            vec![StatementKind::Skipped(SkipReason::UnbalancedParens)]
        );
    }

    #[test]
    fn test_stray_close_paren_marks_statement_unbalanced() {
        let text = "SELECT 1); CREATE TABLE t (a INT);";
        assert_eq!(
            kinds(text),
            vec![
                StatementKind::Skipped(SkipReason::UnbalancedParens),
                StatementKind::TableDef
            ]
        );
    }

    #[test]
    fn test_unterminated_quote() {
        let text = "INSERT INTO t VALUES ('oops";
        assert_eq!(
            kinds(text),
            vec![StatementKind::Skipped(SkipReason::UnterminatedQuote)]
        );
    }

    // -----------------------------------------------------------------------
    // Comments
    // -----------------------------------------------------------------------

    #[test]
    fn test_comments_are_stripped_from_text() {
        let text = "CREATE TABLE t ( -- note; with semicolon\n a INT /* b INT; */ );";
        let statements: Vec<_> = scan(text).collect();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].kind, StatementKind::TableDef);
        assert!(!statements[0].text.contains("note"));
        assert!(!statements[0].text.contains("b INT"));
        assert!(statements[0].text.contains("a INT"));
    }

    #[test]
    fn test_nested_block_comments() {
        let text = "/* outer /* inner; */ still comment; */ CREATE TABLE t (a INT);";
        assert_eq!(kinds(text), vec![StatementKind::TableDef]);
    }

    #[test]
    fn test_comment_only_tail_is_blank() {
        let text = "CREATE TABLE t (a INT);\n-- trailing note";
        let statements: Vec<_> = scan(text).collect();
        assert_eq!(statements.len(), 2);
        assert!(statements[1].is_blank());
        assert_eq!(statements[1].kind, StatementKind::Other);
    }

    // -----------------------------------------------------------------------
    // Classification
    // -----------------------------------------------------------------------

    #[test]
    fn test_classification_by_leading_keywords() {
        let text = "CREATE TEMPORARY TABLE a (x INT);\
                    CREATE UNIQUE INDEX idx ON a (x);\
                    CREATE OR REPLACE VIEW v AS SELECT 1;\
                    ALTER TABLE a ADD COLUMN y INT;\
                    CREATE OR REPLACE PROCEDURE p() LANGUAGE sql AS 'SELECT 1';";
        assert_eq!(
            kinds(text),
            vec![
                StatementKind::TableDef,
                StatementKind::Other,
                StatementKind::Other,
                StatementKind::Other,
                StatementKind::Skipped(SkipReason::Routine),
            ]
        );
    }

    #[test]
    fn test_go_separates_tsql_batches() {
        let text = "CREATE PROCEDURE p AS\nBEGIN\n  SELECT 1;\n  SELECT 2;\nEND\nGO\nCREATE TABLE t (a INT);\n";
        let statements: Vec<_> = scan(text).collect();
        assert_eq!(statements[0].kind, StatementKind::Skipped(SkipReason::Routine));
        assert!(statements[0].raw.ends_with("GO\n"));
        assert_eq!(statements[1].kind, StatementKind::TableDef);
    }

    #[test]
    fn test_go_inside_a_line_is_not_a_separator() {
        let text = "SELECT go FROM t; SELECT 1 AS go;";
        assert_eq!(kinds(text), vec![StatementKind::Other, StatementKind::Other]);
    }

    #[test]
    fn test_begin_transaction_does_not_open_a_block() {
        let text = "CREATE PROCEDURE p AS BEGIN TRANSACTION; COMMIT; CREATE TABLE t (a INT);";
        assert_eq!(
            kinds(text),
            vec![
                StatementKind::Skipped(SkipReason::Routine),
                StatementKind::Other,
                StatementKind::TableDef
            ]
        );
    }

    #[test]
    fn test_case_blocks_inside_routine_body() {
        let text = "CREATE PROCEDURE p() BEGIN CASE x WHEN 1 THEN SELECT 1; END CASE; END; \
                    CREATE TABLE t (a INT);";
        assert_eq!(
            kinds(text),
            vec![
                StatementKind::Skipped(SkipReason::Routine),
                StatementKind::TableDef
            ]
        );
    }

    #[test]
    fn test_end_followed_by_new_if_closes_block() {
        let text = "CREATE PROCEDURE p AS BEGIN IF 1=1 BEGIN SELECT 1; END IF 2=2 SELECT 2; END; \
                    CREATE TABLE after_proc (a INT);";
        assert_eq!(
            kinds(text),
            vec![
                StatementKind::Skipped(SkipReason::Routine),
                StatementKind::TableDef
            ]
        );
    }

    #[test]
    fn test_end_if_and_end_while_do_not_close_the_body() {
        let text = "CREATE PROCEDURE p() BEGIN IF x THEN SELECT 1; END IF; \
                    WHILE y DO SELECT 2; END WHILE; \
                    lbl: LOOP SELECT 3; END LOOP lbl; END; \
                    CREATE TABLE t (a INT);";
        let statements: Vec<_> = scan(text).filter(|s| !s.is_blank()).collect();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].kind, StatementKind::Skipped(SkipReason::Routine));
        assert!(statements[0].raw.ends_with("END LOOP lbl; END;"));
        assert_eq!(statements[1].kind, StatementKind::TableDef);
    }

    #[test]
    fn test_statement_indexes_are_sequential() {
        let indexes: Vec<usize> = scan("SELECT 1; SELECT 2; SELECT 3;").map(|s| s.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }
}
