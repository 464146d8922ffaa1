//! Tests for question-driven table selection (src/selector.rs).

#[cfg(test)]
mod tests {
    use crate::enrich::Addition;
    use crate::registry::SampleQuery;
    use crate::selector::TableSelector;
    use crate::tests::test_utils::insurance_workspace;

    #[test]
    fn test_alias_and_column_hits_rank_policies_first() {
        let (_dir, workspace) = insurance_workspace();
        let candidates = TableSelector::new(&workspace)
            .select("which policies does an insurer have", 5)
            .unwrap();

        assert_eq!(candidates[0].table, "policies");
        assert_eq!(candidates[0].score, 3);
        assert_eq!(candidates[0].matched_tokens, vec!["insurer", "policies"]);
        assert_eq!(candidates[0].matched_columns, vec!["pol_insurerid"]);
        assert_eq!(candidates[1].table, "insurers");
        assert_eq!(candidates[1].score, 2);
    }

    #[test]
    fn test_limit_and_no_match() {
        let (_dir, workspace) = insurance_workspace();
        let selector = TableSelector::new(&workspace);

        let top = selector.select("claim amount", 1).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].table, "claims");
        assert_eq!(top[0].score, 4);

        assert!(selector.select("zzqx", 5).unwrap().is_empty());
        assert!(selector.select("", 5).unwrap().is_empty());
    }

    #[test]
    fn test_enrichment_feeds_selection() {
        let (_dir, mut workspace) = insurance_workspace();
        workspace
            .submit_enrichment(
                "claims",
                &Addition::SampleQuery(SampleQuery::new("total payout per quarter")),
            )
            .unwrap();
        workspace
            .submit_enrichment("claims", &Addition::neighbor("policies"))
            .unwrap();

        let candidates = TableSelector::new(&workspace).select("payout", 5).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].table, "claims");
        assert_eq!(candidates[0].sample_queries, vec!["total payout per quarter"]);
        assert_eq!(candidates[0].neighbors, vec!["policies"]);
    }
}
