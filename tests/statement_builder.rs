use rstest::rstest;
use sqlforge::params::ParamDirection;
use sqlforge::prefix::TablePrefixes;
use sqlforge::statement::{LikeMode, StatementBuilder};
use sqlforge::value::Value;

#[test]
fn same_column_twice_gets_distinct_parameters() {
    let mut b = StatementBuilder::new();
    b.between("Age", 18, 65);
    let params: Vec<_> = b.params().iter().collect();
    assert_eq!(params.len(), 2);
    assert_ne!(params[0].name(), params[1].name(), "BETWEEN bounds must not share a name");
    assert_eq!(params[0].value(), &Value::Int(18));
    assert_eq!(params[1].value(), &Value::Int(65));
    assert_eq!(
        b.sql(),
        format!("Age BETWEEN {} AND {}", params[0].name(), params[1].name())
    );
}

#[rstest]
#[case(false, "Age IS NULL")]
#[case(true, "Age = NULL")]
fn null_comparison_never_binds(#[case] is_assignment: bool, #[case] expected: &str) {
    let mut b = StatementBuilder::new();
    b.append_comparison("Age", "=", Value::Null, is_assignment);
    assert_eq!(b.sql(), expected);
    assert!(b.params().is_empty(), "NULL must not create a parameter");
}

#[test]
fn full_text_like_ands_every_word() {
    let mut b = StatementBuilder::new();
    b.like("Name", "john smith", LikeMode::Contains, true);
    let params: Vec<_> = b.params().iter().collect();
    assert_eq!(params.len(), 2);
    assert_eq!(params[0].value(), &Value::from("%john%"));
    assert_eq!(params[1].value(), &Value::from("%smith%"));
    assert_eq!(
        b.sql(),
        format!("( Name LIKE {} AND Name LIKE {} )", params[0].name(), params[1].name())
    );
}

#[rstest]
#[case(LikeMode::StartsWith, "ab%")]
#[case(LikeMode::EndsWith, "%ab")]
#[case(LikeMode::Contains, "%ab%")]
fn like_modes_place_the_wildcard(#[case] mode: LikeMode, #[case] bound: &str) {
    let mut b = StatementBuilder::new();
    b.like("Code", "ab", mode, false);
    assert_eq!(b.params().iter().next().map(|p| p.value().clone()), Some(Value::from(bound)));
}

#[test]
fn empty_full_text_phrase_matches_anything() {
    let mut b = StatementBuilder::new();
    b.like("Name", "   ", LikeMode::Contains, true);
    assert_eq!(b.params().iter().next().map(|p| p.value().clone()), Some(Value::from("%%")));
}

#[test]
fn in_list_binds_each_value() {
    let mut b = StatementBuilder::new();
    b.in_list("Id", [1, 2, 3]);
    assert_eq!(b.params().len(), 3);
    assert!(b.sql().starts_with("Id IN (@Id_1_"));
}

#[test]
fn subquery_parameters_are_merged() {
    let mut inner = StatementBuilder::new();
    inner.select(&["OwnerId"]).from("Pet").where_("Species", "=", "cat");
    let mut outer = StatementBuilder::new();
    outer.select(&["Name"]).from("Owner").append("WHERE").in_subquery("Id", inner);
    assert!(outer.sql().contains("Id IN ( SELECT OwnerId FROM Pet WHERE Species = @Species_1_"));
    assert!(outer.sql().ends_with(")"));
    assert_eq!(outer.params().len(), 1);
}

#[test]
fn merge_keeps_both_parameter_sets() {
    let mut left = StatementBuilder::new();
    left.select(&[]).from("T").where_("A", "=", 1);
    let mut right = StatementBuilder::new();
    right.and("B", "=", 2);
    left.merge(right);
    assert_eq!(left.params().len(), 2);
    assert!(left.sql().contains(" AND B = @B_1_"));
}

#[test]
fn joins_and_grouping() {
    let mut b = StatementBuilder::new();
    b.select(&["o.Id", "COUNT(*)"])
        .from("Orders o")
        .inner_join("Customer c")
        .on("c.Id", "=", "o.CustomerId")
        .left_join("Region r")
        .on_value("r.Code", "=", "EU")
        .group_by(&["o.Id"]);
    let sql = b.sql().to_string();
    assert!(sql.starts_with(
        "SELECT o.Id, COUNT(*) FROM Orders o INNER JOIN Customer c ON c.Id = o.CustomerId LEFT JOIN Region r ON r.Code = @rCode_1_"
    ));
    assert!(sql.ends_with("GROUP BY o.Id"));
}

#[test]
fn delete_with_raw_predicates() {
    let mut b = StatementBuilder::new();
    b.delete_from("Session").where_raw("Expires < 0").or_raw("Revoked = 1");
    assert_eq!(b.build().sql(), "DELETE FROM Session WHERE Expires < 0 OR Revoked = 1");
}

#[test]
fn named_parameters_keep_their_direction() {
    let mut b = StatementBuilder::new();
    let input = b.add_named_parameter(":limit", 10);
    b.select(&[]).from("T").append(&format!("LIMIT {}", input));
    assert_eq!(b.sql(), "SELECT * FROM T LIMIT @limit");
    let param = b.params().get("limit").expect("parameter present");
    assert_eq!(param.direction(), ParamDirection::Input);
}

#[test]
fn compiled_statement_is_trimmed_and_displayable() {
    let mut b = StatementBuilder::new();
    b.append("  SELECT 1 ");
    let compiled = b.build();
    assert_eq!(compiled.sql(), "SELECT 1");
    assert_eq!(compiled.to_string(), "SELECT 1");
}

#[test]
fn named_parameter_with_a_dot_is_inlined_in_debug_sql() {
    let mut b = StatementBuilder::new();
    let limit = b.add_named_parameter("page.size", 25);
    b.select(&[]).from("T").append(&format!("LIMIT {}", limit));
    assert_eq!(b.sql(), "SELECT * FROM T LIMIT @page_size");
    assert_eq!(b.debug_sql(), "SELECT * FROM T LIMIT 25");
}

#[test]
fn subquery_tokens_take_the_outer_prefixes() {
    let mut inner = StatementBuilder::new();
    inner.select(&["OwnerId"]).from("{owner}{qualifier}Pet");
    let mut outer = StatementBuilder::with_prefixes(TablePrefixes::new("dbo", "crm", ""));
    outer
        .select(&["Name"])
        .from("{owner}{qualifier}Owner")
        .append("WHERE")
        .in_subquery("Id", inner);
    assert_eq!(
        outer.sql(),
        "SELECT Name FROM dbo.crm_Owner WHERE Id IN ( SELECT OwnerId FROM dbo.crm_Pet )"
    );
}
