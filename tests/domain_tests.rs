use authorization_service::domain::condition::{
    ComparisonOperator, ConditionValue, FieldCondition,
};
use authorization_service::domain::dates::parse_date_target;
use authorization_service::domain::privilege::{
    PRIV_NEWSADMIN, PRIV_RESOURCEADMIN, PRIV_SYSADMIN, privilege_id_for_name,
    privilege_name_for_id,
};
use authorization_service::domain::privilege_set::{PrivilegeSet, PrivilegeSetItem};
use authorization_service::domain::user::User;
use authorization_service::domain::xml::{privilege_set_from_xml, privilege_set_to_xml};
use authorization_service::test_utils::{CREATION_DATE_FIELD, VIEW_COUNT_FIELD, create_test_schema};
use chrono::{Duration, TimeZone, Utc};

// ===== PRIVILEGE SET TREE TESTS =====

#[test]
fn test_privilege_add_remove_round_trip() {
    let mut set = PrivilegeSet::new();
    set.add_privilege(PRIV_SYSADMIN);
    set.add_privilege(PRIV_NEWSADMIN);
    set.add_privilege(PRIV_SYSADMIN);

    assert_eq!(set.privileges(), vec![PRIV_SYSADMIN, PRIV_NEWSADMIN]);
    assert!(set.includes_privilege(PRIV_SYSADMIN));
    assert!(!set.includes_privilege(PRIV_RESOURCEADMIN));

    set.remove_privilege(PRIV_SYSADMIN);
    assert!(!set.includes_privilege(PRIV_SYSADMIN));
    assert_eq!(set.component_count(), 1);

    // Removing a non-member is a no-op.
    set.remove_privilege(PRIV_SYSADMIN);
    assert_eq!(set.component_count(), 1);
}

#[test]
fn test_condition_dedup_and_recursive_removal() {
    let mut inner = PrivilegeSet::new();
    inner.add_condition(
        VIEW_COUNT_FIELD,
        ConditionValue::Number(5),
        ComparisonOperator::GreaterThan,
    );

    let mut set = PrivilegeSet::new();
    assert!(set.add_condition(
        VIEW_COUNT_FIELD,
        ConditionValue::Number(5),
        ComparisonOperator::GreaterThan,
    ));
    assert!(!set.add_condition(
        VIEW_COUNT_FIELD,
        ConditionValue::Number(5),
        ComparisonOperator::GreaterThan,
    ));
    set.add_subset(inner);

    assert_eq!(set.conditions(false).len(), 1);
    assert_eq!(set.conditions(true).len(), 2);

    // Shallow removal leaves the copy inside the subset alone.
    assert!(set.remove_condition(
        VIEW_COUNT_FIELD,
        &ConditionValue::Number(5),
        ComparisonOperator::GreaterThan,
        false,
    ));
    assert_eq!(set.conditions(true).len(), 1);

    assert!(set.remove_condition(
        VIEW_COUNT_FIELD,
        &ConditionValue::Number(5),
        ComparisonOperator::GreaterThan,
        true,
    ));
    assert!(set.conditions(true).is_empty());
}

#[test]
fn test_mentions_field_and_scrubbing() {
    let mut inner = PrivilegeSet::new();
    inner.add_condition(
        CREATION_DATE_FIELD,
        ConditionValue::Text("3 days ago".to_string()),
        ComparisonOperator::LessThan,
    );
    inner.add_privilege(PRIV_SYSADMIN);

    let mut set = PrivilegeSet::new();
    set.add_privilege(PRIV_NEWSADMIN);
    set.add_subset(inner);

    assert!(set.mentions_field(CREATION_DATE_FIELD));
    assert!(!set.mentions_field(VIEW_COUNT_FIELD));

    assert!(set.remove_field_conditions(CREATION_DATE_FIELD));
    assert!(!set.mentions_field(CREATION_DATE_FIELD));
    // The subset itself and the privilege flags survive the scrub.
    assert_eq!(set.subsets().len(), 1);
    assert!(set.subsets()[0].includes_privilege(PRIV_SYSADMIN));
}

#[test]
fn test_subset_dedup_is_structural() {
    let mut a = PrivilegeSet::new();
    a.add_privilege(PRIV_SYSADMIN);
    let b = a.clone();

    let mut set = PrivilegeSet::new();
    set.add_subset(a);
    set.add_subset(b);
    assert_eq!(set.subsets().len(), 1);
}

// ===== SNAPSHOT TESTS =====

#[test]
fn test_snapshot_round_trip_preserves_tree() {
    let mut inner = PrivilegeSet::new();
    inner.set_uses_and_logic(true);
    inner.add_privilege(PRIV_NEWSADMIN);
    inner.add_condition(
        VIEW_COUNT_FIELD,
        ConditionValue::Number(10),
        ComparisonOperator::GreaterOrEqual,
    );

    let mut set = PrivilegeSet::new();
    set.add_privilege(PRIV_SYSADMIN);
    set.add_condition(
        CREATION_DATE_FIELD,
        ConditionValue::Text("1 week ago".to_string()),
        ComparisonOperator::LessThan,
    );
    set.add_subset(inner);

    let restored = PrivilegeSet::from_data(&set.data()).unwrap();
    assert_eq!(restored, set);
    assert_eq!(restored.subsets().len(), 1);
    assert!(restored.subsets()[0].uses_and_logic());
}

#[test]
fn test_snapshot_rejects_malformed_input() {
    assert!(PrivilegeSet::from_data("").is_err());
    assert!(PrivilegeSet::from_data("{}").is_err());
    assert!(PrivilegeSet::from_data(r#"{"Privileges":"nope","Logic":"OR"}"#).is_err());
    assert!(PrivilegeSet::from_data(r#"{"Privileges":[true],"Logic":"OR"}"#).is_err());
}

// ===== XML AUTHORING TESTS =====

#[test]
fn test_xml_full_vocabulary_round_trip() {
    let schema = create_test_schema();
    let xml = r#"
        <PrivilegeSet>
            <AddPrivilege>PRIV_SYSADMIN</AddPrivilege>
            <AddCondition>
                <Field>View Count</Field>
                <Operator>&gt;=</Operator>
                <Value>10</Value>
            </AddCondition>
            <AddSubset>
                <PrivilegeSet>
                    <UsesAndLogic>TRUE</UsesAndLogic>
                    <AddPrivilege>PRIV_NEWSADMIN</AddPrivilege>
                    <AddCondition>
                        <Field>Date Of Record Creation</Field>
                        <Operator>&lt;</Operator>
                        <Value>3 days ago</Value>
                    </AddCondition>
                </PrivilegeSet>
            </AddSubset>
        </PrivilegeSet>
    "#;

    let set = privilege_set_from_xml(xml, &schema).unwrap();
    assert!(set.includes_privilege(PRIV_SYSADMIN));
    assert_eq!(set.conditions(false).len(), 1);
    let subset = set.subsets()[0];
    assert!(subset.uses_and_logic());
    assert!(subset.includes_privilege(PRIV_NEWSADMIN));

    let exported = privilege_set_to_xml(&set, &schema).unwrap();
    let reparsed = privilege_set_from_xml(&exported, &schema).unwrap();
    assert_eq!(reparsed, set);
}

#[test]
fn test_xml_rejects_unknown_vocabulary() {
    let schema = create_test_schema();
    assert!(
        privilege_set_from_xml(
            "<PrivilegeSet><GrantEverything/></PrivilegeSet>",
            &schema
        )
        .is_err()
    );
    assert!(
        privilege_set_from_xml(
            "<PrivilegeSet><AddCondition><Field>No Such Field</Field></AddCondition></PrivilegeSet>",
            &schema
        )
        .is_err()
    );
    assert!(
        privilege_set_from_xml(
            "<PrivilegeSet><AddPrivilege>PRIV_NONSENSE</AddPrivilege></PrivilegeSet>",
            &schema
        )
        .is_err()
    );
}

// ===== DATE EXPRESSION TESTS =====

#[test]
fn test_relative_date_expressions() {
    let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();

    let target = parse_date_target("3 days ago", now).unwrap();
    assert_eq!(target.at, now - Duration::days(3));
    assert_eq!(target.relative, Some(Duration::days(3)));

    let target = parse_date_target("1 hour ago", now).unwrap();
    assert_eq!(target.at, now - Duration::hours(1));

    let target = parse_date_target("now", now).unwrap();
    assert_eq!(target.at, now);
    assert_eq!(target.relative, None);

    let target = parse_date_target("2024-01-01", now).unwrap();
    assert_eq!(target.at, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    assert_eq!(target.relative, None);

    assert!(parse_date_target("whenever", now).is_err());
}

// ===== OPERATOR / VALUE TESTS =====

#[test]
fn test_operator_parse_and_display() {
    for text in ["==", "!=", "<", ">", "<=", ">="] {
        let op: ComparisonOperator = text.parse().unwrap();
        assert_eq!(op.to_string(), text);
    }
    assert!("~".parse::<ComparisonOperator>().is_err());
}

#[test]
fn test_authoring_value_literals() {
    assert_eq!(
        ConditionValue::from_authoring_text("NULL"),
        ConditionValue::Absent
    );
    assert_eq!(
        ConditionValue::from_authoring_text("TRUE"),
        ConditionValue::Number(1)
    );
    assert_eq!(
        ConditionValue::from_authoring_text("FALSE"),
        ConditionValue::Number(0)
    );
    assert_eq!(
        ConditionValue::from_authoring_text("17"),
        ConditionValue::Number(17)
    );
    assert_eq!(
        ConditionValue::from_authoring_text("3 days ago"),
        ConditionValue::Text("3 days ago".to_string())
    );
}

#[test]
fn test_condition_equality_is_structural() {
    let a = FieldCondition::new(4, ComparisonOperator::Equal, ConditionValue::Absent);
    let b = FieldCondition::new(4, ComparisonOperator::Equal, ConditionValue::Absent);
    let c = FieldCondition::new(4, ComparisonOperator::NotEqual, ConditionValue::Absent);
    assert_eq!(a, b);
    assert_ne!(a, c);
}

// ===== USER / PRIVILEGE REGISTRY TESTS =====

#[test]
fn test_user_privilege_flags() {
    let mut user = User::new(7, "jdoe", vec![PRIV_NEWSADMIN]);
    assert!(user.has_priv(PRIV_NEWSADMIN));
    assert!(!user.has_priv(PRIV_SYSADMIN));

    user.grant_priv(PRIV_SYSADMIN);
    assert!(user.has_priv(PRIV_SYSADMIN));

    user.revoke_priv(PRIV_NEWSADMIN);
    assert!(!user.has_priv(PRIV_NEWSADMIN));
}

#[test]
fn test_privilege_name_registry() {
    assert_eq!(privilege_id_for_name("PRIV_SYSADMIN"), Some(PRIV_SYSADMIN));
    assert_eq!(privilege_name_for_id(PRIV_SYSADMIN), Some("PRIV_SYSADMIN"));
    assert_eq!(privilege_id_for_name("PRIV_BOGUS"), None);
}

#[test]
fn test_items_expose_tree_shape() {
    let mut set = PrivilegeSet::new();
    set.add_privilege(PRIV_SYSADMIN);
    set.add_condition(
        VIEW_COUNT_FIELD,
        ConditionValue::Number(1),
        ComparisonOperator::Equal,
    );
    set.add_subset(PrivilegeSet::new());

    assert!(matches!(set.items()[0], PrivilegeSetItem::Privilege(_)));
    assert!(matches!(set.items()[1], PrivilegeSetItem::Condition(_)));
    assert!(matches!(set.items()[2], PrivilegeSetItem::Subset(_)));
}
