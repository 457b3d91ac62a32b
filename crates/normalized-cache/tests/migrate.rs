#![allow(unused_crate_dependencies)]

use std::collections::BTreeMap;

use normalized_cache::{
    CacheContext, GraphSnapshot, GraphValue, MigrationMap, NodeId, NodeKind, ParameterizedMigration, RawOperation,
    migrate, operation::ArgumentValue,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn snapshot() -> GraphSnapshot {
    let mut context = CacheContext::default();
    let payload = json!({
        "version": 1,
        "viewer": {"__typename": "User", "id": 1, "name": "foo"}
    });

    normalized_cache::write(
        &mut context,
        &GraphSnapshot::new(),
        &RawOperation::query("{ version viewer { __typename id name } }"),
        &payload,
    )
    .unwrap()
    .snapshot
}

#[test]
fn fields_are_migrated_by_type() {
    let mut snapshot = snapshot();
    let migrations = MigrationMap::new()
        .with_field("User", "name", |value| match value.and_then(GraphValue::as_str) {
            Some(name) => GraphValue::String(name.to_uppercase()),
            None => GraphValue::Null,
        })
        .with_field("User", "nickname", |value| {
            value.cloned().unwrap_or(GraphValue::String("anonymous".into()))
        })
        .with_field("Query", "version", |_| GraphValue::Number(2.into()));

    migrate(&mut snapshot, &migrations).unwrap();

    assert_eq!(
        serde_json::to_value(snapshot.data(&"1".into())).unwrap(),
        json!({"__typename": "User", "id": 1, "name": "FOO", "nickname": "anonymous"})
    );
    assert_eq!(
        serde_json::to_value(snapshot.data(&NodeId::query_root())).unwrap(),
        json!({"version": 2, "viewer": {"__ref": "1"}})
    );
    snapshot.verify().unwrap();
}

#[test]
fn other_types_are_left_alone() {
    let original = snapshot();
    let mut snapshot = original.clone();
    let migrations = MigrationMap::new().with_field("Post", "title", |_| GraphValue::Null);

    migrate(&mut snapshot, &migrations).unwrap();

    assert_eq!(snapshot, original);
}

#[test]
fn parameterized_values_are_seeded_once() {
    let mut snapshot = snapshot();
    let migrations = MigrationMap::new().with_parameterized(
        "User",
        ParameterizedMigration {
            path: vec!["avatar".into()],
            args: BTreeMap::from([("size".to_string(), ArgumentValue::from(json!(64)))]),
            default_value: GraphValue::String("default.png".into()),
        },
    );

    migrate(&mut snapshot, &migrations).unwrap();
    migrate(&mut snapshot, &migrations).unwrap();

    let id = NodeId::from(r#"1❖["avatar"]❖{"size":64}"#);
    let node = snapshot.node(&id).unwrap();
    assert_eq!(node.kind(), NodeKind::ParameterizedValue);
    assert_eq!(node.data(), Some(&GraphValue::String("default.png".into())));
    assert_eq!(node.inbound().len(), 1);
    assert_eq!(snapshot.node(&"1".into()).unwrap().outbound().len(), 1);
    assert_eq!(snapshot.len(), 3);
    snapshot.verify().unwrap();
}
