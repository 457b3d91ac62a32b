use std::sync::Arc;

use serde_json::{Value, json};

use super::SnapshotEditor;
use crate::{
    CacheConfig, CacheContext, GraphSnapshot, GraphValue, NodeId,
    operation::{OperationInstance, RawOperation, Variables},
};

fn context() -> CacheContext {
    CacheContext::new(CacheConfig {
        freeze_snapshots: true,
        ..CacheConfig::default()
    })
}

fn operation(context: &mut CacheContext, document: &str, variables: Value) -> Arc<OperationInstance> {
    context
        .parse_operation(&RawOperation::query(document).with_variables(Variables::from_value(variables)))
        .unwrap()
}

#[test]
fn payloads_accumulate_until_commit() {
    let mut context = context();
    let viewer = operation(&mut context, "{ viewer { id name } }", json!({}));
    let settings = operation(&mut context, "{ settings { theme } }", json!({}));

    let mut editor = SnapshotEditor::new(&context, GraphSnapshot::new());
    editor
        .merge_payload(&viewer, &json!({"viewer": {"id": "1", "name": "Foo"}}))
        .unwrap();
    editor
        .merge_payload(&settings, &json!({"settings": {"theme": "dark"}}))
        .unwrap();
    editor
        .merge_payload(&viewer, &json!({"viewer": {"id": "1", "name": "Bar"}}))
        .unwrap();

    let edited = editor.commit().unwrap();

    assert_eq!(edited.written_queries.len(), 2);
    assert_eq!(
        serde_json::to_value(edited.snapshot.data(&NodeId::query_root())).unwrap(),
        json!({"viewer": {"__ref": "1"}, "settings": {"theme": "dark"}})
    );
    assert_eq!(
        serde_json::to_value(edited.snapshot.data(&"1".into())).unwrap(),
        json!({"id": "1", "name": "Bar"})
    );
}

#[test]
fn parent_snapshot_is_left_untouched() {
    let mut context = context();
    let viewer = operation(&mut context, "{ viewer { id name } }", json!({}));

    let mut editor = SnapshotEditor::new(&context, GraphSnapshot::new());
    editor
        .merge_payload(&viewer, &json!({"viewer": {"id": "1", "name": "Foo"}}))
        .unwrap();
    let first = editor.commit().unwrap().snapshot;

    let mut editor = SnapshotEditor::new(&context, first.clone());
    editor
        .merge_payload(&viewer, &json!({"viewer": {"id": "1", "name": "Bar"}}))
        .unwrap();
    let second = editor.commit().unwrap().snapshot;

    assert_eq!(
        first.data(&"1".into()).and_then(|data| data.field("name")),
        Some(&GraphValue::String("Foo".into()))
    );
    assert_eq!(
        second.data(&"1".into()).and_then(|data| data.field("name")),
        Some(&GraphValue::String("Bar".into()))
    );
}

#[test]
fn ancestors_are_reversioned_without_being_edited() {
    let mut context = context();
    let viewer = operation(&mut context, "{ viewer { id name } }", json!({}));

    let mut editor = SnapshotEditor::new(&context, GraphSnapshot::new());
    editor
        .merge_payload(&viewer, &json!({"viewer": {"id": "1", "name": "Foo"}}))
        .unwrap();
    let first = editor.commit().unwrap().snapshot;

    let mut editor = SnapshotEditor::new(&context, first.clone());
    editor
        .merge_payload(&viewer, &json!({"viewer": {"id": "1", "name": "Bar"}}))
        .unwrap();
    let edited = editor.commit().unwrap();

    let root = NodeId::query_root();
    assert_eq!(edited.edited_node_ids.iter().collect::<Vec<_>>(), [&NodeId::from("1")]);
    assert!(!Arc::ptr_eq(
        first.node(&root).unwrap(),
        edited.snapshot.node(&root).unwrap()
    ));
    assert_eq!(first.data(&root), edited.snapshot.data(&root));
}

#[test]
fn list_items_merge_an_entity_once() {
    let mut context = context();
    let operation = operation(&mut context, "{ list { id name } }", json!({}));

    let mut editor = SnapshotEditor::new(&context, GraphSnapshot::new());
    editor
        .merge_payload(
            &operation,
            &json!({"list": [{"id": "1", "name": "Foo"}, {"id": "1", "name": "Ignored"}]}),
        )
        .unwrap();
    let edited = editor.commit().unwrap();

    assert_eq!(
        serde_json::to_value(edited.snapshot.data(&"1".into())).unwrap(),
        json!({"id": "1", "name": "Foo"})
    );
    let inbound: Vec<String> = edited
        .snapshot
        .node(&"1".into())
        .unwrap()
        .inbound()
        .iter()
        .map(|reference| format!("{}:{:?}", reference.id, reference.path))
        .collect();
    assert_eq!(inbound, [r#"ROOT_QUERY:["list", 0]"#, r#"ROOT_QUERY:["list", 1]"#]);
}

#[test]
fn identity_must_not_come_from_null() {
    let mut context = CacheContext::default().with_entity_id_for_value(|_| Some(NodeId::new("always")));
    let operation = operation(&mut context, "{ viewer { name } }", json!({}));

    let mut editor = SnapshotEditor::new(&context, GraphSnapshot::new());
    let error = editor.merge_payload(&operation, &json!({"viewer": null})).unwrap_err();

    assert_eq!(
        error.to_string(),
        "The identity function returned an id for a null payload at viewer (container ROOT_QUERY)"
    );
}
