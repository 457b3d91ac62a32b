//! Upgrading a restored snapshot to a newer shape of the schema.

use std::{collections::HashMap, fmt, sync::Arc};

use indexmap::IndexMap;

use crate::{
    GraphSnapshot, GraphValue, NodeId, OperationError, PathPart,
    graph::{Direction, NodeKind, NodeSnapshot},
    ids::node_id_for_parameterized_value,
    operation::Arguments,
};

/// Computes the new value of a field from its current value, `None` when absent.
pub type FieldMigration = dyn Fn(Option<&GraphValue>) -> GraphValue + Send + Sync;

/// Seeds the value of a parameterized field that entities of a type may be missing.
#[derive(Debug, Clone)]
pub struct ParameterizedMigration {
    pub path: Vec<PathPart>,
    pub args: Arguments,
    pub default_value: GraphValue,
}

/// Migrations to apply, keyed by type name.
#[derive(Default)]
pub struct MigrationMap {
    fields: HashMap<String, IndexMap<String, Arc<FieldMigration>>>,
    parameterized: HashMap<String, Vec<ParameterizedMigration>>,
}

impl fmt::Debug for MigrationMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationMap")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("parameterized", &self.parameterized)
            .finish()
    }
}

impl MigrationMap {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_field(
        mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        migration: impl Fn(Option<&GraphValue>) -> GraphValue + Send + Sync + 'static,
    ) -> Self {
        self.fields
            .entry(type_name.into())
            .or_default()
            .insert(field_name.into(), Arc::new(migration));
        self
    }

    #[must_use]
    pub fn with_parameterized(mut self, type_name: impl Into<String>, migration: ParameterizedMigration) -> Self {
        self.parameterized.entry(type_name.into()).or_default().push(migration);
        self
    }

    fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.parameterized.is_empty()
    }
}

/// The type of an entity: its `__typename`, or `Query` for the query root.
fn type_name(id: &NodeId, node: &NodeSnapshot) -> Option<String> {
    match node.data()?.field("__typename").and_then(GraphValue::as_str) {
        Some(type_name) => Some(type_name.to_string()),
        None if id.is_query_root() => Some("Query".to_string()),
        None => None,
    }
}

/// Applies migrations to every entity of the snapshot, in place.
pub fn migrate(snapshot: &mut GraphSnapshot, migrations: &MigrationMap) -> Result<(), OperationError> {
    if migrations.is_empty() {
        return Ok(());
    }

    let entities: Vec<(NodeId, String)> = snapshot
        .iter()
        .filter(|(_, node)| node.is_entity())
        .filter_map(|(id, node)| Some((id.clone(), type_name(id, node)?)))
        .collect();

    let mut migrated = 0usize;
    for (id, type_name) in entities {
        if let Some(fields) = migrations.fields.get(&type_name) {
            migrate_fields(snapshot, &id, fields);
            migrated += 1;
        }

        if let Some(parameterized) = migrations.parameterized.get(&type_name) {
            for migration in parameterized {
                add_parameterized_value(snapshot, &id, migration)?;
            }
        }
    }

    tracing::debug!(migrated, "Migrated snapshot");

    Ok(())
}

fn migrate_fields(snapshot: &mut GraphSnapshot, id: &NodeId, fields: &IndexMap<String, Arc<FieldMigration>>) {
    let Some(node) = snapshot.nodes_mut().get_mut(id) else {
        return;
    };

    let data = Arc::make_mut(node).data_mut().get_or_insert_default();
    for (field_name, migration) in fields {
        let value = migration(data.field(field_name));
        data.set(&[PathPart::from(field_name.as_str())], value);
    }
}

fn add_parameterized_value(
    snapshot: &mut GraphSnapshot,
    container_id: &NodeId,
    migration: &ParameterizedMigration,
) -> Result<(), OperationError> {
    let field_id = node_id_for_parameterized_value(container_id, &migration.path, &migration.args)?;

    let linked = snapshot
        .node(container_id)
        .is_some_and(|container| container.has_reference(Direction::Outbound, &field_id, &migration.path));
    if linked {
        return Ok(());
    }

    let mut node = NodeSnapshot::new(NodeKind::ParameterizedValue);
    *node.data_mut() = Some(migration.default_value.clone());
    node.add_reference(Direction::Inbound, container_id.clone(), migration.path.clone());

    let nodes = snapshot.nodes_mut();
    nodes.insert(field_id.clone(), Arc::new(node));
    if let Some(container) = nodes.get_mut(container_id) {
        Arc::make_mut(container).add_reference(Direction::Outbound, field_id, migration.path.clone());
    }

    Ok(())
}
