use super::SnapshotEditor;
use crate::{
    NodeId, OperationError, PathPart,
    graph::{Direction, GraphValue, NodeKind, NodeSnapshot},
    ids::node_id_for_parameterized_value,
    operation::Arguments,
};

/// A change of the node referenced at `path` inside `container_id`, applied once the payload
/// walk is done.
#[derive(Debug, Clone)]
pub(super) struct ReferenceEdit {
    pub container_id: NodeId,
    pub path: Vec<PathPart>,
    pub previous_id: Option<NodeId>,
    pub next_id: Option<NodeId>,
    /// Only drop the reference; the container's data was already rewritten.
    pub no_write: bool,
}

impl SnapshotEditor<'_> {
    pub(super) fn merge_reference_edits(&mut self, edits: Vec<ReferenceEdit>) {
        for edit in edits {
            let ReferenceEdit {
                container_id,
                path,
                previous_id,
                next_id,
                no_write,
            } = edit;

            // Edits are applied in selection order, so when two selections target the same
            // position the later one replaces whatever the earlier one linked.
            let previous_id = if no_write {
                previous_id
            } else {
                self.current_entity_reference(&container_id, &path)
            };

            if !no_write {
                let value = next_id.clone().map(GraphValue::Reference).unwrap_or_default();
                self.set_value(&container_id, &path, value);
            }

            if let Some(previous_id) = previous_id {
                self.remove_reference(&container_id, &path, previous_id);
            }

            if let Some(next_id) = next_id {
                self.ensure_new_snapshot(&container_id, NodeKind::Entity).add_reference(
                    Direction::Outbound,
                    next_id.clone(),
                    path.clone(),
                );
                self.ensure_new_snapshot(&next_id, NodeKind::Entity).add_reference(
                    Direction::Inbound,
                    container_id.clone(),
                    path,
                );
                self.orphaned_node_ids.remove(&next_id);
            }
        }
    }

    fn remove_reference(&mut self, container_id: &NodeId, path: &[PathPart], target_id: NodeId) {
        self.ensure_new_snapshot(container_id, NodeKind::Entity).remove_reference(
            Direction::Outbound,
            &target_id,
            path,
        );

        if self.get_node_snapshot(&target_id).is_none() {
            return;
        }

        let orphaned = self
            .ensure_new_snapshot(&target_id, NodeKind::Entity)
            .remove_reference(Direction::Inbound, container_id, path);

        if orphaned {
            self.orphaned_node_ids.insert(target_id);
        }
    }

    /// The entity currently linked at `path` of the container, as opposed to a parameterized
    /// value stored for a field at the same path.
    fn current_entity_reference(&self, container_id: &NodeId, path: &[PathPart]) -> Option<NodeId> {
        self.get_node_snapshot(container_id)?
            .outbound()
            .iter()
            .filter(|reference| reference.path == path)
            .find(|reference| {
                self.get_node_snapshot(&reference.id)
                    .is_some_and(NodeSnapshot::is_entity)
            })
            .map(|reference| reference.id.clone())
    }

    /// Returns the id of the node holding the value of a parameterized field, creating it and
    /// linking it to its container if needed.
    pub(super) fn ensure_parameterized_value_snapshot(
        &mut self,
        container_id: &NodeId,
        path: &[PathPart],
        args: &Arguments,
    ) -> Result<NodeId, OperationError> {
        let field_id = node_id_for_parameterized_value(container_id, path, args)?;

        let linked = self
            .get_node_snapshot(container_id)
            .is_some_and(|container| container.has_reference(Direction::Outbound, &field_id, path));

        if !linked {
            let mut node = NodeSnapshot::new(NodeKind::ParameterizedValue);
            node.add_reference(Direction::Inbound, container_id.clone(), path.to_vec());
            self.new_nodes.insert(field_id.clone(), Some(node));

            self.ensure_new_snapshot(container_id, NodeKind::Entity).add_reference(
                Direction::Outbound,
                field_id.clone(),
                path.to_vec(),
            );
        }

        Ok(field_id)
    }
}
