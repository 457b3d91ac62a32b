use std::sync::Arc;

use fxhash::FxHashSet;

use super::{EditedSnapshot, SnapshotEditor};
use crate::{
    NodeId, Result,
    graph::{GraphSnapshot, NodeKind},
};

impl SnapshotEditor<'_> {
    /// Produces the new snapshot. The parent snapshot is left untouched.
    pub fn commit(mut self) -> Result<EditedSnapshot> {
        self.rebuild_ancestors();
        let snapshot = self.build_snapshot();

        if self.context.config().freeze_snapshots {
            snapshot.verify()?;
        }

        tracing::debug!(
            nodes = snapshot.len(),
            edited = self.edited_node_ids.len(),
            "Committed snapshot"
        );

        Ok(EditedSnapshot {
            snapshot,
            edited_node_ids: self.edited_node_ids,
            written_queries: self.written_queries,
            warnings: self.warnings,
        })
    }

    /// Gives every transitive container of an edited node a new version, so that a change is
    /// visible from every node pointing at it. Containers are not marked as edited.
    fn rebuild_ancestors(&mut self) {
        let mut queue: Vec<NodeId> = self.edited_node_ids.iter().cloned().collect();
        let mut seen: FxHashSet<NodeId> = queue.iter().cloned().collect();

        while let Some(id) = queue.pop() {
            let Some(node) = self.get_node_snapshot(&id) else {
                continue;
            };

            let containers: Vec<NodeId> = node
                .inbound()
                .iter()
                .map(|reference| reference.id.clone())
                .filter(|container_id| !seen.contains(container_id))
                .collect();

            for container_id in containers {
                seen.insert(container_id.clone());
                if self.get_node_snapshot(&container_id).is_none() {
                    continue;
                }
                self.ensure_new_snapshot(&container_id, NodeKind::Entity);
                queue.push(container_id);
            }
        }
    }

    fn build_snapshot(&mut self) -> GraphSnapshot {
        let context = self.context;
        let transformer = context.entity_transformer();
        let mut nodes = self.parent.nodes().clone();

        for (id, node) in self.new_nodes.drain() {
            match node {
                None => {
                    nodes.remove(&id);
                }
                Some(mut node) => {
                    // Re-versioned ancestors keep their data as is.
                    let edited = self.edited_node_ids.contains(&id);
                    if let (Some(transformer), true, true, Some(data)) =
                        (transformer, edited, node.is_entity(), node.data_mut())
                    {
                        transformer(data);
                    }
                    nodes.insert(id, Arc::new(node));
                }
            }
        }

        GraphSnapshot::from_nodes(nodes)
    }
}
