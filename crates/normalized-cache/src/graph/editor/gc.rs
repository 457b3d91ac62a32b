use super::SnapshotEditor;
use crate::graph::{Direction, NodeKind};

impl SnapshotEditor<'_> {
    /// Removes every node that lost its last inbound reference, then whatever became
    /// unreachable through them.
    pub(super) fn remove_orphaned_nodes(&mut self) {
        let mut queue: Vec<_> = std::mem::take(&mut self.orphaned_node_ids).into_iter().collect();
        let mut removed = 0usize;

        while let Some(id) = queue.pop() {
            let Some(node) = self.get_node_snapshot(&id) else {
                continue;
            };
            if !node.inbound().is_empty() {
                continue;
            }

            let outbound = node.outbound().to_vec();
            self.new_nodes.insert(id.clone(), None);
            self.edited_node_ids.insert(id.clone());
            removed += 1;

            for reference in outbound {
                if self.get_node_snapshot(&reference.id).is_none() {
                    continue;
                }

                let orphaned = self
                    .ensure_new_snapshot(&reference.id, NodeKind::Entity)
                    .remove_reference(Direction::Inbound, &id, &reference.path);

                if orphaned {
                    queue.push(reference.id);
                }
            }
        }

        if removed > 0 {
            tracing::debug!(removed, "Removed orphaned nodes");
        }
    }
}
