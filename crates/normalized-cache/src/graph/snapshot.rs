use std::{collections::BTreeMap, fmt, sync::Arc};

use super::{GraphValue, NodeSnapshot, node::Direction};
use crate::{CacheConsistencyError, NodeId};

/// An immutable view of the whole graph.
///
/// Cloning is cheap and edits never touch an existing snapshot: the editor builds a new one that
/// shares every unchanged node with its parent.
#[derive(Clone, Default)]
pub struct GraphSnapshot {
    nodes: im::HashMap<NodeId, Arc<NodeSnapshot>>,
}

impl GraphSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_nodes(nodes: im::HashMap<NodeId, Arc<NodeSnapshot>>) -> Self {
        GraphSnapshot { nodes }
    }

    pub fn node(&self, id: &NodeId) -> Option<&Arc<NodeSnapshot>> {
        self.nodes.get(id)
    }

    /// The data of the node, if it exists and holds any.
    pub fn data(&self, id: &NodeId) -> Option<&GraphValue> {
        self.node(id)?.data()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> + '_ {
        self.nodes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Arc<NodeSnapshot>)> + '_ {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn nodes(&self) -> &im::HashMap<NodeId, Arc<NodeSnapshot>> {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut im::HashMap<NodeId, Arc<NodeSnapshot>> {
        &mut self.nodes
    }

    /// Checks that every reference points at an existing node and is mirrored on the other end.
    pub fn verify(&self) -> Result<(), CacheConsistencyError> {
        for (id, node) in self.nodes.iter() {
            for reference in node.outbound() {
                let Some(target) = self.nodes.get(&reference.id) else {
                    return Err(CacheConsistencyError::DanglingReference {
                        source_id: id.clone(),
                        target_id: reference.id.clone(),
                    });
                };
                if !target.has_reference(Direction::Inbound, id, &reference.path) {
                    return Err(CacheConsistencyError::MissingInboundReference {
                        source_id: id.clone(),
                        target_id: reference.id.clone(),
                        path: reference.path.clone(),
                    });
                }
            }

            for reference in node.inbound() {
                let mirrored = self
                    .nodes
                    .get(&reference.id)
                    .is_some_and(|source| source.has_reference(Direction::Outbound, id, &reference.path));
                if !mirrored {
                    return Err(CacheConsistencyError::MissingOutboundReference {
                        source_id: reference.id.clone(),
                        target_id: id.clone(),
                        path: reference.path.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Ordered view used for display and serialization.
    fn sorted(&self) -> BTreeMap<&NodeId, &NodeSnapshot> {
        self.nodes.iter().map(|(id, node)| (id, node.as_ref())).collect()
    }
}

impl fmt::Debug for GraphSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.sorted()).finish()
    }
}

impl PartialEq for GraphSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

/// Serializes to the flat `{ id: { type, inbound?, outbound?, data? } }` form, ordered by id.
impl serde::Serialize for GraphSnapshot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_map(self.sorted())
    }
}

impl FromIterator<(NodeId, NodeSnapshot)> for GraphSnapshot {
    fn from_iter<T: IntoIterator<Item = (NodeId, NodeSnapshot)>>(iter: T) -> Self {
        GraphSnapshot {
            nodes: iter.into_iter().map(|(id, node)| (id, Arc::new(node))).collect(),
        }
    }
}
