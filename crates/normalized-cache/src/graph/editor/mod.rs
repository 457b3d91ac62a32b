//! Building a new snapshot out of a parent snapshot and a series of payloads.
//!
//! Merging a payload runs in three phases: values are written while walking the payload and the
//! selection together, the reference changes collected on the way are applied, and finally nodes
//! nothing points at anymore are removed. [`SnapshotEditor::commit`] then produces the new
//! [`GraphSnapshot`].

mod commit;
mod gc;
mod merge;
mod references;

use std::{collections::BTreeSet, sync::Arc};

use fxhash::FxHashMap;

use super::{GraphSnapshot, GraphValue, NodeKind, NodeSnapshot};
use crate::{CacheContext, NodeId, PathPart, operation::OperationInstance};

/// Result of committing an editor.
#[derive(Debug, Clone)]
pub struct EditedSnapshot {
    pub snapshot: GraphSnapshot,
    /// Nodes whose data changed or that were removed. Ancestors that were only re-versioned to
    /// point at a changed node are not included.
    pub edited_node_ids: BTreeSet<NodeId>,
    pub written_queries: Vec<Arc<OperationInstance>>,
    pub warnings: Vec<String>,
}

/// Accumulates changes on top of a parent snapshot, which itself is never modified.
pub struct SnapshotEditor<'ctx> {
    context: &'ctx CacheContext,
    parent: GraphSnapshot,
    /// Nodes created or modified so far. `None` marks a removed node.
    new_nodes: FxHashMap<NodeId, Option<NodeSnapshot>>,
    edited_node_ids: BTreeSet<NodeId>,
    /// Nodes that lost their last inbound reference during the current merge.
    orphaned_node_ids: BTreeSet<NodeId>,
    written_queries: Vec<Arc<OperationInstance>>,
    warnings: Vec<String>,
}

impl<'ctx> SnapshotEditor<'ctx> {
    pub fn new(context: &'ctx CacheContext, parent: GraphSnapshot) -> Self {
        SnapshotEditor {
            context,
            parent,
            new_nodes: FxHashMap::default(),
            edited_node_ids: BTreeSet::new(),
            orphaned_node_ids: BTreeSet::new(),
            written_queries: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// The most recent version of a node, whether edited or inherited from the parent.
    pub(crate) fn get_node_snapshot(&self, id: &NodeId) -> Option<&NodeSnapshot> {
        match self.new_nodes.get(id) {
            Some(node) => node.as_ref(),
            None => self.parent.node(id).map(Arc::as_ref),
        }
    }

    pub(crate) fn get_node_data(&self, id: &NodeId) -> Option<&GraphValue> {
        self.get_node_snapshot(id)?.data()
    }

    /// A mutable copy of the node owned by this editor. A node that does not exist yet (or was
    /// removed earlier in this editor) is created empty with the given kind.
    fn ensure_new_snapshot(&mut self, id: &NodeId, kind: NodeKind) -> &mut NodeSnapshot {
        let parent = &self.parent;
        self.new_nodes
            .entry(id.clone())
            .or_insert_with(|| parent.node(id).map(|node| NodeSnapshot::clone(node)))
            .get_or_insert_with(|| NodeSnapshot::new(kind))
    }

    /// Writes a value into a node's data and marks the node as edited.
    fn set_value(&mut self, id: &NodeId, path: &[PathPart], value: GraphValue) {
        self.edited_node_ids.insert(id.clone());
        self.ensure_new_snapshot(id, NodeKind::Entity)
            .data_mut()
            .get_or_insert_default()
            .set(path, value);
    }
}

#[cfg(test)]
mod tests;
