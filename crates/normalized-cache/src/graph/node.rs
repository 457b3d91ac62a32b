use super::GraphValue;
use crate::{NodeId, PathPart};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    /// An identifiable object, stored once no matter how many places point at it.
    Entity,
    /// The value of a field selected with arguments.
    ParameterizedValue,
}

/// One end of an edge: the node at the other end and the path within the source node's data
/// where the edge lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct NodeReference {
    pub id: NodeId,
    pub path: Vec<PathPart>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Inbound,
    Outbound,
}

/// A node of the graph. Every outbound reference has a matching inbound reference on its target.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NodeSnapshot {
    #[serde(rename = "type")]
    kind: NodeKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    inbound: Vec<NodeReference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    outbound: Vec<NodeReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<GraphValue>,
}

impl NodeSnapshot {
    pub fn new(kind: NodeKind) -> Self {
        NodeSnapshot {
            kind,
            inbound: Vec::new(),
            outbound: Vec::new(),
            data: None,
        }
    }

    pub fn entity(data: GraphValue) -> Self {
        NodeSnapshot {
            data: Some(data),
            ..NodeSnapshot::new(NodeKind::Entity)
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_entity(&self) -> bool {
        self.kind == NodeKind::Entity
    }

    pub fn data(&self) -> Option<&GraphValue> {
        self.data.as_ref()
    }

    pub fn inbound(&self) -> &[NodeReference] {
        &self.inbound
    }

    pub fn outbound(&self) -> &[NodeReference] {
        &self.outbound
    }

    pub(crate) fn data_mut(&mut self) -> &mut Option<GraphValue> {
        &mut self.data
    }

    fn references_mut(&mut self, direction: Direction) -> &mut Vec<NodeReference> {
        match direction {
            Direction::Inbound => &mut self.inbound,
            Direction::Outbound => &mut self.outbound,
        }
    }

    fn references(&self, direction: Direction) -> &[NodeReference] {
        match direction {
            Direction::Inbound => &self.inbound,
            Direction::Outbound => &self.outbound,
        }
    }

    pub(crate) fn has_reference(&self, direction: Direction, id: &NodeId, path: &[PathPart]) -> bool {
        self.references(direction)
            .iter()
            .any(|reference| reference.id == *id && reference.path == path)
    }

    /// Adds the reference unless it is already present.
    pub(crate) fn add_reference(&mut self, direction: Direction, id: NodeId, path: Vec<PathPart>) {
        if !self.has_reference(direction, &id, &path) {
            self.references_mut(direction).push(NodeReference { id, path });
        }
    }

    /// Returns whether no reference in that direction is left.
    pub(crate) fn remove_reference(&mut self, direction: Direction, id: &NodeId, path: &[PathPart]) -> bool {
        let references = self.references_mut(direction);
        references.retain(|reference| !(reference.id == *id && reference.path == path));
        references.is_empty()
    }
}
