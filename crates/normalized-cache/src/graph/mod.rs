mod editor;
mod node;
mod snapshot;
mod value;

pub(crate) use node::Direction;
pub use self::{
    editor::{EditedSnapshot, SnapshotEditor},
    node::{NodeKind, NodeReference, NodeSnapshot},
    snapshot::GraphSnapshot,
    value::GraphValue,
};
