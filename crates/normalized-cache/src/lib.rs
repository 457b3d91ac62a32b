//! A normalized cache for GraphQL responses.
//!
//! Responses are split into a graph of nodes: every identifiable object (an entity) is stored
//! once under its id, and the value of every field selected with arguments lives in a node of its
//! own. Writing a response produces a new immutable [`GraphSnapshot`] that shares all untouched
//! nodes with the previous one.
//!
//! The write path:
//!
//! 1. The document is parsed into a [`ParsedQuery`](operation::ParsedQuery), once per document.
//! 2. Variables are substituted to get an [`OperationInstance`], once per document, root and
//!    variable set.
//! 3. A [`SnapshotEditor`] merges the payload into the graph and commits a new snapshot.

mod context;
mod error;
mod graph;
mod ids;
mod migrate;
pub mod operation;
mod tracer;

use serde_json::Value;

pub use self::{
    context::{CacheConfig, CacheContext, EntityIdForValue, EntityTransformer, default_entity_id_for_value},
    error::*,
    graph::{EditedSnapshot, GraphSnapshot, GraphValue, NodeKind, NodeReference, NodeSnapshot, SnapshotEditor},
    ids::{NodeId, PARAMETERIZED_ID_SEPARATOR, PathPart, node_id_for_parameterized_value},
    migrate::{FieldMigration, MigrationMap, ParameterizedMigration, migrate},
    operation::{OperationInstance, RawOperation, Variables},
    tracer::{LoggingTracer, NoopTracer, Tracer, WriteSummary},
};

/// Writes the payload of an operation on top of `snapshot`, returning the new snapshot.
///
/// Nothing is written on error: `snapshot` is never modified and the partially edited state is
/// discarded.
pub fn write(
    context: &mut CacheContext,
    snapshot: &GraphSnapshot,
    operation: &RawOperation,
    payload: &Value,
) -> Result<EditedSnapshot> {
    let operation = context.parse_operation(operation)?;
    let context = &*context;
    let tracer = context.tracer();

    tracer.write_start(&operation, payload);

    let mut editor = SnapshotEditor::new(context, snapshot.clone());
    let warnings = editor.merge_payload(&operation, payload)?;
    for warning in &warnings {
        tracer.warning(warning);
    }

    let edited = editor.commit()?;

    tracer.write_end(
        &operation,
        WriteSummary {
            payload,
            edited_node_ids: &edited.edited_node_ids,
            warnings: &edited.warnings,
        },
    );

    Ok(edited)
}

#[cfg(test)]
use tracing_subscriber as _;
