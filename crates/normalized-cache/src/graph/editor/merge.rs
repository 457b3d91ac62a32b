use std::sync::Arc;

use fxhash::FxHashSet;
use serde_json::{Map, Value};

use super::{SnapshotEditor, references::ReferenceEdit};
use crate::{
    InvalidPayloadError, NodeId, OperationError, PathPart, Result,
    error::DottedPath,
    graph::GraphValue,
    operation::{OperationInstance, ParsedQuery},
};

static NULL: Value = Value::Null;

/// State of a single `merge_payload` call.
#[derive(Default)]
struct MergeState {
    reference_edits: Vec<ReferenceEdit>,
    warnings: Vec<String>,
    /// Entities already merged with a given selection. A payload may reference the same entity
    /// in several places.
    visited: FxHashSet<(NodeId, *const ParsedQuery)>,
}

/// Where a payload value is written: the node holding it, the path from the payload root (for
/// error messages) and the path within that node's data.
struct Location<'a> {
    container_id: &'a NodeId,
    prefix_path: &'a [PathPart],
    path: &'a [PathPart],
}

impl Location<'_> {
    fn invalid_payload(&self, message: &'static str, payload: &Value) -> InvalidPayloadError {
        InvalidPayloadError {
            message: message.into(),
            prefix_path: self.prefix_path.to_vec(),
            container_id: self.container_id.clone(),
            path: self.path.to_vec(),
            payload: payload.clone(),
        }
    }

    fn inconsistent_identity(&self, message: &'static str) -> OperationError {
        OperationError::InconsistentIdentity {
            message: message.into(),
            prefix_path: self.prefix_path.iter().chain(self.path).cloned().collect(),
            container_id: self.container_id.clone(),
        }
    }

    fn payload_path(&self, field: &str) -> Vec<PathPart> {
        let mut path: Vec<PathPart> = self.prefix_path.iter().chain(self.path).cloned().collect();
        path.push(field.into());
        path
    }
}

/// What a payload position held before the merge.
struct PreviousValue {
    /// Nothing was ever written at that position.
    is_missing: bool,
    /// Missing or null.
    is_null: bool,
    list_len: Option<usize>,
    id: Option<NodeId>,
}

impl SnapshotEditor<'_> {
    /// Merges a payload for an operation into the graph. On success, returns the warnings this
    /// payload produced.
    ///
    /// An error leaves the editor in an unspecified state; it should be dropped, which discards
    /// every change since the parent snapshot.
    pub fn merge_payload(&mut self, operation: &Arc<OperationInstance>, payload: &Value) -> Result<Vec<String>> {
        let location = Location {
            container_id: &operation.root_id,
            prefix_path: &[],
            path: &[],
        };

        let Value::Object(fields) = payload else {
            return Err(location
                .invalid_payload("Expected the operation payload to be an object", payload)
                .into());
        };

        let mut state = MergeState::default();
        self.merge_fields(&mut state, &location, &operation.parsed_query, fields)?;

        self.merge_reference_edits(state.reference_edits);
        self.remove_orphaned_nodes();

        if !self
            .written_queries
            .iter()
            .any(|written| Arc::ptr_eq(written, operation))
        {
            self.written_queries.push(Arc::clone(operation));
        }
        self.warnings.extend(state.warnings.iter().cloned());

        Ok(state.warnings)
    }

    fn merge_fields(
        &mut self,
        state: &mut MergeState,
        location: &Location<'_>,
        parsed_query: &ParsedQuery,
        payload: &Map<String, Value>,
    ) -> Result<()> {
        for (response_name, node) in parsed_query.iter() {
            if node.is_excluded() {
                continue;
            }

            let schema_name = node.schema_name().unwrap_or(response_name);
            let field_value = match payload.get(response_name) {
                Some(value) => value,
                None => {
                    let message = format!(
                        "Encountered undefined at {}. Treating as null",
                        DottedPath(&location.payload_path(response_name))
                    );
                    state.warnings.push(message);
                    &NULL
                }
            };

            let mut field_path = location.path.to_vec();
            field_path.push(schema_name.into());

            // A parameterized field lives in its own node, rooted at an empty path.
            let (container_id, prefix_path, field_path) = match node.args() {
                Some(args) => {
                    let container_id = self.ensure_parameterized_value_snapshot(location.container_id, &field_path, args)?;
                    let prefix_path: Vec<PathPart> = location.prefix_path.iter().cloned().chain(field_path).collect();
                    (container_id, prefix_path, Vec::new())
                }
                None => (location.container_id.clone(), location.prefix_path.to_vec(), field_path),
            };

            let field_location = Location {
                container_id: &container_id,
                prefix_path: &prefix_path,
                path: &field_path,
            };

            match node.children() {
                Some(children) => self.merge_subgraph(state, &field_location, children, field_value)?,
                None => {
                    let unchanged = self
                        .get_node_data(&container_id)
                        .and_then(|data| data.get(&field_path))
                        .is_some_and(|previous| previous.eq_json(field_value));

                    if !unchanged {
                        self.set_value(&container_id, &field_path, GraphValue::from(field_value));
                    }
                }
            }
        }

        Ok(())
    }

    fn previous_value(&self, location: &Location<'_>) -> PreviousValue {
        let previous = self
            .get_node_data(location.container_id)
            .and_then(|data| data.get(location.path));

        PreviousValue {
            is_missing: previous.is_none(),
            is_null: previous.is_none_or(GraphValue::is_null),
            list_len: previous.and_then(GraphValue::as_list).map(<[GraphValue]>::len),
            id: previous.and_then(GraphValue::as_reference).cloned(),
        }
    }

    /// Merges the payload of a field with a sub-selection.
    fn merge_subgraph(
        &mut self,
        state: &mut MergeState,
        location: &Location<'_>,
        parsed_query: &Arc<ParsedQuery>,
        payload: &Value,
    ) -> Result<()> {
        if !matches!(payload, Value::Null | Value::Object(_) | Value::Array(_)) {
            return Err(location
                .invalid_payload(
                    "Received a scalar value for a field with a selection set; expected an object, a list or null",
                    payload,
                )
                .into());
        }

        let previous = self.previous_value(location);

        if payload.is_array() || previous.list_len.is_some() {
            if !previous.is_null && previous.list_len.is_none() {
                return Err(location
                    .invalid_payload("Unsupported transition from a non-list to list value", payload)
                    .into());
            }
            if !payload.is_null() && !payload.is_array() {
                return Err(location
                    .invalid_payload("Unsupported transition from a list to a non-list value", payload)
                    .into());
            }

            return self.merge_array_subgraph(state, location, parsed_query, payload.as_array(), previous.list_len);
        }

        let payload_id = self.context.entity_id_for_value(payload);

        if payload_id != previous.id {
            if !payload.is_null() && payload_id.is_none() {
                return Err(location
                    .invalid_payload("Unsupported transition from an entity to a non-entity value", payload)
                    .into());
            }
            if !previous.is_null && previous.id.is_none() {
                return Err(location
                    .invalid_payload("Unsupported transition from a non-entity value to an entity", payload)
                    .into());
            }
            if payload.is_null() && payload_id.is_some() {
                return Err(location
                    .inconsistent_identity("The identity function returned an id for a null payload")
                    .into());
            }

            state.reference_edits.push(ReferenceEdit {
                container_id: location.container_id.clone(),
                path: location.path.to_vec(),
                previous_id: previous.id,
                next_id: payload_id.clone(),
                no_write: false,
            });

            if payload.is_null() {
                return Ok(());
            }
        } else if payload.is_null() {
            if !previous.is_null {
                self.remove_references_under(state, location.container_id, location.path, None);
            }
            if previous.is_missing || !previous.is_null {
                self.set_value(location.container_id, location.path, GraphValue::Null);
            }
            return Ok(());
        }

        let Value::Object(fields) = payload else {
            return Ok(());
        };

        match payload_id {
            Some(entity_id) => {
                if !state
                    .visited
                    .insert((entity_id.clone(), Arc::as_ptr(parsed_query)))
                {
                    return Ok(());
                }

                let prefix_path: Vec<PathPart> = location.prefix_path.iter().chain(location.path).cloned().collect();
                let entity_location = Location {
                    container_id: &entity_id,
                    prefix_path: &prefix_path,
                    path: &[],
                };
                self.merge_fields(state, &entity_location, parsed_query, fields)
            }
            None => self.merge_fields(state, location, parsed_query, fields),
        }
    }

    fn merge_array_subgraph(
        &mut self,
        state: &mut MergeState,
        location: &Location<'_>,
        parsed_query: &Arc<ParsedQuery>,
        payload: Option<&Vec<Value>>,
        previous_len: Option<usize>,
    ) -> Result<()> {
        let Some(items) = payload else {
            self.remove_references_under(state, location.container_id, location.path, None);
            self.set_value(location.container_id, location.path, GraphValue::Null);
            return Ok(());
        };

        if previous_len != Some(items.len()) {
            let mut resized = self
                .get_node_data(location.container_id)
                .and_then(|data| data.get(location.path))
                .and_then(GraphValue::as_list)
                .map(<[GraphValue]>::to_vec)
                .unwrap_or_default();
            resized.resize(items.len(), GraphValue::Null);
            self.set_value(location.container_id, location.path, GraphValue::List(resized));

            if previous_len.is_some_and(|previous_len| items.len() < previous_len) {
                self.remove_references_under(state, location.container_id, location.path, Some(items.len()));
            }
        }

        for (index, item) in items.iter().enumerate() {
            let mut item_path = location.path.to_vec();
            item_path.push(PathPart::Index(index));

            let item_location = Location {
                container_id: location.container_id,
                prefix_path: location.prefix_path,
                path: &item_path,
            };
            self.merge_subgraph(state, &item_location, parsed_query, item)?;
        }

        Ok(())
    }

    /// Schedules the removal of references nested below `path`. With `from_index`, only the
    /// references inside list items at or after that index are removed.
    fn remove_references_under(
        &self,
        state: &mut MergeState,
        container_id: &NodeId,
        path: &[PathPart],
        from_index: Option<usize>,
    ) {
        let Some(container) = self.get_node_snapshot(container_id) else {
            return;
        };

        for reference in container.outbound() {
            let Some((next, _)) = reference
                .path
                .strip_prefix(path)
                .and_then(|rest| rest.split_first())
            else {
                continue;
            };

            if from_index.is_some_and(|from_index| next.as_index().is_none_or(|index| index < from_index)) {
                continue;
            }

            state.reference_edits.push(ReferenceEdit {
                container_id: container_id.clone(),
                path: reference.path.clone(),
                previous_id: Some(reference.id.clone()),
                next_id: None,
                no_write: true,
            });
        }
    }
}
