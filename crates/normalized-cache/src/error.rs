use std::borrow::Cow;

use itertools::Itertools;

use crate::{NodeId, PathPart};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the cache can produce. All of them abort the operation in flight; non-fatal
/// anomalies are reported as warnings instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Variable(#[from] VariableError),
    #[error(transparent)]
    InvalidPayload(#[from] InvalidPayloadError),
    #[error(transparent)]
    Operation(#[from] OperationError),
    #[error(transparent)]
    CacheConsistency(#[from] CacheConsistencyError),
}

/// Malformed or unsupported selections.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    #[error("Could not parse GraphQL document: {message}")]
    Parsing { message: String },
    #[error("Expected fragment {name} to be defined")]
    UnknownFragment { name: String },
    #[error("Fragment cycle detected: {}", .cycle.iter().join(", "))]
    FragmentCycle { cycle: Vec<String> },
    #[error("Conflicting field definitions: {message} at {}", DottedPath(.path))]
    ConflictingFields { message: Cow<'static, str>, path: Vec<String> },
    #[error("Parsed a query, but found no fields present; it may use unsupported GraphQL features")]
    NoFields,
    #[error("Expected exactly one operation definition, found {count}")]
    MissingOperation { count: usize },
    #[error("Found {count} fragments. `fragment_name` must be provided when there is not exactly 1 fragment")]
    AmbiguousFragment { count: usize },
    #[error("Validation error{} in {operation}:\n - {}", if .messages.len() == 1 { "" } else { "s" }, .messages.iter().join("\n - "))]
    Validation { operation: String, messages: Vec<String> },
}

impl QueryError {
    pub(crate) fn conflicting_fields(message: impl Into<Cow<'static, str>>, path: &[&str]) -> Self {
        QueryError::ConflictingFields {
            message: message.into(),
            path: path.iter().map(|segment| segment.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum VariableError {
    #[error("Expected variable ${name} to exist for query")]
    Missing { name: String },
    #[error("Expected the condition of @{directive} to be a boolean, found {value}")]
    InvalidCondition { directive: &'static str, value: serde_json::Value },
}

/// The payload does not have the shape the selection expects at some position.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} at {} (container {container_id}, path {})", DottedPath(.prefix_path), DottedPath(.path))]
pub struct InvalidPayloadError {
    pub message: Cow<'static, str>,
    pub prefix_path: Vec<PathPart>,
    pub container_id: NodeId,
    pub path: Vec<PathPart>,
    pub payload: serde_json::Value,
}

/// Raised when the cache reaches a state that points at a bug, either in a user supplied hook
/// (such as the identity function) or in the cache itself.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OperationError {
    #[error("{message} at {} (container {container_id})", DottedPath(.prefix_path))]
    InconsistentIdentity {
        message: Cow<'static, str>,
        prefix_path: Vec<PathPart>,
        container_id: NodeId,
    },
    #[error("Argument value still references variable ${name}; the operation must be expanded first")]
    UnexpandedVariable { name: String },
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheConsistencyError {
    #[error("Node {source_id} references {target_id} at {} but the reverse reference is missing", DottedPath(.path))]
    MissingInboundReference {
        source_id: NodeId,
        target_id: NodeId,
        path: Vec<PathPart>,
    },
    #[error("Node {target_id} is referenced by {source_id} at {} but the forward reference is missing", DottedPath(.path))]
    MissingOutboundReference {
        source_id: NodeId,
        target_id: NodeId,
        path: Vec<PathPart>,
    },
    #[error("Node {source_id} references missing node {target_id}")]
    DanglingReference { source_id: NodeId, target_id: NodeId },
}

/// Renders a path in dotted notation, `foo.0.bar`.
pub(crate) struct DottedPath<'a, T>(pub &'a [T]);

impl<T: std::fmt::Display> std::fmt::Display for DottedPath<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        write!(f, "{}", self.0.iter().format("."))
    }
}
