use std::collections::BTreeSet;

use serde_json::Value;

use crate::{NodeId, operation::OperationInstance};

/// Hooks observing cache activity. Every method defaults to doing nothing.
#[allow(unused_variables)]
pub trait Tracer: Send + Sync {
    fn warning(&self, message: &str) {}

    fn read_start(&self, operation: &OperationInstance) {}

    fn read_end(&self, operation: &OperationInstance, complete: bool) {}

    fn write_start(&self, operation: &OperationInstance, payload: &Value) {}

    fn write_end(&self, operation: &OperationInstance, summary: WriteSummary<'_>) {}
}

/// Outcome of a write, handed to [`Tracer::write_end`].
#[derive(Debug, Clone, Copy)]
pub struct WriteSummary<'a> {
    pub payload: &'a Value,
    pub edited_node_ids: &'a BTreeSet<NodeId>,
    pub warnings: &'a [String],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Forwards cache activity to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTracer;

impl Tracer for LoggingTracer {
    fn warning(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn read_start(&self, operation: &OperationInstance) {
        tracing::trace!(root_id = %operation.root_id, "Reading operation");
    }

    fn read_end(&self, operation: &OperationInstance, complete: bool) {
        tracing::trace!(root_id = %operation.root_id, complete, "Read operation");
    }

    fn write_start(&self, operation: &OperationInstance, _payload: &Value) {
        tracing::debug!(
            root_id = %operation.root_id,
            operation_name = operation.info.operation_name.as_deref().unwrap_or_default(),
            "Writing payload"
        );
    }

    fn write_end(&self, operation: &OperationInstance, summary: WriteSummary<'_>) {
        tracing::debug!(
            root_id = %operation.root_id,
            edited = summary.edited_node_ids.len(),
            warnings = summary.warnings.len(),
            "Wrote payload"
        );
    }
}
