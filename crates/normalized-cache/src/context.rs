use std::{fmt, sync::Arc};

use fxhash::FxHashMap;
use serde_json::Value;

use crate::{
    GraphValue, NodeId, Result,
    operation::{OperationInstance, ParseOptions, QueryInfo, RawOperation, expand_variables},
    tracer::{NoopTracer, Tracer},
};

/// Computes the identity of a payload object, or `None` for values stored inline.
pub type EntityIdForValue = dyn Fn(&Value) -> Option<NodeId> + Send + Sync;

/// Rewrites the data of entity nodes as snapshots are committed.
pub type EntityTransformer = dyn Fn(&mut GraphValue) + Send + Sync;

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Verify the bidirectional reference invariant on every committed snapshot.
    pub freeze_snapshots: bool,
    /// Select `__typename` in every selection set below the root.
    pub add_typename: bool,
    /// Reject operations whose used and declared variables differ.
    pub strict_variables: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freeze_snapshots: false,
            add_typename: false,
            strict_variables: true,
        }
    }
}

/// Default identity: the `id` field of an object, strings as is and numbers stringified.
pub fn default_entity_id_for_value(value: &Value) -> Option<NodeId> {
    match value.as_object()?.get("id")? {
        Value::String(id) if !id.is_empty() => Some(NodeId::new(id.as_str())),
        Value::Number(id) => Some(NodeId::new(id.to_string())),
        _ => None,
    }
}

/// Identifies a document: its text plus the fragment selected from it, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DocumentKey([u8; 32]);

impl DocumentKey {
    fn new(operation: &RawOperation) -> Self {
        let mut hasher = blake3::Hasher::new();
        hash_bytes(&mut hasher, operation.document.as_bytes());
        hasher.update(&[operation.from_fragment_document as u8]);
        match &operation.fragment_name {
            Some(name) => {
                hasher.update(&[1]);
                hash_bytes(&mut hasher, name.as_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
        DocumentKey(hasher.finalize().into())
    }
}

/// Length-prefixed so that consecutive parts cannot run into each other.
fn hash_bytes(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Configuration, user hooks and the registry of operations seen so far.
pub struct CacheContext {
    config: CacheConfig,
    entity_id_for_value: Arc<EntityIdForValue>,
    entity_transformer: Option<Arc<EntityTransformer>>,
    tracer: Arc<dyn Tracer>,
    query_infos: FxHashMap<DocumentKey, Arc<QueryInfo>>,
    operations: FxHashMap<DocumentKey, Vec<Arc<OperationInstance>>>,
}

impl Default for CacheContext {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl fmt::Debug for CacheContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheContext")
            .field("config", &self.config)
            .field("documents", &self.query_infos.len())
            .finish_non_exhaustive()
    }
}

impl CacheContext {
    pub fn new(config: CacheConfig) -> Self {
        CacheContext {
            config,
            entity_id_for_value: Arc::new(default_entity_id_for_value),
            entity_transformer: None,
            tracer: Arc::new(NoopTracer),
            query_infos: FxHashMap::default(),
            operations: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn with_entity_id_for_value(
        mut self,
        entity_id_for_value: impl Fn(&Value) -> Option<NodeId> + Send + Sync + 'static,
    ) -> Self {
        self.entity_id_for_value = Arc::new(entity_id_for_value);
        self
    }

    #[must_use]
    pub fn with_entity_transformer(
        mut self,
        entity_transformer: impl Fn(&mut GraphValue) + Send + Sync + 'static,
    ) -> Self {
        self.entity_transformer = Some(Arc::new(entity_transformer));
        self
    }

    #[must_use]
    pub fn with_tracer(mut self, tracer: impl Tracer + 'static) -> Self {
        self.tracer = Arc::new(tracer);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn tracer(&self) -> &dyn Tracer {
        self.tracer.as_ref()
    }

    pub(crate) fn entity_transformer(&self) -> Option<&EntityTransformer> {
        self.entity_transformer.as_deref()
    }

    /// Identity of a payload value. An empty id counts as no id.
    pub fn entity_id_for_value(&self, value: &Value) -> Option<NodeId> {
        (self.entity_id_for_value)(value).filter(|id| !id.as_str().is_empty())
    }

    /// Returns the operation instance for a document, root and variable set, reusing both the
    /// parsed document and the expanded instance when they were seen before.
    pub fn parse_operation(&mut self, raw: &RawOperation) -> Result<Arc<OperationInstance>> {
        let key = DocumentKey::new(raw);
        let info = self.query_info(key, raw)?;
        let variables = raw
            .variables
            .as_ref()
            .map(|variables| variables.with_defaults(&info.variable_defaults))
            .unwrap_or_else(|| info.variable_defaults.clone());

        let instances = self.operations.entry(key).or_default();
        if let Some(instance) = instances
            .iter()
            .find(|instance| instance.root_id == raw.root_id && instance.variables == variables)
        {
            return Ok(Arc::clone(instance));
        }

        let parsed_query = expand_variables(&info.parsed_query, &variables)?;
        let instance = Arc::new(OperationInstance {
            root_id: raw.root_id.clone(),
            is_static: !info.parsed_query.is_dynamic(),
            parsed_query,
            info,
            variables,
        });

        tracing::debug!(
            root_id = %instance.root_id,
            variables = %instance.variables,
            is_static = instance.is_static,
            "Registered operation instance"
        );

        instances.push(Arc::clone(&instance));
        Ok(instance)
    }

    fn query_info(&mut self, key: DocumentKey, raw: &RawOperation) -> Result<Arc<QueryInfo>> {
        if let Some(info) = self.query_infos.get(&key) {
            return Ok(Arc::clone(info));
        }

        let options = ParseOptions {
            add_typename: self.config.add_typename,
        };
        let info = Arc::new(QueryInfo::new(raw, options, self.config.strict_variables)?);
        self.query_infos.insert(key, Arc::clone(&info));

        Ok(info)
    }
}
