use std::{fmt, sync::Arc};

use crate::{OperationError, operation::Arguments};

/// Separates the components of a parameterized value's node id. Chosen so it never shows up in
/// entity ids or in the JSON encoding of paths and arguments.
pub const PARAMETERIZED_ID_SEPARATOR: char = '❖';

/// Identity of a node in the graph.
///
/// Ids are persisted alongside cache dumps, so their textual form must stay stable.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct NodeId(Arc<str>);

impl NodeId {
    pub const QUERY_ROOT: &'static str = "ROOT_QUERY";
    pub const MUTATION_ROOT: &'static str = "ROOT_MUTATION";
    pub const SUBSCRIPTION_ROOT: &'static str = "ROOT_SUBSCRIPTION";

    pub fn new(id: impl Into<Arc<str>>) -> Self {
        NodeId(id.into())
    }

    pub fn query_root() -> Self {
        NodeId::new(Self::QUERY_ROOT)
    }

    pub fn mutation_root() -> Self {
        NodeId::new(Self::MUTATION_ROOT)
    }

    pub fn subscription_root() -> Self {
        NodeId::new(Self::SUBSCRIPTION_ROOT)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_query_root(&self) -> bool {
        self.as_str() == Self::QUERY_ROOT
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        NodeId::new(id)
    }
}

impl std::borrow::Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A segment of a path inside a node's data: an object key or an array index.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum PathPart {
    Index(usize),
    Key(String),
}

impl PathPart {
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathPart::Index(index) => Some(*index),
            PathPart::Key(_) => None,
        }
    }
}

impl fmt::Display for PathPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPart::Index(index) => write!(f, "{index}"),
            PathPart::Key(key) => f.write_str(key),
        }
    }
}

impl fmt::Debug for PathPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPart::Index(index) => fmt::Debug::fmt(index, f),
            PathPart::Key(key) => fmt::Debug::fmt(key, f),
        }
    }
}

impl From<usize> for PathPart {
    fn from(index: usize) -> Self {
        PathPart::Index(index)
    }
}

impl From<&str> for PathPart {
    fn from(key: &str) -> Self {
        PathPart::Key(key.to_string())
    }
}

impl From<String> for PathPart {
    fn from(key: String) -> Self {
        PathPart::Key(key)
    }
}

/// Derives the id of the node holding the value of a parameterized field.
///
/// The id is `container ❖ json(path) ❖ json(args)`. Arguments are stored with sorted object
/// keys, so two logically equal argument maps always produce the same id.
pub fn node_id_for_parameterized_value(
    container_id: &NodeId,
    path: &[PathPart],
    args: &Arguments,
) -> Result<NodeId, OperationError> {
    if let Some(name) = args.values().find_map(|value| value.first_variable()) {
        return Err(OperationError::UnexpandedVariable { name: name.to_string() });
    }

    // Serializing paths and variable-free arguments into a String cannot fail.
    let path = serde_json::to_string(path).unwrap_or_default();
    let args = serde_json::to_string(args).unwrap_or_default();

    Ok(NodeId::new(format!(
        "{container_id}{PARAMETERIZED_ID_SEPARATOR}{path}{PARAMETERIZED_ID_SEPARATOR}{args}"
    )))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::operation::ArgumentValue;

    #[test]
    fn parameterized_ids_are_stable() {
        let mut args = BTreeMap::new();
        args.insert("id".to_string(), ArgumentValue::from(serde_json::json!(1)));

        let id = node_id_for_parameterized_value(&NodeId::query_root(), &["foo".into()], &args).unwrap();

        assert_eq!(id.as_str(), r#"ROOT_QUERY❖["foo"]❖{"id":1}"#);
    }

    #[test]
    fn argument_key_order_is_irrelevant() {
        let first = ArgumentValue::from(serde_json::json!({"b": 1, "a": {"d": true, "c": [1, 2]}}));
        let second = ArgumentValue::from(serde_json::json!({"a": {"c": [1, 2], "d": true}, "b": 1}));

        let first = BTreeMap::from([("filter".to_string(), first)]);
        let second = BTreeMap::from([("filter".to_string(), second)]);
        let path = ["foo".into(), 0.into(), "bar".into()];

        let first = node_id_for_parameterized_value(&NodeId::query_root(), &path, &first).unwrap();
        let second = node_id_for_parameterized_value(&NodeId::query_root(), &path, &second).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first.as_str(),
            r#"ROOT_QUERY❖["foo",0,"bar"]❖{"filter":{"a":{"c":[1,2],"d":true},"b":1}}"#
        );
    }

    #[test]
    fn unexpanded_variables_are_rejected() {
        let args = BTreeMap::from([("id".to_string(), ArgumentValue::variable("userId"))]);

        let error = node_id_for_parameterized_value(&NodeId::query_root(), &["user".into()], &args).unwrap_err();

        assert_eq!(
            error.to_string(),
            "Argument value still references variable $userId; the operation must be expanded first"
        );
    }
}
