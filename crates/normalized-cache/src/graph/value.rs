use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde_json::Value;

use crate::{NodeId, PathPart};

/// Data stored in a node. Same shape as JSON, except that a position holding an entity or a
/// parameterized value points at that node instead of embedding it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GraphValue {
    #[default]
    Null,
    Boolean(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<GraphValue>),
    Object(IndexMap<String, GraphValue>),
    Reference(NodeId),
}

impl GraphValue {
    pub fn is_null(&self) -> bool {
        matches!(self, GraphValue::Null)
    }

    pub fn as_reference(&self) -> Option<&NodeId> {
        match self {
            GraphValue::Reference(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[GraphValue]> {
        match self {
            GraphValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, GraphValue>> {
        match self {
            GraphValue::Object(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GraphValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&GraphValue> {
        self.as_object()?.get(name)
    }

    /// The value at `path`, or `None` if the path leads nowhere.
    pub fn get(&self, path: &[PathPart]) -> Option<&GraphValue> {
        path.iter().try_fold(self, |value, part| match (value, part) {
            (GraphValue::Object(fields), PathPart::Key(key)) => fields.get(key),
            (GraphValue::List(items), PathPart::Index(index)) => items.get(*index),
            _ => None,
        })
    }

    /// Writes `value` at `path`, creating or replacing intermediate containers that do not have
    /// the expected shape.
    pub(crate) fn set(&mut self, path: &[PathPart], value: GraphValue) {
        let Some((first, rest)) = path.split_first() else {
            *self = value;
            return;
        };

        match first {
            PathPart::Key(key) => {
                let mut fields = match std::mem::take(self) {
                    GraphValue::Object(fields) => fields,
                    _ => IndexMap::new(),
                };
                fields.entry(key.clone()).or_default().set(rest, value);
                *self = GraphValue::Object(fields);
            }
            PathPart::Index(index) => {
                let mut items = match std::mem::take(self) {
                    GraphValue::List(items) => items,
                    _ => Vec::new(),
                };
                if items.len() <= *index {
                    items.resize(index + 1, GraphValue::Null);
                }
                items[*index].set(rest, value);
                *self = GraphValue::List(items);
            }
        }
    }

    /// Structural equality with a JSON payload. A reference never equals a payload value.
    pub fn eq_json(&self, other: &Value) -> bool {
        match (self, other) {
            (GraphValue::Null, Value::Null) => true,
            (GraphValue::Boolean(left), Value::Bool(right)) => left == right,
            (GraphValue::Number(left), Value::Number(right)) => left == right,
            (GraphValue::String(left), Value::String(right)) => left == right,
            (GraphValue::List(left), Value::Array(right)) => {
                left.len() == right.len() && left.iter().zip(right).all(|(left, right)| left.eq_json(right))
            }
            (GraphValue::Object(left), Value::Object(right)) => {
                left.len() == right.len()
                    && left
                        .iter()
                        .all(|(key, left)| right.get(key).is_some_and(|right| left.eq_json(right)))
            }
            _ => false,
        }
    }
}

impl From<&Value> for GraphValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => GraphValue::Null,
            Value::Bool(value) => GraphValue::Boolean(*value),
            Value::Number(value) => GraphValue::Number(value.clone()),
            Value::String(value) => GraphValue::String(value.clone()),
            Value::Array(items) => GraphValue::List(items.iter().map(GraphValue::from).collect()),
            Value::Object(fields) => GraphValue::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), GraphValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for GraphValue {
    fn from(value: Value) -> Self {
        GraphValue::from(&value)
    }
}

/// References are written as `{"__ref": "<node id>"}`.
impl serde::Serialize for GraphValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            GraphValue::Null => serializer.serialize_unit(),
            GraphValue::Boolean(value) => serializer.serialize_bool(*value),
            GraphValue::Number(value) => value.serialize(serializer),
            GraphValue::String(value) => serializer.serialize_str(value),
            GraphValue::List(items) => serializer.collect_seq(items),
            GraphValue::Object(fields) => serializer.collect_map(fields),
            GraphValue::Reference(id) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("__ref", id)?;
                map.end()
            }
        }
    }
}
