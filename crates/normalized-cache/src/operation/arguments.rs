use std::collections::BTreeMap;

use indexmap::IndexSet;
use serde::ser::{Error as _, SerializeMap};

use super::Variables;
use crate::VariableError;

/// Field arguments, keyed by argument name. Ordered so that serialization is deterministic.
pub type Arguments = BTreeMap<String, ArgumentValue>;

/// Placeholder for `$name` inside an argument value, replaced during variable expansion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableArgument {
    pub name: String,
}

/// A JSON value as written in an argument position, which may still contain variable
/// placeholders at any depth.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    Null,
    Boolean(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<ArgumentValue>),
    Object(BTreeMap<String, ArgumentValue>),
    Variable(VariableArgument),
}

impl ArgumentValue {
    pub fn variable(name: impl Into<String>) -> Self {
        ArgumentValue::Variable(VariableArgument { name: name.into() })
    }

    /// Converts a value from the GraphQL AST, recording every variable it references.
    ///
    /// Enum values become strings, the same as they would in a JSON request.
    pub(crate) fn from_ast(value: cynic_parser::Value<'_>, variables_used: &mut IndexSet<String>) -> Self {
        use cynic_parser::Value;

        match value {
            Value::Variable(variable) => {
                variables_used.insert(variable.name().to_string());
                ArgumentValue::variable(variable.name())
            }
            Value::Null(_) => ArgumentValue::Null,
            Value::Boolean(value) => ArgumentValue::Boolean(value.value()),
            Value::Int(value) => ArgumentValue::Number(value.as_i64().into()),
            Value::Float(value) => serde_json::Number::from_f64(value.value())
                .map(ArgumentValue::Number)
                .unwrap_or(ArgumentValue::Null),
            Value::String(value) => ArgumentValue::String(value.as_str().to_string()),
            Value::Enum(value) => ArgumentValue::String(value.name().to_string()),
            Value::List(items) => ArgumentValue::List(
                items
                    .into_iter()
                    .map(|item| ArgumentValue::from_ast(item, variables_used))
                    .collect(),
            ),
            Value::Object(fields) => ArgumentValue::Object(
                fields
                    .into_iter()
                    .map(|field| {
                        (
                            field.name().to_string(),
                            ArgumentValue::from_ast(field.value(), variables_used),
                        )
                    })
                    .collect(),
            ),
        }
    }

    /// Substitutes every variable placeholder with its value.
    pub(crate) fn expand(&self, variables: &Variables) -> Result<ArgumentValue, VariableError> {
        Ok(match self {
            ArgumentValue::Variable(VariableArgument { name }) => variables
                .get(name)
                .cloned()
                .map(ArgumentValue::from)
                .ok_or_else(|| VariableError::Missing { name: name.clone() })?,
            ArgumentValue::List(items) => {
                ArgumentValue::List(items.iter().map(|item| item.expand(variables)).collect::<Result<_, _>>()?)
            }
            ArgumentValue::Object(fields) => ArgumentValue::Object(
                fields
                    .iter()
                    .map(|(name, value)| Ok((name.clone(), value.expand(variables)?)))
                    .collect::<Result<_, VariableError>>()?,
            ),
            scalar => scalar.clone(),
        })
    }

    /// The first variable placeholder found in this value, depth first.
    pub fn first_variable(&self) -> Option<&str> {
        match self {
            ArgumentValue::Variable(variable) => Some(&variable.name),
            ArgumentValue::List(items) => items.iter().find_map(ArgumentValue::first_variable),
            ArgumentValue::Object(fields) => fields.values().find_map(ArgumentValue::first_variable),
            _ => None,
        }
    }

    /// Converts back into plain JSON, or `None` if a variable placeholder remains.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        Some(match self {
            ArgumentValue::Null => serde_json::Value::Null,
            ArgumentValue::Boolean(value) => serde_json::Value::Bool(*value),
            ArgumentValue::Number(value) => serde_json::Value::Number(value.clone()),
            ArgumentValue::String(value) => serde_json::Value::String(value.clone()),
            ArgumentValue::List(items) => {
                serde_json::Value::Array(items.iter().map(ArgumentValue::to_json).collect::<Option<_>>()?)
            }
            ArgumentValue::Object(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(name, value)| Some((name.clone(), value.to_json()?)))
                    .collect::<Option<_>>()?,
            ),
            ArgumentValue::Variable(_) => return None,
        })
    }
}

impl From<serde_json::Value> for ArgumentValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ArgumentValue::Null,
            serde_json::Value::Bool(value) => ArgumentValue::Boolean(value),
            serde_json::Value::Number(value) => ArgumentValue::Number(value),
            serde_json::Value::String(value) => ArgumentValue::String(value),
            serde_json::Value::Array(items) => ArgumentValue::List(items.into_iter().map(Into::into).collect()),
            serde_json::Value::Object(fields) => {
                ArgumentValue::Object(fields.into_iter().map(|(name, value)| (name, value.into())).collect())
            }
        }
    }
}

impl serde::Serialize for ArgumentValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            ArgumentValue::Null => serializer.serialize_unit(),
            ArgumentValue::Boolean(value) => serializer.serialize_bool(*value),
            ArgumentValue::Number(value) => value.serialize(serializer),
            ArgumentValue::String(value) => serializer.serialize_str(value),
            ArgumentValue::List(items) => serializer.collect_seq(items),
            ArgumentValue::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, value) in fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
            ArgumentValue::Variable(variable) => Err(S::Error::custom(format_args!(
                "cannot serialize unexpanded variable ${}",
                variable.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn expansion_preserves_nested_structure() {
        let value = ArgumentValue::Object(BTreeMap::from([(
            "one".to_string(),
            ArgumentValue::Object(BTreeMap::from([
                ("two".to_string(), ArgumentValue::variable("bar")),
                (
                    "three".to_string(),
                    ArgumentValue::List(vec![
                        ArgumentValue::from(json!(1)),
                        ArgumentValue::from(json!(2)),
                        ArgumentValue::variable("foo"),
                    ]),
                ),
            ])),
        )]));

        let variables = Variables::from_value(json!({"foo": "fizz", "bar": {"nested": true}}));
        let expanded = value.expand(&variables).unwrap();

        assert_eq!(
            expanded.to_json(),
            Some(json!({"one": {"two": {"nested": true}, "three": [1, 2, "fizz"]}}))
        );
    }

    #[test]
    fn expansion_requires_every_variable() {
        let value = ArgumentValue::List(vec![ArgumentValue::variable("missing")]);

        let error = value.expand(&Variables::default()).unwrap_err();

        assert_eq!(error.to_string(), "Expected variable $missing to exist for query");
    }

    #[test]
    fn first_variable_walks_nested_values() {
        let value = ArgumentValue::from(json!({"a": [1, {"b": null}]}));
        assert_eq!(value.first_variable(), None);

        let value = ArgumentValue::List(vec![ArgumentValue::Null, ArgumentValue::variable("x")]);
        assert_eq!(value.first_variable(), Some("x"));
        assert_eq!(value.to_json(), None);
    }
}
