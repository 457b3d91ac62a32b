use std::{
    collections::BTreeMap,
    fmt,
    ops::{Deref, DerefMut},
};

use serde_json::Value;

/// Variables of an operation.
///
/// Kept sorted so that two logically identical variable maps compare and display the same way;
/// operations are memoized on them.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct Variables(BTreeMap<String, Value>);

impl fmt::Display for Variables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;

        for (i, (name, value)) in self.0.iter().enumerate() {
            write!(f, "{}{name}: {value}", if i == 0 { "" } else { ", " })?;
        }

        f.write_str("}")
    }
}

impl Variables {
    /// Get the variables from a JSON value.
    ///
    /// If the value is not a map, then no variables will be returned.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(obj) => Self(obj.into_iter().collect()),
            _ => Self::default(),
        }
    }

    /// Get the variables as a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0.into_iter().collect())
    }

    /// Returns a copy of `defaults` overridden by every variable in `self`.
    pub(crate) fn with_defaults(&self, defaults: &Variables) -> Variables {
        let mut merged = defaults.clone();
        merged.extend(self.0.iter().map(|(name, value)| (name.clone(), value.clone())));
        merged
    }
}

impl FromIterator<(String, Value)> for Variables {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Deref for Variables {
    type Target = BTreeMap<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Variables {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn caller_variables_override_defaults() {
        let defaults = Variables::from_value(json!({"first": 10, "after": null}));
        let variables = Variables::from_value(json!({"first": 2}));

        let merged = variables.with_defaults(&defaults);

        assert_eq!(merged.to_string(), "{after: null, first: 2}");
    }

    #[test]
    fn non_object_values_yield_no_variables() {
        assert!(Variables::from_value(json!([1, 2])).is_empty());
        assert!(Variables::from_value(json!(null)).is_empty());
    }
}
