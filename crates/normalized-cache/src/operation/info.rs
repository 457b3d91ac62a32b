use std::sync::Arc;

pub use cynic_parser::common::OperationType;
use cynic_parser::executable::OperationDefinition;
use indexmap::IndexSet;

use super::{ArgumentValue, FragmentMap, ParseOptions, ParsedQuery, Variables, parse_query};
use crate::{NodeId, QueryError};

/// An operation as handed to the cache: a document, the node it is rooted at and its variables.
#[derive(Debug, Clone)]
pub struct RawOperation {
    pub root_id: NodeId,
    pub document: Arc<str>,
    pub variables: Option<Variables>,
    /// The document consists of fragments only; one of them is the selection.
    pub from_fragment_document: bool,
    /// Which fragment of a fragment document to use. Optional if it holds exactly one.
    pub fragment_name: Option<String>,
}

impl RawOperation {
    pub fn query(document: impl Into<Arc<str>>) -> Self {
        RawOperation {
            root_id: NodeId::query_root(),
            document: document.into(),
            variables: None,
            from_fragment_document: false,
            fragment_name: None,
        }
    }

    pub fn mutation(document: impl Into<Arc<str>>) -> Self {
        RawOperation {
            root_id: NodeId::mutation_root(),
            ..RawOperation::query(document)
        }
    }

    /// A fragment document applied to an existing entity.
    pub fn fragment(document: impl Into<Arc<str>>, root_id: impl Into<NodeId>) -> Self {
        RawOperation {
            root_id: root_id.into(),
            from_fragment_document: true,
            ..RawOperation::query(document)
        }
    }

    #[must_use]
    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = Some(variables);
        self
    }

    #[must_use]
    pub fn with_root_id(mut self, root_id: impl Into<NodeId>) -> Self {
        self.root_id = root_id.into();
        self
    }

    #[must_use]
    pub fn with_fragment_name(mut self, fragment_name: impl Into<String>) -> Self {
        self.fragment_name = Some(fragment_name.into());
        self
    }
}

/// Everything derived from a document alone, shared by all instances of it.
#[derive(Debug, Clone)]
pub struct QueryInfo {
    pub operation_type: OperationType,
    pub operation_name: Option<String>,
    pub parsed_query: Arc<ParsedQuery>,
    pub variables_used: IndexSet<String>,
    /// Default values declared in the operation's variable definitions.
    pub variable_defaults: Variables,
}

impl QueryInfo {
    pub(crate) fn new(operation: &RawOperation, options: ParseOptions, validate_variables: bool) -> Result<Self, QueryError> {
        let document = cynic_parser::parse_executable_document(&operation.document)
            .map_err(|err| QueryError::Parsing { message: err.to_string() })?;

        let fragments: FragmentMap<'_> = document
            .fragments()
            .map(|fragment| (fragment.name(), fragment))
            .collect();

        if operation.from_fragment_document {
            let fragment = match &operation.fragment_name {
                Some(name) => fragments
                    .get(name.as_str())
                    .copied()
                    .ok_or_else(|| QueryError::UnknownFragment { name: name.clone() })?,
                None if fragments.len() == 1 => document
                    .fragments()
                    .next()
                    .ok_or(QueryError::AmbiguousFragment { count: 0 })?,
                None => return Err(QueryError::AmbiguousFragment { count: fragments.len() }),
            };

            let result = parse_query(options, &fragments, fragment.selection_set())?;

            return Ok(QueryInfo {
                operation_type: OperationType::Query,
                operation_name: Some(fragment.name().to_string()),
                parsed_query: result.parsed_query,
                variables_used: result.variables_used,
                variable_defaults: Variables::default(),
            });
        }

        let count = document.operations().count();
        let Some(definition) = document.operations().next().filter(|_| count == 1) else {
            return Err(QueryError::MissingOperation { count });
        };

        let result = parse_query(options, &fragments, definition.selection_set())?;
        let info = QueryInfo {
            operation_type: definition.operation_type(),
            operation_name: definition.name().map(str::to_string),
            parsed_query: result.parsed_query,
            variables_used: result.variables_used,
            variable_defaults: variable_defaults(definition),
        };

        if validate_variables {
            info.validate_variables(definition)?;
        }

        Ok(info)
    }

    /// Every variable used must be declared, and every declared variable must be used.
    fn validate_variables(&self, definition: OperationDefinition<'_>) -> Result<(), QueryError> {
        let declared: IndexSet<&str> = definition
            .variable_definitions()
            .map(|variable| variable.name())
            .collect();

        let mut messages = Vec::new();
        for name in &self.variables_used {
            if !declared.contains(name.as_str()) {
                messages.push(format!("Variable ${name} is used, but not declared"));
            }
        }
        for name in declared {
            if !self.variables_used.contains(name) {
                messages.push(format!("Variable ${name} is unused"));
            }
        }

        if messages.is_empty() {
            return Ok(());
        }

        Err(QueryError::Validation {
            operation: self
                .operation_name
                .clone()
                .unwrap_or_else(|| "anonymous operation".to_string()),
            messages,
        })
    }
}

fn variable_defaults(definition: OperationDefinition<'_>) -> Variables {
    definition
        .variable_definitions()
        .filter_map(|variable| {
            let default = variable.default_value()?;
            let value = ArgumentValue::from_ast(default.into(), &mut IndexSet::new()).to_json()?;
            Some((variable.name().to_string(), value))
        })
        .collect()
}

/// A document bound to a root node and a complete set of variables, ready to be merged.
#[derive(Debug, Clone)]
pub struct OperationInstance {
    pub root_id: NodeId,
    pub info: Arc<QueryInfo>,
    /// The selection with every variable substituted and every condition evaluated.
    pub parsed_query: Arc<ParsedQuery>,
    /// No parameterized or aliased field anywhere in the selection.
    pub is_static: bool,
    /// Caller supplied variables merged over the declared defaults.
    pub variables: Variables,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn info(operation: &RawOperation) -> Result<QueryInfo, QueryError> {
        QueryInfo::new(operation, ParseOptions::default(), true)
    }

    #[test]
    fn collects_operation_metadata() {
        let info = info(&RawOperation::query(
            r#"query Feed($first: Int = 10, $after: String) { feed(first: $first, after: $after) { id } }"#,
        ))
        .unwrap();

        assert_eq!(info.operation_type, OperationType::Query);
        assert_eq!(info.operation_name.as_deref(), Some("Feed"));
        assert_eq!(info.variables_used.iter().collect::<Vec<_>>(), ["first", "after"]);
        assert_eq!(info.variable_defaults.clone().into_value(), json!({"first": 10}));
    }

    #[test]
    fn undeclared_and_unused_variables_are_reported() {
        let error = info(&RawOperation::query(
            r#"query Broken($unused: Int) { user(id: $id) { name } }"#,
        ))
        .unwrap_err();

        assert_eq!(
            error.to_string(),
            "Validation errors in Broken:\n - Variable $id is used, but not declared\n - Variable $unused is unused"
        );
    }

    #[test]
    fn validation_can_be_disabled() {
        let operation = RawOperation::query("{ user(id: $id) { name } }");

        assert!(QueryInfo::new(&operation, ParseOptions::default(), false).is_ok());
    }

    #[test]
    fn fragment_documents_select_a_fragment() {
        let document = r#"
            fragment Name on User { name }
            fragment Friends on User { friends(first: $count) { id } }
        "#;

        let error = info(&RawOperation::fragment(document, "1")).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Found 2 fragments. `fragment_name` must be provided when there is not exactly 1 fragment"
        );

        let info = info(&RawOperation::fragment(document, "1").with_fragment_name("Friends")).unwrap();
        assert_eq!(info.operation_name.as_deref(), Some("Friends"));
        assert!(info.parsed_query.get("friends").is_some());
        assert_eq!(info.variables_used.iter().collect::<Vec<_>>(), ["count"]);
    }

    #[test]
    fn variables_on_fragment_definitions_count_as_used() {
        let info = info(&RawOperation::query(
            r#"
                query Viewer($withName: Boolean!) { viewer { ...Name } }
                fragment Name on User @include(if: $withName) { name }
            "#,
        ))
        .unwrap();

        assert_eq!(info.variables_used.iter().collect::<Vec<_>>(), ["withName"]);
    }

    #[test]
    fn documents_need_exactly_one_operation() {
        let error = info(&RawOperation::query("query A { a } query B { b }")).unwrap_err();

        assert_eq!(error.to_string(), "Expected exactly one operation definition, found 2");
    }
}
