//! Everything about operations: the parsed selection model, variable expansion and the
//! per-document metadata the cache keeps around.

mod arguments;
mod directives;
mod expand;
mod info;
mod parse;
mod variables;

use std::sync::Arc;

use indexmap::IndexMap;

pub use self::{
    arguments::{ArgumentValue, Arguments, VariableArgument},
    directives::{ConditionalDirective, InclusionCondition},
    expand::expand_variables,
    info::{OperationInstance, QueryInfo, RawOperation},
    parse::{FragmentMap, ParseOptions, ParseResult, parse_query},
    variables::Variables,
};

/// The fields selected at one level of an operation, keyed by response name.
///
/// Field order follows the order of first appearance in the document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedQuery {
    fields: IndexMap<String, Arc<ParsedQueryNode>>,
}

impl ParsedQuery {
    pub fn get(&self, response_name: &str) -> Option<&Arc<ParsedQueryNode>> {
        self.fields.get(response_name)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &Arc<ParsedQueryNode>)> + '_ {
        self.fields.iter().map(|(name, node)| (name.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether any field at this level is parameterized, aliased, or contains such a field.
    /// Static selections can be shared across variable sets and read without a rewrite.
    pub fn is_dynamic(&self) -> bool {
        self.fields.values().any(|node| node.is_dynamic())
    }

    pub(crate) fn has_conditions(&self) -> bool {
        self.fields
            .values()
            .any(|node| !node.conditions.is_empty() || node.has_conditional_children)
    }

    pub(crate) fn contains(&self, response_name: &str) -> bool {
        self.fields.contains_key(response_name)
    }

    /// Inserting an existing name keeps its original position.
    pub(crate) fn insert(&mut self, response_name: String, node: Arc<ParsedQueryNode>) {
        self.fields.insert(response_name, node);
    }
}

impl FromIterator<(String, Arc<ParsedQueryNode>)> for ParsedQuery {
    fn from_iter<T: IntoIterator<Item = (String, Arc<ParsedQueryNode>)>>(iter: T) -> Self {
        ParsedQuery {
            fields: iter.into_iter().collect(),
        }
    }
}

/// What a field selects below itself.
#[derive(Debug, Clone, PartialEq)]
pub enum SubSelection {
    Leaf,
    /// Children without any parameterized or aliased field at any depth.
    Static(Arc<ParsedQuery>),
    /// Children containing a parameterized or aliased field somewhere.
    Dynamic(Arc<ParsedQuery>),
}

impl SubSelection {
    pub(crate) fn from_children(children: Option<Arc<ParsedQuery>>) -> Self {
        match children {
            None => SubSelection::Leaf,
            Some(children) if children.is_dynamic() => SubSelection::Dynamic(children),
            Some(children) => SubSelection::Static(children),
        }
    }

    pub fn children(&self) -> Option<&Arc<ParsedQuery>> {
        match self {
            SubSelection::Leaf => None,
            SubSelection::Static(children) | SubSelection::Dynamic(children) => Some(children),
        }
    }
}

/// A single selected field.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQueryNode {
    pub(crate) selection: SubSelection,
    /// Set only when the response name (the alias) differs from the schema field name.
    pub(crate) schema_name: Option<String>,
    pub(crate) args: Option<Arguments>,
    /// The field is included when this is empty or any one condition passes.
    pub(crate) conditions: Vec<InclusionCondition>,
    pub(crate) has_conditional_children: bool,
    /// Set by variable expansion for fields whose conditions all failed.
    pub(crate) excluded: bool,
}

impl ParsedQueryNode {
    pub fn leaf() -> Self {
        ParsedQueryNode {
            selection: SubSelection::Leaf,
            schema_name: None,
            args: None,
            conditions: Vec::new(),
            has_conditional_children: false,
            excluded: false,
        }
    }

    pub fn selection(&self) -> &SubSelection {
        &self.selection
    }

    pub fn children(&self) -> Option<&Arc<ParsedQuery>> {
        self.selection.children()
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema_name.as_deref()
    }

    pub fn args(&self) -> Option<&Arguments> {
        self.args.as_ref()
    }

    pub fn conditions(&self) -> &[InclusionCondition] {
        &self.conditions
    }

    pub fn is_excluded(&self) -> bool {
        self.excluded
    }

    pub fn has_parameterized_children(&self) -> bool {
        matches!(self.selection, SubSelection::Dynamic(_))
    }

    pub fn is_dynamic(&self) -> bool {
        self.args.is_some() || self.schema_name.is_some() || self.has_parameterized_children()
    }

    /// Whether variable expansion has to rebuild this node rather than share it.
    pub(crate) fn needs_expansion(&self) -> bool {
        self.args.is_some()
            || self.has_parameterized_children()
            || !self.conditions.is_empty()
            || self.has_conditional_children
    }
}
