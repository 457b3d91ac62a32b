use std::sync::Arc;

use super::{Arguments, ParsedQuery, ParsedQueryNode, SubSelection, Variables};
use crate::VariableError;

/// Substitutes variables into every argument of the selection and evaluates `@skip` /
/// `@include` conditions.
///
/// Subtrees without arguments or conditions are shared with the input rather than copied, and
/// an input with nothing to expand is returned as is.
pub fn expand_variables(
    parsed_query: &Arc<ParsedQuery>,
    variables: &Variables,
) -> Result<Arc<ParsedQuery>, VariableError> {
    if !parsed_query.iter().any(|(_, node)| node.needs_expansion()) {
        return Ok(Arc::clone(parsed_query));
    }

    let fields = parsed_query
        .iter()
        .map(|(response_name, node)| {
            let node = if node.needs_expansion() {
                Arc::new(expand_node(node, variables)?)
            } else {
                Arc::clone(node)
            };
            Ok((response_name.to_string(), node))
        })
        .collect::<Result<ParsedQuery, VariableError>>()?;

    Ok(Arc::new(fields))
}

fn expand_node(node: &ParsedQueryNode, variables: &Variables) -> Result<ParsedQueryNode, VariableError> {
    let mut included = node.conditions.is_empty();
    for condition in &node.conditions {
        if condition.evaluate(variables)? {
            included = true;
            break;
        }
    }

    let selection = match &node.selection {
        SubSelection::Leaf => SubSelection::Leaf,
        SubSelection::Static(children) => SubSelection::Static(expand_variables(children, variables)?),
        SubSelection::Dynamic(children) => SubSelection::Dynamic(expand_variables(children, variables)?),
    };

    let args = node
        .args
        .as_ref()
        .map(|args| {
            args.iter()
                .map(|(name, value)| Ok((name.clone(), value.expand(variables)?)))
                .collect::<Result<Arguments, VariableError>>()
        })
        .transpose()?;

    Ok(ParsedQueryNode {
        selection,
        schema_name: node.schema_name.clone(),
        args,
        conditions: node.conditions.clone(),
        has_conditional_children: node.has_conditional_children,
        excluded: !included,
    })
}
