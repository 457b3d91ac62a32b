use std::{collections::HashMap, sync::Arc};

use cynic_parser::executable::{FieldSelection, FragmentDefinition, FragmentSpread, InlineFragment, Iter, Selection};
use fxhash::FxHashMap;
use indexmap::IndexSet;

use super::{
    ArgumentValue, Arguments, InclusionCondition, ParsedQuery, ParsedQueryNode, SubSelection, directives,
};
use crate::QueryError;

/// Fragment definitions of a document, by name.
pub type FragmentMap<'doc> = HashMap<&'doc str, FragmentDefinition<'doc>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Add a `__typename` selection to every selection set below the root.
    pub add_typename: bool,
}

#[derive(Debug, Clone)]
pub struct ParseResult {
    pub parsed_query: Arc<ParsedQuery>,
    pub variables_used: IndexSet<String>,
}

const TYPENAME: &str = "__typename";

/// Turns a selection set into the cache's field model, resolving fragment spreads and merging
/// repeated selections of the same response name.
pub fn parse_query<'doc>(
    options: ParseOptions,
    fragments: &FragmentMap<'doc>,
    selection_set: Iter<'doc, Selection<'doc>>,
) -> Result<ParseResult, QueryError> {
    let mut parser = QueryParser {
        options,
        fragments,
        variables_used: IndexSet::new(),
        fragment_cache: FxHashMap::default(),
        fragment_stack: Vec::new(),
        path: Vec::new(),
    };

    let mut parsed_query = ParsedQuery::default();
    parser.parse_selection_set(selection_set, &mut parsed_query)?;

    if parsed_query.is_empty() {
        return Err(QueryError::NoFields);
    }

    Ok(ParseResult {
        parsed_query: Arc::new(parsed_query),
        variables_used: parser.variables_used,
    })
}

struct QueryParser<'doc, 'f> {
    options: ParseOptions,
    fragments: &'f FragmentMap<'doc>,
    variables_used: IndexSet<String>,
    /// Each fragment is parsed once per document, spreads share the result.
    fragment_cache: FxHashMap<&'doc str, Arc<ParsedQuery>>,
    fragment_stack: Vec<&'doc str>,
    /// Response names from the root to the selection being parsed.
    path: Vec<&'doc str>,
}

impl<'doc> QueryParser<'doc, '_> {
    fn parse_selection_set(
        &mut self,
        selection_set: Iter<'doc, Selection<'doc>>,
        into: &mut ParsedQuery,
    ) -> Result<(), QueryError> {
        for selection in selection_set {
            match selection {
                Selection::Field(field) => {
                    let response_name = field.alias().unwrap_or(field.name());
                    let node = self.parse_field(field)?;
                    merge_field(&self.path, into, response_name, node)?;
                }
                Selection::FragmentSpread(spread) => {
                    let condition = InclusionCondition::from_directives(spread.directives(), &mut self.variables_used);
                    let fields = self.parse_fragment_spread(spread)?;
                    self.merge_conditional_fields(into, &fields, condition.as_ref())?;
                }
                Selection::InlineFragment(fragment) => {
                    let condition =
                        InclusionCondition::from_directives(fragment.directives(), &mut self.variables_used);
                    let fields = self.parse_inline_fragment(fragment)?;
                    self.merge_conditional_fields(into, &fields, condition.as_ref())?;
                }
            }
        }

        Ok(())
    }

    fn parse_field(&mut self, field: FieldSelection<'doc>) -> Result<Arc<ParsedQueryNode>, QueryError> {
        let condition = InclusionCondition::from_directives(field.directives(), &mut self.variables_used);

        let mut args = Arguments::new();
        for argument in field.arguments() {
            let value = ArgumentValue::from_ast(argument.value(), &mut self.variables_used);
            args.insert(argument.name().to_string(), value);
        }

        let (args, schema_name) = if directives::is_static(field.directives()) {
            (None, None)
        } else {
            let schema_name = field
                .alias()
                .filter(|alias| *alias != field.name())
                .map(|_| field.name().to_string());
            ((!args.is_empty()).then_some(args), schema_name)
        };

        let children = if field.selection_set().next().is_some() {
            self.path.push(field.alias().unwrap_or(field.name()));
            let children = self.parse_children(field.selection_set());
            self.path.pop();
            children?
        } else {
            None
        };

        let has_conditional_children = children.as_ref().is_some_and(|children| children.has_conditions());

        Ok(Arc::new(ParsedQueryNode {
            selection: SubSelection::from_children(children),
            schema_name,
            args,
            conditions: condition.into_iter().collect(),
            has_conditional_children,
            excluded: false,
        }))
    }

    /// Parses the selection set of a field. An empty result is treated as no selection at all.
    fn parse_children(
        &mut self,
        selection_set: Iter<'doc, Selection<'doc>>,
    ) -> Result<Option<Arc<ParsedQuery>>, QueryError> {
        let mut children = ParsedQuery::default();
        self.parse_selection_set(selection_set, &mut children)?;

        if children.is_empty() {
            return Ok(None);
        }

        if self.options.add_typename && !children.contains(TYPENAME) {
            children.insert(TYPENAME.to_string(), Arc::new(ParsedQueryNode::leaf()));
        }

        Ok(Some(Arc::new(children)))
    }

    fn parse_fragment_spread(&mut self, spread: FragmentSpread<'doc>) -> Result<Arc<ParsedQuery>, QueryError> {
        let name = spread.fragment_name();

        if let Some(fields) = self.fragment_cache.get(name) {
            return Ok(Arc::clone(fields));
        }

        if self.fragment_stack.contains(&name) {
            self.fragment_stack.push(name);
            return Err(QueryError::FragmentCycle {
                cycle: std::mem::take(&mut self.fragment_stack)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            });
        }

        let Some(fragment) = self.fragments.get(name).copied() else {
            return Err(QueryError::UnknownFragment { name: name.to_string() });
        };

        directives::collect_variables(fragment.directives(), &mut self.variables_used);

        self.fragment_stack.push(name);
        let mut fields = ParsedQuery::default();
        let result = self.parse_selection_set(fragment.selection_set(), &mut fields);
        self.fragment_stack.pop();
        result?;

        let fields = Arc::new(fields);
        self.fragment_cache.insert(name, Arc::clone(&fields));

        Ok(fields)
    }

    fn parse_inline_fragment(&mut self, fragment: InlineFragment<'doc>) -> Result<ParsedQuery, QueryError> {
        let mut fields = ParsedQuery::default();
        self.parse_selection_set(fragment.selection_set(), &mut fields)?;
        Ok(fields)
    }

    /// Merges the fields contributed by a fragment, which only apply when the fragment's own
    /// `@skip` / `@include` directives pass.
    fn merge_conditional_fields(
        &self,
        into: &mut ParsedQuery,
        fields: &ParsedQuery,
        condition: Option<&InclusionCondition>,
    ) -> Result<(), QueryError> {
        for (response_name, node) in fields.iter() {
            let node = match condition {
                Some(condition) => Arc::new(with_condition(node, condition)),
                None => Arc::clone(node),
            };
            merge_field(&self.path, into, response_name, node)?;
        }

        Ok(())
    }
}

fn with_condition(node: &ParsedQueryNode, condition: &InclusionCondition) -> ParsedQueryNode {
    let conditions = if node.conditions.is_empty() {
        vec![condition.clone()]
    } else {
        node.conditions.iter().map(|existing| existing.and(condition)).collect()
    };

    ParsedQueryNode {
        conditions,
        ..node.clone()
    }
}

fn merge_field(
    path: &[&str],
    into: &mut ParsedQuery,
    response_name: &str,
    node: Arc<ParsedQueryNode>,
) -> Result<(), QueryError> {
    let merged = match into.get(response_name) {
        Some(existing) => {
            let mut field_path = path.to_vec();
            field_path.push(response_name);
            merge_nodes(&field_path, existing, &node)?
        }
        None => node,
    };

    into.insert(response_name.to_string(), merged);

    Ok(())
}

/// Combines two selections of the same response name. Both must select the same schema field
/// with the same arguments.
fn merge_nodes(
    path: &[&str],
    existing: &Arc<ParsedQueryNode>,
    incoming: &Arc<ParsedQueryNode>,
) -> Result<Arc<ParsedQueryNode>, QueryError> {
    if Arc::ptr_eq(existing, incoming) {
        return Ok(Arc::clone(existing));
    }

    if existing.args != incoming.args {
        return Err(QueryError::conflicting_fields("parameterization mismatch", path));
    }

    if existing.schema_name != incoming.schema_name {
        return Err(QueryError::conflicting_fields("alias mismatch", path));
    }

    let children = match (existing.children(), incoming.children()) {
        (None, None) => None,
        (Some(children), None) | (None, Some(children)) => Some(Arc::clone(children)),
        (Some(existing), Some(incoming)) if Arc::ptr_eq(existing, incoming) => Some(Arc::clone(existing)),
        (Some(existing), Some(incoming)) => {
            let mut merged = ParsedQuery::clone(existing);
            for (response_name, node) in incoming.iter() {
                merge_field(path, &mut merged, response_name, Arc::clone(node))?;
            }
            Some(Arc::new(merged))
        }
    };

    // An unconditional selection wins over any conditional one.
    let conditions = if existing.conditions.is_empty() || incoming.conditions.is_empty() {
        Vec::new()
    } else {
        let mut conditions = existing.conditions.clone();
        for condition in &incoming.conditions {
            if !conditions.contains(condition) {
                conditions.push(condition.clone());
            }
        }
        conditions
    };

    let has_conditional_children = children.as_ref().is_some_and(|children| children.has_conditions());

    Ok(Arc::new(ParsedQueryNode {
        selection: SubSelection::from_children(children),
        schema_name: existing.schema_name.clone(),
        args: existing.args.clone(),
        conditions,
        has_conditional_children,
        excluded: false,
    }))
}

#[cfg(test)]
mod tests {
    use cynic_parser::ExecutableDocument;
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(query: &str) -> Result<ParseResult, QueryError> {
        parse_with(query, ParseOptions::default())
    }

    fn parse_with(query: &str, options: ParseOptions) -> Result<ParseResult, QueryError> {
        let document = cynic_parser::parse_executable_document(query).unwrap();
        parse_document(&document, options)
    }

    fn parse_document(document: &ExecutableDocument, options: ParseOptions) -> Result<ParseResult, QueryError> {
        let fragments: FragmentMap<'_> = document
            .fragments()
            .map(|fragment| (fragment.name(), fragment))
            .collect();
        let operation = document.operations().next().unwrap();
        parse_query(options, &fragments, operation.selection_set())
    }

    fn field_names(query: &ParsedQuery) -> Vec<&str> {
        query.iter().map(|(name, _)| name).collect()
    }

    #[test]
    fn fields_keep_document_order() {
        let result = parse("{ foo bar { baz } fizz }").unwrap();

        assert_eq!(field_names(&result.parsed_query), ["foo", "bar", "fizz"]);
        let bar = result.parsed_query.get("bar").unwrap();
        assert_eq!(field_names(bar.children().unwrap()), ["baz"]);
        assert!(result.parsed_query.get("foo").unwrap().children().is_none());
        assert!(!result.parsed_query.is_dynamic());
    }

    #[test]
    fn aliases_record_the_schema_name() {
        let result = parse("{ renamed: foo same: same }").unwrap();

        let renamed = result.parsed_query.get("renamed").unwrap();
        assert_eq!(renamed.schema_name(), Some("foo"));
        assert!(renamed.is_dynamic());

        let same = result.parsed_query.get("same").unwrap();
        assert_eq!(same.schema_name(), None);
    }

    #[test]
    fn arguments_mark_ancestors_dynamic() {
        let result = parse(r#"query ($id: ID!) { viewer { user(id: $id, kind: ADMIN) { name } } }"#).unwrap();

        let viewer = result.parsed_query.get("viewer").unwrap();
        assert!(viewer.args().is_none());
        assert!(viewer.has_parameterized_children());

        let user = viewer.children().unwrap().get("user").unwrap();
        let args = user.args().unwrap();
        assert_eq!(args["id"], ArgumentValue::variable("id"));
        assert_eq!(args["kind"], ArgumentValue::String("ADMIN".into()));
        assert!(!user.has_parameterized_children());

        assert_eq!(result.variables_used.iter().collect::<Vec<_>>(), ["id"]);
    }

    #[test]
    fn fragments_are_merged_into_the_selection() {
        let result = parse(
            r#"
            query { viewer { id ...Profile } }
            fragment Profile on User { name viewer { id } }
            "#,
        )
        .unwrap();

        let viewer = result.parsed_query.get("viewer").unwrap().children().unwrap();
        assert_eq!(field_names(viewer), ["id", "name", "viewer"]);
    }

    #[test]
    fn merging_is_order_independent() {
        let first = parse("{ foo { a } foo { b { c } } foo { b { d } } }").unwrap();
        let second = parse("{ foo { b { d } } foo { a } foo { b { c } } }").unwrap();

        let fields = |result: &ParseResult| {
            let foo = result.parsed_query.get("foo").unwrap().children().unwrap();
            let mut names: Vec<String> = field_names(foo).into_iter().map(str::to_string).collect();
            let mut nested: Vec<String> = field_names(foo.get("b").unwrap().children().unwrap())
                .into_iter()
                .map(str::to_string)
                .collect();
            names.sort();
            nested.sort();
            (names, nested)
        };

        assert_eq!(fields(&first), fields(&second));
        assert_eq!(fields(&first), (vec!["a".into(), "b".into()], vec!["c".into(), "d".into()]));
    }

    #[test]
    fn conflicting_arguments_are_rejected() {
        let error = parse("{ foo { bar(id: 1) } ...Rest } fragment Rest on Query { foo { bar(id: 2) } }")
            .unwrap_err();

        assert_eq!(
            error.to_string(),
            "Conflicting field definitions: parameterization mismatch at foo.bar"
        );
    }

    #[test]
    fn conflicting_aliases_are_rejected() {
        let error = parse("{ foo: bar foo: baz }").unwrap_err();

        assert_eq!(error.to_string(), "Conflicting field definitions: alias mismatch at foo");
    }

    #[test]
    fn static_fields_drop_arguments_and_aliases() {
        let result = parse(r#"{ renamed: items(first: 10) @static { id } }"#).unwrap();

        let items = result.parsed_query.get("renamed").unwrap();
        assert!(items.args().is_none());
        assert!(items.schema_name().is_none());
        assert!(!result.parsed_query.is_dynamic());
    }

    #[test]
    fn typename_is_added_below_the_root() {
        let result = parse_with("{ viewer { id } }", ParseOptions { add_typename: true }).unwrap();

        assert_eq!(field_names(&result.parsed_query), ["viewer"]);
        let viewer = result.parsed_query.get("viewer").unwrap().children().unwrap();
        assert_eq!(field_names(viewer), ["id", "__typename"]);
    }

    #[test]
    fn unknown_fragments_are_reported() {
        let error = parse("{ ...Missing }").unwrap_err();

        assert_eq!(error.to_string(), "Expected fragment Missing to be defined");
    }

    #[test]
    fn fragment_cycles_are_reported() {
        let error = parse(
            r#"
            { ...A }
            fragment A on Query { viewer { ...B } }
            fragment B on User { friend { ...A } }
            "#,
        )
        .unwrap_err();

        assert_eq!(error.to_string(), "Fragment cycle detected: A, B, A");
    }

    #[test]
    fn fragments_are_parsed_once_per_document() {
        let result = parse(
            r#"
            { first { ...Fields } second { ...Fields } }
            fragment Fields on Thing { id name }
            "#,
        )
        .unwrap();

        let first = result.parsed_query.get("first").unwrap().children().unwrap();
        let second = result.parsed_query.get("second").unwrap().children().unwrap();
        assert!(Arc::ptr_eq(first.get("id").unwrap(), second.get("id").unwrap()));
    }

    #[test]
    fn conditions_are_collected() {
        let result = parse(
            r#"
            query ($withName: Boolean!, $skipFriend: Boolean!) {
                viewer {
                    id
                    name @include(if: $withName)
                    ... @skip(if: $skipFriend) { friend { id } }
                }
            }
            "#,
        )
        .unwrap();

        let viewer = result.parsed_query.get("viewer").unwrap();
        assert!(viewer.conditions().is_empty());
        assert!(viewer.has_conditional_children);

        let children = viewer.children().unwrap();
        assert!(children.get("id").unwrap().conditions().is_empty());
        assert_eq!(children.get("name").unwrap().conditions().len(), 1);
        assert_eq!(children.get("friend").unwrap().conditions().len(), 1);

        assert_eq!(
            result.variables_used.iter().collect::<Vec<_>>(),
            ["withName", "skipFriend"]
        );
    }

    #[test]
    fn unconditional_selections_win() {
        let result = parse(r#"query ($flag: Boolean!) { foo @include(if: $flag) foo }"#).unwrap();

        assert!(result.parsed_query.get("foo").unwrap().conditions().is_empty());
    }

    #[test]
    fn fragment_conditions_apply_to_their_fields() {
        let result =
            parse(r#"query ($a: Boolean!, $b: Boolean!) { ... @include(if: $a) { foo @skip(if: $b) } bar }"#).unwrap();

        let foo = result.parsed_query.get("foo").unwrap();
        assert_eq!(foo.conditions().len(), 1);
        assert_eq!(foo.conditions()[0].directives().len(), 2);
        assert!(result.parsed_query.get("bar").unwrap().conditions().is_empty());
    }
}
