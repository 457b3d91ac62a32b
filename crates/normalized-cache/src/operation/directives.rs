use cynic_parser::executable::{Directive, Iter};
use indexmap::IndexSet;

use super::{ArgumentValue, Variables};
use crate::VariableError;

/// Fields marked `@static` are stored as if they had neither arguments nor an alias.
pub(crate) const STATIC_DIRECTIVE: &str = "static";

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionalDirective {
    Skip(ArgumentValue),
    Include(ArgumentValue),
}

/// A set of `@skip` / `@include` directives that must all let a selection through.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InclusionCondition {
    directives: Vec<ConditionalDirective>,
}

impl InclusionCondition {
    pub fn directives(&self) -> &[ConditionalDirective] {
        &self.directives
    }

    /// Extracts the conditional directives of a selection. Every directive argument, conditional
    /// or not, is scanned for variable references.
    pub(crate) fn from_directives<'a>(
        directives: Iter<'a, Directive<'a>>,
        variables_used: &mut IndexSet<String>,
    ) -> Option<Self> {
        let mut condition = InclusionCondition::default();

        for directive in directives {
            let mut condition_argument = None;
            for argument in directive.arguments() {
                let value = ArgumentValue::from_ast(argument.value(), variables_used);
                if argument.name() == "if" {
                    condition_argument = Some(value);
                }
            }

            let Some(value) = condition_argument else {
                continue;
            };

            match directive.name() {
                "skip" => condition.directives.push(ConditionalDirective::Skip(value)),
                "include" => condition.directives.push(ConditionalDirective::Include(value)),
                _ => {}
            }
        }

        (!condition.directives.is_empty()).then_some(condition)
    }

    /// Both conditions must pass.
    pub(crate) fn and(&self, other: &InclusionCondition) -> InclusionCondition {
        let mut directives = self.directives.clone();
        directives.extend(other.directives.iter().cloned());
        InclusionCondition { directives }
    }

    pub(crate) fn evaluate(&self, variables: &Variables) -> Result<bool, VariableError> {
        for directive in &self.directives {
            let (name, value, include_when) = match directive {
                ConditionalDirective::Skip(value) => ("skip", value, false),
                ConditionalDirective::Include(value) => ("include", value, true),
            };

            match value.expand(variables)? {
                ArgumentValue::Boolean(condition) if condition == include_when => {}
                ArgumentValue::Boolean(_) => return Ok(false),
                other => {
                    return Err(VariableError::InvalidCondition {
                        directive: name,
                        value: other.to_json().unwrap_or_default(),
                    });
                }
            }
        }

        Ok(true)
    }
}

/// Records the variables referenced by directive arguments, for directives that carry no
/// inclusion condition.
pub(crate) fn collect_variables<'a>(directives: Iter<'a, Directive<'a>>, variables_used: &mut IndexSet<String>) {
    for argument in directives.flat_map(|directive| directive.arguments()) {
        ArgumentValue::from_ast(argument.value(), variables_used);
    }
}

pub(crate) fn is_static<'a>(mut directives: Iter<'a, Directive<'a>>) -> bool {
    directives.any(|directive| directive.name() == STATIC_DIRECTIVE)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn condition(directives: Vec<ConditionalDirective>) -> InclusionCondition {
        InclusionCondition { directives }
    }

    #[test]
    fn skip_and_include_combine() {
        let condition = condition(vec![
            ConditionalDirective::Skip(ArgumentValue::variable("skip")),
            ConditionalDirective::Include(ArgumentValue::variable("include")),
        ]);

        let variables = |skip: bool, include: bool| Variables::from_value(json!({"skip": skip, "include": include}));

        assert!(condition.evaluate(&variables(false, true)).unwrap());
        assert!(!condition.evaluate(&variables(true, true)).unwrap());
        assert!(!condition.evaluate(&variables(false, false)).unwrap());
    }

    #[test]
    fn literal_conditions_need_no_variables() {
        let condition = condition(vec![ConditionalDirective::Skip(ArgumentValue::Boolean(true))]);
        assert!(!condition.evaluate(&Variables::default()).unwrap());
    }

    #[test]
    fn non_boolean_conditions_are_rejected() {
        let condition = condition(vec![ConditionalDirective::Include(ArgumentValue::variable("flag"))]);
        let error = condition
            .evaluate(&Variables::from_value(json!({"flag": "yes"})))
            .unwrap_err();

        assert_eq!(
            error.to_string(),
            "Expected the condition of @include to be a boolean, found \"yes\""
        );
    }
}
