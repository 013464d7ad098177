//! Validation rules derived from member traits.
//!
//! Rule order is fixed: the required-fields check first, then for each member
//! in member order its length, range and pattern checks.

use serde_json::{Number, Value};

use crate::model::Shape;
use crate::model::traits::{LENGTH, PATTERN, RANGE};

use super::ir::utils::attribute_name;

/// Inclusive bounds of a length or range trait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bounds {
    Between(Number, Number),
    AtLeast(Number),
    AtMost(Number),
}

impl Bounds {
    /// `None` when the trait value carries neither `min` nor `max`.
    fn from_trait(value: &Value) -> Option<Self> {
        let bound = |key: &str| value.get(key).and_then(Value::as_number).cloned();
        match (bound("min"), bound("max")) {
            (Some(min), Some(max)) => Some(Bounds::Between(min, max)),
            (Some(min), None) => Some(Bounds::AtLeast(min)),
            (None, Some(max)) => Some(Bounds::AtMost(max)),
            (None, None) => None,
        }
    }
}

/// A member as it appears in generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleField {
    /// Wire name, used in messages.
    pub member: String,
    /// Python attribute name.
    pub attribute: String,
}

impl RuleField {
    fn new(member: &str) -> Self {
        Self {
            member: member.to_string(),
            attribute: attribute_name(member),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationRule {
    Required { fields: Vec<RuleField> },
    Length { field: RuleField, bounds: Bounds },
    Range { field: RuleField, bounds: Bounds },
    Pattern { field: RuleField, pattern: String },
}

impl ValidationRule {
    /// Suffix of the generated validator method.
    pub fn method_name(&self) -> String {
        match self {
            ValidationRule::Required { .. } => "_check_required".to_string(),
            ValidationRule::Length { field, .. } => format!("_check_{}_length", field.attribute),
            ValidationRule::Range { field, .. } => format!("_check_{}_range", field.attribute),
            ValidationRule::Pattern { field, .. } => format!("_check_{}_pattern", field.attribute),
        }
    }
}

/// Every rule for a structure, in emission order.
pub fn rules_for(shape: &Shape) -> Vec<ValidationRule> {
    let mut rules = Vec::new();

    let required: Vec<RuleField> = shape.required_members().map(|member| RuleField::new(&member.name)).collect();
    if !required.is_empty() {
        rules.push(ValidationRule::Required { fields: required });
    }

    for member in shape.members.values() {
        if let Some(bounds) = member.traits.get(LENGTH).and_then(Bounds::from_trait) {
            rules.push(ValidationRule::Length {
                field: RuleField::new(&member.name),
                bounds,
            });
        }
        if let Some(bounds) = member.traits.get(RANGE).and_then(Bounds::from_trait) {
            rules.push(ValidationRule::Range {
                field: RuleField::new(&member.name),
                bounds,
            });
        }
        if let Some(pattern) = member.traits.string(PATTERN) {
            rules.push(ValidationRule::Pattern {
                field: RuleField::new(&member.name),
                pattern: pattern.to_string(),
            });
        }
    }
    rules
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ast::RawAst;
    use crate::builder::build;
    use crate::config::BuildConfig;
    use crate::model::ShapeId;
    use crate::parser::parse_idl;
    use std::path::Path;

    fn shape(source: &str, name: &str) -> Shape {
        let ast: RawAst = parse_idl(source, Path::new("rules.smithy")).unwrap();
        let model = build(&ast, &BuildConfig::default()).unwrap();
        model.shape(&ShapeId::from_parts("ns", name)).unwrap().clone()
    }

    #[test]
    fn test_required_and_range() {
        let shape = shape(
            "namespace ns\nstructure Item {\n    @required\n    name: String\n    @range(min: 0, max: 100)\n    score: Integer\n}\n",
            "Item",
        );
        let rules = rules_for(&shape);
        assert_eq!(rules.len(), 2);
        let ValidationRule::Required { fields } = &rules[0] else {
            unreachable!("required check comes first");
        };
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].member, "name");
        assert_eq!(
            rules[1],
            ValidationRule::Range {
                field: RuleField::new("score"),
                bounds: Bounds::Between(0.into(), 100.into()),
            }
        );
    }

    #[test]
    fn test_bound_variants_and_order() {
        let shape = shape(
            r#"namespace ns
structure Item {
    @length(min: 3)
    @pattern("^[a-z]+$")
    alpha: String

    @length(max: 10)
    beta: String

    @range(max: 2.5)
    gamma: Double

    @length
    delta: String
}
"#,
            "Item",
        );
        let rules = rules_for(&shape);
        let names: Vec<_> = rules.iter().map(ValidationRule::method_name).collect();
        assert_eq!(
            names,
            vec![
                "_check_alpha_length",
                "_check_alpha_pattern",
                "_check_beta_length",
                "_check_gamma_range"
            ]
        );
        assert!(matches!(&rules[0], ValidationRule::Length { bounds: Bounds::AtLeast(min), .. } if min.as_u64() == Some(3)));
        assert!(matches!(&rules[2], ValidationRule::Length { bounds: Bounds::AtMost(_), .. }));
        assert!(matches!(&rules[3], ValidationRule::Range { bounds: Bounds::AtMost(max), .. } if max.as_f64() == Some(2.5)));
    }

    #[test]
    fn test_no_traits_no_rules() {
        let shape = shape("namespace ns\nstructure Plain {\n    a: String\n}\n", "Plain");
        assert!(rules_for(&shape).is_empty());
    }
}
