//! Data layer: one pydantic model per structure shape.

use serde_json::Value;
use tracing::debug;

use crate::config::EmitOptions;
use crate::model::traits::DEFAULT;
use crate::model::{Member, Model, Shape};

use super::common::{MODELS_PACKAGE, file_path, future_annotations, header, import_model};
use super::fields::FieldKind;
use super::ir::utils::{attribute_name, py_string, to_snake_case};
use super::ir::{
    Emit, ImportGroup, PyArg, PyClass, PyExpr, PyField, PyFunction, PyImports, PyItem, PyLiteral, PyModule, PyParam,
    PyStmt, PyType,
};
use super::validation::{Bounds, ValidationRule, rules_for};
use super::{Artifact, Emitter};

/// Emits `<root>/<module>/models/<snake name>.py` for every structure.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeEmitter;

impl Emitter for TypeEmitter {
    type Options = EmitOptions;

    fn generate(&self, model: &Model, options: &EmitOptions) -> Vec<Artifact> {
        model
            .structures()
            .map(|shape| {
                debug!(shape_id = %shape.id, "Emitting model.");
                let module = codegen_model(model, shape, options);
                Artifact::new(
                    file_path(options, MODELS_PACKAGE, &to_snake_case(&shape.name)),
                    module.emit(),
                )
            })
            .collect()
    }
}

fn codegen_model(model: &Model, shape: &Shape, options: &EmitOptions) -> PyModule {
    let mut imports = PyImports::default();
    future_annotations(&mut imports);
    imports.from(ImportGroup::ThirdParty, "pydantic", "BaseModel");
    imports.from(ImportGroup::ThirdParty, "pydantic", "ConfigDict");

    let mut class = PyClass::new(&shape.name);
    class.bases.push("BaseModel".to_string());
    class.docstring = shape.documentation.clone();
    class.attributes.push(PyStmt::assign(
        "model_config",
        PyExpr::name("ConfigDict").call(vec![PyArg::keyword(
            "populate_by_name",
            PyExpr::Literal(PyLiteral::Bool(true)),
        )]),
    ));

    // Imported after the class; resolved by `model_rebuild`.
    let mut references = PyImports::default();
    for member in shape.members.values() {
        let kind = FieldKind::resolve(model, &member.target);
        if kind.uses_any() {
            imports.from(ImportGroup::Stdlib, "typing", "Any");
        }
        if kind.uses_datetime() {
            imports.from(ImportGroup::Stdlib, "datetime", "datetime");
        }
        for name in kind.references() {
            if name != shape.name {
                import_model(&mut references, options, name);
            }
        }
        class.fields.push(codegen_field(member, &kind, &mut imports));
    }

    let rules = rules_for(shape);
    if !rules.is_empty() {
        imports.from(ImportGroup::ThirdParty, "pydantic", "model_validator");
    }
    for rule in &rules {
        if matches!(rule, ValidationRule::Pattern { .. }) {
            imports.import(ImportGroup::Stdlib, "re");
        }
        class.validators.push(codegen_validator(&shape.name, rule));
    }

    let mut items = vec![PyItem::Class(class)];
    if !references.is_empty() {
        items.push(PyItem::Imports(references));
        items.push(PyItem::Stmt(PyStmt::Expr(PyExpr::name(&shape.name).attr("model_rebuild").call(vec![
            PyArg::keyword("raise_errors", PyExpr::Literal(PyLiteral::Bool(false))),
        ]))));
    }
    PyModule {
        docstring: Some(header("Model", shape.id.as_str())),
        imports,
        items,
    }
}

/// Default value from the `default` trait.
enum DefaultValue {
    Literal(PyExpr),
    /// `Field(default_factory=...)` for mutable defaults.
    Factory(&'static str),
}

fn default_value(value: &Value) -> Option<DefaultValue> {
    let literal = match value {
        Value::Null => PyLiteral::None,
        Value::Bool(b) => PyLiteral::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => PyLiteral::Int(i),
            None => PyLiteral::Float(n.as_f64()?),
        },
        Value::String(s) => PyLiteral::Str(s.clone()),
        Value::Array(items) if items.is_empty() => return Some(DefaultValue::Factory("list")),
        Value::Object(entries) if entries.is_empty() => return Some(DefaultValue::Factory("dict")),
        Value::Array(_) | Value::Object(_) => return None,
    };
    Some(DefaultValue::Literal(PyExpr::Literal(literal)))
}

fn codegen_field(member: &Member, kind: &FieldKind, imports: &mut PyImports) -> PyField {
    let name = attribute_name(&member.name);
    let required = member.is_required();
    let ty = if required {
        kind.py_type()
    } else {
        PyType::optional(kind.py_type())
    };

    let default = match member.traits.get(DEFAULT).and_then(default_value) {
        Some(default) => Some(default),
        None if required => None,
        None => Some(DefaultValue::Literal(PyExpr::none())),
    };

    let mut args = Vec::new();
    let mut plain_default = None;
    let mut needs_field = false;
    match default {
        Some(DefaultValue::Literal(expr)) => {
            args.push(PyArg::keyword("default", expr.clone()));
            plain_default = Some(expr);
        }
        Some(DefaultValue::Factory(factory)) => {
            args.push(PyArg::keyword("default_factory", PyExpr::name(factory)));
            needs_field = true;
        }
        None => {}
    }
    if name != member.name {
        args.push(PyArg::keyword("alias", PyExpr::str(&member.name)));
        needs_field = true;
    }
    if let Some(doc) = &member.documentation {
        args.push(PyArg::keyword("description", PyExpr::str(doc)));
        needs_field = true;
    }

    let default = if needs_field {
        imports.from(ImportGroup::ThirdParty, "pydantic", "Field");
        Some(PyExpr::name("Field").call(args))
    } else {
        plain_default
    };
    PyField { name, ty, default }
}

fn bound_text(bounds: &Bounds, subject: &str) -> (String, String) {
    match bounds {
        Bounds::Between(min, max) => (format!("not {min} <= {subject} <= {max}"), format!("between {min} and {max}")),
        Bounds::AtLeast(min) => (format!("{subject} < {min}"), format!("at least {min}")),
        Bounds::AtMost(max) => (format!("{subject} > {max}"), format!("at most {max}")),
    }
}

fn value_error(message: &str) -> PyStmt {
    PyStmt::Raise {
        exception: PyExpr::name("ValueError").call(vec![PyArg::positional(PyExpr::str(message))]),
        cause: None,
    }
}

fn codegen_validator(model_name: &str, rule: &ValidationRule) -> PyFunction {
    let mut function = PyFunction::new(rule.method_name());
    function.decorators.push(
        PyExpr::name("model_validator").call(vec![PyArg::keyword("mode", PyExpr::str("after"))]),
    );
    function.params.push(PyParam::receiver());
    function.return_type = Some(PyType::Named(model_name.to_string()));

    let value = |attribute: &str| PyStmt::assign("value", PyExpr::name("self").attr(attribute));
    function.body = match rule {
        ValidationRule::Required { fields } => {
            let names = PyExpr::List(fields.iter().map(|field| PyExpr::str(&field.attribute)).collect());
            vec![
                PyStmt::assign(
                    "missing",
                    PyExpr::Raw(format!(
                        "[name for name in {} if getattr(self, name) is None]",
                        names.emit()
                    )),
                ),
                PyStmt::If {
                    cond: PyExpr::name("missing"),
                    then_body: vec![PyStmt::Raise {
                        exception: PyExpr::name("ValueError").call(vec![PyArg::positional(PyExpr::FString(
                            "missing required fields: {', '.join(missing)}".to_string(),
                        ))]),
                        cause: None,
                    }],
                    else_body: None,
                },
            ]
        }
        ValidationRule::Length { field, bounds } => {
            let (cond, text) = bound_text(bounds, "len(value)");
            vec![
                value(&field.attribute),
                PyStmt::If {
                    cond: PyExpr::Raw(format!("value is not None and {cond}")),
                    then_body: vec![value_error(&format!("{} length must be {text}", field.member))],
                    else_body: None,
                },
            ]
        }
        ValidationRule::Range { field, bounds } => {
            let (cond, text) = bound_text(bounds, "value");
            vec![
                value(&field.attribute),
                PyStmt::If {
                    cond: PyExpr::Raw(format!("value is not None and {cond}")),
                    then_body: vec![value_error(&format!("{} must be {text}", field.member))],
                    else_body: None,
                },
            ]
        }
        ValidationRule::Pattern { field, pattern } => vec![
            value(&field.attribute),
            PyStmt::If {
                cond: PyExpr::Raw(format!(
                    "value is not None and re.search({}, value) is None",
                    py_string(pattern)
                )),
                then_body: vec![value_error(&format!("{} must match pattern {pattern}", field.member))],
                else_body: None,
            },
        ],
    };
    function.body.push(PyStmt::Return(Some(PyExpr::name("self"))));
    function
}
