//! Outbound client: one httpx-based async client class per service.

use tracing::debug;

use crate::config::{AppOptions, EmitOptions};
use crate::model::{HttpLocation, HttpParam, Model, Operation, Service, Shape, uri_labels};

use super::common::{CLIENT_PACKAGE, file_path, future_annotations, header, io_type, method_name};
use super::fields::FieldKind;
use super::ir::utils::{attribute_name, to_snake_case};
use super::ir::{
    Emit, ImportGroup, PyArg, PyClass, PyExcept, PyExpr, PyFunction, PyImports, PyItem, PyLiteral, PyModule, PyParam,
    PyStmt, PyType,
};
use super::{Artifact, Emitter};

/// Default request timeout of the generated client, in seconds.
const DEFAULT_TIMEOUT: f64 = 30.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct ClientEmitter;

impl Emitter for ClientEmitter {
    type Options = AppOptions;

    fn generate(&self, model: &Model, options: &AppOptions) -> Vec<Artifact> {
        let Some(service) = &model.service else {
            debug!("No service declared, skipping client.");
            return Vec::new();
        };
        let module = format!("{}_client", to_snake_case(&service.name));
        vec![Artifact::new(
            file_path(&options.emit, CLIENT_PACKAGE, &module),
            codegen_client(model, service, options).emit(),
        )]
    }
}

// =============================================================================
// Errors
// =============================================================================

fn transport_error() -> PyClass {
    let mut class = PyClass::new("TransportError");
    class.bases.push("Exception".into());
    class.docstring = Some("The request could not be sent or no response arrived.".into());
    class
}

fn unexpected_status_error() -> PyClass {
    let mut class = PyClass::new("UnexpectedStatusError");
    class.bases.push("Exception".into());
    class.docstring = Some("The service answered with a status other than the declared one.".into());

    let mut init = PyFunction::new("__init__");
    init.params = vec![
        PyParam::receiver(),
        PyParam::new("operation", PyType::Str),
        PyParam::new("status_code", PyType::Int),
        PyParam::new("body", PyType::Str),
    ];
    init.return_type = Some(PyType::None);
    init.body.push(PyStmt::Expr(PyExpr::Raw("super().__init__".into()).call(vec![PyArg::positional(
        PyExpr::FString("{operation} returned unexpected status {status_code}".into()),
    )])));
    for field in ["operation", "status_code", "body"] {
        init.body.push(self_assign(field, PyExpr::name(field)));
    }
    class.methods.push(init);
    class
}

fn self_assign(attr: &str, value: PyExpr) -> PyStmt {
    PyStmt::Assign {
        target: PyExpr::name("self").attr(attr),
        ty: None,
        value,
    }
}

// =============================================================================
// Client lifecycle
// =============================================================================

fn lifecycle_methods(client_class: &str, application: &str) -> Vec<PyFunction> {
    let mut init = PyFunction::new("__init__");
    init.params = vec![
        PyParam::receiver(),
        PyParam::new("base_url", PyType::Str),
        PyParam::keyword_only_marker(),
        PyParam::new("client", PyType::optional(PyType::Named("httpx.AsyncClient".into()))).with_default(PyExpr::none()),
        PyParam::new("timeout", PyType::Float).with_default(PyExpr::Literal(PyLiteral::Float(DEFAULT_TIMEOUT))),
    ];
    init.return_type = Some(PyType::None);
    init.body = vec![
        self_assign("_owns_client", PyExpr::Raw("client is None".into())),
        self_assign(
            "_client",
            PyExpr::Raw(format!(
                "client or {}",
                PyExpr::name("httpx").attr("AsyncClient").call(vec![
                    PyArg::keyword("base_url", PyExpr::name("base_url")),
                    PyArg::keyword("timeout", PyExpr::name("timeout")),
                    PyArg::keyword("headers", PyExpr::Dict(vec![(PyExpr::str("User-Agent"), PyExpr::str(application))])),
                ])
                .emit()
            )),
        ),
    ];

    let mut aclose = PyFunction::new("aclose");
    aclose.is_async = true;
    aclose.params.push(PyParam::receiver());
    aclose.return_type = Some(PyType::None);
    aclose.docstring = Some("Close the underlying HTTP client if this instance created it.".into());
    aclose.body.push(PyStmt::If {
        cond: PyExpr::name("self").attr("_owns_client"),
        then_body: vec![PyStmt::Expr(
            PyExpr::name("self").attr("_client").attr("aclose").call(Vec::new()).awaited(),
        )],
        else_body: None,
    });

    let mut enter = PyFunction::new("__aenter__");
    enter.is_async = true;
    enter.params.push(PyParam::receiver());
    enter.return_type = Some(PyType::Named(client_class.to_string()));
    enter.body.push(PyStmt::Return(Some(PyExpr::name("self"))));

    let mut exit = PyFunction::new("__aexit__");
    exit.is_async = true;
    exit.params = vec![PyParam::receiver(), PyParam::new("*exc_info", PyType::Named("object".into()))];
    exit.return_type = Some(PyType::None);
    exit.body.push(PyStmt::Expr(
        PyExpr::name("self").attr("aclose").call(Vec::new()).awaited(),
    ));

    vec![init, aclose, enter, exit]
}

// =============================================================================
// Operations
// =============================================================================

/// Escape text for the inside of a double-quoted f-string.
fn escape_fstring(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('{', "{{")
        .replace('}', "}}")
}

/// URL expression: labels substituted from the request, percent-encoded.
/// Greedy labels keep `/` unescaped.
fn url_expr(uri: &str, has_input: bool) -> PyExpr {
    let labels = uri_labels(uri);
    if labels.is_empty() || !has_input {
        return PyExpr::str(uri);
    }
    let mut content = escape_fstring(uri);
    for label in labels {
        let (written, safe) = if label.greedy {
            (format!("{{{{{}+}}}}", label.name), "/")
        } else {
            (format!("{{{{{}}}}}", label.name), "")
        };
        let substitution = format!("{{quote(str(request.{}), safe='{safe}')}}", attribute_name(&label.name));
        content = content.replace(&written, &substitution);
    }
    PyExpr::FString(content)
}

/// Wire rendering of a bound member value.
fn param_value(kind: &FieldKind, value: PyExpr, stringify: bool) -> PyExpr {
    match kind {
        FieldKind::Timestamp => value.attr("isoformat").call(Vec::new()),
        _ if stringify => PyExpr::name("str").call(vec![PyArg::positional(value)]),
        _ => value,
    }
}

fn bind_params(model: &Model, shape: &Shape, target: &str, params: &[HttpParam], stringify: bool) -> Vec<PyStmt> {
    params
        .iter()
        .filter_map(|param| {
            let member = shape.members.get(&param.member)?;
            let kind = FieldKind::resolve(model, &member.target);
            let value = PyExpr::name("request").attr(attribute_name(&member.name));
            let present = format!("{} is not None", value.emit());
            let assign = PyStmt::Assign {
                target: PyExpr::name(target).index(PyExpr::str(&param.name)),
                ty: None,
                value: param_value(&kind, value, stringify),
            };
            if member.is_required() {
                Some(assign)
            } else {
                Some(PyStmt::If {
                    cond: PyExpr::Raw(present),
                    then_body: vec![assign],
                    else_body: None,
                })
            }
        })
        .collect()
}

fn model_dump(value: PyExpr, include: Option<Vec<String>>) -> PyExpr {
    let mut args = vec![
        PyArg::keyword("mode", PyExpr::str("json")),
        PyArg::keyword("by_alias", PyExpr::Literal(PyLiteral::Bool(true))),
        PyArg::keyword("exclude_none", PyExpr::Literal(PyLiteral::Bool(true))),
    ];
    if let Some(include) = include {
        args.push(PyArg::keyword("include", PyExpr::Set(include.into_iter().map(PyExpr::str).collect())));
    }
    value.attr("model_dump").call(args)
}

/// Body keyword argument for the request call, if the operation sends one.
fn body_arg(model: &Model, operation: &Operation) -> Option<PyArg> {
    if !operation.http.method.has_body() {
        return None;
    }
    let input = operation.input.as_ref()?;
    if !input.is_structure() {
        return Some(PyArg::keyword("json", PyExpr::name("request")));
    }

    let payload = input
        .members
        .values()
        .find(|member| member.http_binding == Some(HttpLocation::Body));
    if let Some(payload) = payload {
        let value = PyExpr::name("request").attr(attribute_name(&payload.name));
        return Some(match FieldKind::resolve(model, &payload.target) {
            FieldKind::Binary => PyArg::keyword("content", value),
            FieldKind::Reference(_) => {
                let absent = format!("None if {} is None", value.emit());
                PyArg::keyword("json", PyExpr::Raw(format!("{absent} else {}", model_dump(value, None).emit())))
            }
            _ => PyArg::keyword("json", value),
        });
    }

    let unbound: Vec<String> = input
        .members
        .values()
        .filter(|member| member.http_binding.is_none())
        .map(|member| attribute_name(&member.name))
        .collect();
    if unbound.is_empty() {
        return None;
    }
    let include = (unbound.len() < input.members.len()).then_some(unbound);
    Some(PyArg::keyword("json", model_dump(PyExpr::name("request"), include)))
}

fn codegen_operation(model: &Model, operation: &Operation, imports: &mut PyImports, options: &EmitOptions) -> PyFunction {
    let mut function = PyFunction::new(method_name(&operation.name));
    function.is_async = true;
    function.params.push(PyParam::receiver());
    if let Some(input) = &operation.input {
        function.params.push(PyParam::new("request", io_type(input, imports, options)));
    }
    let output = operation.output.as_ref();
    function.return_type = Some(match output {
        Some(output) => io_type(output, imports, options),
        None => PyType::None,
    });
    function.docstring = Some(
        operation
            .documentation
            .clone()
            .unwrap_or_else(|| format!("Call {} ({} {}).", operation.name, operation.http.method, operation.http.uri)),
    );

    let http = &operation.http;
    let mut body = vec![PyStmt::assign("url", url_expr(&http.uri, operation.input.is_some()))];
    let mut call_args = vec![
        PyArg::positional(PyExpr::str(http.method.as_str())),
        PyArg::positional(PyExpr::name("url")),
    ];

    if let Some(input) = operation.input.as_ref().filter(|input| input.is_structure()) {
        if !http.query_params.is_empty() {
            imports.from(ImportGroup::Stdlib, "typing", "Any");
            body.push(PyStmt::Assign {
                target: PyExpr::name("params"),
                ty: Some(PyType::Dict(Box::new(PyType::Any))),
                value: PyExpr::Dict(Vec::new()),
            });
            body.extend(bind_params(model, input, "params", &http.query_params, false));
            call_args.push(PyArg::keyword("params", PyExpr::name("params")));
        }
        if !http.header_params.is_empty() {
            body.push(PyStmt::Assign {
                target: PyExpr::name("headers"),
                ty: Some(PyType::Dict(Box::new(PyType::Str))),
                value: PyExpr::Dict(Vec::new()),
            });
            body.extend(bind_params(model, input, "headers", &http.header_params, true));
            call_args.push(PyArg::keyword("headers", PyExpr::name("headers")));
        }
    }
    call_args.extend(body_arg(model, operation));

    body.push(PyStmt::Try {
        body: vec![PyStmt::assign(
            "response",
            PyExpr::name("self")
                .attr("_client")
                .attr("request")
                .call(call_args)
                .awaited(),
        )],
        handlers: vec![PyExcept {
            exception: "httpx.HTTPError".into(),
            binding: Some("error".into()),
            body: vec![PyStmt::Raise {
                exception: PyExpr::name("TransportError").call(vec![PyArg::positional(
                    PyExpr::name("str").call(vec![PyArg::positional(PyExpr::name("error"))]),
                )]),
                cause: Some("error".into()),
            }],
        }],
    });
    body.push(PyStmt::If {
        cond: PyExpr::Raw(format!("response.status_code != {}", http.code)),
        then_body: vec![PyStmt::Raise {
            exception: PyExpr::name("UnexpectedStatusError").call(vec![
                PyArg::positional(PyExpr::str(&operation.name)),
                PyArg::positional(PyExpr::name("response").attr("status_code")),
                PyArg::positional(PyExpr::name("response").attr("text")),
            ]),
            cause: None,
        }],
        else_body: None,
    });

    let json = PyExpr::name("response").attr("json").call(Vec::new());
    match output {
        Some(output) if output.is_structure() => body.push(PyStmt::Return(Some(
            PyExpr::name(&output.name)
                .attr("model_validate")
                .call(vec![PyArg::positional(json)]),
        ))),
        Some(_) => body.push(PyStmt::Return(Some(json))),
        None => {}
    }

    function.body = body;
    function
}

fn codegen_client(model: &Model, service: &Service, options: &AppOptions) -> PyModule {
    let mut imports = PyImports::default();
    future_annotations(&mut imports);
    imports.import(ImportGroup::ThirdParty, "httpx");
    let has_labels = service
        .operations
        .iter()
        .any(|operation| operation.input.is_some() && !uri_labels(&operation.http.uri).is_empty());
    if has_labels {
        imports.from(ImportGroup::Stdlib, "urllib.parse", "quote");
    }

    let class_name = format!("{}Client", service.name);
    let mut class = PyClass::new(&class_name);
    class.docstring = Some(format!(
        "Async client for {} version {}.\n\nPass an existing `httpx.AsyncClient` to share its connection pool; it is\nthen left open by `aclose`.",
        service.name, service.version
    ));
    class.methods = lifecycle_methods(&class_name, &options.application);
    for operation in &service.operations {
        debug!(operation = %operation.id, "Emitting client method.");
        class
            .methods
            .push(codegen_operation(model, operation, &mut imports, &options.emit));
    }

    PyModule {
        docstring: Some(header("Client", service.id.as_str())),
        imports,
        items: vec![
            PyItem::Class(transport_error()),
            PyItem::Class(unexpected_status_error()),
            PyItem::Class(class),
        ],
    }
}
