//! Server layer: FastAPI contract, handlers and routes for the service.
//!
//! Three artifacts under `<module>/api/`:
//! - `<service>_contract.py`: a `Protocol` the application implements
//! - `<service>_handlers.py`: request extraction, validation and error mapping
//! - `<service>_routes.py`: an `APIRouter` factory wiring handlers to URIs

use tracing::debug;

use crate::config::{AppOptions, EmitOptions};
use crate::model::{HttpLocation, Member, Model, Operation, Service, Shape, uri_labels};

use super::common::{API_PACKAGE, file_path, future_annotations, header, import_model, io_type, method_name};
use super::fields::FieldKind;
use super::ir::utils::{py_string, to_snake_case};
use super::ir::{
    Emit, ImportGroup, PyArg, PyClass, PyExcept, PyExpr, PyFunction, PyImports, PyItem, PyLiteral, PyModule, PyParam,
    PyStmt, PyType,
};
use super::{Artifact, Emitter};

#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceEmitter;

impl Emitter for ServiceEmitter {
    type Options = AppOptions;

    fn generate(&self, model: &Model, options: &AppOptions) -> Vec<Artifact> {
        let Some(service) = &model.service else {
            debug!("No service declared, skipping server layer.");
            return Vec::new();
        };
        let names = Names::new(service, &options.emit);
        vec![
            Artifact::new(
                file_path(&options.emit, API_PACKAGE, &names.contract_module),
                codegen_contract(service, &names, &options.emit).emit(),
            ),
            Artifact::new(
                file_path(&options.emit, API_PACKAGE, &names.handlers_module),
                codegen_handlers(model, service, &names, &options.emit).emit(),
            ),
            Artifact::new(
                file_path(&options.emit, API_PACKAGE, &names.routes_module),
                codegen_routes(service, &names, options).emit(),
            ),
        ]
    }
}

/// Class and module names derived from the service name.
struct Names {
    contract: String,
    handlers: String,
    contract_module: String,
    handlers_module: String,
    routes_module: String,
    contract_import: String,
    handlers_import: String,
}

impl Names {
    fn new(service: &Service, options: &EmitOptions) -> Self {
        let base = to_snake_case(&service.name);
        let contract_module = format!("{base}_contract");
        let handlers_module = format!("{base}_handlers");
        Self {
            contract: format!("{}Contract", service.name),
            handlers: format!("{}Handlers", service.name),
            contract_import: format!("{}.{contract_module}", options.import_path(API_PACKAGE)),
            handlers_import: format!("{}.{handlers_module}", options.import_path(API_PACKAGE)),
            routes_module: format!("{base}_routes"),
            contract_module,
            handlers_module,
        }
    }
}

fn structure(shape: Option<&Shape>) -> Option<&Shape> {
    shape.filter(|shape| shape.is_structure())
}

// =============================================================================
// Contract
// =============================================================================

fn codegen_contract(service: &Service, names: &Names, options: &EmitOptions) -> PyModule {
    let mut imports = PyImports::default();
    future_annotations(&mut imports);
    imports.from(ImportGroup::Stdlib, "typing", "Protocol");

    let mut class = PyClass::new(&names.contract);
    class.bases.push("Protocol".to_string());
    class.docstring = Some(
        service
            .documentation
            .clone()
            .unwrap_or_else(|| format!("Operations implemented by the {} application.", service.name)),
    );

    for operation in &service.operations {
        let mut function = PyFunction::new(method_name(&operation.name));
        function.is_async = true;
        function.params.push(PyParam::receiver());
        if let Some(input) = &operation.input {
            function.params.push(PyParam::new("request", io_type(input, &mut imports, options)));
        }
        function.return_type = Some(match &operation.output {
            Some(output) => io_type(output, &mut imports, options),
            None => PyType::None,
        });
        function.docstring = operation.documentation.clone();
        function.body.push(PyStmt::Ellipsis);
        class.methods.push(function);
    }

    PyModule {
        docstring: Some(header("Service contract", service.id.as_str())),
        imports,
        items: vec![PyItem::Class(class)],
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// How one operation's input is spread over the HTTP request.
struct InputLayout<'a> {
    shape: &'a Shape,
    /// Unbound members, read from the JSON body object.
    body: Vec<&'a Member>,
    payload: Option<&'a Member>,
    path: Vec<&'a Member>,
}

impl<'a> InputLayout<'a> {
    fn new(shape: &'a Shape) -> Self {
        let bound = |location: HttpLocation| {
            shape
                .members
                .values()
                .filter(move |member| member.http_binding == Some(location))
        };
        Self {
            shape,
            body: shape.members.values().filter(|member| member.http_binding.is_none()).collect(),
            payload: bound(HttpLocation::Body).next(),
            path: bound(HttpLocation::Path).collect(),
        }
    }
}

/// Whether the handler for this operation parses a JSON body.
fn reads_json(model: &Model, operation: &Operation) -> bool {
    if !operation.http.method.has_body() {
        return false;
    }
    match structure(operation.input.as_ref()) {
        Some(shape) => {
            let layout = InputLayout::new(shape);
            match layout.payload {
                Some(payload) => FieldKind::resolve(model, &payload.target) != FieldKind::Binary,
                None => !layout.body.is_empty(),
            }
        }
        None => operation.input.is_some(),
    }
}

fn data_key(key: &str) -> PyExpr {
    PyExpr::name("data").index(PyExpr::str(key))
}

fn set_data(key: &str, value: PyExpr) -> PyStmt {
    PyStmt::Assign {
        target: data_key(key),
        ty: None,
        value,
    }
}

fn request_attr(attr: &str) -> PyExpr {
    PyExpr::name("request").attr(attr)
}

fn json_response(code: u16, content: PyExpr) -> PyExpr {
    PyExpr::name("JSONResponse").call(vec![
        PyArg::keyword("status_code", PyExpr::int(i64::from(code))),
        PyArg::keyword("content", content),
    ])
}

/// Statements that collect the input into `data` and validate it.
fn extract_input(model: &Model, operation: &Operation, shape: &Shape, imports: &mut PyImports) -> Vec<PyStmt> {
    let layout = InputLayout::new(shape);
    let has_body = operation.http.method.has_body();
    let mut body = Vec::new();

    if has_body && layout.payload.is_none() && !layout.body.is_empty() {
        body.push(PyStmt::assign(
            "data",
            PyExpr::name("_read_object").call(vec![PyArg::positional(PyExpr::name("request"))]).awaited(),
        ));
    } else {
        imports.from(ImportGroup::Stdlib, "typing", "Any");
        body.push(PyStmt::Assign {
            target: PyExpr::name("data"),
            ty: Some(PyType::Dict(Box::new(PyType::Any))),
            value: PyExpr::Dict(Vec::new()),
        });
    }

    if has_body && let Some(payload) = layout.payload {
        let read = if FieldKind::resolve(model, &payload.target) == FieldKind::Binary {
            request_attr("body").call(Vec::new()).awaited()
        } else {
            PyExpr::name("_read_json").call(vec![PyArg::positional(PyExpr::name("request"))]).awaited()
        };
        body.push(set_data(&payload.name, read));
    }

    for member in &layout.path {
        body.push(set_data(&member.name, request_attr("path_params").index(PyExpr::str(&member.name))));
    }

    for param in &operation.http.query_params {
        let is_list = layout
            .shape
            .members
            .get(&param.member)
            .is_some_and(|member| FieldKind::resolve(model, &member.target).is_list());
        let value = if is_list {
            request_attr("query_params")
                .attr("getlist")
                .call(vec![PyArg::positional(PyExpr::str(&param.name))])
        } else {
            request_attr("query_params").index(PyExpr::str(&param.name))
        };
        body.push(PyStmt::If {
            cond: PyExpr::Raw(format!("{} in request.query_params", py_string(&param.name))),
            then_body: vec![set_data(&param.member, value)],
            else_body: None,
        });
    }

    for param in &operation.http.header_params {
        body.push(PyStmt::If {
            cond: PyExpr::Raw(format!("{} in request.headers", py_string(&param.name))),
            then_body: vec![set_data(&param.member, request_attr("headers").index(PyExpr::str(&param.name)))],
            else_body: None,
        });
    }

    body.push(PyStmt::assign(
        "payload",
        PyExpr::name(&shape.name)
            .attr("model_validate")
            .call(vec![PyArg::positional(PyExpr::name("data"))]),
    ));
    body
}

fn codegen_handler(model: &Model, operation: &Operation, imports: &mut PyImports, options: &EmitOptions) -> PyFunction {
    let name = method_name(&operation.name);
    let mut function = PyFunction::new(&name);
    function.is_async = true;
    function.params = vec![PyParam::receiver(), PyParam::new("request", PyType::Named("Request".into()))];
    function.return_type = Some(PyType::Named("Response".into()));
    function.docstring = Some(format!(
        "{} {}: {}.",
        operation.http.method, operation.http.uri, operation.name
    ));

    let call = PyExpr::name("self").attr("_implementation").attr(&name);
    let mut input = Vec::new();
    let validates = matches!(&operation.input, Some(shape) if shape.is_structure());
    let call = match &operation.input {
        Some(shape) if shape.is_structure() => {
            import_model(imports, options, &shape.name);
            input.extend(extract_input(model, operation, shape, imports));
            call.call(vec![PyArg::positional(PyExpr::name("payload"))])
        }
        Some(_) if operation.http.method.has_body() => {
            input.push(PyStmt::assign(
                "payload",
                PyExpr::name("_read_json").call(vec![PyArg::positional(PyExpr::name("request"))]).awaited(),
            ));
            call.call(vec![PyArg::positional(PyExpr::name("payload"))])
        }
        Some(_) => call.call(vec![PyArg::positional(PyExpr::none())]),
        None => call.call(Vec::new()),
    };

    // Only request decoding maps to 400; anything raised by the
    // implementation or while serializing its result is a 500.
    let mut rejections = Vec::new();
    if validates {
        rejections.push(PyExcept {
            exception: "ValidationError".into(),
            binding: Some("error".into()),
            body: vec![PyStmt::Return(Some(PyExpr::name("_bad_request").call(vec![
                PyArg::positional(PyExpr::Raw("jsonable_encoder(error.errors(include_url=False))".into())),
            ])))],
        });
    }
    if reads_json(model, operation) {
        rejections.push(PyExcept {
            exception: "json.JSONDecodeError".into(),
            binding: Some("error".into()),
            body: vec![PyStmt::Return(Some(PyExpr::name("_bad_request").call(vec![
                PyArg::positional(PyExpr::Raw(
                    "[{\"type\": \"json_invalid\", \"loc\": [\"body\"], \"msg\": str(error)}]".into(),
                )),
            ])))],
        });
    }

    let code = operation.http.code;
    let mut execute = Vec::new();
    match &operation.output {
        Some(output) if output.is_structure() => {
            execute.push(PyStmt::assign("result", call.awaited()));
            execute.push(PyStmt::Return(Some(json_response(
                code,
                PyExpr::name("result").attr("model_dump").call(vec![
                    PyArg::keyword("mode", PyExpr::str("json")),
                    PyArg::keyword("by_alias", PyExpr::Literal(PyLiteral::Bool(true))),
                    PyArg::keyword("exclude_none", PyExpr::Literal(PyLiteral::Bool(true))),
                ]),
            ))));
        }
        Some(_) => {
            execute.push(PyStmt::assign("result", call.awaited()));
            execute.push(PyStmt::Return(Some(json_response(
                code,
                PyExpr::name("jsonable_encoder").call(vec![PyArg::positional(PyExpr::name("result"))]),
            ))));
        }
        None => {
            execute.push(PyStmt::Expr(call.awaited()));
            execute.push(PyStmt::Return(Some(
                PyExpr::name("Response").call(vec![PyArg::keyword("status_code", PyExpr::int(i64::from(code)))]),
            )));
        }
    }

    if !input.is_empty() {
        if rejections.is_empty() {
            function.body.extend(input);
        } else {
            function.body.push(PyStmt::Try {
                body: input,
                handlers: rejections,
            });
        }
    }
    function.body.push(PyStmt::Try {
        body: execute,
        handlers: vec![PyExcept {
            exception: "Exception".into(),
            binding: None,
            body: vec![
                PyStmt::Expr(PyExpr::name("logger").attr("exception").call(vec![PyArg::positional(
                    PyExpr::str(format!("Unhandled error in {}", operation.name)),
                )])),
                PyStmt::Return(Some(PyExpr::name("_internal_error").call(Vec::new()))),
            ],
        }],
    });
    function
}

fn error_response(code: u16, kind: &str, extra: (&str, PyExpr)) -> PyStmt {
    PyStmt::Return(Some(json_response(
        code,
        PyExpr::Dict(vec![(PyExpr::str("type"), PyExpr::str(kind)), (PyExpr::str(extra.0), extra.1)]),
    )))
}

/// `logger`, the error response builders and, when needed, the body readers.
fn module_helpers(with_json: bool) -> Vec<PyItem> {
    let mut items = vec![PyItem::Stmt(PyStmt::assign(
        "logger",
        PyExpr::name("logging")
            .attr("getLogger")
            .call(vec![PyArg::positional(PyExpr::name("__name__"))]),
    ))];

    let mut bad_request = PyFunction::new("_bad_request");
    bad_request.params.push(PyParam::new("errors", PyType::Any));
    bad_request.return_type = Some(PyType::Named("JSONResponse".into()));
    bad_request.body.push(error_response(400, "ValidationError", ("errors", PyExpr::name("errors"))));
    items.push(PyItem::Function(bad_request));

    let mut internal = PyFunction::new("_internal_error");
    internal.return_type = Some(PyType::Named("JSONResponse".into()));
    internal
        .body
        .push(error_response(500, "InternalServerError", ("message", PyExpr::str("Internal server error"))));
    items.push(PyItem::Function(internal));

    if with_json {
        let mut read_json = PyFunction::new("_read_json");
        read_json.is_async = true;
        read_json.params.push(PyParam::new("request", PyType::Named("Request".into())));
        read_json.return_type = Some(PyType::Any);
        read_json.body = vec![
            PyStmt::assign("body", request_attr("body").call(Vec::new()).awaited()),
            PyStmt::If {
                cond: PyExpr::Raw("not body".into()),
                then_body: vec![PyStmt::Return(Some(PyExpr::none()))],
                else_body: None,
            },
            PyStmt::Return(Some(
                PyExpr::name("json")
                    .attr("loads")
                    .call(vec![PyArg::positional(PyExpr::name("body"))]),
            )),
        ];
        items.push(PyItem::Function(read_json));

        let mut read_object = PyFunction::new("_read_object");
        read_object.is_async = true;
        read_object.params.push(PyParam::new("request", PyType::Named("Request".into())));
        read_object.return_type = Some(PyType::Dict(Box::new(PyType::Any)));
        read_object.body = vec![
            PyStmt::assign(
                "data",
                PyExpr::name("_read_json").call(vec![PyArg::positional(PyExpr::name("request"))]).awaited(),
            ),
            PyStmt::If {
                cond: PyExpr::Raw("data is None".into()),
                then_body: vec![PyStmt::Return(Some(PyExpr::Dict(Vec::new())))],
                else_body: None,
            },
            PyStmt::If {
                cond: PyExpr::Raw("not isinstance(data, dict)".into()),
                then_body: vec![PyStmt::Raise {
                    exception: PyExpr::Raw(
                        "json.JSONDecodeError(\"request body must be a JSON object\", \"\", 0)".into(),
                    ),
                    cause: None,
                }],
                else_body: None,
            },
            PyStmt::Return(Some(PyExpr::name("data"))),
        ];
        items.push(PyItem::Function(read_object));
    }
    items
}

fn codegen_handlers(model: &Model, service: &Service, names: &Names, options: &EmitOptions) -> PyModule {
    let with_json = service.operations.iter().any(|operation| reads_json(model, operation));

    let mut imports = PyImports::default();
    future_annotations(&mut imports);
    imports.import(ImportGroup::Stdlib, "logging");
    imports.from(ImportGroup::Stdlib, "typing", "Any");
    if with_json {
        imports.import(ImportGroup::Stdlib, "json");
    }
    imports.from(ImportGroup::ThirdParty, "fastapi", "Request");
    imports.from(ImportGroup::ThirdParty, "fastapi", "Response");
    imports.from(ImportGroup::ThirdParty, "fastapi.encoders", "jsonable_encoder");
    imports.from(ImportGroup::ThirdParty, "fastapi.responses", "JSONResponse");
    imports.from(ImportGroup::ThirdParty, "pydantic", "ValidationError");
    imports.from(ImportGroup::Local, &names.contract_import, &names.contract);

    let mut class = PyClass::new(&names.handlers);
    class.docstring = Some(format!("HTTP handlers delegating to a {} implementation.", names.contract));
    let mut init = PyFunction::new("__init__");
    init.params = vec![
        PyParam::receiver(),
        PyParam::new("implementation", PyType::Named(names.contract.clone())),
    ];
    init.return_type = Some(PyType::None);
    init.body.push(PyStmt::Assign {
        target: PyExpr::name("self").attr("_implementation"),
        ty: None,
        value: PyExpr::name("implementation"),
    });
    class.methods.push(init);

    for operation in &service.operations {
        debug!(operation = %operation.id, "Emitting handler.");
        class
            .methods
            .push(codegen_handler(model, operation, &mut imports, options));
    }

    let mut items = module_helpers(with_json);
    items.push(PyItem::Class(class));
    PyModule {
        docstring: Some(header("Service handlers", service.id.as_str())),
        imports,
        items,
    }
}

// =============================================================================
// Routes
// =============================================================================

/// FastAPI path template: greedy `{key+}` labels become `{key:path}`.
fn route_path(uri: &str) -> String {
    uri_labels(uri)
        .into_iter()
        .filter(|label| label.greedy)
        .fold(uri.to_string(), |path, label| {
            path.replace(&format!("{{{}+}}", label.name), &format!("{{{}:path}}", label.name))
        })
}

fn codegen_routes(service: &Service, names: &Names, options: &AppOptions) -> PyModule {
    let mut imports = PyImports::default();
    future_annotations(&mut imports);
    imports.from(ImportGroup::ThirdParty, "fastapi", "APIRouter");
    imports.from(ImportGroup::Local, &names.contract_import, &names.contract);
    imports.from(ImportGroup::Local, &names.handlers_import, &names.handlers);

    let mut function = PyFunction::new("create_router");
    function.params.push(PyParam::new("implementation", PyType::Named(names.contract.clone())));
    function.return_type = Some(PyType::Named("APIRouter".into()));
    function.docstring = Some(format!("Build a router serving every {} operation.", service.name));
    function.body.push(PyStmt::assign(
        "handlers",
        PyExpr::name(&names.handlers).call(vec![PyArg::positional(PyExpr::name("implementation"))]),
    ));
    function.body.push(PyStmt::assign(
        "router",
        PyExpr::name("APIRouter").call(vec![PyArg::keyword(
            "tags",
            PyExpr::List(vec![PyExpr::str(&options.application)]),
        )]),
    ));
    for operation in &service.operations {
        function.body.push(PyStmt::Expr(PyExpr::name("router").attr("add_api_route").call(vec![
            PyArg::positional(PyExpr::str(route_path(&operation.http.uri))),
            PyArg::positional(PyExpr::name("handlers").attr(method_name(&operation.name))),
            PyArg::keyword("methods", PyExpr::List(vec![PyExpr::str(operation.http.method.as_str())])),
            PyArg::keyword("name", PyExpr::str(&operation.name)),
            PyArg::keyword("status_code", PyExpr::int(i64::from(operation.http.code))),
        ])));
    }
    function.body.push(PyStmt::Return(Some(PyExpr::name("router"))));

    PyModule {
        docstring: Some(header("Service routes", service.id.as_str())),
        imports,
        items: vec![PyItem::Function(function)],
    }
}
