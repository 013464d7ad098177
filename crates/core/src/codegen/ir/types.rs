//! Python document IR.
//!
//! This module defines the structural representation every artifact is built
//! as before rendering:
//! - PyType: annotations (primitives, containers, optionals, named models)
//! - PyExpr / PyStmt: expressions and statements inside function bodies
//! - PyClass / PyFunction: declarations with their sections
//! - PyModule: imports plus top-level items

use std::collections::{BTreeMap, BTreeSet};

/// Python type annotation
#[derive(Debug, Clone, PartialEq)]
pub enum PyType {
    Str,
    Int,
    Float,
    Bool,
    Datetime,
    Bytes,
    Any,
    None,
    /// list[T]
    List(Box<PyType>),
    /// dict[str, T]
    Dict(Box<PyType>),
    /// T | None
    Optional(Box<PyType>),
    /// Named class reference: Post, APIRouter
    Named(String),
}

impl PyType {
    pub fn optional(inner: PyType) -> Self {
        match inner {
            PyType::Optional(_) | PyType::Any | PyType::None => inner,
            other => PyType::Optional(Box::new(other)),
        }
    }
}

/// Python literal values
#[derive(Debug, Clone, PartialEq)]
pub enum PyLiteral {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
}

/// Call argument, positional or keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct PyArg {
    pub name: Option<String>,
    pub value: PyExpr,
}

impl PyArg {
    pub fn positional(value: PyExpr) -> Self {
        Self { name: None, value }
    }

    pub fn keyword(name: impl Into<String>, value: PyExpr) -> Self {
        Self {
            name: Some(name.into()),
            value,
        }
    }
}

/// Python expression
#[derive(Debug, Clone, PartialEq)]
pub enum PyExpr {
    /// Identifier: request
    Name(String),
    Literal(PyLiteral),
    /// Attribute access: request.path_params
    Attr { object: Box<PyExpr>, attr: String },
    /// Call: f(a, key=b)
    Call { callee: Box<PyExpr>, args: Vec<PyArg> },
    /// Subscript: data["id"]
    Index { object: Box<PyExpr>, index: Box<PyExpr> },
    /// await expr
    Await(Box<PyExpr>),
    /// [a, b]
    List(Vec<PyExpr>),
    /// {"a": b}
    Dict(Vec<(PyExpr, PyExpr)>),
    /// {a, b}
    Set(Vec<PyExpr>),
    /// f"..." with already-escaped content
    FString(String),
    /// Raw code that doesn't fit the IR
    Raw(String),
}

impl PyExpr {
    pub fn name(name: impl Into<String>) -> Self {
        PyExpr::Name(name.into())
    }

    pub fn str(value: impl Into<String>) -> Self {
        PyExpr::Literal(PyLiteral::Str(value.into()))
    }

    pub fn int(value: i64) -> Self {
        PyExpr::Literal(PyLiteral::Int(value))
    }

    pub fn none() -> Self {
        PyExpr::Literal(PyLiteral::None)
    }

    pub fn attr(self, attr: impl Into<String>) -> Self {
        PyExpr::Attr {
            object: Box::new(self),
            attr: attr.into(),
        }
    }

    pub fn call(self, args: Vec<PyArg>) -> Self {
        PyExpr::Call {
            callee: Box::new(self),
            args,
        }
    }

    pub fn index(self, index: PyExpr) -> Self {
        PyExpr::Index {
            object: Box::new(self),
            index: Box::new(index),
        }
    }

    pub fn awaited(self) -> Self {
        PyExpr::Await(Box::new(self))
    }
}

/// Function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct PyParam {
    pub name: String,
    pub ty: Option<PyType>,
    pub default: Option<PyExpr>,
}

impl PyParam {
    pub fn new(name: impl Into<String>, ty: PyType) -> Self {
        Self {
            name: name.into(),
            ty: Some(ty),
            default: None,
        }
    }

    /// Untyped receiver: `self`.
    pub fn receiver() -> Self {
        Self {
            name: "self".to_string(),
            ty: None,
            default: None,
        }
    }

    /// Bare `*` separating keyword-only parameters.
    pub fn keyword_only_marker() -> Self {
        Self {
            name: "*".to_string(),
            ty: None,
            default: None,
        }
    }

    pub fn with_default(mut self, default: PyExpr) -> Self {
        self.default = Some(default);
        self
    }
}

/// `except Type as name:` clause
#[derive(Debug, Clone, PartialEq)]
pub struct PyExcept {
    pub exception: String,
    pub binding: Option<String>,
    pub body: Vec<PyStmt>,
}

/// Statement in a function body
#[derive(Debug, Clone, PartialEq)]
pub enum PyStmt {
    /// target: T = value
    Assign {
        target: PyExpr,
        ty: Option<PyType>,
        value: PyExpr,
    },
    Expr(PyExpr),
    Return(Option<PyExpr>),
    If {
        cond: PyExpr,
        then_body: Vec<PyStmt>,
        else_body: Option<Vec<PyStmt>>,
    },
    /// raise Exc(...) [from cause]
    Raise { exception: PyExpr, cause: Option<String> },
    Try {
        body: Vec<PyStmt>,
        handlers: Vec<PyExcept>,
    },
    /// `...` body placeholder
    Ellipsis,
}

impl PyStmt {
    pub fn assign(target: impl Into<String>, value: PyExpr) -> Self {
        PyStmt::Assign {
            target: PyExpr::Name(target.into()),
            ty: None,
            value,
        }
    }
}

/// Function or method definition
#[derive(Debug, Clone, PartialEq)]
pub struct PyFunction {
    pub name: String,
    pub decorators: Vec<PyExpr>,
    pub params: Vec<PyParam>,
    pub return_type: Option<PyType>,
    pub docstring: Option<String>,
    pub body: Vec<PyStmt>,
    pub is_async: bool,
}

impl PyFunction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decorators: Vec::new(),
            params: Vec::new(),
            return_type: None,
            docstring: None,
            body: Vec::new(),
            is_async: false,
        }
    }
}

/// Annotated class attribute: `name: T = default`
#[derive(Debug, Clone, PartialEq)]
pub struct PyField {
    pub name: String,
    pub ty: PyType,
    pub default: Option<PyExpr>,
}

/// Class definition with its sections in rendering order.
#[derive(Debug, Clone, PartialEq)]
pub struct PyClass {
    pub name: String,
    pub bases: Vec<String>,
    pub docstring: Option<String>,
    /// Unannotated class-level assignments, e.g. `model_config = ...`
    pub attributes: Vec<PyStmt>,
    pub fields: Vec<PyField>,
    pub validators: Vec<PyFunction>,
    pub methods: Vec<PyFunction>,
}

impl PyClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            docstring: None,
            attributes: Vec::new(),
            fields: Vec::new(),
            validators: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.fields.is_empty() && self.validators.is_empty() && self.methods.is_empty()
    }
}

/// Top-level module item
#[derive(Debug, Clone, PartialEq)]
pub enum PyItem {
    Class(PyClass),
    Function(PyFunction),
    Stmt(PyStmt),
    /// Imports placed after the definitions that other modules need first.
    Imports(PyImports),
}

/// Import block, grouped the way isort/ruff group them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PyImports {
    /// `import x` statements
    pub modules: BTreeSet<(ImportGroup, String)>,
    /// `from x import a, b` statements
    pub names: BTreeMap<(ImportGroup, String), BTreeSet<String>>,
}

/// Import section, in rendering order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImportGroup {
    Future,
    Stdlib,
    ThirdParty,
    Local,
}

impl PyImports {
    pub fn import(&mut self, group: ImportGroup, module: impl Into<String>) {
        self.modules.insert((group, module.into()));
    }

    pub fn from(&mut self, group: ImportGroup, module: impl Into<String>, name: impl Into<String>) {
        self.names
            .entry((group, module.into()))
            .or_default()
            .insert(name.into());
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.names.is_empty()
    }
}

/// Complete Python module
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PyModule {
    pub docstring: Option<String>,
    pub imports: PyImports,
    pub items: Vec<PyItem>,
}
