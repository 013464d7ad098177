//! Python code emission via the Emit trait.
//!
//! Every IR node implements `Emit`; block-level nodes additionally render at
//! an indentation level (4 spaces per level). This is the only place that
//! knows Python surface syntax.

use super::types::{
    ImportGroup, PyArg, PyClass, PyExcept, PyExpr, PyField, PyFunction, PyImports, PyItem, PyLiteral, PyModule,
    PyParam, PyStmt, PyType,
};
use super::utils::{escape_docstring, py_string};

/// Longest `from x import ...` line before it is wrapped in parentheses.
const MAX_IMPORT_LINE: usize = 88;

/// Trait for emitting Python code from IR nodes.
pub trait Emit {
    /// Convert the IR node to its Python source representation.
    fn emit(&self) -> String;
}

fn indent_str(indent: usize) -> String {
    "    ".repeat(indent)
}

fn join<T: Emit>(items: &[T], sep: &str) -> String {
    items.iter().map(Emit::emit).collect::<Vec<_>>().join(sep)
}

// =============================================================================
// Types and Literals
// =============================================================================

impl Emit for PyType {
    fn emit(&self) -> String {
        match self {
            PyType::Str => "str".to_string(),
            PyType::Int => "int".to_string(),
            PyType::Float => "float".to_string(),
            PyType::Bool => "bool".to_string(),
            PyType::Datetime => "datetime".to_string(),
            PyType::Bytes => "bytes".to_string(),
            PyType::Any => "Any".to_string(),
            PyType::None => "None".to_string(),
            PyType::List(inner) => format!("list[{}]", inner.emit()),
            PyType::Dict(value) => format!("dict[str, {}]", value.emit()),
            PyType::Optional(inner) => format!("{} | None", inner.emit()),
            PyType::Named(name) => name.clone(),
        }
    }
}

impl Emit for PyLiteral {
    fn emit(&self) -> String {
        match self {
            PyLiteral::Str(s) => py_string(s),
            PyLiteral::Int(i) => i.to_string(),
            // Debug formatting always keeps a decimal point or exponent.
            PyLiteral::Float(f) => format!("{f:?}"),
            PyLiteral::Bool(true) => "True".to_string(),
            PyLiteral::Bool(false) => "False".to_string(),
            PyLiteral::None => "None".to_string(),
        }
    }
}

// =============================================================================
// Expressions
// =============================================================================

impl Emit for PyArg {
    fn emit(&self) -> String {
        match &self.name {
            Some(name) => format!("{name}={}", self.value.emit()),
            None => self.value.emit(),
        }
    }
}

impl Emit for PyExpr {
    fn emit(&self) -> String {
        match self {
            PyExpr::Name(name) => name.clone(),
            PyExpr::Literal(lit) => lit.emit(),
            PyExpr::Attr { object, attr } => format!("{}.{attr}", object.emit()),
            PyExpr::Call { callee, args } => format!("{}({})", callee.emit(), join(args, ", ")),
            PyExpr::Index { object, index } => format!("{}[{}]", object.emit(), index.emit()),
            PyExpr::Await(expr) => format!("await {}", expr.emit()),
            PyExpr::List(items) => format!("[{}]", join(items, ", ")),
            PyExpr::Dict(entries) => {
                let parts: Vec<_> = entries
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key.emit(), value.emit()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            PyExpr::Set(items) if items.is_empty() => "set()".to_string(),
            PyExpr::Set(items) => format!("{{{}}}", join(items, ", ")),
            PyExpr::FString(content) => format!("f\"{content}\""),
            PyExpr::Raw(code) => code.clone(),
        }
    }
}

impl Emit for PyParam {
    fn emit(&self) -> String {
        match (&self.ty, &self.default) {
            (Some(ty), Some(default)) => format!("{}: {} = {}", self.name, ty.emit(), default.emit()),
            (Some(ty), None) => format!("{}: {}", self.name, ty.emit()),
            (None, Some(default)) => format!("{}={}", self.name, default.emit()),
            (None, None) => self.name.clone(),
        }
    }
}

// =============================================================================
// Statements
// =============================================================================

impl Emit for PyStmt {
    fn emit(&self) -> String {
        self.emit_indented(0)
    }
}

fn emit_block(body: &[PyStmt], indent: usize) -> String {
    if body.is_empty() {
        return format!("{}pass\n", indent_str(indent));
    }
    body.iter().map(|stmt| stmt.emit_indented(indent)).collect()
}

fn emit_docstring(text: &str, indent: usize) -> String {
    let prefix = indent_str(indent);
    let text = escape_docstring(text.trim());
    if !text.contains('\n') {
        return format!("{prefix}\"\"\"{text}\"\"\"\n");
    }
    let mut output = format!("{prefix}\"\"\"");
    for (i, line) in text.lines().enumerate() {
        if i > 0 && !line.trim().is_empty() {
            output.push_str(&prefix);
        }
        output.push_str(line.trim_end());
        output.push('\n');
    }
    output.push_str(&format!("{prefix}\"\"\"\n"));
    output
}

impl PyStmt {
    /// Emit with specified indentation level (4 spaces per level)
    pub fn emit_indented(&self, indent: usize) -> String {
        let prefix = indent_str(indent);
        match self {
            PyStmt::Assign { target, ty, value } => match ty {
                Some(ty) => format!("{prefix}{}: {} = {}\n", target.emit(), ty.emit(), value.emit()),
                None => format!("{prefix}{} = {}\n", target.emit(), value.emit()),
            },
            PyStmt::Expr(expr) => format!("{prefix}{}\n", expr.emit()),
            PyStmt::Return(Some(expr)) => format!("{prefix}return {}\n", expr.emit()),
            PyStmt::Return(None) => format!("{prefix}return\n"),
            PyStmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let mut output = format!("{prefix}if {}:\n", cond.emit());
                output.push_str(&emit_block(then_body, indent + 1));
                if let Some(else_body) = else_body {
                    output.push_str(&format!("{prefix}else:\n"));
                    output.push_str(&emit_block(else_body, indent + 1));
                }
                output
            }
            PyStmt::Raise { exception, cause } => match cause {
                Some(cause) => format!("{prefix}raise {} from {cause}\n", exception.emit()),
                None => format!("{prefix}raise {}\n", exception.emit()),
            },
            PyStmt::Try { body, handlers } => {
                let mut output = format!("{prefix}try:\n");
                output.push_str(&emit_block(body, indent + 1));
                for handler in handlers {
                    output.push_str(&handler.emit_indented(indent));
                }
                output
            }
            PyStmt::Ellipsis => format!("{prefix}...\n"),
        }
    }
}

impl PyExcept {
    pub fn emit_indented(&self, indent: usize) -> String {
        let prefix = indent_str(indent);
        let mut output = match &self.binding {
            Some(binding) => format!("{prefix}except {} as {binding}:\n", self.exception),
            None => format!("{prefix}except {}:\n", self.exception),
        };
        output.push_str(&emit_block(&self.body, indent + 1));
        output
    }
}

// =============================================================================
// Functions and Classes
// =============================================================================

impl Emit for PyFunction {
    fn emit(&self) -> String {
        self.emit_indented(0)
    }
}

impl PyFunction {
    pub fn emit_indented(&self, indent: usize) -> String {
        let prefix = indent_str(indent);
        let mut output = String::new();
        for decorator in &self.decorators {
            output.push_str(&format!("{prefix}@{}\n", decorator.emit()));
        }
        let async_str = if self.is_async { "async " } else { "" };
        let return_str = self
            .return_type
            .as_ref()
            .map(|ty| format!(" -> {}", ty.emit()))
            .unwrap_or_default();
        output.push_str(&format!(
            "{prefix}{async_str}def {}({}){return_str}:\n",
            self.name,
            join(&self.params, ", ")
        ));
        if let Some(doc) = &self.docstring {
            output.push_str(&emit_docstring(doc, indent + 1));
            if !self.body.is_empty() {
                output.push_str(&emit_block(&self.body, indent + 1));
            }
        } else {
            output.push_str(&emit_block(&self.body, indent + 1));
        }
        output
    }
}

impl PyField {
    pub fn emit_indented(&self, indent: usize) -> String {
        let prefix = indent_str(indent);
        match &self.default {
            Some(default) => format!("{prefix}{}: {} = {}\n", self.name, self.ty.emit(), default.emit()),
            None => format!("{prefix}{}: {}\n", self.name, self.ty.emit()),
        }
    }
}

impl Emit for PyClass {
    fn emit(&self) -> String {
        let mut output = if self.bases.is_empty() {
            format!("class {}:\n", self.name)
        } else {
            format!("class {}({}):\n", self.name, self.bases.join(", "))
        };

        let mut sections: Vec<String> = Vec::new();
        if let Some(doc) = &self.docstring {
            sections.push(emit_docstring(doc, 1));
        }
        if !self.attributes.is_empty() {
            sections.push(self.attributes.iter().map(|stmt| stmt.emit_indented(1)).collect());
        }
        if !self.fields.is_empty() {
            sections.push(self.fields.iter().map(|field| field.emit_indented(1)).collect());
        }
        for function in self.validators.iter().chain(&self.methods) {
            sections.push(function.emit_indented(1));
        }

        if sections.is_empty() {
            output.push_str("    pass\n");
        } else {
            output.push_str(&sections.join("\n"));
        }
        output
    }
}

// =============================================================================
// Imports
// =============================================================================

fn emit_from_import(module: &str, names: &[&str]) -> String {
    let line = format!("from {module} import {}", names.join(", "));
    if line.len() <= MAX_IMPORT_LINE {
        return format!("{line}\n");
    }
    let mut output = format!("from {module} import (\n");
    for name in names {
        output.push_str(&format!("    {name},\n"));
    }
    output.push_str(")\n");
    output
}

impl Emit for PyImports {
    fn emit(&self) -> String {
        let groups = [
            ImportGroup::Future,
            ImportGroup::Stdlib,
            ImportGroup::ThirdParty,
            ImportGroup::Local,
        ];
        let mut blocks = Vec::new();
        for group in groups {
            let mut block = String::new();
            for (_, module) in self.modules.iter().filter(|(g, _)| *g == group) {
                block.push_str(&format!("import {module}\n"));
            }
            for ((_, module), names) in self.names.iter().filter(|((g, _), _)| *g == group) {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                block.push_str(&emit_from_import(module, &names));
            }
            if !block.is_empty() {
                blocks.push(block);
            }
        }
        blocks.join("\n")
    }
}

// =============================================================================
// Module
// =============================================================================

impl PyItem {
    fn is_definition(&self) -> bool {
        matches!(self, PyItem::Class(_) | PyItem::Function(_))
    }
}

impl Emit for PyItem {
    fn emit(&self) -> String {
        match self {
            PyItem::Class(class) => class.emit(),
            PyItem::Function(function) => function.emit(),
            PyItem::Stmt(stmt) => stmt.emit(),
            PyItem::Imports(imports) => imports.emit(),
        }
    }
}

impl Emit for PyModule {
    fn emit(&self) -> String {
        let mut output = String::new();
        if let Some(doc) = &self.docstring {
            output.push_str(&emit_docstring(doc, 0));
        }
        if !self.imports.is_empty() {
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(&self.imports.emit());
        }

        // Two blank lines around top-level definitions, one after the imports.
        let mut previous: Option<&PyItem> = None;
        for item in &self.items {
            let separator = match previous {
                None if output.is_empty() => "",
                None if item.is_definition() => "\n\n",
                None => "\n",
                Some(prev) if prev.is_definition() || item.is_definition() => "\n\n",
                Some(PyItem::Imports(_)) => "\n",
                Some(_) => "",
            };
            output.push_str(separator);
            output.push_str(&item.emit());
            previous = Some(item);
        }
        output
    }
}

// =============================================================================
// Tests
// =============================================================================
