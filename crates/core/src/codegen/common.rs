//! Naming and import helpers shared by the emitters.

use std::path::PathBuf;

use crate::config::EmitOptions;
use crate::model::{Shape, ShapeKind};

use super::ir::utils::{attribute_name, to_snake_case};
use super::ir::{ImportGroup, PyImports, PyType};

pub(crate) const MODELS_PACKAGE: &str = "models";
pub(crate) const API_PACKAGE: &str = "api";
pub(crate) const CLIENT_PACKAGE: &str = "client";

/// Module docstring placed at the top of every artifact.
pub(crate) fn header(what: &str, source: &str) -> String {
    format!("{what} generated by idlgen from `{source}`.\n\nDo not edit by hand; regenerate instead.")
}

pub(crate) fn file_path(options: &EmitOptions, package: &str, module: &str) -> PathBuf {
    options.module_dir().join(package).join(format!("{module}.py"))
}

pub(crate) fn model_module(options: &EmitOptions, shape_name: &str) -> String {
    format!("{}.{}", options.import_path(MODELS_PACKAGE), to_snake_case(shape_name))
}

pub(crate) fn import_model(imports: &mut PyImports, options: &EmitOptions, shape_name: &str) {
    imports.from(ImportGroup::Local, model_module(options, shape_name), shape_name);
}

/// Python name of an operation method.
pub(crate) fn method_name(operation: &str) -> String {
    attribute_name(operation)
}

pub(crate) fn future_annotations(imports: &mut PyImports) {
    imports.from(ImportGroup::Future, "__future__", "annotations");
}

/// Annotation for an operation input or output.
///
/// Structures become their generated model (imported); anything else,
/// including unresolved placeholders, degrades to `Any`.
pub(crate) fn io_type(shape: &Shape, imports: &mut PyImports, options: &EmitOptions) -> PyType {
    if shape.kind == ShapeKind::Structure {
        import_model(imports, options, &shape.name);
        PyType::Named(shape.name.clone())
    } else {
        imports.from(ImportGroup::Stdlib, "typing", "Any");
        PyType::Any
    }
}
