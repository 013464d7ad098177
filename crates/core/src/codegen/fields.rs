//! Mapping from member targets to generated field kinds.

use crate::model::{Model, Resolved, ShapeId, ShapeKind};

use super::ir::PyType;

/// List/map nesting beyond this depth degrades to `Unknown`; it only happens
/// with self-referencing collections.
const MAX_DEPTH: usize = 16;

/// Target-language kind of a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Binary,
    List(Box<FieldKind>),
    /// String-keyed map of the inner kind.
    Map(Box<FieldKind>),
    /// Another generated model, by shape name.
    Reference(String),
    Unknown,
}

impl FieldKind {
    /// Resolve a member target. Total: every target maps to some kind.
    pub fn resolve(model: &Model, target: &ShapeId) -> Self {
        Self::resolve_at(model, target, 0)
    }

    fn resolve_at(model: &Model, target: &ShapeId, depth: usize) -> Self {
        if depth > MAX_DEPTH {
            return FieldKind::Unknown;
        }
        match model.resolve(target) {
            Resolved::Prelude(kind) => Self::scalar(kind),
            Resolved::Missing => FieldKind::Unknown,
            Resolved::Declared(shape) => match shape.kind {
                ShapeKind::Structure => FieldKind::Reference(shape.name.clone()),
                ShapeKind::List => FieldKind::List(Box::new(Self::element(model, shape.target.as_ref(), depth))),
                ShapeKind::Map => FieldKind::Map(Box::new(Self::element(model, shape.target.as_ref(), depth))),
                kind => Self::scalar(kind),
            },
        }
    }

    fn element(model: &Model, target: Option<&ShapeId>, depth: usize) -> Self {
        target.map_or(FieldKind::Unknown, |target| Self::resolve_at(model, target, depth + 1))
    }

    fn scalar(kind: ShapeKind) -> Self {
        match kind {
            ShapeKind::String | ShapeKind::Enum => FieldKind::String,
            ShapeKind::Integer | ShapeKind::Long | ShapeKind::Short | ShapeKind::Byte => FieldKind::Integer,
            ShapeKind::Float | ShapeKind::Double => FieldKind::Float,
            ShapeKind::Boolean => FieldKind::Boolean,
            ShapeKind::Timestamp => FieldKind::Timestamp,
            ShapeKind::Blob => FieldKind::Binary,
            ShapeKind::Structure
            | ShapeKind::Union
            | ShapeKind::List
            | ShapeKind::Map
            | ShapeKind::Document
            | ShapeKind::Unit
            | ShapeKind::Service
            | ShapeKind::Operation
            | ShapeKind::Unknown => FieldKind::Unknown,
        }
    }

    pub fn py_type(&self) -> PyType {
        match self {
            FieldKind::String => PyType::Str,
            FieldKind::Integer => PyType::Int,
            FieldKind::Float => PyType::Float,
            FieldKind::Boolean => PyType::Bool,
            FieldKind::Timestamp => PyType::Datetime,
            FieldKind::Binary => PyType::Bytes,
            FieldKind::List(inner) => PyType::List(Box::new(inner.py_type())),
            FieldKind::Map(inner) => PyType::Dict(Box::new(inner.py_type())),
            FieldKind::Reference(name) => PyType::Named(name.clone()),
            FieldKind::Unknown => PyType::Any,
        }
    }

    /// Model names referenced anywhere inside this kind.
    pub fn references(&self) -> Vec<&str> {
        match self {
            FieldKind::Reference(name) => vec![name.as_str()],
            FieldKind::List(inner) | FieldKind::Map(inner) => inner.references(),
            _ => Vec::new(),
        }
    }

    pub fn uses_any(&self) -> bool {
        match self {
            FieldKind::Unknown => true,
            FieldKind::List(inner) | FieldKind::Map(inner) => inner.uses_any(),
            _ => false,
        }
    }

    pub fn uses_datetime(&self) -> bool {
        match self {
            FieldKind::Timestamp => true,
            FieldKind::List(inner) | FieldKind::Map(inner) => inner.uses_datetime(),
            _ => false,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FieldKind::List(_))
    }
}
