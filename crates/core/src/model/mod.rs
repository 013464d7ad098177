//! The normalized, immutable model produced by [`build`](crate::builder::build).
//!
//! A [`Model`] is a shape graph keyed by [`ShapeId`] plus the (optional)
//! service declared alongside it. Every value is eagerly materialized: an
//! [`Operation`] owns full copies of its input, output and error shapes, so
//! emitters never chase ids for them.

pub mod http;
pub mod traits;

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use http::{HttpBinding, HttpMethod, HttpParam, extract_path_params, uri_labels};
pub use traits::Traits;

use traits::PRELUDE_NAMESPACE;

/// Absolute shape id of the form `namespace#Name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeId(String);

impl ShapeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_parts(namespace: &str, name: &str) -> Self {
        Self(format!("{namespace}#{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace part, if the id is absolute.
    pub fn namespace(&self) -> Option<&str> {
        self.0.split_once('#').map(|(namespace, _)| namespace)
    }

    /// Name part; the whole id when there is no `#`.
    pub fn name(&self) -> &str {
        self.0.split_once('#').map_or(self.0.as_str(), |(_, name)| name)
    }

    pub fn is_prelude(&self) -> bool {
        self.namespace() == Some(PRELUDE_NAMESPACE)
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShapeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Kind of a shape declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapeKind {
    Structure,
    Union,
    List,
    Map,
    String,
    Integer,
    Long,
    Short,
    Byte,
    Float,
    Double,
    Boolean,
    Timestamp,
    Blob,
    Enum,
    /// Untyped JSON-like value.
    Document,
    /// `smithy.api#Unit`: the absence of a value.
    Unit,
    Service,
    Operation,
    /// Unrecognised type name or placeholder for a dangling reference.
    Unknown,
}

impl ShapeKind {
    /// Map a declared type name (`"structure"`, `"string"`, ...) to a kind.
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "structure" => ShapeKind::Structure,
            "union" => ShapeKind::Union,
            "list" | "set" => ShapeKind::List,
            "map" => ShapeKind::Map,
            "string" => ShapeKind::String,
            "integer" | "bigInteger" => ShapeKind::Integer,
            "long" => ShapeKind::Long,
            "short" => ShapeKind::Short,
            "byte" => ShapeKind::Byte,
            "float" => ShapeKind::Float,
            "double" | "bigDecimal" => ShapeKind::Double,
            "boolean" => ShapeKind::Boolean,
            "timestamp" => ShapeKind::Timestamp,
            "blob" => ShapeKind::Blob,
            "enum" | "intEnum" => ShapeKind::Enum,
            "document" => ShapeKind::Document,
            "service" => ShapeKind::Service,
            "operation" => ShapeKind::Operation,
            _ => ShapeKind::Unknown,
        }
    }

    /// Kind of a built-in prelude shape such as `smithy.api#String`.
    pub fn prelude(name: &str) -> Option<Self> {
        let kind = match name {
            "String" => ShapeKind::String,
            "Integer" | "PrimitiveInteger" | "BigInteger" => ShapeKind::Integer,
            "Long" | "PrimitiveLong" => ShapeKind::Long,
            "Short" | "PrimitiveShort" => ShapeKind::Short,
            "Byte" | "PrimitiveByte" => ShapeKind::Byte,
            "Float" | "PrimitiveFloat" => ShapeKind::Float,
            "Double" | "PrimitiveDouble" | "BigDecimal" => ShapeKind::Double,
            "Boolean" | "PrimitiveBoolean" => ShapeKind::Boolean,
            "Timestamp" => ShapeKind::Timestamp,
            "Blob" => ShapeKind::Blob,
            "Document" => ShapeKind::Document,
            "Unit" => ShapeKind::Unit,
            _ => return None,
        };
        Some(kind)
    }
}

/// Where a member is bound in an HTTP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpLocation {
    Path,
    Query,
    Header,
    Body,
}

/// A named member of a structure, union, list or map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Member {
    pub name: String,
    pub target: ShapeId,
    pub http_binding: Option<HttpLocation>,
    pub traits: Traits,
    pub documentation: Option<String>,
}

impl Member {
    pub fn is_required(&self) -> bool {
        self.traits.has(traits::REQUIRED)
    }
}

/// A named type declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shape {
    pub id: ShapeId,
    pub name: String,
    pub kind: ShapeKind,
    /// In declaration order.
    pub members: IndexMap<String, Member>,
    /// Element type of a list, value type of a map, or alias target.
    pub target: Option<ShapeId>,
    pub enum_values: Option<Vec<String>>,
    pub traits: Traits,
    pub documentation: Option<String>,
}

impl Shape {
    /// Best-effort stand-in for a shape that could not be resolved.
    pub fn placeholder(id: &ShapeId) -> Self {
        Self {
            id: id.clone(),
            name: id.name().to_string(),
            kind: ShapeKind::Unknown,
            members: IndexMap::new(),
            target: None,
            enum_values: None,
            traits: Traits::new(),
            documentation: None,
        }
    }

    pub fn is_structure(&self) -> bool {
        self.kind == ShapeKind::Structure
    }

    pub fn required_members(&self) -> impl Iterator<Item = &Member> {
        self.members.values().filter(|member| member.is_required())
    }
}

/// Wire protocol declared on the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Protocol {
    #[default]
    #[serde(rename = "restJson1")]
    RestJson1,
    #[serde(rename = "awsJson1_0")]
    AwsJson1_0,
    #[serde(rename = "awsJson1_1")]
    AwsJson1_1,
}

/// One endpoint of the service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    pub id: ShapeId,
    pub name: String,
    pub input: Option<Shape>,
    pub output: Option<Shape>,
    pub errors: Vec<Shape>,
    pub http: HttpBinding,
    pub traits: Traits,
    pub documentation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Service {
    pub id: ShapeId,
    pub name: String,
    pub version: String,
    pub namespace: String,
    /// In declaration order.
    pub operations: Vec<Operation>,
    pub protocol: Protocol,
    pub errors: Vec<ShapeId>,
    pub traits: Traits,
    pub documentation: Option<String>,
}

/// Outcome of looking up a member target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    /// A built-in `smithy.api#...` shape.
    Prelude(ShapeKind),
    Declared(&'a Shape),
    Missing,
}

/// The normalized model. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    pub namespace: String,
    pub shapes: BTreeMap<ShapeId, Shape>,
    pub service: Option<Service>,
    pub metadata: BTreeMap<String, Value>,
}

impl Model {
    pub fn shape(&self, id: &ShapeId) -> Option<&Shape> {
        self.shapes.get(id)
    }

    pub fn resolve(&self, id: &ShapeId) -> Resolved<'_> {
        if let Some(shape) = self.shapes.get(id) {
            return Resolved::Declared(shape);
        }
        if id.is_prelude()
            && let Some(kind) = ShapeKind::prelude(id.name())
        {
            return Resolved::Prelude(kind);
        }
        Resolved::Missing
    }

    /// Structure shapes in map order.
    pub fn structures(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.values().filter(|shape| shape.is_structure())
    }
}
