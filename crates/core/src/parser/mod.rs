//! Text parser for the supported IDL subset.
//!
//! The parser reads top-level statements one at a time: control statements,
//! `namespace`, `metadata`, `use`, and shape declarations preceded by trait
//! applications and `///` documentation. Shape bodies are read one level deep
//! (members of a structure, keys of a service or operation body); nested
//! inline definitions are rejected rather than guessed at.
//!
//! Traits preceding a member attach to that member, so `@required` marks
//! exactly the member it annotates.

mod cursor;
mod node;

use std::collections::BTreeMap;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::ast::{RawAst, RawMember, RawShape, ShapeRef};
use crate::error::ParseError;
use crate::model::ShapeKind;
use crate::model::traits::{self, PRELUDE_NAMESPACE};
use cursor::Cursor;

const SIMPLE_SHAPES: [&str; 13] = [
    "string",
    "integer",
    "long",
    "short",
    "byte",
    "float",
    "double",
    "boolean",
    "timestamp",
    "blob",
    "bigInteger",
    "bigDecimal",
    "document",
];

/// Declarations outside the supported subset; their bodies are skipped.
const SKIPPED_SHAPES: [&str; 3] = ["resource", "enum", "intEnum"];

const PROTOCOL_TRAITS: [&str; 3] = ["restJson1", "awsJson1_0", "awsJson1_1"];

/// Parse one IDL source file into a raw AST.
///
/// `file` is only used to label errors.
pub fn parse_idl(source: &str, file: &Path) -> Result<RawAst, ParseError> {
    Parser::new(source, file).parse()
}

struct Parser {
    cursor: Cursor,
    namespace: Option<String>,
    ast: RawAst,
    service: Option<String>,
}

/// Traits and docs collected ahead of a declaration.
#[derive(Default)]
struct Pending {
    traits: BTreeMap<String, Value>,
    position: Option<(usize, usize)>,
}

impl Pending {
    fn into_traits(self) -> Option<BTreeMap<String, Value>> {
        (!self.traits.is_empty()).then_some(self.traits)
    }
}

impl Parser {
    fn new(source: &str, file: &Path) -> Self {
        Self {
            cursor: Cursor::new(source, file),
            namespace: None,
            ast: RawAst::default(),
            service: None,
        }
    }

    fn parse(mut self) -> Result<RawAst, ParseError> {
        loop {
            let pending = self.pending_traits()?;
            if self.cursor.at_end() {
                if let Some(position) = pending.position {
                    return Err(self.cursor.error_at(position, "trait applied to nothing"));
                }
                break;
            }
            if self.cursor.peek() == Some('$') {
                self.cursor.rest_of_line();
                continue;
            }
            let position = self.cursor.position();
            let Some(keyword) = self.cursor.ident() else {
                let found = self.cursor.peek().unwrap_or(' ');
                return Err(self.cursor.error(format!("expected a statement, found `{found}`")));
            };
            self.statement(&keyword, position, pending)?;
        }

        if self.namespace.is_none() {
            return Err(self.cursor.error_at((1, 1), "missing `namespace` declaration"));
        }
        debug!(shapes = self.ast.shapes.len(), "Parsed IDL source.");
        Ok(self.ast)
    }

    fn statement(&mut self, keyword: &str, position: (usize, usize), pending: Pending) -> Result<(), ParseError> {
        let is_shape = !matches!(keyword, "namespace" | "metadata" | "use" | "apply");
        if !is_shape && pending.position.is_some() {
            return Err(self.cursor.error_at(position, format!("traits cannot be applied to `{keyword}`")));
        }
        match keyword {
            "namespace" => self.namespace_statement(position),
            "metadata" => self.metadata_statement(),
            "use" => {
                self.cursor.skip_inline_space();
                self.cursor
                    .shape_id()
                    .ok_or_else(|| self.cursor.error("expected a shape id after `use`"))?;
                Ok(())
            }
            "apply" => {
                self.cursor.skip_inline_space();
                self.cursor
                    .shape_id()
                    .ok_or_else(|| self.cursor.error("expected a shape id after `apply`"))?;
                debug!("Skipping `apply` statement.");
                self.pending_traits().map(|_| ())
            }
            "service" => self.service_statement(position, pending),
            "operation" => self.operation_statement(pending),
            "structure" | "union" => self.aggregate_statement(keyword, pending),
            "list" | "set" => self.collection_statement("list", "member", pending),
            "map" => self.collection_statement("map", "value", pending),
            simple if SIMPLE_SHAPES.contains(&simple) => {
                let id = self.shape_header(position)?;
                let mut shape = RawShape::of_type(simple);
                shape.traits = pending.into_traits();
                self.insert_shape(id, shape, position)
            }
            skipped if SKIPPED_SHAPES.contains(&skipped) => {
                let id = self.shape_header(position)?;
                debug!(shape_id = %id, kind = skipped, "Skipping unsupported declaration.");
                self.cursor.skip_trivia();
                if self.cursor.peek() == Some('{') {
                    self.cursor.skip_block()?;
                }
                Ok(())
            }
            other => Err(self.cursor.error_at(position, format!("unexpected `{other}`"))),
        }
    }

    /// Collect trait applications and doc comments ahead of a declaration.
    fn pending_traits(&mut self) -> Result<Pending, ParseError> {
        let mut pending = Pending::default();
        let mut docs = Vec::new();
        loop {
            docs.extend(self.cursor.skip_trivia());
            if self.cursor.peek() != Some('@') {
                break;
            }
            pending.position.get_or_insert(self.cursor.position());
            let (id, value) = self.trait_application()?;
            pending.traits.insert(id, value);
        }
        if !docs.is_empty() && !pending.traits.contains_key(traits::DOCUMENTATION) {
            pending
                .traits
                .insert(traits::DOCUMENTATION.to_string(), Value::String(docs.join("\n")));
        }
        Ok(pending)
    }

    fn trait_application(&mut self) -> Result<(String, Value), ParseError> {
        self.cursor.expect('@')?;
        let name = self
            .cursor
            .shape_id()
            .ok_or_else(|| self.cursor.error("expected a trait name after `@`"))?;
        let value = if self.cursor.eat('(') {
            self.cursor.skip_trivia();
            if self.cursor.eat(')') {
                json!({})
            } else if node::at_key(&mut self.cursor) {
                Value::Object(node::object_until(&mut self.cursor, ')')?)
            } else {
                let value = node::value(&mut self.cursor)?;
                self.cursor.skip_trivia();
                self.cursor.expect(')')?;
                value
            }
        } else {
            json!({})
        };
        Ok((trait_id(&name), value))
    }

    fn namespace_statement(&mut self, position: (usize, usize)) -> Result<(), ParseError> {
        if self.namespace.is_some() {
            return Err(self.cursor.error_at(position, "duplicate `namespace` declaration"));
        }
        self.cursor.skip_inline_space();
        let namespace = self
            .cursor
            .shape_id()
            .filter(|ns| !ns.contains('#'))
            .ok_or_else(|| self.cursor.error("expected a namespace after `namespace`"))?;
        self.ast
            .metadata
            .insert("namespace".to_string(), Value::String(namespace.clone()));
        self.namespace = Some(namespace);
        Ok(())
    }

    fn metadata_statement(&mut self) -> Result<(), ParseError> {
        self.cursor.skip_inline_space();
        let key = match self.cursor.peek() {
            Some('"') => self.cursor.string()?,
            _ => self
                .cursor
                .ident()
                .ok_or_else(|| self.cursor.error("expected a metadata key"))?,
        };
        self.cursor.skip_trivia();
        self.cursor.expect('=')?;
        let value = node::value(&mut self.cursor)?;
        self.ast.metadata.insert(key, value);
        Ok(())
    }

    fn service_statement(&mut self, position: (usize, usize), pending: Pending) -> Result<(), ParseError> {
        let id = self.shape_header(position)?;
        if let Some(existing) = &self.service {
            return Err(self.cursor.error_at(
                position,
                format!("only one service per file is supported (already declared `{existing}`)"),
            ));
        }
        let body = self.node_body()?;
        let mut shape = RawShape::of_type("service");
        shape.version = body.get("version").and_then(Value::as_str).map(str::to_string);
        shape.operations = self.id_list(&body, "operations");
        shape.errors = self.id_list(&body, "errors");
        shape.traits = pending.into_traits();
        self.service = Some(id.clone());
        self.insert_shape(id, shape, position)
    }

    fn operation_statement(&mut self, pending: Pending) -> Result<(), ParseError> {
        let position = self.cursor.position();
        let id = self.shape_header(position)?;
        let body = self.node_body()?;
        let mut shape = RawShape::of_type("operation");
        shape.input = self.id_ref(&body, "input");
        shape.output = self.id_ref(&body, "output");
        shape.errors = self.id_list(&body, "errors");
        shape.traits = pending.into_traits();
        self.insert_shape(id, shape, position)
    }

    fn aggregate_statement(&mut self, kind: &str, pending: Pending) -> Result<(), ParseError> {
        let position = self.cursor.position();
        let id = self.shape_header(position)?;
        self.skip_mixins()?;
        let members = self.member_block()?;
        let mut shape = RawShape::of_type(kind);
        shape.members = Some(members);
        shape.traits = pending.into_traits();
        self.insert_shape(id, shape, position)
    }

    /// `list Name { member: T }` and `map Name { key: K, value: V }`.
    fn collection_statement(&mut self, kind: &str, element: &str, pending: Pending) -> Result<(), ParseError> {
        let position = self.cursor.position();
        let id = self.shape_header(position)?;
        self.skip_mixins()?;
        let block_position = self.cursor.position();
        let members = self.member_block()?;
        let element_member = members.get(element).ok_or_else(|| {
            self.cursor
                .error_at(block_position, format!("`{kind}` shape `{id}` is missing its `{element}` member"))
        })?;
        let mut shape = RawShape::of_type(kind);
        shape.target = Some(ShapeRef::Id(element_member.target.clone()));
        if kind == "map" {
            shape.key = members.get("key").map(|key| ShapeRef::Id(key.target.clone()));
        }
        shape.traits = pending.into_traits();
        self.insert_shape(id, shape, position)
    }

    /// Read the shape name after its keyword and make it absolute.
    fn shape_header(&mut self, position: (usize, usize)) -> Result<String, ParseError> {
        let Some(namespace) = self.namespace.clone() else {
            return Err(self
                .cursor
                .error_at(position, "shape declared before the `namespace` statement"));
        };
        self.cursor.skip_inline_space();
        let name = self
            .cursor
            .ident()
            .ok_or_else(|| self.cursor.error("expected a shape name"))?;
        Ok(format!("{namespace}#{name}"))
    }

    /// `with [MixinA, MixinB]` and `for Resource` are accepted and ignored.
    fn skip_mixins(&mut self) -> Result<(), ParseError> {
        loop {
            self.cursor.skip_trivia();
            let mark = self.cursor.mark();
            match self.cursor.ident().as_deref() {
                Some("for") => {
                    self.cursor.skip_trivia();
                    self.cursor
                        .shape_id()
                        .ok_or_else(|| self.cursor.error("expected a resource after `for`"))?;
                }
                Some("with") => {
                    node::value(&mut self.cursor)?;
                }
                _ => {
                    self.cursor.reset(mark);
                    return Ok(());
                }
            }
        }
    }

    fn node_body(&mut self) -> Result<Map<String, Value>, ParseError> {
        self.cursor.skip_trivia();
        self.cursor.expect('{')?;
        node::object_until(&mut self.cursor, '}')
    }

    fn member_block(&mut self) -> Result<IndexMap<String, RawMember>, ParseError> {
        self.cursor.skip_trivia();
        self.cursor.expect('{')?;
        let mut members = IndexMap::new();
        loop {
            let mut pending = self.pending_traits()?;
            if self.cursor.eat('}') {
                if let Some(position) = pending.position {
                    return Err(self.cursor.error_at(position, "trait applied to nothing"));
                }
                return Ok(members);
            }
            if self.cursor.at_end() {
                return Err(self.cursor.error("unexpected end of input, expected `}`"));
            }
            let position = self.cursor.position();
            if self.cursor.peek() == Some('$') {
                return Err(self.cursor.error("elided member targets (`$member`) are not supported"));
            }
            let name = self
                .cursor
                .ident()
                .ok_or_else(|| self.cursor.error("expected a member name"))?;
            self.cursor.skip_trivia();
            self.cursor.expect(':')?;
            self.cursor.skip_trivia();
            let target = self
                .cursor
                .shape_id()
                .ok_or_else(|| self.cursor.error(format!("expected a target for member `{name}`")))?;
            self.cursor.skip_inline_space();
            if self.cursor.eat('=') {
                let default = node::value(&mut self.cursor)?;
                pending.traits.insert(traits::DEFAULT.to_string(), default);
            }
            let member = RawMember {
                target: self.absolute_target(&target),
                traits: pending.into_traits(),
            };
            if members.insert(name.clone(), member).is_some() {
                return Err(self.cursor.error_at(position, format!("duplicate member `{name}`")));
            }
        }
    }

    fn insert_shape(&mut self, id: String, shape: RawShape, position: (usize, usize)) -> Result<(), ParseError> {
        if self.ast.shapes.contains_key(&id) {
            return Err(self.cursor.error_at(position, format!("duplicate shape `{id}`")));
        }
        self.ast.shapes.insert(id, shape);
        Ok(())
    }

    /// Classify a written target: prelude names go to the prelude, absolute ids
    /// stay as they are, everything else lands in the current namespace.
    fn absolute_target(&self, target: &str) -> String {
        if target.contains('#') {
            return target.to_string();
        }
        if ShapeKind::prelude(target).is_some() {
            return format!("{PRELUDE_NAMESPACE}#{target}");
        }
        match &self.namespace {
            Some(namespace) => format!("{namespace}#{target}"),
            None => target.to_string(),
        }
    }

    fn id_ref(&self, body: &Map<String, Value>, key: &str) -> Option<ShapeRef> {
        body.get(key)
            .and_then(Value::as_str)
            .map(|id| ShapeRef::Id(self.absolute_target(id)))
    }

    fn id_list(&self, body: &Map<String, Value>, key: &str) -> Option<Vec<ShapeRef>> {
        body.get(key).and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|id| ShapeRef::Id(self.absolute_target(id)))
                .collect()
        })
    }
}

fn trait_id(name: &str) -> String {
    if name.contains('#') {
        name.to_string()
    } else if PROTOCOL_TRAITS.contains(&name) {
        format!("aws.protocols#{name}")
    } else {
        format!("{PRELUDE_NAMESPACE}#{name}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn parse(source: &str) -> RawAst {
        parse_idl(source, Path::new("test.smithy")).unwrap()
    }

    fn parse_err(source: &str) -> ParseError {
        parse_idl(source, Path::new("broken.smithy")).unwrap_err()
    }

    const BLOG: &str = r#"
$version: "2"
namespace example.blog

/// Blog posting service.
@restJson1
service BlogService {
    version: "2024-01-01"
    operations: [CreatePost, GetPost]
}

@http(method: "POST", uri: "/posts", code: 201)
operation CreatePost {
    input: CreatePostInput
    output: CreatePostOutput
    errors: [ValidationFailed]
}

@readonly
@http(method: "GET", uri: "/posts/{id}")
operation GetPost {
    input: GetPostInput
}

structure CreatePostInput {
    /// Post title.
    @required
    @length(min: 1, max: 200)
    title: String

    body: String

    @range(min: 0, max: 100)
    priority: Integer = 0

    author: Author
}

structure GetPostInput {
    @required
    @httpLabel
    id: String
}

list TagList {
    member: String
}

map Attributes {
    key: String
    value: Timestamp
}

@pattern("^[a-z]+$")
string Slug
"#;

    #[test]
    fn test_namespace_is_recorded_in_metadata() {
        let ast = parse(BLOG);
        assert_eq!(ast.metadata["namespace"], json!("example.blog"));
    }

    #[test]
    fn test_service_block() {
        let ast = parse(BLOG);
        let service = &ast.shapes["example.blog#BlogService"];
        assert_eq!(service.type_name(), Some("service"));
        assert_eq!(service.version.as_deref(), Some("2024-01-01"));
        let operations: Vec<_> = service.operations.as_ref().unwrap().iter().map(ShapeRef::id).collect();
        assert_eq!(operations, vec!["example.blog#CreatePost", "example.blog#GetPost"]);
        let traits = service.traits.as_ref().unwrap();
        assert!(traits.contains_key("aws.protocols#restJson1"));
        assert_eq!(traits[traits::DOCUMENTATION], json!("Blog posting service."));
    }

    #[test]
    fn test_operation_block_with_http_trait() {
        let ast = parse(BLOG);
        let create = &ast.shapes["example.blog#CreatePost"];
        assert_eq!(create.input.as_ref().unwrap().id(), "example.blog#CreatePostInput");
        assert_eq!(create.output.as_ref().unwrap().id(), "example.blog#CreatePostOutput");
        assert_eq!(create.errors.as_ref().unwrap()[0].id(), "example.blog#ValidationFailed");
        let http = &create.traits.as_ref().unwrap()[traits::HTTP];
        assert_eq!(http, &json!({ "method": "POST", "uri": "/posts", "code": 201 }));

        let get = &ast.shapes["example.blog#GetPost"];
        assert!(get.output.is_none());
        assert!(get.traits.as_ref().unwrap().contains_key("smithy.api#readonly"));
    }

    #[test]
    fn test_member_typing_and_positional_traits() {
        let ast = parse(BLOG);
        let members = ast.shapes["example.blog#CreatePostInput"].members.as_ref().unwrap();

        assert_eq!(members["title"].target, "smithy.api#String");
        assert_eq!(members["priority"].target, "smithy.api#Integer");
        assert_eq!(members["author"].target, "example.blog#Author");

        let title = members["title"].traits.as_ref().unwrap();
        assert!(title.contains_key(traits::REQUIRED));
        assert_eq!(title[traits::LENGTH], json!({ "min": 1, "max": 200 }));
        assert_eq!(title[traits::DOCUMENTATION], json!("Post title."));

        // `body` follows a required member but is not itself required.
        assert!(members["body"].traits.is_none());

        let priority = members["priority"].traits.as_ref().unwrap();
        assert_eq!(priority[traits::DEFAULT], json!(0));
        assert!(!priority.contains_key(traits::REQUIRED));
    }

    #[test]
    fn test_collections_and_simple_shapes() {
        let ast = parse(BLOG);
        let tags = &ast.shapes["example.blog#TagList"];
        assert_eq!(tags.type_name(), Some("list"));
        assert_eq!(tags.target.as_ref().map(ShapeRef::id), Some("smithy.api#String"));

        let attributes = &ast.shapes["example.blog#Attributes"];
        assert_eq!(attributes.type_name(), Some("map"));
        assert_eq!(attributes.target.as_ref().map(ShapeRef::id), Some("smithy.api#Timestamp"));

        let slug = &ast.shapes["example.blog#Slug"];
        assert_eq!(slug.type_name(), Some("string"));
        assert_eq!(slug.traits.as_ref().unwrap()[traits::PATTERN], json!("^[a-z]+$"));
    }

    #[test]
    fn test_metadata_and_skipped_declarations() {
        let ast = parse(
            r#"
metadata owner = "blog-team"
namespace a.b
use smithy.api#String

enum Color { RED, GREEN }

resource Post { identifiers: { id: String } }

structure Plain {}
"#,
        );
        assert_eq!(ast.metadata["owner"], json!("blog-team"));
        assert_eq!(ast.shapes.len(), 1);
        assert!(ast.shapes.contains_key("a.b#Plain"));
    }

    #[test]
    fn test_missing_namespace_is_an_error() {
        let err = parse_err("structure Foo {}");
        assert_eq!(err.file, Path::new("broken.smithy"));
        assert!(err.message.contains("namespace"));
    }

    #[test]
    fn test_second_service_is_an_error() {
        let err = parse_err("namespace a\nservice A {}\nservice B {}\n");
        assert_eq!(err.line, 3);
        assert!(err.message.contains("only one service"));
    }

    #[test]
    fn test_inline_io_is_an_error() {
        let err = parse_err("namespace a\noperation Op {\n    input := {\n        name: String\n    }\n}\n");
        assert_eq!(err.line, 3);
        assert!(err.message.contains(":="));
    }

    #[test]
    fn test_unbalanced_block_is_an_error() {
        let err = parse_err("namespace a\nstructure Foo {\n    name: String\n");
        assert!(err.message.contains("expected `}`"));
    }

    #[test]
    fn test_dangling_trait_is_an_error() {
        let err = parse_err("namespace a\nstructure Foo {\n    @required\n}\n");
        assert_eq!((err.line, err.column), (3, 5));
        assert_eq!(err.message, "trait applied to nothing");
    }
}
