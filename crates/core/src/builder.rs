//! Normalization from raw AST to the immutable [`Model`].
//!
//! This module handles all the shape-graph logic:
//! - Namespace resolution
//! - Shape and member construction, including member HTTP binding
//! - Service location, protocol detection and operation resolution
//! - Dangling-reference policy
//!
//! Relative ids (hand-written structured documents often use them) are
//! qualified against the resolved namespace before anything else happens.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::ast::{RawAst, RawMember, RawShape, ShapeRef};
use crate::config::{BuildConfig, ReferencePolicy};
use crate::error::{Error, Result};
use crate::model::http::{DEFAULT_CODE, DEFAULT_URI};
use crate::model::traits::{self, PRELUDE_NAMESPACE};
use crate::model::{
    HttpBinding, HttpLocation, HttpMethod, HttpParam, Member, Model, Operation, Protocol, Resolved, Service,
    Shape, ShapeId, ShapeKind, Traits, extract_path_params,
};

/// Build a model from a raw AST.
pub fn build(ast: &RawAst, config: &BuildConfig) -> Result<Model> {
    let namespace = resolve_namespace(ast)?;
    let builder = Builder {
        namespace: &namespace,
        config,
        raw: ast
            .shapes
            .iter()
            .map(|(id, shape)| (qualify_declared(&namespace, id), shape))
            .collect(),
    };

    let shapes = builder.build_shapes();
    let mut model = Model {
        namespace: namespace.clone(),
        shapes,
        service: None,
        metadata: ast.metadata.clone(),
    };
    builder.check_member_targets(&model)?;
    model.service = builder.build_service(&model)?;

    info!(
        namespace = %model.namespace,
        shapes = model.shapes.len(),
        operations = model.service.as_ref().map_or(0, |service| service.operations.len()),
        "Built model."
    );
    Ok(model)
}

/// Explicit `namespace` metadata, else the prefix of the first absolute id.
fn resolve_namespace(ast: &RawAst) -> Result<String> {
    if let Some(namespace) = ast.metadata.get("namespace").and_then(Value::as_str)
        && !namespace.is_empty()
    {
        return Ok(namespace.to_string());
    }
    ast.shapes
        .keys()
        .find_map(|id| id.split_once('#').map(|(namespace, _)| namespace))
        .filter(|namespace| !namespace.is_empty())
        .map(str::to_string)
        .ok_or(Error::NamespaceNotFound)
}

fn qualify_declared(namespace: &str, id: &str) -> ShapeId {
    if id.contains('#') {
        ShapeId::new(id)
    } else {
        ShapeId::from_parts(namespace, id)
    }
}

struct Builder<'a> {
    namespace: &'a str,
    config: &'a BuildConfig,
    raw: BTreeMap<ShapeId, &'a RawShape>,
}

impl Builder<'_> {
    /// Make a written reference absolute: declared shapes first, then the
    /// prelude, then the current namespace.
    fn qualify(&self, id: &str) -> ShapeId {
        if id.contains('#') {
            return ShapeId::new(id);
        }
        let local = ShapeId::from_parts(self.namespace, id);
        if !self.raw.contains_key(&local) && ShapeKind::prelude(id).is_some() {
            return ShapeId::from_parts(PRELUDE_NAMESPACE, id);
        }
        local
    }

    fn build_shapes(&self) -> BTreeMap<ShapeId, Shape> {
        self.raw
            .iter()
            .map(|(id, raw)| (id.clone(), self.build_shape(id, raw)))
            .collect()
    }

    fn build_shape(&self, id: &ShapeId, raw: &RawShape) -> Shape {
        let type_name = raw.type_name().unwrap_or("structure");
        let kind = ShapeKind::from_type_name(type_name);
        if kind == ShapeKind::Unknown {
            warn!(shape_id = %id, shape_type = type_name, "Unrecognised shape type.");
        }

        let members = raw
            .members
            .iter()
            .flatten()
            .map(|(name, member)| (name.clone(), self.build_member(name, member)))
            .collect();

        let target = raw
            .target
            .as_ref()
            .or(raw.member.as_ref())
            .or(raw.value.as_ref())
            .map(|target| self.qualify(target.id()));

        let traits = to_traits(raw.traits.as_ref());
        debug!(shape_id = %id, kind = ?kind, "Built shape.");
        Shape {
            id: id.clone(),
            name: id.name().to_string(),
            kind,
            members,
            target,
            enum_values: raw.enum_values.clone(),
            documentation: traits.documentation(),
            traits,
        }
    }

    fn build_member(&self, name: &str, raw: &RawMember) -> Member {
        let traits = to_traits(raw.traits.as_ref());
        Member {
            name: name.to_string(),
            target: self.qualify(&raw.target),
            http_binding: http_location(&traits),
            documentation: traits.documentation(),
            traits,
        }
    }

    /// Member, list and map targets must resolve to something.
    fn check_member_targets(&self, model: &Model) -> Result<()> {
        for shape in model.shapes.values() {
            let targets = shape
                .members
                .values()
                .map(|member| (format!("member `{}${}`", shape.id, member.name), &member.target))
                .chain(shape.target.iter().map(|target| (format!("shape `{}`", shape.id), target)));
            for (from, target) in targets {
                if model.resolve(target) == Resolved::Missing {
                    self.dangling(&from, target)?;
                }
            }
        }
        Ok(())
    }

    /// Apply the reference policy to one dangling reference.
    fn dangling(&self, from: &str, target: &ShapeId) -> Result<()> {
        match self.config.references {
            ReferencePolicy::Strict => Err(Error::DanglingReference {
                from: from.to_string(),
                target: target.to_string(),
            }),
            ReferencePolicy::Lenient => {
                warn!(from, target = %target, "Reference to an undefined shape.");
                Ok(())
            }
        }
    }

    fn build_service(&self, model: &Model) -> Result<Option<Service>> {
        let Some((id, raw)) = self
            .raw
            .iter()
            .find(|(_, raw)| raw.type_name() == Some("service"))
        else {
            debug!("No service declared; building a types-only model.");
            return Ok(None);
        };

        let traits = to_traits(raw.traits.as_ref());
        let mut operations = Vec::new();
        for reference in raw.operations.iter().flatten() {
            let op_id = self.qualify(reference.id());
            match self.raw.get(&op_id) {
                Some(op_raw) if op_raw.type_name() == Some("operation") => {
                    operations.push(self.build_operation(model, &op_id, op_raw)?);
                }
                _ => {
                    self.dangling(&format!("service `{id}`"), &op_id)?;
                    warn!(operation = %op_id, "Dropping unresolved operation.");
                }
            }
        }

        Ok(Some(Service {
            id: id.clone(),
            name: id.name().to_string(),
            version: raw.version.clone().unwrap_or_else(|| "1.0".to_string()),
            namespace: id.namespace().unwrap_or(self.namespace).to_string(),
            operations,
            protocol: protocol(&traits),
            errors: raw
                .errors
                .iter()
                .flatten()
                .map(|error| self.qualify(error.id()))
                .collect(),
            documentation: traits.documentation(),
            traits,
        }))
    }

    fn build_operation(&self, model: &Model, id: &ShapeId, raw: &RawShape) -> Result<Operation> {
        let from = format!("operation `{id}`");
        let input = match &raw.input {
            Some(reference) => self.operation_shape(model, &from, reference)?,
            None => None,
        };
        let output = match &raw.output {
            Some(reference) => self.operation_shape(model, &from, reference)?,
            None => None,
        };
        let errors = raw
            .errors
            .iter()
            .flatten()
            .filter_map(|reference| self.operation_shape(model, &from, reference).transpose())
            .collect::<Result<Vec<_>>>()?;

        let traits = to_traits(raw.traits.as_ref());
        let http = http_binding(id, &traits, input.as_ref());
        debug!(operation = %id, method = %http.method, uri = %http.uri, "Built operation.");
        Ok(Operation {
            id: id.clone(),
            name: id.name().to_string(),
            input,
            output,
            errors,
            http,
            documentation: traits.documentation(),
            traits,
        })
    }

    /// Copy a referenced shape, or a placeholder when it does not exist.
    /// `smithy.api#Unit` means no shape at all.
    fn operation_shape(&self, model: &Model, from: &str, reference: &ShapeRef) -> Result<Option<Shape>> {
        let id = self.qualify(reference.id());
        match model.resolve(&id) {
            Resolved::Declared(shape) => Ok(Some(shape.clone())),
            Resolved::Prelude(ShapeKind::Unit) => Ok(None),
            Resolved::Prelude(kind) => Ok(Some(Shape {
                kind,
                ..Shape::placeholder(&id)
            })),
            Resolved::Missing => {
                self.dangling(from, &id)?;
                Ok(Some(Shape::placeholder(&id)))
            }
        }
    }
}

fn to_traits(raw: Option<&BTreeMap<String, Value>>) -> Traits {
    raw.cloned().map(Traits::from).unwrap_or_default()
}

/// Binding precedence is path, query, header, body.
fn http_location(traits: &Traits) -> Option<HttpLocation> {
    [
        (traits::HTTP_LABEL, HttpLocation::Path),
        (traits::HTTP_QUERY, HttpLocation::Query),
        (traits::HTTP_HEADER, HttpLocation::Header),
        (traits::HTTP_PAYLOAD, HttpLocation::Body),
    ]
    .into_iter()
    .find(|(id, _)| traits.has(id))
    .map(|(_, location)| location)
}

fn protocol(traits: &Traits) -> Protocol {
    if traits.has(traits::REST_JSON_1) {
        Protocol::RestJson1
    } else if traits.has(traits::AWS_JSON_1_0) {
        Protocol::AwsJson1_0
    } else if traits.has(traits::AWS_JSON_1_1) {
        Protocol::AwsJson1_1
    } else {
        Protocol::default()
    }
}

fn http_binding(id: &ShapeId, traits: &Traits, input: Option<&Shape>) -> HttpBinding {
    let http = traits.get(traits::HTTP);
    let field = |key: &str| http.and_then(|value| value.get(key));

    let method = match field("method").and_then(Value::as_str) {
        Some(name) => HttpMethod::parse(name).unwrap_or_else(|| {
            warn!(operation = %id, method = name, "Unsupported HTTP method; using POST.");
            HttpMethod::Post
        }),
        None => HttpMethod::default(),
    };
    let uri = field("uri")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_URI)
        .to_string();
    let code = field("code")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok())
        .unwrap_or(DEFAULT_CODE);

    HttpBinding {
        method,
        path_params: extract_path_params(&uri),
        uri,
        code,
        query_params: bound_params(input, HttpLocation::Query, traits::HTTP_QUERY),
        header_params: bound_params(input, HttpLocation::Header, traits::HTTP_HEADER),
    }
}

/// Input members bound to `location`; the wire name is the trait value, or
/// the member name when the trait carries none.
fn bound_params(input: Option<&Shape>, location: HttpLocation, trait_id: &str) -> Vec<HttpParam> {
    input
        .into_iter()
        .flat_map(|shape| shape.members.values())
        .filter(|member| member.http_binding == Some(location))
        .map(|member| HttpParam {
            member: member.name.clone(),
            name: member
                .traits
                .string(trait_id)
                .filter(|name| !name.is_empty())
                .unwrap_or(member.name.as_str())
                .to_string(),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::importer::import_document;
    use crate::parser::parse_idl;
    use serde_json::json;
    use std::path::Path;

    fn build_json(document: Value) -> Result<Model> {
        let ast = import_document(&document.to_string()).unwrap();
        build(&ast, &BuildConfig::default())
    }

    fn build_idl(source: &str) -> Model {
        let ast = parse_idl(source, Path::new("test.smithy")).unwrap();
        build(&ast, &BuildConfig::default()).unwrap()
    }

    #[test]
    fn test_explicit_namespace_wins() {
        let model = build_json(json!({
            "metadata": { "namespace": "example.blog" },
            "shapes": { "other.ns#Post": { "type": "structure" } }
        }))
        .unwrap();
        assert_eq!(model.namespace, "example.blog");
    }

    #[test]
    fn test_namespace_from_first_shape_id() {
        let model = build_json(json!({
            "shapes": {
                "zeta#Later": { "type": "structure" },
                "ns#Name": { "type": "structure" }
            }
        }))
        .unwrap();
        assert_eq!(model.namespace, "ns");
    }

    #[test]
    fn test_empty_input_has_no_namespace() {
        let err = build(&RawAst::default(), &BuildConfig::default()).unwrap_err();
        assert!(matches!(err, Error::NamespaceNotFound));

        let err = build_json(json!({ "shapes": { "Bare": {} } })).unwrap_err();
        assert!(matches!(err, Error::NamespaceNotFound));
    }

    #[test]
    fn test_shape_defaults() {
        let model = build_json(json!({
            "metadata": { "namespace": "ns" },
            "shapes": {
                "ns#Implicit": {},
                "ns#Odd": { "type": "resource" },
                "Relative": { "members": { "tags": { "target": "TagList" } } },
                "ns#TagList": { "type": "list", "member": { "target": "String" } }
            }
        }))
        .unwrap();

        let implicit = model.shape(&"ns#Implicit".into()).unwrap();
        assert_eq!(implicit.kind, ShapeKind::Structure);
        assert!(implicit.members.is_empty());
        assert!(implicit.traits.is_empty());

        assert_eq!(model.shape(&"ns#Odd".into()).unwrap().kind, ShapeKind::Unknown);

        let relative = model.shape(&"ns#Relative".into()).unwrap();
        assert_eq!(relative.members["tags"].target, ShapeId::new("ns#TagList"));

        let list = model.shape(&"ns#TagList".into()).unwrap();
        assert_eq!(list.target, Some(ShapeId::new("smithy.api#String")));
    }

    #[test]
    fn test_member_binding_classification() {
        let model = build_json(json!({
            "shapes": {
                "ns#Input": {
                    "type": "structure",
                    "members": {
                        "id": { "target": "smithy.api#String", "traits": { "smithy.api#httpLabel": {} } },
                        "limit": { "target": "smithy.api#Integer", "traits": { "smithy.api#httpQuery": "max" } },
                        "token": { "target": "smithy.api#String", "traits": { "smithy.api#httpHeader": "X-Token" } },
                        "body": { "target": "smithy.api#Blob", "traits": { "smithy.api#httpPayload": {} } },
                        "plain": { "target": "smithy.api#String" },
                        "both": {
                            "target": "smithy.api#String",
                            "traits": { "smithy.api#httpHeader": "X-Both", "smithy.api#httpLabel": {} }
                        }
                    }
                }
            }
        }))
        .unwrap();

        let members = &model.shape(&"ns#Input".into()).unwrap().members;
        assert_eq!(members["id"].http_binding, Some(HttpLocation::Path));
        assert_eq!(members["limit"].http_binding, Some(HttpLocation::Query));
        assert_eq!(members["token"].http_binding, Some(HttpLocation::Header));
        assert_eq!(members["body"].http_binding, Some(HttpLocation::Body));
        assert_eq!(members["plain"].http_binding, None);
        assert_eq!(members["both"].http_binding, Some(HttpLocation::Path));
    }

    #[test]
    fn test_types_only_model_has_no_service() {
        let model = build_idl("namespace ns\nstructure A {}\n");
        assert!(model.service.is_none());
    }

    #[test]
    fn test_service_defaults() {
        let model = build_idl(
            "namespace ns\nservice Api {\n    operations: [Ping]\n}\noperation Ping {}\n",
        );
        let service = model.service.unwrap();
        assert_eq!(service.name, "Api");
        assert_eq!(service.namespace, "ns");
        assert_eq!(service.version, "1.0");
        assert_eq!(service.protocol, Protocol::RestJson1);

        let ping = &service.operations[0];
        assert_eq!(ping.http, HttpBinding::default());
        assert_eq!(ping.http.method, HttpMethod::Post);
        assert_eq!(ping.http.uri, "/");
        assert_eq!(ping.http.code, 200);
        assert!(ping.http.path_params.is_empty());
        assert!(ping.input.is_none());
    }

    #[test]
    fn test_protocol_detection() {
        let model = build_idl("namespace ns\n@awsJson1_1\nservice Api {}\n");
        assert_eq!(model.service.unwrap().protocol, Protocol::AwsJson1_1);
    }

    #[test]
    fn test_operations_keep_declaration_order_and_bindings() {
        let model = build_idl(
            r#"
namespace ns

service Store {
    version: "2"
    operations: [PutObject, GetObject]
}

@http(method: "PUT", uri: "/buckets/{bucket}/items/{key+}", code: 201)
operation PutObject {
    input: PutObjectInput
}

@http(method: "get", uri: "/items")
operation GetObject {
    output: Obj
}

structure PutObjectInput {
    @required
    @httpLabel
    bucket: String

    @required
    @httpLabel
    key: String

    @httpQuery("v")
    version: String

    @httpHeader("If-Match")
    etag: String

    @httpQuery
    dryRun: Boolean
}

structure Obj {}
"#,
        );
        let service = model.service.unwrap();
        let names: Vec<_> = service.operations.iter().map(|op| op.name.as_str()).collect();
        assert_eq!(names, vec!["PutObject", "GetObject"]);

        let put = &service.operations[0].http;
        assert_eq!(put.method, HttpMethod::Put);
        assert_eq!(put.code, 201);
        assert_eq!(put.path_params, vec!["bucket".to_string(), "key".to_string()]);
        let query: Vec<_> = put.query_params.iter().map(|p| (p.member.as_str(), p.name.as_str())).collect();
        assert_eq!(query, vec![("dryRun", "dryRun"), ("version", "v")]);
        assert_eq!(put.header_params[0].name, "If-Match");

        let get = &service.operations[1];
        assert_eq!(get.http.method, HttpMethod::Get);
        assert_eq!(get.output.as_ref().unwrap().name, "Obj");
    }

    #[test]
    fn test_dangling_references_are_lenient_by_default() {
        let model = build_idl(
            r#"
namespace ns
service Api { operations: [Missing, Present] }
operation Present { input: Ghost }
structure Holder { ref: Nowhere }
"#,
        );
        let service = model.service.as_ref().unwrap();
        assert_eq!(service.operations.len(), 1);
        let input = service.operations[0].input.as_ref().unwrap();
        assert_eq!(input.kind, ShapeKind::Unknown);
        assert_eq!(input.name, "Ghost");
        assert_eq!(
            model.resolve(&ShapeId::new("ns#Nowhere")),
            Resolved::Missing
        );
    }

    #[test]
    fn test_strict_mode_rejects_dangling_operation() {
        let ast = parse_idl(
            "namespace ns\nservice Api { operations: [Missing] }\n",
            Path::new("strict.smithy"),
        )
        .unwrap();
        let err = build(&ast, &BuildConfig::strict()).unwrap_err();
        match err {
            Error::DanglingReference { from, target } => {
                assert_eq!(from, "service `ns#Api`");
                assert_eq!(target, "ns#Missing");
            }
            other => unreachable!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_strict_mode_rejects_dangling_member_target() {
        let ast = parse_idl("namespace ns\nstructure A { b: B }\n", Path::new("strict.smithy")).unwrap();
        let err = build(&ast, &BuildConfig::strict()).unwrap_err();
        assert!(err.to_string().contains("ns#B"));
    }

    #[test]
    fn test_operation_shapes_are_materialized() {
        let model = build_idl(
            "namespace ns\nservice Api { operations: [Op] }\noperation Op { input: In, errors: [Oops] }\nstructure In { @required name: String }\nstructure Oops {}\n",
        );
        let op = &model.service.as_ref().unwrap().operations[0];
        let input = op.input.as_ref().unwrap();
        assert_eq!(input, model.shape(&"ns#In".into()).unwrap());
        assert!(input.members["name"].is_required());
        assert_eq!(op.errors[0].name, "Oops");
    }

    #[test]
    fn test_unit_and_document_prelude_shapes_are_accepted_in_strict_mode() {
        let ast = parse_idl(
            "namespace ns
service Api { operations: [Fire] }
operation Fire { input: Event, output: Unit }
structure Event { payload: Document }
",
            Path::new("prelude.smithy"),
        )
        .unwrap();
        let model = build(&ast, &BuildConfig::strict()).unwrap();
        let op = &model.service.as_ref().unwrap().operations[0];
        assert_eq!(op.input.as_ref().unwrap().name, "Event");
        assert!(op.output.is_none());
        let payload = &model.shape(&"ns#Event".into()).unwrap().members["payload"];
        assert_eq!(payload.target, ShapeId::new("smithy.api#Document"));
        assert_eq!(model.resolve(&payload.target), Resolved::Prelude(ShapeKind::Document));
    }
}
