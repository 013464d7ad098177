//! End-to-end tests: IDL sources on disk through the builder and every emitter.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::fs;
use std::path::{Path, PathBuf};

use idlgen_core::codegen::validation::{Bounds, ValidationRule, rules_for};
use idlgen_core::model::Protocol;
use idlgen_core::{
    AppOptions, BuildConfig, ClientEmitter, EmitOptions, Emitter, EmitterSelection, Error, LoaderConfig, Model,
    ServiceEmitter, ShapeId, TypeEmitter, build, generate_all, import_file, load_directory,
};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

fn blog_model() -> Model {
    let ast = load_directory(&fixture("blog"), &LoaderConfig::default()).unwrap();
    build(&ast, &BuildConfig::default()).unwrap()
}

fn options() -> AppOptions {
    AppOptions::new(EmitOptions::new("blog_api", "generated"), "blog")
}

#[test]
fn test_blog_model_shape() {
    let model = blog_model();
    assert_eq!(model.namespace, "example.blog");
    assert_eq!(model.structures().count(), 7);
    assert!(model.shape(&ShapeId::new("example.blog#PostList")).is_some());

    let service = model.service.as_ref().unwrap();
    assert_eq!(service.name, "BlogService");
    assert_eq!(service.version, "2024-06-01");
    assert_eq!(service.protocol, Protocol::RestJson1);

    let names: Vec<_> = service.operations.iter().map(|op| op.name.as_str()).collect();
    assert_eq!(names, vec!["CreatePost", "GetPost", "ListPosts"]);

    let create = &service.operations[0];
    assert_eq!(create.http.method.as_str(), "POST");
    assert_eq!(create.http.code, 201);
    let get = &service.operations[1];
    assert_eq!(get.http.uri, "/posts/{id}");
    assert_eq!(get.http.path_params, vec!["id"]);
    assert_eq!(get.http.code, 200);
    let list = &service.operations[2];
    let query: Vec<_> = list.http.query_params.iter().map(|param| param.name.as_str()).collect();
    assert_eq!(query, vec!["cursor", "limit"]);
}

#[test]
fn test_end_to_end_artifact_counts() {
    let model = blog_model();
    let generated = generate_all(&model, &options(), EmitterSelection::all());
    assert_eq!(generated.types.len(), 7);
    assert_eq!(generated.service.len(), 3);
    assert_eq!(generated.client.len(), 1);
    assert_eq!(generated.len(), 11);

    let client = &generated.client[0];
    assert_eq!(client.path, PathBuf::from("generated/blog_api/client/blog_service_client.py"));

    let lifecycle = ["aclose", "__aenter__", "__aexit__"];
    let calls: Vec<&str> = client
        .content
        .lines()
        .filter_map(|line| line.strip_prefix("    async def "))
        .filter_map(|rest| rest.split('(').next())
        .filter(|name| !lifecycle.contains(name))
        .collect();
    assert_eq!(calls, vec!["create_post", "get_post", "list_posts"]);
}

#[test]
fn test_selection_limits_emitters() {
    let model = blog_model();
    let selection: EmitterSelection = [idlgen_core::EmitterKind::Types].into_iter().collect();
    let generated = generate_all(&model, &options(), selection);
    assert_eq!(generated.types.len(), 7);
    assert!(generated.service.is_empty());
    assert!(generated.client.is_empty());
}

#[test]
fn test_emitters_are_deterministic() {
    let model = blog_model();
    let options = options();
    assert_eq!(
        TypeEmitter.generate(&model, &options.emit),
        TypeEmitter.generate(&model, &options.emit)
    );
    assert_eq!(
        ServiceEmitter.generate(&model, &options),
        ServiceEmitter.generate(&model, &options)
    );
    assert_eq!(
        ClientEmitter.generate(&model, &options),
        ClientEmitter.generate(&model, &options)
    );

    // Parallel fan-out yields exactly what the emitters produce one by one.
    let generated = generate_all(&model, &options, EmitterSelection::all());
    assert_eq!(generated.types, TypeEmitter.generate(&model, &options.emit));
}

#[test]
fn test_generated_handlers_and_routes() {
    let model = blog_model();
    let artifacts = ServiceEmitter.generate(&model, &options());
    let handlers = &artifacts[1].content;
    assert!(handlers.contains("class BlogServiceHandlers:\n"));
    assert!(handlers.contains("data[\"id\"] = request.path_params[\"id\"]"));
    assert!(handlers.contains("data[\"requestId\"] = request.headers[\"X-Request-Id\"]"));
    assert!(handlers.contains("status_code=201"));

    let routes = &artifacts[2].content;
    assert!(routes.contains("from blog_api.api.blog_service_handlers import BlogServiceHandlers\n"));
    assert!(routes.contains("router.add_api_route(\"/posts/{id}\", handlers.get_post, methods=[\"GET\"]"));
}

#[test]
fn test_structured_document_required_and_range() {
    let ast = import_file(&fixture("blog.json")).unwrap();
    let model = build(&ast, &BuildConfig::default()).unwrap();
    let post = model.shape(&ShapeId::new("example.blog#Post")).unwrap();

    let rules = rules_for(post);
    assert_eq!(rules.len(), 2);
    assert!(matches!(&rules[0], ValidationRule::Required { fields } if fields.len() == 1));
    match &rules[1] {
        ValidationRule::Range {
            bounds: Bounds::Between(min, max),
            ..
        } => {
            assert_eq!(min.as_i64(), Some(0));
            assert_eq!(max.as_i64(), Some(100));
        }
        other => panic!("expected a range rule, got {other:?}"),
    }

    let artifacts = TypeEmitter.generate(&model, &EmitOptions::new("blog_api", "generated"));
    let content = &artifacts[0].content;
    assert!(content.contains("    id: str\n"));
    assert!(content.contains("    score: int | None = None\n"));
}

#[test]
fn test_later_file_wins_on_collision() {
    let ast = load_directory(&fixture("collision"), &LoaderConfig::default()).unwrap();
    let model = build(&ast, &BuildConfig::default()).unwrap();

    let item = model.shape(&ShapeId::new("example.collision#Item")).unwrap();
    assert_eq!(item.members.len(), 2);
    assert!(item.members["name"].is_required());
    assert!(model.shape(&ShapeId::new("example.collision#OnlyFirst")).is_some());
}

#[test]
fn test_parse_errors_name_file_and_line() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("good.smithy"), "namespace ns\nstructure A {}\n").unwrap();
    fs::write(dir.path().join("bad.smithy"), "namespace ns\n\nstructure {\n").unwrap();

    match load_directory(dir.path(), &LoaderConfig::default()) {
        Err(Error::Parse(errors)) => {
            assert_eq!(errors.len(), 1);
            let error = &errors.errors()[0];
            assert!(error.file.ends_with("bad.smithy"));
            assert_eq!(error.line, 3);
        }
        other => panic!("expected parse errors, got {other:?}"),
    }
}

#[test]
fn test_strict_mode_rejects_dangling_operation() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("svc.smithy"),
        "namespace ns\nservice Svc {\n    operations: [Missing]\n}\n",
    )
    .unwrap();
    let ast = load_directory(dir.path(), &LoaderConfig::default()).unwrap();

    let lenient = build(&ast, &BuildConfig::default()).unwrap();
    assert!(lenient.service.unwrap().operations.is_empty());

    let err = build(&ast, &BuildConfig::strict()).unwrap_err();
    assert!(matches!(err, Error::DanglingReference { .. }));
}
