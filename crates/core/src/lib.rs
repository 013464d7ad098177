//! idlgen core: Smithy IDL to a normalized [`Model`], and the model to Python
//! sources.
//!
//! The pipeline is a straight line of pure stages:
//!
//! ```text
//! directory ── loader ──┐
//!                       ├─ RawAst ── builder ── Model ── codegen ── Vec<Artifact>
//! JSON doc ── importer ─┘
//! ```
//!
//! Nothing here writes files; the CLI owns the filesystem side.

pub mod ast;
pub mod builder;
pub mod codegen;
pub mod config;
pub mod error;
pub mod importer;
pub mod loader;
pub mod model;
pub mod parser;

pub use ast::RawAst;
pub use builder::build;
pub use codegen::{
    Artifact, ClientEmitter, Emitter, EmitterKind, EmitterSelection, GeneratedArtifacts, ServiceEmitter, TypeEmitter,
    generate_all,
};
pub use config::{AppOptions, BuildConfig, EmitOptions, LoaderConfig, ReferencePolicy};
pub use error::{Error, ParseError, ParseErrors, Result};
pub use importer::{import_document, import_file};
pub use loader::load_directory;
pub use model::{Model, Shape, ShapeId, ShapeKind};
