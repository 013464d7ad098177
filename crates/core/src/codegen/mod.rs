//! Code generation from the [`Model`] to Python source artifacts.
//!
//! This module defines a three-layer architecture:
//! 1. Model-level helpers: field kinds and validation rules
//! 2. Python document IR: modules, classes, functions, statements
//! 3. Emission: IR to source strings via the `Emit` trait
//!
//! Each emitter is a pure function of the model and its options. Running an
//! emitter twice on the same input yields byte-identical artifacts, and
//! artifact order follows model order (shape map order, then operation
//! declaration order).
//!
//! ## Module Structure
//!
//! - `types`: data layer (pydantic models)
//! - `service`: server layer (FastAPI contract, handlers, routes)
//! - `client`: outbound client (httpx)
//! - `fields`: member target -> field kind mapping
//! - `validation`: trait -> validation rule derivation
//! - `ir`: Python document IR and its serializer

mod client;
mod common;
pub mod fields;
pub mod ir;
mod service;
mod types;
pub mod validation;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{AppOptions, EmitOptions};
use crate::model::Model;

pub use client::ClientEmitter;
pub use fields::FieldKind;
pub use service::ServiceEmitter;
pub use types::TypeEmitter;
pub use validation::{Bounds, ValidationRule};

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub content: String,
    /// Whether the writer should run the configured formatter on it.
    pub format: bool,
}

impl Artifact {
    pub fn new(path: PathBuf, content: String) -> Self {
        Self {
            path,
            content,
            format: true,
        }
    }
}

/// A pure transform from a model to an ordered list of artifacts.
pub trait Emitter {
    type Options;

    fn generate(&self, model: &Model, options: &Self::Options) -> Vec<Artifact>;
}

/// Names accepted on the command line and in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitterKind {
    Types,
    Service,
    Client,
}

/// Which emitters [`generate_all`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitterSelection {
    pub types: bool,
    pub service: bool,
    pub client: bool,
}

impl EmitterSelection {
    pub fn all() -> Self {
        Self {
            types: true,
            service: true,
            client: true,
        }
    }

    pub fn none() -> Self {
        Self {
            types: false,
            service: false,
            client: false,
        }
    }

    pub fn contains(&self, kind: EmitterKind) -> bool {
        match kind {
            EmitterKind::Types => self.types,
            EmitterKind::Service => self.service,
            EmitterKind::Client => self.client,
        }
    }
}

impl Default for EmitterSelection {
    fn default() -> Self {
        Self::all()
    }
}

/// An empty iterator selects nothing; callers decide whether that means "all".
impl FromIterator<EmitterKind> for EmitterSelection {
    fn from_iter<I: IntoIterator<Item = EmitterKind>>(iter: I) -> Self {
        let mut selection = Self::none();
        for kind in iter {
            match kind {
                EmitterKind::Types => selection.types = true,
                EmitterKind::Service => selection.service = true,
                EmitterKind::Client => selection.client = true,
            }
        }
        selection
    }
}

/// Output of [`generate_all`], one list per emitter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedArtifacts {
    pub types: Vec<Artifact>,
    pub service: Vec<Artifact>,
    pub client: Vec<Artifact>,
}

impl GeneratedArtifacts {
    pub fn len(&self) -> usize {
        self.types.len() + self.service.len() + self.client.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.types.iter().chain(&self.service).chain(&self.client)
    }

    pub fn into_vec(self) -> Vec<Artifact> {
        let mut all = self.types;
        all.extend(self.service);
        all.extend(self.client);
        all
    }
}

/// Run the selected emitters in parallel over one model.
pub fn generate_all(model: &Model, options: &AppOptions, selection: EmitterSelection) -> GeneratedArtifacts {
    let run_types = |emit: &EmitOptions| {
        if selection.types {
            TypeEmitter.generate(model, emit)
        } else {
            Vec::new()
        }
    };
    let run_service = || {
        if selection.service {
            ServiceEmitter.generate(model, options)
        } else {
            Vec::new()
        }
    };
    let run_client = || {
        if selection.client {
            ClientEmitter.generate(model, options)
        } else {
            Vec::new()
        }
    };

    let (types, (service, client)) = rayon::join(|| run_types(&options.emit), || rayon::join(run_service, run_client));
    let generated = GeneratedArtifacts { types, service, client };
    info!(
        types = generated.types.len(),
        service = generated.service.len(),
        client = generated.client.len(),
        "Generated artifacts."
    );
    generated
}
