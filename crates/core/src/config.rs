//! Configuration values threaded through loading, building and emission.
//!
//! Nothing here is global: every entry point takes the config it needs as an
//! argument.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_EXTENSION: &str = "smithy";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// File extensions (without the dot) treated as IDL sources.
    pub extensions: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extensions: vec![DEFAULT_EXTENSION.to_string()],
        }
    }
}

impl LoaderConfig {
    pub fn matches(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(extension))
    }
}

/// What to do with references that point at nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferencePolicy {
    /// Warn, then drop the operation or fall back to a placeholder shape.
    #[default]
    Lenient,
    /// Fail the build on the first dangling reference.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub references: ReferencePolicy,
}

impl BuildConfig {
    pub fn strict() -> Self {
        Self {
            references: ReferencePolicy::Strict,
        }
    }
}

/// Options shared by every emitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitOptions {
    /// Dotted Python package the generated code lives in, e.g. `blog.generated`.
    pub target_module: String,
    pub output_root: PathBuf,
}

impl EmitOptions {
    pub fn new(target_module: impl Into<String>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            target_module: target_module.into(),
            output_root: output_root.into(),
        }
    }

    /// `blog.generated` -> `<output_root>/blog/generated`.
    pub fn module_dir(&self) -> PathBuf {
        self.target_module
            .split('.')
            .filter(|part| !part.is_empty())
            .fold(self.output_root.clone(), |path, part| path.join(part))
    }

    /// Dotted import path of a sub-package, e.g. `blog.generated.models`.
    pub fn import_path(&self, package: &str) -> String {
        if self.target_module.is_empty() {
            package.to_string()
        } else {
            format!("{}.{package}", self.target_module)
        }
    }
}

/// Options for the service and client emitters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppOptions {
    pub emit: EmitOptions,
    /// Application identifier, used for router tags and the client user agent.
    pub application: String,
}

impl AppOptions {
    pub fn new(emit: EmitOptions, application: impl Into<String>) -> Self {
        Self {
            emit,
            application: application.into(),
        }
    }
}
