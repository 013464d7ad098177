//! Where the model comes from: a source directory or a structured document.

use std::path::PathBuf;

use idlgen_core::{BuildConfig, LoaderConfig, Model, RawAst, build, import_file, load_directory};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Directory of IDL text files.
    Directory(PathBuf),
    /// JSON document in raw AST form.
    Document(PathBuf),
}

impl Input {
    /// Pick the input from the two mutually exclusive options.
    pub fn select(source: Option<PathBuf>, document: Option<PathBuf>) -> Result<Self, String> {
        match (source, document) {
            (Some(_), Some(_)) => Err("--source and --document are mutually exclusive".to_string()),
            (Some(dir), None) => Ok(Input::Directory(dir)),
            (None, Some(file)) => Ok(Input::Document(file)),
            (None, None) => Err("No input given: pass --source DIR or --document FILE".to_string()),
        }
    }

    pub fn load(&self, loader: &LoaderConfig) -> Result<RawAst, String> {
        let ast = match self {
            Input::Directory(dir) => load_directory(dir, loader),
            Input::Document(file) => import_file(file),
        };
        ast.map_err(|err| err.to_string())
    }

    /// Load and build in one step.
    pub fn model(&self, loader: &LoaderConfig, config: &BuildConfig) -> Result<Model, String> {
        let ast = self.load(loader)?;
        build(&ast, config).map_err(|err| err.to_string())
    }
}
