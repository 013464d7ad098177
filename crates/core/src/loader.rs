//! Source discovery and batch parsing.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::ast::{self, RawAst};
use crate::config::LoaderConfig;
use crate::error::{Error, ParseError, ParseErrors, Result};
use crate::parser::parse_idl;

pub use crate::ast::merge;

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Every IDL source file under `directory`, sorted by path.
pub fn discover(directory: &Path, config: &LoaderConfig) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = WalkDir::new(directory)
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| config.matches(ext))
        })
        .map(|entry| entry.path().to_path_buf())
        .collect();

    if files.is_empty() {
        return Err(Error::SourceDiscovery {
            directory: directory.to_path_buf(),
        });
    }
    files.sort();
    debug!(directory = %directory.display(), count = files.len(), "Discovered IDL sources.");
    Ok(files)
}

/// Parse every source file under `directory` and merge them in path order.
///
/// All files are parsed even after a failure so that every parse error is
/// reported at once; any failure means no AST. A file that cannot be read
/// is reported alongside the parse errors, located at line 1.
pub fn load_directory(directory: &Path, config: &LoaderConfig) -> Result<RawAst> {
    let files = discover(directory, config)?;

    // `collect` on an indexed parallel iterator keeps input order.
    let results: Vec<Result<RawAst>> = files.par_iter().map(|path| load_file(path)).collect();

    let mut asts = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(ast) => asts.push(ast),
            Err(Error::Parse(errors)) => failures.extend(errors.0),
            Err(Error::Io { path, source }) => {
                failures.push(ParseError::new(path, 1, 1, format!("unreadable source: {source}")));
            }
            Err(other) => return Err(other),
        }
    }
    if !failures.is_empty() {
        return Err(Error::Parse(ParseErrors(failures)));
    }

    let merged = ast::merge(asts);
    info!(
        files = files.len(),
        shapes = merged.shapes.len(),
        "Loaded IDL sources."
    );
    Ok(merged)
}

/// Read and parse a single source file.
pub fn load_file(path: &Path) -> Result<RawAst> {
    let source = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(file = %path.display(), "Parsing IDL source.");
    parse_idl(&source, path).map_err(|err| Error::Parse(err.into()))
}
