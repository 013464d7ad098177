//! Structured input: a JSON document already in raw AST form.
//!
//! Only the outer container is checked here. Shape semantics (types, traits,
//! references) are left to the builder, exactly as for parsed text.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::ast::RawAst;
use crate::error::{Error, Result};

/// Decode a `{"shapes": {...}, "metadata": {...}}` document.
pub fn import_document(document: &str) -> Result<RawAst> {
    let value: Value = serde_json::from_str(document).map_err(|err| Error::Decode {
        message: err.to_string(),
    })?;
    import_value(value)
}

/// Decode an already-parsed JSON value.
pub fn import_value(value: Value) -> Result<RawAst> {
    let Some(root) = value.as_object() else {
        return Err(decode_error("document root must be an object"));
    };
    match root.get("shapes") {
        Some(Value::Object(_)) => {}
        Some(_) => return Err(decode_error("`shapes` must be an object")),
        None => return Err(decode_error("missing `shapes`")),
    }
    if root.get("metadata").is_some_and(|metadata| !metadata.is_object()) {
        return Err(decode_error("`metadata` must be an object"));
    }

    let ast: RawAst = serde_json::from_value(value).map_err(|err| Error::Decode {
        message: err.to_string(),
    })?;
    debug!(shapes = ast.shapes.len(), "Imported structured model document.");
    Ok(ast)
}

pub fn import_file(path: &Path) -> Result<RawAst> {
    let contents = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    import_document(&contents)
}

fn decode_error(message: &str) -> Error {
    Error::Decode {
        message: message.to_string(),
    }
}
