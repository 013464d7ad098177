//! Error types for loading, parsing and building IDL models.

use std::fmt;
use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the loading and build pipeline.
///
/// Emitters never fail; everything that can go wrong happens before a
/// [`Model`](crate::model::Model) exists.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No IDL source files were found under the directory.
    #[error("no IDL source files found in {}", directory.display())]
    SourceDiscovery { directory: PathBuf },

    /// One or more source files failed to parse.
    #[error(transparent)]
    Parse(#[from] ParseErrors),

    /// Neither metadata nor any shape id yields a namespace.
    #[error("unable to determine a namespace: no `namespace` metadata and no shape id of the form `namespace#Name`")]
    NamespaceNotFound,

    /// A shape or operation id points at nothing (strict mode only).
    #[error("{from} references undefined shape `{target}`")]
    DanglingReference { from: String, target: String },

    /// A structured input document could not be decoded.
    #[error("failed to decode structured model document: {message}")]
    Decode { message: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A single parse failure, located in its source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub file: PathBuf,
    /// 1-based line of the failure.
    pub line: usize,
    /// 1-based column of the failure.
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(file: impl Into<PathBuf>, line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.file.display(),
            self.line,
            self.column,
            self.message
        )
    }
}

impl std::error::Error for ParseError {}

/// Every parse failure of a batch. A batch with any failure yields no AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseErrors(pub Vec<ParseError>);

impl ParseErrors {
    pub fn errors(&self) -> &[ParseError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.0.len() == 1 { "file" } else { "files" };
        write!(f, "failed to parse {} {noun}:", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrors {}

impl From<ParseError> for ParseErrors {
    fn from(error: ParseError) -> Self {
        Self(vec![error])
    }
}
