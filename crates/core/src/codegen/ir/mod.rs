//! Structural document IR for generated Python modules.
//!
//! Emitters never concatenate source text directly. They build a tree
//! (`PyModule` -> imports, classes with attribute/field/validator/method
//! sections, functions, statements) and hand it to the `Emit` serializer.
//!
//! ## Module Structure
//!
//! - `types`: Python AST IR (PyType, PyExpr, PyStmt, PyFunction, PyClass, PyModule)
//! - `emit`: Python AST -> code strings (via Emit trait)
//! - `utils`: identifier conversion and literal escaping

pub mod emit;
pub mod types;
pub mod utils;

pub use emit::Emit;
pub use types::{
    ImportGroup, PyArg, PyClass, PyExcept, PyExpr, PyField, PyFunction, PyImports, PyItem, PyLiteral, PyModule,
    PyParam, PyStmt, PyType,
};
