//! # Krait Frontend
//!
//! Syntax-tree contract for the Krait Python compiler: the AST data model
//! the external parser targets, source locations, and frontend
//! diagnostics.

pub mod ast;
pub mod errors;
pub mod validate;

// Re-export commonly used types
pub use ast::*;
pub use errors::{FrontendError, SourceLocation};
pub use validate::validate_module;
