//! # Krait IR
//!
//! The optimizing intermediate representation of the Krait compiler: a
//! mutable node tree lowered from the frontend syntax tree, refined to a
//! fixpoint by shape inference, constant folding, and escape analysis,
//! then frozen and queried by the code-generation backend.

pub mod codespec;
pub mod driver;
pub mod errors;
pub mod escape;
pub mod fold;
pub mod infer;
pub mod lower;
pub mod node;
pub mod shape;
pub mod trace;

// Re-export commonly used types
pub use codespec::{spec_for, CodeSpec};
pub use driver::{compile_module, compile_program, CompileConfig, CompiledModule};
pub use errors::CompileError;
pub use escape::{classify, EscapeDescriptor, ExceptionExit};
pub use node::{
    Arity, BinaryOpIR, BoolOpIR, CompareOpIR, Node, NodeKind, RuntimeErrorKind, UnaryOpIR,
};
pub use shape::{ConstValue, Shape, TypeSet, ValueType};
pub use trace::{PassCounts, TraceCollector, TraceEvent, TraceVerdict};
