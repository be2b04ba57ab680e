//! Error types for IR construction and optimization.

use krait_frontend::{FrontendError, SourceLocation};
use thiserror::Error;

/// Errors that abort compilation of a module.
///
/// Statically proven *runtime* failures are not errors at this level: they
/// are rewritten into explicit raise terminals and compilation proceeds.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CompileError {
    /// The syntax tree violated the parser contract.
    #[error(transparent)]
    Frontend(#[from] FrontendError),

    /// Malformed IR: wrong child arity, misplaced node kind, or a similar
    /// structural invariant violation. A defect in the lowering stage or in
    /// a rewrite, never a user error.
    #[error("internal structural error at {location}: {message}")]
    Structural {
        message: String,
        location: SourceLocation,
    },

    /// A pass tried to de-refine an established shape or escape fact.
    /// A defect in a pass implementation; fails loudly because monotonicity
    /// is what bounds fixpoint iteration.
    #[error("lattice violation at {location}: {message}")]
    LatticeViolation {
        message: String,
        location: SourceLocation,
    },

    /// The fixpoint driver hit its sweep bound without quiescing. The bound
    /// is a defense limit; hitting it means a pass is oscillating.
    #[error("optimizer did not reach fixpoint within {limit} sweeps")]
    SweepLimitExceeded { limit: usize },

    /// Rejected driver configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CompileError {
    pub fn structural(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::Structural {
            message: message.into(),
            location,
        }
    }

    pub fn lattice_violation(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::LatticeViolation {
            message: message.into(),
            location,
        }
    }
}
