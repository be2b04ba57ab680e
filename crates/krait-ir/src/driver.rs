//! # Fixpoint driver
//!
//! Owns the compilation of one module: lowering, iterative optimization to
//! a fixpoint, and the frozen result handed to code generation.
//!
//! Nodes are owned in place, so the dirty-set worklist is realized as
//! whole-tree sweeps: each sweep runs shape inference, folding, and escape
//! classification over every node and reports how many facts or subtrees
//! changed; the driver repeats until a sweep reports zero. Re-visiting a
//! rewritten node's ancestors and descendants is subsumed by the next
//! sweep. Termination is guaranteed because shape and escape facts move
//! monotonically over finite-height lattices and every structural rewrite
//! strictly shrinks the tree; `max_sweeps` is a defense bound, and hitting
//! it is reported as an internal error rather than looping.

use krait_frontend::ast::ModuleAst;

use crate::codespec::{spec_for, CodeSpec};
use crate::errors::CompileError;
use crate::node::{validate_tree, Node};
use crate::trace::TraceCollector;
use crate::{escape, fold, infer, lower};

/// Immutable per-compilation configuration, fixed at driver construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileConfig {
    /// `0` disables folding and shape inference entirely; any higher level
    /// runs the full pass set.
    pub optimization_level: u8,
    /// Promise that no call or attribute access rebinds module names
    /// behind the compiler's back. Degrades those operations from full to
    /// value escape and keeps name facts alive across them.
    pub assume_no_external_mutation: bool,
    /// Defense bound on optimization sweeps per module.
    pub max_sweeps: usize,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            optimization_level: 1,
            assume_no_external_mutation: false,
            max_sweeps: 64,
        }
    }
}

impl CompileConfig {
    fn validate(self) -> Result<Self, CompileError> {
        if self.max_sweeps == 0 {
            return Err(CompileError::Config(
                "max_sweeps must be greater than zero".into(),
            ));
        }
        Ok(self)
    }
}

/// What the fixpoint iteration actually did, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixpointDiagnostics {
    /// Sweeps executed, including the final quiescent one.
    pub sweeps_run: usize,
    /// Total fact refinements and rewrites across all sweeps.
    pub mutations: usize,
    /// Always true for a constructed [`CompiledModule`]; recorded for
    /// external logging symmetry.
    pub fixpoint_reached: bool,
    /// Node count of the frozen tree.
    pub node_count: usize,
}

/// A frozen, fixpoint-reached module: the optimized tree, the pass trace,
/// and the code-spec query surface. Constructing one is the proof that
/// optimization finished; queries before fixpoint are unrepresentable.
#[derive(Debug)]
pub struct CompiledModule {
    root: Node,
    trace: TraceCollector,
    diagnostics: FixpointDiagnostics,
}

impl CompiledModule {
    /// The frozen tree.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Selects the code-generation template for a node of this tree.
    pub fn spec_for(&self, node: &Node) -> CodeSpec {
        spec_for(node)
    }

    /// The pass trace accumulated across all sweeps.
    pub fn trace(&self) -> &TraceCollector {
        &self.trace
    }

    pub fn diagnostics(&self) -> FixpointDiagnostics {
        self.diagnostics
    }
}

/// Compiles one module: validates the syntax tree, lowers it, and drives
/// the pass set to fixpoint.
pub fn compile_module(
    ast: &ModuleAst,
    config: &CompileConfig,
) -> Result<CompiledModule, CompileError> {
    let config = config.validate()?;
    krait_frontend::validate_module(ast)?;

    let mut root = lower::lower_module(ast);
    validate_tree(&root)?;

    let mut trace = TraceCollector::new();
    let mut diagnostics = FixpointDiagnostics {
        sweeps_run: 0,
        mutations: 0,
        fixpoint_reached: false,
        node_count: 0,
    };

    if config.optimization_level == 0 {
        // No folding or inference; a single classification sweep still
        // records conservative escape facts for the backend.
        escape::run(&mut root, config.assume_no_external_mutation, &mut trace)?;
        diagnostics.sweeps_run = 1;
        diagnostics.fixpoint_reached = true;
        diagnostics.node_count = root.size();
        return Ok(CompiledModule {
            root,
            trace,
            diagnostics,
        });
    }

    loop {
        let mut changed = 0;
        changed += infer::run(&mut root, config.assume_no_external_mutation, &mut trace)?;
        changed += fold::run(&mut root, &mut trace);
        changed += escape::run(&mut root, config.assume_no_external_mutation, &mut trace)?;
        diagnostics.sweeps_run += 1;
        diagnostics.mutations += changed;

        #[cfg(debug_assertions)]
        validate_tree(&root)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            sweep = diagnostics.sweeps_run,
            changed,
            "optimization sweep finished"
        );

        if changed == 0 {
            break;
        }
        if diagnostics.sweeps_run >= config.max_sweeps {
            return Err(CompileError::SweepLimitExceeded {
                limit: config.max_sweeps,
            });
        }
    }

    diagnostics.fixpoint_reached = true;
    diagnostics.node_count = root.size();

    #[cfg(feature = "tracing")]
    tracing::debug!(
        sweeps = diagnostics.sweeps_run,
        nodes = diagnostics.node_count,
        "module reached fixpoint"
    );

    Ok(CompiledModule {
        root,
        trace,
        diagnostics,
    })
}

/// Compiles independent modules of one program in parallel. Each module's
/// tree is exclusively owned, so no synchronization is needed beyond the
/// join; errors are reported deterministically in module order.
pub fn compile_program(
    modules: &[ModuleAst],
    config: &CompileConfig,
) -> Result<Vec<CompiledModule>, CompileError> {
    use rayon::prelude::*;

    let results: Vec<Result<CompiledModule, CompileError>> = modules
        .par_iter()
        .map(|module| compile_module(module, config))
        .collect();

    let mut compiled = Vec::with_capacity(results.len());
    for result in results {
        compiled.push(result?);
    }
    Ok(compiled)
}
