//! # Code-spec queries
//!
//! The read-only surface the code-generation backend queries against a
//! frozen (fixpoint-reached) tree to pick a template family and its
//! specialization parameters for each node: a fixed-arity construction
//! instead of a generic variable-length one, a native numeric operation
//! instead of a generic dispatch, and so on.
//!
//! Queries never mutate the IR, and they are only reachable through
//! [`crate::driver::CompiledModule`], which is constructed after the driver
//! has proven fixpoint.

use crate::node::{BinaryOpIR, BoolOpIR, CompareOpIR, Node, NodeKind, RuntimeErrorKind, UnaryOpIR};
use crate::shape::{ConstValue, ValueType};

/// The closed set of template families the backend can emit, with their
/// specialization parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSpec {
    /// Materialize a shared immutable constant.
    LoadConstant,
    /// Load a name from the module namespace.
    LoadName,
    /// Bind a name in the module namespace.
    StoreName,
    /// Fixed-arity list construction (`MAKE_LIST<N>` family). Also selected
    /// for constant list values, which still build a fresh object per
    /// evaluation.
    BuildListFixed { arity: usize },
    /// Variable-length list construction (starred elements present).
    BuildListAny,
    BuildTupleFixed { arity: usize },
    BuildTupleAny,
    BuildSetFixed { arity: usize },
    BuildSetAny,
    BuildDictFixed { arity: usize },
    BuildDictAny,
    /// Native integer operation; both operands are known ints (or bools).
    BinaryIntOp { op: BinaryOpIR },
    /// Native float operation; operands are known numeric with a float.
    BinaryFloatOp { op: BinaryOpIR },
    /// String concatenation or repetition with known string operands.
    BinaryStrOp { op: BinaryOpIR },
    /// Generic dispatching binary operation.
    BinaryGenericOp { op: BinaryOpIR },
    UnaryNumericOp { op: UnaryOpIR },
    UnaryGenericOp { op: UnaryOpIR },
    CompareNumeric { op: CompareOpIR },
    CompareGeneric { op: CompareOpIR },
    ShortCircuit { op: BoolOpIR },
    ConditionalExpr,
    CallGeneric { arg_count: usize },
    AttributeGeneric,
    /// Index into a known sequence (list/tuple/str/bytes).
    SubscriptSequence,
    /// Lookup in a known mapping.
    SubscriptMapping,
    SubscriptGeneric,
    /// Unpack a starred element into an enclosing construction.
    UnpackIterable,
    /// Run child statements in order (module root, suite).
    Sequence,
    Branch,
    Loop,
    ReturnValue,
    ReturnNone,
    /// Evaluate and discard (expression statement).
    Discard,
    NoOp,
    /// Raise the recorded error unconditionally.
    RaiseAtRuntime { error: RuntimeErrorKind },
}

/// Selects the template family for one node of a frozen tree.
pub fn spec_for(node: &Node) -> CodeSpec {
    let child_type = |i: usize| node.children.get(i).and_then(|c| c.shape.exact_type());
    match &node.kind {
        NodeKind::Module { .. } | NodeKind::Block => CodeSpec::Sequence,
        NodeKind::Assign { .. } => CodeSpec::StoreName,
        NodeKind::ExprStmt => CodeSpec::Discard,
        NodeKind::If => CodeSpec::Branch,
        NodeKind::While => CodeSpec::Loop,
        NodeKind::Return => {
            if node.children.is_empty() {
                CodeSpec::ReturnNone
            } else {
                CodeSpec::ReturnValue
            }
        }
        NodeKind::Pass => CodeSpec::NoOp,

        NodeKind::Constant(value) => match value {
            // Mutable containers build a fresh object per evaluation; the
            // folder guarantees their elements are shareable immutables.
            ConstValue::List(elements) => CodeSpec::BuildListFixed {
                arity: elements.len(),
            },
            ConstValue::Set(elements) => CodeSpec::BuildSetFixed {
                arity: elements.len(),
            },
            ConstValue::Dict(entries) => CodeSpec::BuildDictFixed {
                arity: entries.len(),
            },
            _ => CodeSpec::LoadConstant,
        },
        NodeKind::Name { .. } => CodeSpec::LoadName,

        NodeKind::Unary(op) => match child_type(0) {
            Some(ty) if ty.is_numeric() && !matches!(op, UnaryOpIR::Not) => {
                CodeSpec::UnaryNumericOp { op: *op }
            }
            _ => CodeSpec::UnaryGenericOp { op: *op },
        },
        NodeKind::Binary(op) => binary_spec(*op, child_type(0), child_type(1)),
        NodeKind::Compare(op) => match (child_type(0), child_type(1)) {
            (Some(l), Some(r)) if l.is_numeric() && r.is_numeric() => {
                CodeSpec::CompareNumeric { op: *op }
            }
            _ => CodeSpec::CompareGeneric { op: *op },
        },
        NodeKind::BoolChain(op) => CodeSpec::ShortCircuit { op: *op },
        NodeKind::IfExpr => CodeSpec::ConditionalExpr,

        NodeKind::Call => CodeSpec::CallGeneric {
            arg_count: node.children.len().saturating_sub(1),
        },
        NodeKind::Attribute { .. } => CodeSpec::AttributeGeneric,
        NodeKind::Subscript => match child_type(0) {
            Some(ValueType::List | ValueType::Tuple | ValueType::Str | ValueType::Bytes) => {
                CodeSpec::SubscriptSequence
            }
            Some(ValueType::Dict) => CodeSpec::SubscriptMapping,
            _ => CodeSpec::SubscriptGeneric,
        },

        NodeKind::BuildList => match node.arity_hint {
            Some(arity) => CodeSpec::BuildListFixed {
                arity: arity as usize,
            },
            None => CodeSpec::BuildListAny,
        },
        NodeKind::BuildTuple => match node.arity_hint {
            Some(arity) => CodeSpec::BuildTupleFixed {
                arity: arity as usize,
            },
            None => CodeSpec::BuildTupleAny,
        },
        NodeKind::BuildSet => match node.arity_hint {
            Some(arity) => CodeSpec::BuildSetFixed {
                arity: arity as usize,
            },
            None => CodeSpec::BuildSetAny,
        },
        NodeKind::BuildDict => match node.arity_hint {
            Some(arity) => CodeSpec::BuildDictFixed {
                arity: arity as usize,
            },
            None => CodeSpec::BuildDictAny,
        },
        NodeKind::Starred => CodeSpec::UnpackIterable,

        NodeKind::RaiseError { error, .. } => CodeSpec::RaiseAtRuntime { error: *error },
    }
}

fn binary_spec(
    op: BinaryOpIR,
    left: Option<ValueType>,
    right: Option<ValueType>,
) -> CodeSpec {
    let (Some(l), Some(r)) = (left, right) else {
        return CodeSpec::BinaryGenericOp { op };
    };
    let int_like = |ty: ValueType| matches!(ty, ValueType::Int | ValueType::Bool);
    if int_like(l) && int_like(r) {
        return CodeSpec::BinaryIntOp { op };
    }
    if l.is_numeric() && r.is_numeric() {
        return CodeSpec::BinaryFloatOp { op };
    }
    let str_concat = op == BinaryOpIR::Add && l == ValueType::Str && r == ValueType::Str;
    let str_repeat = op == BinaryOpIR::Mul
        && ((l == ValueType::Str && int_like(r)) || (int_like(l) && r == ValueType::Str));
    if str_concat || str_repeat {
        return CodeSpec::BinaryStrOp { op };
    }
    CodeSpec::BinaryGenericOp { op }
}
