//! # Escape and control-flow descriptors
//!
//! A closed set of tags describing whether evaluating an operation can
//! raise, and whether evaluating it can alter values reachable from outer
//! scopes. Classification is a pure total function over the node kind and
//! its operands' shapes; combinations it does not recognize default to the
//! conservative [`EscapeDescriptor::FullEscape`].
//!
//! The rewrite engine consults these descriptors to decide whether an
//! optimization is legal: nothing may be elided or reordered across a
//! fully-escaping operation, because arbitrary code may have mutated any
//! outer-visible state.

use std::fmt;

use crate::errors::CompileError;
use crate::node::{BinaryOpIR, Node, NodeKind, UnaryOpIR};
use crate::shape::{ConstValue, Shape, ValueType};
use crate::trace::{TraceCollector, TraceVerdict};

/// Whether an operation can exit by raising. Deliberately coarse: the model
/// distinguishes "cannot raise" from "may raise anything", not exception
/// classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionExit {
    None,
    Any,
}

/// What evaluating an operation may do beyond producing its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeDescriptor {
    /// Cannot raise and has no outer-visible effects.
    NoEscape,
    /// May raise; operand values escape into the raised exception, but no
    /// outer-scope state is mutated.
    ValueEscape,
    /// Arbitrary code may run: may raise, and anything reachable from outer
    /// scopes may be mutated.
    FullEscape,
}

impl EscapeDescriptor {
    /// Whether this operation can exit by raising.
    pub fn exception_exit(self) -> ExceptionExit {
        match self {
            Self::NoEscape => ExceptionExit::None,
            Self::ValueEscape | Self::FullEscape => ExceptionExit::Any,
        }
    }

    /// Whether operand values can outlive the operation abnormally.
    pub fn is_value_escaping(self) -> bool {
        !matches!(self, Self::NoEscape)
    }

    pub fn can_raise(self) -> bool {
        self.exception_exit() == ExceptionExit::Any
    }

    /// True when no computation may be moved or elided across this
    /// operation.
    pub fn blocks_code_motion(self) -> bool {
        matches!(self, Self::FullEscape)
    }

    fn severity(self) -> u8 {
        match self {
            Self::NoEscape => 0,
            Self::ValueEscape => 1,
            Self::FullEscape => 2,
        }
    }

    /// Refine toward a less escaping descriptor. Returns whether anything
    /// changed; a proposal *more* escaping than the established fact is a
    /// defect, symmetric with shape lattice violations.
    pub fn refine(&mut self, proposed: EscapeDescriptor) -> Result<bool, EscapeConflict> {
        if proposed.severity() > self.severity() {
            return Err(EscapeConflict {
                current: *self,
                proposed,
            });
        }
        if proposed.severity() < self.severity() {
            *self = proposed;
            return Ok(true);
        }
        Ok(false)
    }
}

impl fmt::Display for EscapeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EscapeDescriptor::NoEscape => "no-escape",
            EscapeDescriptor::ValueEscape => "value-escape",
            EscapeDescriptor::FullEscape => "full-escape",
        };
        f.write_str(text)
    }
}

/// Attempted de-refinement of an escape fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscapeConflict {
    pub current: EscapeDescriptor,
    pub proposed: EscapeDescriptor,
}

impl fmt::Display for EscapeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "escape {} contradicts established {}",
            self.proposed, self.current
        )
    }
}

fn is_zero(value: &ConstValue) -> bool {
    match value {
        ConstValue::Int(v) => num_traits::Zero::is_zero(v),
        ConstValue::Float(v) => *v == 0.0,
        ConstValue::Bool(v) => !*v,
        _ => false,
    }
}

/// True when both operand types are known and arithmetic treats them as
/// numbers.
fn both_numeric(left: Option<ValueType>, right: Option<ValueType>) -> bool {
    matches!((left, right), (Some(l), Some(r)) if l.is_numeric() && r.is_numeric())
}

/// Classifies one node given its kind and its operands' current shapes.
///
/// Pure and total. `assume_no_external_mutation` degrades calls and
/// attribute access from `FullEscape` to `ValueEscape`: they may still
/// raise, but the configuration promises they rebind no outer names.
pub fn classify(node: &Node, assume_no_external_mutation: bool) -> EscapeDescriptor {
    let opaque = if assume_no_external_mutation {
        EscapeDescriptor::ValueEscape
    } else {
        EscapeDescriptor::FullEscape
    };
    let child_type = |i: usize| node.children.get(i).and_then(|c| c.shape.exact_type());
    match &node.kind {
        // Structural kinds evaluate nothing themselves; their children
        // carry their own descriptors.
        NodeKind::Module { .. }
        | NodeKind::Block
        | NodeKind::Assign { .. }
        | NodeKind::ExprStmt
        | NodeKind::If
        | NodeKind::While
        | NodeKind::Return
        | NodeKind::Pass
        | NodeKind::IfExpr
        | NodeKind::Constant(_) => EscapeDescriptor::NoEscape,

        // A name whose shape is pinned was provably bound on every path
        // that reaches it; an unconstrained name may raise NameError.
        NodeKind::Name { .. } => {
            if node.shape == Shape::Unknown {
                EscapeDescriptor::ValueEscape
            } else {
                EscapeDescriptor::NoEscape
            }
        }

        NodeKind::Unary(op) => classify_unary(*op, child_type(0), opaque),
        NodeKind::Binary(op) => classify_binary(node, *op, opaque),
        NodeKind::Compare(op) => {
            let (left, right) = (child_type(0), child_type(1));
            match (left, right) {
                (Some(l), Some(r)) => {
                    if op.is_equality() || comparable_types(l, r) {
                        EscapeDescriptor::NoEscape
                    } else {
                        // Guaranteed TypeError; the folder rewrites it.
                        EscapeDescriptor::ValueEscape
                    }
                }
                _ => opaque,
            }
        }
        NodeKind::BoolChain(_) => {
            // The chain itself only tests truthiness of its left operand.
            match child_type(0) {
                Some(_) => EscapeDescriptor::NoEscape,
                None => opaque,
            }
        }

        NodeKind::Call => opaque,
        NodeKind::Attribute { .. } => opaque,

        NodeKind::Subscript => {
            // In-range accesses of constant containers fold away entirely;
            // whatever remains may raise IndexError/KeyError/TypeError. An
            // unknown object type may run arbitrary __getitem__.
            match child_type(0) {
                Some(_) => EscapeDescriptor::ValueEscape,
                None => opaque,
            }
        }

        NodeKind::BuildList | NodeKind::BuildTuple | NodeKind::BuildSet | NodeKind::BuildDict => {
            classify_construction(node, opaque)
        }

        // Unpacking runs the operand's iteration protocol.
        NodeKind::Starred => match child_type(0) {
            Some(
                ValueType::List
                | ValueType::Tuple
                | ValueType::Set
                | ValueType::Dict
                | ValueType::Str
                | ValueType::Bytes,
            ) => EscapeDescriptor::NoEscape,
            // A known non-iterable certainly raises; the folder rewrites it.
            Some(_) => EscapeDescriptor::ValueEscape,
            None => opaque,
        },

        NodeKind::RaiseError { .. } => EscapeDescriptor::FullEscape,
    }
}

fn classify_unary(
    op: UnaryOpIR,
    operand: Option<ValueType>,
    opaque: EscapeDescriptor,
) -> EscapeDescriptor {
    match operand {
        Some(ty) => match op {
            // Truthiness of a builtin value never raises.
            UnaryOpIR::Not => EscapeDescriptor::NoEscape,
            UnaryOpIR::Neg | UnaryOpIR::Pos if ty.is_numeric() => EscapeDescriptor::NoEscape,
            UnaryOpIR::Invert if matches!(ty, ValueType::Int | ValueType::Bool) => {
                EscapeDescriptor::NoEscape
            }
            // Known-bad operand: a guaranteed TypeError the folder turns
            // into a raise terminal.
            _ => EscapeDescriptor::ValueEscape,
        },
        None => opaque,
    }
}

fn classify_binary(node: &Node, op: BinaryOpIR, opaque: EscapeDescriptor) -> EscapeDescriptor {
    let left = node.children.first().and_then(|c| c.shape.exact_type());
    let right = node.children.get(1).and_then(|c| c.shape.exact_type());
    let right_const = node.children.get(1).and_then(|c| c.shape.constant_value());
    let (Some(l), Some(r)) = (left, right) else {
        return opaque;
    };

    if both_numeric(Some(l), Some(r)) {
        if op.divides() {
            return match right_const {
                Some(v) if !is_zero(v) => EscapeDescriptor::NoEscape,
                _ => EscapeDescriptor::ValueEscape,
            };
        }
        return match op {
            BinaryOpIR::Pow => classify_pow(node, l, r),
            BinaryOpIR::Shl | BinaryOpIR::Shr => {
                if l == ValueType::Float || r == ValueType::Float {
                    // Guaranteed TypeError.
                    EscapeDescriptor::ValueEscape
                } else {
                    match right_const {
                        Some(ConstValue::Int(v)) if num_traits::Signed::is_negative(v) => {
                            EscapeDescriptor::ValueEscape
                        }
                        Some(_) => EscapeDescriptor::NoEscape,
                        None => EscapeDescriptor::ValueEscape,
                    }
                }
            }
            BinaryOpIR::BitAnd | BinaryOpIR::BitOr | BinaryOpIR::BitXor => {
                if l == ValueType::Float || r == ValueType::Float {
                    EscapeDescriptor::ValueEscape
                } else {
                    EscapeDescriptor::NoEscape
                }
            }
            _ => EscapeDescriptor::NoEscape,
        };
    }

    match (op, l, r) {
        (BinaryOpIR::Add, ValueType::Str, ValueType::Str)
        | (BinaryOpIR::Add, ValueType::Bytes, ValueType::Bytes)
        | (BinaryOpIR::Add, ValueType::List, ValueType::List)
        | (BinaryOpIR::Add, ValueType::Tuple, ValueType::Tuple) => EscapeDescriptor::NoEscape,
        (BinaryOpIR::Mul, seq, ValueType::Int | ValueType::Bool)
        | (BinaryOpIR::Mul, ValueType::Int | ValueType::Bool, seq)
            if matches!(
                seq,
                ValueType::Str | ValueType::Bytes | ValueType::List | ValueType::Tuple
            ) =>
        {
            EscapeDescriptor::NoEscape
        }
        // Known type combination the runtime rejects: certain TypeError.
        _ => EscapeDescriptor::ValueEscape,
    }
}

fn classify_pow(node: &Node, left: ValueType, right: ValueType) -> EscapeDescriptor {
    if left == ValueType::Float || right == ValueType::Float {
        // Float pow never raises for finite operands (negative base with a
        // fractional exponent produces a complex value, not an exception).
        return EscapeDescriptor::NoEscape;
    }
    // int ** negative-int raises ZeroDivisionError when the base is zero.
    let exponent = node.children.get(1).and_then(|c| c.shape.constant_value());
    let base = node.children.first().and_then(|c| c.shape.constant_value());
    match exponent {
        Some(ConstValue::Int(e)) if !num_traits::Signed::is_negative(e) => {
            EscapeDescriptor::NoEscape
        }
        Some(ConstValue::Bool(_)) => EscapeDescriptor::NoEscape,
        _ => match base {
            Some(v) if !is_zero(v) => EscapeDescriptor::NoEscape,
            _ => EscapeDescriptor::ValueEscape,
        },
    }
}

/// Construction-site classification. Element evaluation (including starred
/// unpacking) carries its own per-child descriptors; the construction node
/// itself only allocates and, for sets and dicts, hashes.
fn classify_construction(node: &Node, opaque: EscapeDescriptor) -> EscapeDescriptor {
    if matches!(node.kind, NodeKind::BuildSet | NodeKind::BuildDict) {
        // Hashing a value of unknown type may run arbitrary __hash__, and a
        // starred element contributes values of unknown type.
        let all_hash_known = node.children.iter().all(|child| {
            !matches!(child.kind, NodeKind::Starred) && child.shape.exact_type().is_some()
        });
        if !all_hash_known {
            return opaque;
        }
    }
    EscapeDescriptor::NoEscape
}

pub(crate) fn comparable_types(left: ValueType, right: ValueType) -> bool {
    if left.is_numeric() && right.is_numeric() {
        return true;
    }
    left == right
        && matches!(
            left,
            ValueType::Str | ValueType::Bytes | ValueType::List | ValueType::Tuple
        )
}

/// True when any node in the subtree is fully escaping, meaning arbitrary
/// outer-visible state may have been mutated by evaluating it.
pub fn subtree_contains_full_escape(node: &Node) -> bool {
    let mut found = false;
    node.visit(&mut |n| {
        if n.escape == EscapeDescriptor::FullEscape {
            found = true;
        }
    });
    found
}

/// Escape classification pass: re-derives each node's descriptor from the
/// current shapes and refines it in place. Returns the number of nodes
/// whose descriptor improved.
pub fn run(
    root: &mut Node,
    assume_no_external_mutation: bool,
    trace: &mut TraceCollector,
) -> Result<usize, CompileError> {
    run_node(root, assume_no_external_mutation, trace)
}

fn run_node(
    node: &mut Node,
    assume_no_external_mutation: bool,
    trace: &mut TraceCollector,
) -> Result<usize, CompileError> {
    let mut changes = 0;
    for child in &mut node.children {
        changes += run_node(child, assume_no_external_mutation, trace)?;
    }
    let derived = classify(node, assume_no_external_mutation);
    match node.escape.refine(derived) {
        Ok(true) => {
            trace.record("escape", node.location, TraceVerdict::Applied);
            changes += 1;
        }
        Ok(false) => {}
        Err(conflict) => {
            debug_assert!(false, "escape de-refinement: {}", conflict);
            return Err(CompileError::lattice_violation(
                conflict.to_string(),
                node.location,
            ));
        }
    }
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use krait_frontend::SourceLocation;

    fn loc() -> SourceLocation {
        SourceLocation::new(1, 1)
    }

    fn int(v: i64) -> Node {
        Node::constant(ConstValue::int(v), loc())
    }

    fn binary(op: BinaryOpIR, left: Node, right: Node) -> Node {
        Node::new(NodeKind::Binary(op), vec![left, right], loc())
    }

    #[test]
    fn descriptor_invariants_hold() {
        assert_eq!(
            EscapeDescriptor::NoEscape.exception_exit(),
            ExceptionExit::None
        );
        assert_eq!(
            EscapeDescriptor::ValueEscape.exception_exit(),
            ExceptionExit::Any
        );
        assert!(EscapeDescriptor::ValueEscape.is_value_escaping());
        assert!(EscapeDescriptor::FullEscape.is_value_escaping());
        assert!(!EscapeDescriptor::NoEscape.is_value_escaping());
        assert!(EscapeDescriptor::FullEscape.blocks_code_motion());
    }

    #[test]
    fn refine_only_moves_toward_less_escaping() {
        let mut escape = EscapeDescriptor::FullEscape;
        assert!(escape.refine(EscapeDescriptor::NoEscape).unwrap());
        assert!(escape.refine(EscapeDescriptor::FullEscape).is_err());
    }

    #[test]
    fn integer_addition_cannot_escape() {
        let node = binary(BinaryOpIR::Add, int(1), int(2));
        assert_eq!(classify(&node, false), EscapeDescriptor::NoEscape);
    }

    #[test]
    fn division_by_known_nonzero_cannot_escape() {
        let node = binary(BinaryOpIR::TrueDiv, int(1), int(2));
        assert_eq!(classify(&node, false), EscapeDescriptor::NoEscape);
    }

    #[test]
    fn division_by_possible_zero_may_raise() {
        let mut unknown = Node::leaf(NodeKind::Name { id: "d".into() }, loc());
        unknown.shape = Shape::Exact(ValueType::Int);
        let node = binary(BinaryOpIR::TrueDiv, int(1), unknown);
        assert_eq!(classify(&node, false), EscapeDescriptor::ValueEscape);
    }

    #[test]
    fn calls_are_fully_escaping_by_default() {
        let callee = Node::leaf(NodeKind::Name { id: "f".into() }, loc());
        let node = Node::new(NodeKind::Call, vec![callee], loc());
        assert_eq!(classify(&node, false), EscapeDescriptor::FullEscape);
        assert_eq!(classify(&node, true), EscapeDescriptor::ValueEscape);
    }

    #[test]
    fn unknown_operands_are_conservatively_full_escape() {
        let left = Node::leaf(NodeKind::Name { id: "a".into() }, loc());
        let right = Node::leaf(NodeKind::Name { id: "b".into() }, loc());
        let node = binary(BinaryOpIR::Add, left, right);
        assert_eq!(classify(&node, false), EscapeDescriptor::FullEscape);
    }

    #[test]
    fn raise_terminal_is_always_full_escape() {
        let node = Node::raise_error(crate::node::RuntimeErrorKind::ZeroDivision, "x", loc());
        assert_eq!(classify(&node, false), EscapeDescriptor::FullEscape);
    }

    #[test]
    fn construction_of_plain_elements_cannot_escape() {
        let node = Node::new(NodeKind::BuildList, vec![int(1), int(2)], loc());
        assert_eq!(classify(&node, false), EscapeDescriptor::NoEscape);
    }

    #[test]
    fn unpacking_unknown_iterable_is_opaque() {
        let iterable = Node::leaf(NodeKind::Name { id: "xs".into() }, loc());
        let starred = Node::new(NodeKind::Starred, vec![iterable], loc());
        assert_eq!(classify(&starred, false), EscapeDescriptor::FullEscape);

        // The construction node itself only allocates.
        let node = Node::new(NodeKind::BuildList, vec![starred], loc());
        assert_eq!(classify(&node, false), EscapeDescriptor::NoEscape);
    }

    #[test]
    fn set_construction_with_unknown_elements_hashes_opaquely() {
        let unknown = Node::leaf(NodeKind::Name { id: "x".into() }, loc());
        let node = Node::new(NodeKind::BuildSet, vec![unknown], loc());
        assert_eq!(classify(&node, false), EscapeDescriptor::FullEscape);

        let known = Node::new(NodeKind::BuildSet, vec![int(1)], loc());
        assert_eq!(classify(&known, false), EscapeDescriptor::NoEscape);
    }

    #[test]
    fn pass_refines_descriptors_bottom_up() {
        let mut tree = Node::new(
            NodeKind::Module { name: "m".into() },
            vec![Node::new(
                NodeKind::ExprStmt,
                vec![binary(BinaryOpIR::Add, int(1), int(2))],
                loc(),
            )],
            loc(),
        );
        let mut trace = TraceCollector::new();
        let changes = run(&mut tree, false, &mut trace).unwrap();
        assert!(changes > 0);
        let add = &tree.children[0].children[0];
        assert_eq!(add.escape, EscapeDescriptor::NoEscape);
    }
}
