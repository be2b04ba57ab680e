//! # Constant and container-construction folder
//!
//! Rewrites operations whose operands are compile-time known into constant
//! leaves, reproducing exact runtime semantics: arbitrary-precision integer
//! arithmetic, numeric promotion, string/sequence concatenation and
//! repetition, truthiness, and short-circuit selection. Statically certain
//! runtime failures (division by a known zero, provable type errors) are
//! not compile errors: the offending subtree becomes an explicit raise
//! terminal and compilation proceeds.
//!
//! Folding drops the evaluation of the folded operands, so every fold is
//! gated on the operands being non-escaping; a skipped fold is recorded in
//! the trace only when the decline is permanent (a materialization cap or
//! semantics outside the folder's model, such as complex results of `**`).
//!
//! Container constructions with a statically known element count are
//! stamped with that count as a specialization index, which the code-spec
//! interface later uses to select a fixed-arity construction template.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Pow, Signed, ToPrimitive, Zero};
use smallvec::SmallVec;

use crate::escape::EscapeDescriptor;
use crate::node::{
    BinaryOpIR, BoolOpIR, CompareOpIR, Node, NodeKind, RuntimeErrorKind, UnaryOpIR,
};
use crate::shape::{cmp_int_float, ConstValue, ValueType};
use crate::trace::{TraceCollector, TraceVerdict};

const PASS: &str = "fold";

/// Upper bound on folded sequence lengths and big-integer result bits.
/// Larger results are left to the runtime rather than materialized into
/// the IR.
const MATERIALIZE_CAP: usize = 64 * 1024;

/// Cap in bits on folded integer `**` and `<<` results.
const INT_BITS_CAP: u64 = 1 << 20;

/// What examining a candidate produced.
enum FoldOutcome {
    /// Fold to this constant value.
    Value(ConstValue),
    /// The operation certainly raises at runtime.
    Raise(RuntimeErrorKind, String),
    /// Permanently declined (cap or model limit); recorded as skipped.
    Declined,
    /// Not a candidate after all; nothing recorded.
    NotApplicable,
}

/// Runs one folding sweep. Returns the number of rewrites and refinements.
pub fn run(root: &mut Node, trace: &mut TraceCollector) -> usize {
    fold_node(root, trace)
}

fn fold_node(node: &mut Node, trace: &mut TraceCollector) -> usize {
    let mut changes = 0;
    for child in &mut node.children {
        changes += fold_node(child, trace);
    }

    if hoist_raising_child(node) {
        trace.record(PASS, node.location, TraceVerdict::Applied);
        return changes + 1;
    }

    if fold_selection(node) {
        trace.record(PASS, node.location, TraceVerdict::Applied);
        return changes + 1;
    }

    changes += stamp_arity_hint(node, trace);

    let outcome = examine(node);
    match outcome {
        FoldOutcome::Value(value) => {
            node.replace_with(Node::constant(value, krait_frontend::SourceLocation::UNKNOWN));
            trace.record(PASS, node.location, TraceVerdict::Applied);
            changes += 1;
        }
        FoldOutcome::Raise(error, message) => {
            node.replace_with(Node::raise_error(
                error,
                message,
                krait_frontend::SourceLocation::UNKNOWN,
            ));
            trace.record(PASS, node.location, TraceVerdict::Applied);
            changes += 1;
        }
        FoldOutcome::Declined => {
            trace.record(PASS, node.location, TraceVerdict::Skipped);
        }
        FoldOutcome::NotApplicable => {}
    }
    changes
}

/// A raise terminal in an unconditionally evaluated operand position makes
/// the whole expression certainly raise. Hoisting it is legal only when
/// every operand evaluated before it can neither raise differently nor
/// touch outer state.
fn hoist_raising_child(node: &mut Node) -> bool {
    let unconditional_prefix = match node.kind {
        NodeKind::Unary(_)
        | NodeKind::Binary(_)
        | NodeKind::Compare(_)
        | NodeKind::Call
        | NodeKind::Attribute { .. }
        | NodeKind::Subscript
        | NodeKind::BuildList
        | NodeKind::BuildTuple
        | NodeKind::BuildSet
        | NodeKind::BuildDict
        | NodeKind::Starred => node.children.len(),
        // Only the test/left operand is evaluated unconditionally.
        NodeKind::BoolChain(_) | NodeKind::IfExpr => 1,
        _ => 0,
    };
    for i in 0..unconditional_prefix {
        if matches!(node.children[i].kind, NodeKind::RaiseError { .. }) {
            let preceding_pure = node.children[..i]
                .iter()
                .all(|c| c.escape == EscapeDescriptor::NoEscape);
            if preceding_pure {
                let raised = node.children[i].clone();
                node.replace_with(raised);
                return true;
            }
            return false;
        }
    }
    false
}

/// Short-circuit and conditional-expression selection: a constant test or
/// left operand decides the taken operand at compile time, and the untaken
/// operand would never have been evaluated anyway.
fn fold_selection(node: &mut Node) -> bool {
    let take_index = match &node.kind {
        NodeKind::BoolChain(op) => {
            let Some(value) = foldable_const(&node.children[0]) else {
                return false;
            };
            let takes_left = match op {
                BoolOpIR::And => !value.truthiness(),
                BoolOpIR::Or => value.truthiness(),
            };
            if takes_left {
                0
            } else {
                1
            }
        }
        NodeKind::IfExpr => {
            let Some(value) = foldable_const(&node.children[0]) else {
                return false;
            };
            if value.truthiness() {
                1
            } else {
                2
            }
        }
        _ => return false,
    };
    let taken = node.children.swap_remove(take_index);
    node.replace_with(taken);
    true
}

/// Stamps the container-specialization index on constructions whose element
/// count is statically known (no starred elements).
fn stamp_arity_hint(node: &mut Node, trace: &mut TraceCollector) -> usize {
    let count = match node.kind {
        NodeKind::BuildList | NodeKind::BuildTuple | NodeKind::BuildSet => {
            if node.children.iter().any(|c| matches!(c.kind, NodeKind::Starred)) {
                return 0;
            }
            node.children.len()
        }
        NodeKind::BuildDict => node.children.len() / 2,
        _ => return 0,
    };
    if node.arity_hint.is_none() {
        node.arity_hint = Some(count as u32);
        trace.record(PASS, node.location, TraceVerdict::Applied);
        1
    } else {
        0
    }
}

fn examine(node: &Node) -> FoldOutcome {
    match &node.kind {
        NodeKind::Unary(op) => examine_unary(*op, node),
        NodeKind::Binary(op) => examine_binary(*op, node),
        NodeKind::Compare(op) => examine_compare(*op, node),
        NodeKind::BoolChain(_) | NodeKind::IfExpr => FoldOutcome::NotApplicable,
        NodeKind::Subscript => examine_subscript(node),
        NodeKind::BuildList | NodeKind::BuildTuple | NodeKind::BuildSet | NodeKind::BuildDict => {
            examine_construction(node)
        }
        _ => FoldOutcome::NotApplicable,
    }
}

/// The constant value of an operand, available only when dropping the
/// operand's evaluation is also legal.
fn foldable_const(child: &Node) -> Option<&ConstValue> {
    if child.escape == EscapeDescriptor::NoEscape {
        child.shape.constant_value()
    } else {
        None
    }
}

fn examine_unary(op: UnaryOpIR, node: &Node) -> FoldOutcome {
    let operand = &node.children[0];
    if let Some(value) = foldable_const(operand) {
        return eval_unary(op, value);
    }
    // Known operand type the operator certainly rejects. Rewriting drops
    // the operand's evaluation, so it must not raise first.
    if operand.escape != EscapeDescriptor::NoEscape {
        return FoldOutcome::NotApplicable;
    }
    if let Some(ty) = operand.shape.exact_type() {
        let supported = match op {
            UnaryOpIR::Not => true,
            UnaryOpIR::Neg | UnaryOpIR::Pos => ty.is_numeric(),
            UnaryOpIR::Invert => matches!(ty, ValueType::Int | ValueType::Bool),
        };
        if !supported {
            return FoldOutcome::Raise(
                RuntimeErrorKind::Type,
                format!("bad operand type for unary {}: '{}'", op.symbol(), ty.runtime_name()),
            );
        }
    }
    FoldOutcome::NotApplicable
}

fn examine_binary(op: BinaryOpIR, node: &Node) -> FoldOutcome {
    let (left, right) = (&node.children[0], &node.children[1]);
    if let (Some(a), Some(b)) = (foldable_const(left), foldable_const(right)) {
        return eval_binary(op, a, b);
    }

    let (Some(lt), Some(rt)) = (left.shape.exact_type(), right.shape.exact_type()) else {
        return FoldOutcome::NotApplicable;
    };

    // The rewrites below drop operand evaluation; an operand that might
    // itself raise (or run foreign code) must stay in place.
    let operands_pure = left.escape == EscapeDescriptor::NoEscape
        && right.escape == EscapeDescriptor::NoEscape;
    if !operands_pure {
        return FoldOutcome::NotApplicable;
    }

    // Division by a known zero is never folded to a value; it is a certain
    // runtime error even when the dividend is not constant.
    if op.divides() && lt.is_numeric() {
        if let Some(divisor) = right.shape.constant_value() {
            if const_is_zero(divisor) {
                return FoldOutcome::Raise(
                    RuntimeErrorKind::ZeroDivision,
                    zero_division_message(op, lt, rt),
                );
            }
        }
    }

    if !binary_supported(op, lt, rt) {
        return FoldOutcome::Raise(
            RuntimeErrorKind::Type,
            format!(
                "unsupported operand type(s) for {}: '{}' and '{}'",
                op.symbol(),
                lt.runtime_name(),
                rt.runtime_name()
            ),
        );
    }
    FoldOutcome::NotApplicable
}

/// Whether the runtime defines this operator for these operand types.
fn binary_supported(op: BinaryOpIR, lt: ValueType, rt: ValueType) -> bool {
    if lt.is_numeric() && rt.is_numeric() {
        let bitwise = matches!(
            op,
            BinaryOpIR::BitAnd
                | BinaryOpIR::BitOr
                | BinaryOpIR::BitXor
                | BinaryOpIR::Shl
                | BinaryOpIR::Shr
        );
        return !(bitwise && (lt == ValueType::Float || rt == ValueType::Float));
    }
    let sequence = |ty: ValueType| {
        matches!(
            ty,
            ValueType::Str | ValueType::Bytes | ValueType::List | ValueType::Tuple
        )
    };
    match op {
        BinaryOpIR::Add => lt == rt && sequence(lt),
        BinaryOpIR::Mul => {
            (sequence(lt) && matches!(rt, ValueType::Int | ValueType::Bool))
                || (sequence(rt) && matches!(lt, ValueType::Int | ValueType::Bool))
        }
        _ => false,
    }
}

fn zero_division_message(op: BinaryOpIR, lt: ValueType, rt: ValueType) -> String {
    let float = lt == ValueType::Float || rt == ValueType::Float;
    match (op, float) {
        (BinaryOpIR::TrueDiv, false) => "division by zero".into(),
        (BinaryOpIR::TrueDiv, true) => "float division by zero".into(),
        (BinaryOpIR::FloorDiv, true) => "float floor division by zero".into(),
        (BinaryOpIR::Mod, true) => "float modulo".into(),
        _ => "integer division or modulo by zero".into(),
    }
}

fn const_is_zero(value: &ConstValue) -> bool {
    match value {
        ConstValue::Int(v) => v.is_zero(),
        ConstValue::Float(v) => *v == 0.0,
        ConstValue::Bool(v) => !*v,
        _ => false,
    }
}

fn examine_compare(op: CompareOpIR, node: &Node) -> FoldOutcome {
    let (left, right) = (&node.children[0], &node.children[1]);
    if let (Some(a), Some(b)) = (foldable_const(left), foldable_const(right)) {
        return eval_compare(op, a, b);
    }
    if op.is_equality() {
        return FoldOutcome::NotApplicable;
    }
    if left.escape != EscapeDescriptor::NoEscape || right.escape != EscapeDescriptor::NoEscape {
        return FoldOutcome::NotApplicable;
    }
    if let (Some(lt), Some(rt)) = (left.shape.exact_type(), right.shape.exact_type()) {
        if !crate::escape::comparable_types(lt, rt) {
            return FoldOutcome::Raise(
                RuntimeErrorKind::Type,
                format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    op.symbol(),
                    lt.runtime_name(),
                    rt.runtime_name()
                ),
            );
        }
    }
    FoldOutcome::NotApplicable
}

fn examine_subscript(node: &Node) -> FoldOutcome {
    let (object, index) = (&node.children[0], &node.children[1]);
    if let (Some(obj), Some(idx)) = (foldable_const(object), foldable_const(index)) {
        return eval_subscript(obj, idx);
    }
    if object.escape != EscapeDescriptor::NoEscape || index.escape != EscapeDescriptor::NoEscape {
        return FoldOutcome::NotApplicable;
    }
    let (Some(ot), Some(it)) = (object.shape.exact_type(), index.shape.exact_type()) else {
        return FoldOutcome::NotApplicable;
    };
    match ot {
        ValueType::List | ValueType::Tuple | ValueType::Str | ValueType::Bytes => {
            if !matches!(it, ValueType::Int | ValueType::Bool) {
                return FoldOutcome::Raise(
                    RuntimeErrorKind::Type,
                    format!(
                        "{} indices must be integers, not {}",
                        ot.runtime_name(),
                        it.runtime_name()
                    ),
                );
            }
        }
        ValueType::Dict => {}
        _ => {
            return FoldOutcome::Raise(
                RuntimeErrorKind::Type,
                format!("'{}' object is not subscriptable", ot.runtime_name()),
            );
        }
    }
    FoldOutcome::NotApplicable
}

// ---------------------------------------------------------------------------
// Value-level evaluation
// ---------------------------------------------------------------------------

/// Numeric operand view: bool promotes to int.
enum Num {
    Int(BigInt),
    Float(f64),
}

fn as_num(value: &ConstValue) -> Option<Num> {
    match value {
        ConstValue::Int(v) => Some(Num::Int(v.clone())),
        ConstValue::Bool(v) => Some(Num::Int(BigInt::from(*v as i64))),
        ConstValue::Float(v) => Some(Num::Float(*v)),
        _ => None,
    }
}

/// Exactly representable as `f64`, so float promotion cannot round.
fn int_fits_f64_exactly(v: &BigInt) -> Option<f64> {
    if v.bits() <= 53 {
        v.to_f64()
    } else {
        None
    }
}

fn eval_unary(op: UnaryOpIR, value: &ConstValue) -> FoldOutcome {
    match op {
        UnaryOpIR::Not => FoldOutcome::Value(ConstValue::Bool(!value.truthiness())),
        UnaryOpIR::Neg => match as_num(value) {
            Some(Num::Int(v)) => FoldOutcome::Value(ConstValue::Int(-v)),
            Some(Num::Float(v)) => FoldOutcome::Value(ConstValue::Float(-v)),
            None => unary_type_error(op, value),
        },
        UnaryOpIR::Pos => match as_num(value) {
            Some(Num::Int(v)) => FoldOutcome::Value(ConstValue::Int(v)),
            Some(Num::Float(v)) => FoldOutcome::Value(ConstValue::Float(v)),
            None => unary_type_error(op, value),
        },
        UnaryOpIR::Invert => match value {
            ConstValue::Int(v) => FoldOutcome::Value(ConstValue::Int(-v - 1_i32)),
            ConstValue::Bool(v) => {
                FoldOutcome::Value(ConstValue::Int(BigInt::from(-(*v as i64) - 1)))
            }
            _ => unary_type_error(op, value),
        },
    }
}

fn unary_type_error(op: UnaryOpIR, value: &ConstValue) -> FoldOutcome {
    FoldOutcome::Raise(
        RuntimeErrorKind::Type,
        format!(
            "bad operand type for unary {}: '{}'",
            op.symbol(),
            value.value_type().runtime_name()
        ),
    )
}

fn eval_binary(op: BinaryOpIR, a: &ConstValue, b: &ConstValue) -> FoldOutcome {
    if let (Some(x), Some(y)) = (as_num(a), as_num(b)) {
        return eval_numeric_binary(op, x, y);
    }
    eval_sequence_binary(op, a, b)
}

fn eval_numeric_binary(op: BinaryOpIR, x: Num, y: Num) -> FoldOutcome {
    match (x, y) {
        (Num::Int(a), Num::Int(b)) => eval_int_binary(op, a, b),
        (x, y) => {
            // Promote to float exactly; an int too large for lossless
            // conversion is left to the runtime (which would raise
            // OverflowError, outside this model's error set).
            let fx = match x {
                Num::Float(v) => v,
                Num::Int(v) => match int_fits_f64_exactly(&v) {
                    Some(f) => f,
                    None => return FoldOutcome::Declined,
                },
            };
            let fy = match y {
                Num::Float(v) => v,
                Num::Int(v) => match int_fits_f64_exactly(&v) {
                    Some(f) => f,
                    None => return FoldOutcome::Declined,
                },
            };
            eval_float_binary(op, fx, fy)
        }
    }
}

fn eval_int_binary(op: BinaryOpIR, a: BigInt, b: BigInt) -> FoldOutcome {
    let int = |v: BigInt| FoldOutcome::Value(ConstValue::Int(v));
    match op {
        BinaryOpIR::Add => int(a + b),
        BinaryOpIR::Sub => int(a - b),
        BinaryOpIR::Mul => int(a * b),
        BinaryOpIR::TrueDiv => {
            if b.is_zero() {
                return FoldOutcome::Raise(
                    RuntimeErrorKind::ZeroDivision,
                    "division by zero".into(),
                );
            }
            // Fold only quotients of exactly representable operands, where
            // f64 division is itself the correctly rounded runtime result.
            match (int_fits_f64_exactly(&a), int_fits_f64_exactly(&b)) {
                (Some(fa), Some(fb)) => FoldOutcome::Value(ConstValue::Float(fa / fb)),
                _ => FoldOutcome::Declined,
            }
        }
        BinaryOpIR::FloorDiv => {
            if b.is_zero() {
                return FoldOutcome::Raise(
                    RuntimeErrorKind::ZeroDivision,
                    "integer division or modulo by zero".into(),
                );
            }
            int(a.div_floor(&b))
        }
        BinaryOpIR::Mod => {
            if b.is_zero() {
                return FoldOutcome::Raise(
                    RuntimeErrorKind::ZeroDivision,
                    "integer division or modulo by zero".into(),
                );
            }
            int(a.mod_floor(&b))
        }
        BinaryOpIR::Pow => eval_int_pow(a, b),
        BinaryOpIR::BitAnd => int(a & b),
        BinaryOpIR::BitOr => int(a | b),
        BinaryOpIR::BitXor => int(a ^ b),
        BinaryOpIR::Shl => {
            if b.is_negative() {
                return FoldOutcome::Raise(
                    RuntimeErrorKind::Value,
                    "negative shift count".into(),
                );
            }
            let Some(amount) = b.to_u64() else {
                return FoldOutcome::Declined;
            };
            if a.bits() + amount > INT_BITS_CAP {
                return FoldOutcome::Declined;
            }
            int(a << amount)
        }
        BinaryOpIR::Shr => {
            if b.is_negative() {
                return FoldOutcome::Raise(
                    RuntimeErrorKind::Value,
                    "negative shift count".into(),
                );
            }
            match b.to_u64() {
                // Shifting everything out leaves 0 or -1 by sign.
                None => int(if a.is_negative() {
                    BigInt::from(-1)
                } else {
                    BigInt::from(0)
                }),
                Some(amount) if amount >= a.bits() + 1 => int(if a.is_negative() {
                    BigInt::from(-1)
                } else {
                    BigInt::from(0)
                }),
                Some(amount) => int(a >> amount),
            }
        }
    }
}

fn eval_int_pow(base: BigInt, exponent: BigInt) -> FoldOutcome {
    if exponent.is_negative() {
        if base.is_zero() {
            return FoldOutcome::Raise(
                RuntimeErrorKind::ZeroDivision,
                "0.0 cannot be raised to a negative power".into(),
            );
        }
        // Negative exponent yields a float.
        let (Some(fb), Some(fe)) = (int_fits_f64_exactly(&base), exponent.to_i32()) else {
            return FoldOutcome::Declined;
        };
        let result = fb.powi(fe);
        if result.is_finite() {
            return FoldOutcome::Value(ConstValue::Float(result));
        }
        return FoldOutcome::Declined;
    }
    let Some(exp) = exponent.to_u32() else {
        return FoldOutcome::Declined;
    };
    // Bound the materialized result size before computing it.
    if base.bits().saturating_mul(exp as u64) > INT_BITS_CAP {
        return FoldOutcome::Declined;
    }
    FoldOutcome::Value(ConstValue::Int(Pow::pow(base, exp)))
}

fn eval_float_binary(op: BinaryOpIR, a: f64, b: f64) -> FoldOutcome {
    let float = |v: f64| {
        // Overflow to infinity is runtime-dependent territory (the runtime
        // raises OverflowError for some of these); don't fold it.
        if v.is_finite() {
            FoldOutcome::Value(ConstValue::Float(v))
        } else {
            FoldOutcome::Declined
        }
    };
    match op {
        BinaryOpIR::Add => float(a + b),
        BinaryOpIR::Sub => float(a - b),
        BinaryOpIR::Mul => float(a * b),
        BinaryOpIR::TrueDiv => {
            if b == 0.0 {
                return FoldOutcome::Raise(
                    RuntimeErrorKind::ZeroDivision,
                    "float division by zero".into(),
                );
            }
            float(a / b)
        }
        BinaryOpIR::FloorDiv => {
            if b == 0.0 {
                return FoldOutcome::Raise(
                    RuntimeErrorKind::ZeroDivision,
                    "float floor division by zero".into(),
                );
            }
            float((a / b).floor())
        }
        BinaryOpIR::Mod => {
            if b == 0.0 {
                return FoldOutcome::Raise(
                    RuntimeErrorKind::ZeroDivision,
                    "float modulo".into(),
                );
            }
            // Result takes the sign of the divisor.
            let mut r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r += b;
            }
            float(r)
        }
        BinaryOpIR::Pow => {
            if a == 0.0 && b < 0.0 {
                return FoldOutcome::Raise(
                    RuntimeErrorKind::ZeroDivision,
                    "0.0 cannot be raised to a negative power".into(),
                );
            }
            if a < 0.0 && b.fract() != 0.0 {
                // Complex result; outside this value model.
                return FoldOutcome::Declined;
            }
            float(a.powf(b))
        }
        // Bitwise on floats: certain TypeError.
        BinaryOpIR::BitAnd
        | BinaryOpIR::BitOr
        | BinaryOpIR::BitXor
        | BinaryOpIR::Shl
        | BinaryOpIR::Shr => FoldOutcome::Raise(
            RuntimeErrorKind::Type,
            format!(
                "unsupported operand type(s) for {}: 'float' and 'float'",
                op.symbol()
            ),
        ),
    }
}

fn eval_sequence_binary(op: BinaryOpIR, a: &ConstValue, b: &ConstValue) -> FoldOutcome {
    use ConstValue::*;
    match (op, a, b) {
        (BinaryOpIR::Add, Str(x), Str(y)) => {
            if x.len() + y.len() > MATERIALIZE_CAP {
                return FoldOutcome::Declined;
            }
            let mut out = x.clone();
            out.push_str(y);
            FoldOutcome::Value(Str(out))
        }
        (BinaryOpIR::Add, Bytes(x), Bytes(y)) => {
            if x.len() + y.len() > MATERIALIZE_CAP {
                return FoldOutcome::Declined;
            }
            let mut out = x.clone();
            out.extend_from_slice(y);
            FoldOutcome::Value(Bytes(out))
        }
        (BinaryOpIR::Add, List(x), List(y)) => {
            if x.len() + y.len() > MATERIALIZE_CAP {
                return FoldOutcome::Declined;
            }
            let mut out = x.clone();
            out.extend(y.iter().cloned());
            FoldOutcome::Value(List(out))
        }
        (BinaryOpIR::Add, Tuple(x), Tuple(y)) => {
            if x.len() + y.len() > MATERIALIZE_CAP {
                return FoldOutcome::Declined;
            }
            let mut out = x.clone();
            out.extend(y.iter().cloned());
            FoldOutcome::Value(Tuple(out))
        }
        (BinaryOpIR::Mul, seq, count) | (BinaryOpIR::Mul, count, seq)
            if matches!(seq, Str(_) | Bytes(_) | List(_) | Tuple(_))
                && matches!(count, Int(_) | Bool(_)) =>
        {
            eval_sequence_repeat(seq, count)
        }
        _ => FoldOutcome::Raise(
            RuntimeErrorKind::Type,
            format!(
                "unsupported operand type(s) for {}: '{}' and '{}'",
                op.symbol(),
                a.value_type().runtime_name(),
                b.value_type().runtime_name()
            ),
        ),
    }
}

fn eval_sequence_repeat(seq: &ConstValue, count: &ConstValue) -> FoldOutcome {
    let count = match count {
        ConstValue::Int(v) => v.to_isize().unwrap_or(isize::MAX),
        ConstValue::Bool(v) => *v as isize,
        _ => return FoldOutcome::NotApplicable,
    };
    let count = count.max(0) as usize;
    let base_len = match seq {
        ConstValue::Str(v) => v.len(),
        ConstValue::Bytes(v) => v.len(),
        ConstValue::List(v) | ConstValue::Tuple(v) => v.len(),
        _ => return FoldOutcome::NotApplicable,
    };
    if base_len.saturating_mul(count) > MATERIALIZE_CAP {
        return FoldOutcome::Declined;
    }
    let value = match seq {
        ConstValue::Str(v) => ConstValue::Str(v.repeat(count)),
        ConstValue::Bytes(v) => ConstValue::Bytes(v.repeat(count)),
        ConstValue::List(v) => {
            ConstValue::List(v.iter().cloned().cycle().take(v.len() * count).collect())
        }
        ConstValue::Tuple(v) => {
            ConstValue::Tuple(v.iter().cloned().cycle().take(v.len() * count).collect())
        }
        _ => return FoldOutcome::NotApplicable,
    };
    FoldOutcome::Value(value)
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

enum OrderingOutcome {
    Ordered(std::cmp::Ordering),
    /// NaN involved: every ordering comparison is false, none raise.
    AlwaysFalse,
    Error(String),
}

fn eval_compare(op: CompareOpIR, a: &ConstValue, b: &ConstValue) -> FoldOutcome {
    match op {
        CompareOpIR::Eq => FoldOutcome::Value(ConstValue::Bool(a.py_eq(b))),
        CompareOpIR::NotEq => FoldOutcome::Value(ConstValue::Bool(!a.py_eq(b))),
        _ => match py_ordering(op, a, b) {
            OrderingOutcome::Ordered(ordering) => {
                let result = match op {
                    CompareOpIR::Lt => ordering.is_lt(),
                    CompareOpIR::LtE => ordering.is_le(),
                    CompareOpIR::Gt => ordering.is_gt(),
                    CompareOpIR::GtE => ordering.is_ge(),
                    _ => unreachable!("equality handled above"),
                };
                FoldOutcome::Value(ConstValue::Bool(result))
            }
            OrderingOutcome::AlwaysFalse => FoldOutcome::Value(ConstValue::Bool(false)),
            OrderingOutcome::Error(message) => {
                FoldOutcome::Raise(RuntimeErrorKind::Type, message)
            }
        },
    }
}

fn py_ordering(op: CompareOpIR, a: &ConstValue, b: &ConstValue) -> OrderingOutcome {
    use ConstValue::*;
    let error = || {
        OrderingOutcome::Error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op.symbol(),
            a.value_type().runtime_name(),
            b.value_type().runtime_name()
        ))
    };
    match (a, b) {
        (Int(_) | Float(_) | Bool(_), Int(_) | Float(_) | Bool(_)) => {
            numeric_ordering(a, b).map_or(OrderingOutcome::AlwaysFalse, OrderingOutcome::Ordered)
        }
        (Str(x), Str(y)) => OrderingOutcome::Ordered(x.cmp(y)),
        (Bytes(x), Bytes(y)) => OrderingOutcome::Ordered(x.cmp(y)),
        (Tuple(x), Tuple(y)) | (List(x), List(y)) => {
            for (ex, ey) in x.iter().zip(y.iter()) {
                if !ex.py_eq(ey) {
                    return py_ordering(op, ex, ey);
                }
            }
            OrderingOutcome::Ordered(x.len().cmp(&y.len()))
        }
        _ => error(),
    }
}

fn numeric_ordering(a: &ConstValue, b: &ConstValue) -> Option<std::cmp::Ordering> {
    let (x, y) = (as_num(a)?, as_num(b)?);
    match (x, y) {
        (Num::Int(p), Num::Int(q)) => Some(p.cmp(&q)),
        (Num::Int(p), Num::Float(q)) => cmp_int_float(&p, q),
        (Num::Float(p), Num::Int(q)) => cmp_int_float(&q, p).map(std::cmp::Ordering::reverse),
        (Num::Float(p), Num::Float(q)) => p.partial_cmp(&q),
    }
}

// ---------------------------------------------------------------------------
// Subscripts
// ---------------------------------------------------------------------------

fn eval_subscript(object: &ConstValue, index: &ConstValue) -> FoldOutcome {
    use ConstValue::*;
    match object {
        List(elements) | Tuple(elements) => match normalize_index(index, elements.len()) {
            IndexOutcome::At(i) => FoldOutcome::Value(elements[i].clone()),
            IndexOutcome::OutOfRange => FoldOutcome::Raise(
                RuntimeErrorKind::Index,
                format!("{} index out of range", object.value_type().runtime_name()),
            ),
            IndexOutcome::BadType => subscript_type_error(object, index),
        },
        Str(text) => {
            let char_count = text.chars().count();
            match normalize_index(index, char_count) {
                IndexOutcome::At(i) => {
                    let ch = text.chars().nth(i).map(String::from).unwrap_or_default();
                    FoldOutcome::Value(Str(ch))
                }
                IndexOutcome::OutOfRange => FoldOutcome::Raise(
                    RuntimeErrorKind::Index,
                    "string index out of range".into(),
                ),
                IndexOutcome::BadType => subscript_type_error(object, index),
            }
        }
        Bytes(bytes) => match normalize_index(index, bytes.len()) {
            IndexOutcome::At(i) => FoldOutcome::Value(ConstValue::int(bytes[i] as i64)),
            IndexOutcome::OutOfRange => FoldOutcome::Raise(
                RuntimeErrorKind::Index,
                "index out of range".into(),
            ),
            IndexOutcome::BadType => subscript_type_error(object, index),
        },
        Dict(entries) => {
            if !index.is_hashable() {
                return FoldOutcome::Raise(
                    RuntimeErrorKind::Type,
                    format!("unhashable type: '{}'", index.value_type().runtime_name()),
                );
            }
            for (key, value) in entries {
                if key.py_eq(index) {
                    return FoldOutcome::Value(value.clone());
                }
            }
            FoldOutcome::Raise(RuntimeErrorKind::Key, format!("{}", index))
        }
        _ => FoldOutcome::Raise(
            RuntimeErrorKind::Type,
            format!(
                "'{}' object is not subscriptable",
                object.value_type().runtime_name()
            ),
        ),
    }
}

enum IndexOutcome {
    At(usize),
    OutOfRange,
    BadType,
}

fn normalize_index(index: &ConstValue, len: usize) -> IndexOutcome {
    let raw = match index {
        ConstValue::Int(v) => v.clone(),
        ConstValue::Bool(v) => BigInt::from(*v as i64),
        _ => return IndexOutcome::BadType,
    };
    let len = BigInt::from(len);
    let adjusted = if raw.is_negative() { raw + &len } else { raw };
    if adjusted.is_negative() || adjusted >= len {
        return IndexOutcome::OutOfRange;
    }
    match adjusted.to_usize() {
        Some(i) => IndexOutcome::At(i),
        None => IndexOutcome::OutOfRange,
    }
}

fn subscript_type_error(object: &ConstValue, index: &ConstValue) -> FoldOutcome {
    FoldOutcome::Raise(
        RuntimeErrorKind::Type,
        format!(
            "{} indices must be integers, not {}",
            object.value_type().runtime_name(),
            index.value_type().runtime_name()
        ),
    )
}

// ---------------------------------------------------------------------------
// Container constructions
// ---------------------------------------------------------------------------

fn examine_construction(node: &Node) -> FoldOutcome {
    // Most displays are a handful of elements; spill only when a starred
    // constant splices in something bigger.
    let mut elements: SmallVec<[ConstValue; 8]> = SmallVec::new();
    for child in &node.children {
        if let NodeKind::Starred = child.kind {
            let operand = &child.children[0];
            let Some(value) = foldable_const(operand) else {
                // A starred operand of a known non-iterable type certainly
                // raises; operands already evaluated must be droppable.
                if let Some(ty) = operand.shape.exact_type() {
                    let iterable = matches!(
                        ty,
                        ValueType::List
                            | ValueType::Tuple
                            | ValueType::Set
                            | ValueType::Dict
                            | ValueType::Str
                            | ValueType::Bytes
                    );
                    if !iterable
                        && node.children.iter().take_while(|c| !std::ptr::eq(*c, child)).all(
                            |c| c.escape == EscapeDescriptor::NoEscape,
                        )
                        && operand.escape == EscapeDescriptor::NoEscape
                    {
                        return FoldOutcome::Raise(
                            RuntimeErrorKind::Type,
                            format!("'{}' object is not iterable", ty.runtime_name()),
                        );
                    }
                }
                return FoldOutcome::NotApplicable;
            };
            match unpack_iterable(value) {
                Some(values) => elements.extend(values),
                None => {
                    return FoldOutcome::Raise(
                        RuntimeErrorKind::Type,
                        format!(
                            "'{}' object is not iterable",
                            value.value_type().runtime_name()
                        ),
                    );
                }
            }
        } else {
            match foldable_const(child) {
                Some(value) => elements.push(value.clone()),
                None => return FoldOutcome::NotApplicable,
            }
        }
        if elements.len() > MATERIALIZE_CAP {
            return FoldOutcome::Declined;
        }
    }

    match node.kind {
        NodeKind::BuildList | NodeKind::BuildTuple => {
            // Mutable constant elements would alias a fresh-per-evaluation
            // object; those constructions are left to the backend.
            if !elements.iter().all(ConstValue::is_deeply_immutable) {
                return FoldOutcome::Declined;
            }
            if matches!(node.kind, NodeKind::BuildList) {
                FoldOutcome::Value(ConstValue::List(elements.into_vec()))
            } else {
                FoldOutcome::Value(ConstValue::Tuple(elements.into_vec()))
            }
        }
        NodeKind::BuildSet => {
            if let Some(bad) = elements.iter().find(|e| !e.is_hashable()) {
                return FoldOutcome::Raise(
                    RuntimeErrorKind::Type,
                    format!("unhashable type: '{}'", bad.value_type().runtime_name()),
                );
            }
            // First occurrence wins.
            let mut deduped: Vec<ConstValue> = Vec::with_capacity(elements.len());
            for element in elements {
                if !deduped.iter().any(|e| e.py_eq(&element)) {
                    deduped.push(element);
                }
            }
            FoldOutcome::Value(ConstValue::Set(deduped))
        }
        NodeKind::BuildDict => {
            let mut entries: Vec<(ConstValue, ConstValue)> =
                Vec::with_capacity(elements.len() / 2);
            let mut iter = elements.into_iter();
            while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
                if !key.is_hashable() {
                    return FoldOutcome::Raise(
                        RuntimeErrorKind::Type,
                        format!("unhashable type: '{}'", key.value_type().runtime_name()),
                    );
                }
                if !value.is_deeply_immutable() {
                    return FoldOutcome::Declined;
                }
                // Last write wins for duplicate keys.
                if let Some(existing) = entries.iter_mut().find(|(k, _)| k.py_eq(&key)) {
                    existing.1 = value;
                } else {
                    entries.push((key, value));
                }
            }
            FoldOutcome::Value(ConstValue::Dict(entries))
        }
        _ => FoldOutcome::NotApplicable,
    }
}

/// Elements produced by iterating a constant value, or `None` when the
/// value is not iterable.
fn unpack_iterable(value: &ConstValue) -> Option<Vec<ConstValue>> {
    match value {
        ConstValue::List(v) | ConstValue::Tuple(v) | ConstValue::Set(v) => Some(v.clone()),
        ConstValue::Str(v) => Some(v.chars().map(|c| ConstValue::Str(c.into())).collect()),
        ConstValue::Bytes(v) => Some(v.iter().map(|b| ConstValue::int(*b as i64)).collect()),
        // Iterating a dict yields its keys.
        ConstValue::Dict(entries) => Some(entries.iter().map(|(k, _)| k.clone()).collect()),
        _ => None,
    }
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

    fn float(v: f64) -> Node {
        Node::constant(ConstValue::Float(v), loc())
    }

    fn string(v: &str) -> Node {
        Node::constant(ConstValue::str(v), loc())
    }

    fn binary(op: BinaryOpIR, l: Node, r: Node) -> Node {
        Node::new(NodeKind::Binary(op), vec![l, r], loc())
    }

    fn fold_once(mut node: Node) -> Node {
        let mut trace = TraceCollector::new();
        fold_node(&mut node, &mut trace);
        node
    }

    fn expect_const(node: Node) -> ConstValue {
        match fold_once(node).kind {
            NodeKind::Constant(v) => v,
            other => panic!("expected constant, got {:?}", other),
        }
    }

    fn expect_raise(node: Node) -> RuntimeErrorKind {
        match fold_once(node).kind {
            NodeKind::RaiseError { error, .. } => error,
            other => panic!("expected raise terminal, got {:?}", other),
        }
    }

    #[test]
    fn integer_addition_folds_exactly() {
        let v = expect_const(binary(BinaryOpIR::Add, int(2), int(3)));
        assert_eq!(v, ConstValue::int(5));
    }

    #[test]
    fn string_concatenation_folds() {
        let v = expect_const(binary(BinaryOpIR::Add, string("ab"), string("cd")));
        assert_eq!(v, ConstValue::str("abcd"));
    }

    #[test]
    fn huge_integer_arithmetic_never_overflows() {
        // (1 << 100) + (1 << 100) == 1 << 101, far beyond machine ints.
        let big = ConstValue::Int(BigInt::from(1) << 100);
        let node = binary(
            BinaryOpIR::Add,
            Node::constant(big.clone(), loc()),
            Node::constant(big, loc()),
        );
        let v = expect_const(node);
        assert_eq!(v, ConstValue::Int(BigInt::from(1) << 101));
    }

    #[test]
    fn division_by_zero_becomes_raise_terminal() {
        let error = expect_raise(binary(BinaryOpIR::TrueDiv, int(5), int(0)));
        assert_eq!(error, RuntimeErrorKind::ZeroDivision);
    }

    #[test]
    fn division_by_zero_is_never_a_constant() {
        let folded = fold_once(binary(BinaryOpIR::TrueDiv, int(5), int(0)));
        assert!(!matches!(folded.kind, NodeKind::Constant(_)));
        assert_eq!(folded.escape, EscapeDescriptor::FullEscape);
    }

    #[test]
    fn floor_division_follows_floor_semantics() {
        assert_eq!(
            expect_const(binary(BinaryOpIR::FloorDiv, int(-7), int(2))),
            ConstValue::int(-4)
        );
        assert_eq!(
            expect_const(binary(BinaryOpIR::Mod, int(-7), int(2))),
            ConstValue::int(1)
        );
    }

    #[test]
    fn true_division_of_ints_yields_float() {
        assert_eq!(
            expect_const(binary(BinaryOpIR::TrueDiv, int(1), int(2))),
            ConstValue::Float(0.5)
        );
    }

    #[test]
    fn mixed_int_float_promotes() {
        assert_eq!(
            expect_const(binary(BinaryOpIR::Add, int(1), float(0.5))),
            ConstValue::Float(1.5)
        );
    }

    #[test]
    fn bool_operands_promote_to_int() {
        let node = binary(
            BinaryOpIR::Add,
            Node::constant(ConstValue::Bool(true), loc()),
            int(2),
        );
        assert_eq!(expect_const(node), ConstValue::int(3));
    }

    #[test]
    fn int_plus_str_becomes_type_error_terminal() {
        let error = expect_raise(binary(BinaryOpIR::Add, int(1), string("a")));
        assert_eq!(error, RuntimeErrorKind::Type);
    }

    #[test]
    fn oversized_pow_is_declined_and_traced() {
        let mut node = binary(BinaryOpIR::Pow, int(2), int(10_000_000));
        let mut trace = TraceCollector::new();
        fold_node(&mut node, &mut trace);
        assert!(matches!(node.kind, NodeKind::Binary(_)));
        assert_eq!(trace.summarize()[PASS].skipped, 1);
    }

    #[test]
    fn small_pow_folds() {
        assert_eq!(
            expect_const(binary(BinaryOpIR::Pow, int(2), int(10))),
            ConstValue::int(1024)
        );
    }

    #[test]
    fn negative_exponent_yields_float() {
        assert_eq!(
            expect_const(binary(BinaryOpIR::Pow, int(2), int(-2))),
            ConstValue::Float(0.25)
        );
    }

    #[test]
    fn string_repetition_folds_in_either_operand_order() {
        assert_eq!(
            expect_const(binary(BinaryOpIR::Mul, string("ab"), int(3))),
            ConstValue::str("ababab")
        );
        assert_eq!(
            expect_const(binary(BinaryOpIR::Mul, int(0), string("ab"))),
            ConstValue::str("")
        );
    }

    #[test]
    fn comparisons_fold_with_cross_type_numeric_equality() {
        let eq = Node::new(
            NodeKind::Compare(CompareOpIR::Eq),
            vec![int(1), float(1.0)],
            loc(),
        );
        assert_eq!(expect_const(eq), ConstValue::Bool(true));

        let lt = Node::new(
            NodeKind::Compare(CompareOpIR::Lt),
            vec![string("a"), string("b")],
            loc(),
        );
        assert_eq!(expect_const(lt), ConstValue::Bool(true));
    }

    #[test]
    fn ordering_across_types_becomes_type_error() {
        let node = Node::new(
            NodeKind::Compare(CompareOpIR::Lt),
            vec![int(1), string("a")],
            loc(),
        );
        assert_eq!(expect_raise(node), RuntimeErrorKind::Type);
    }

    #[test]
    fn nan_ordering_folds_to_false_not_error() {
        let node = Node::new(
            NodeKind::Compare(CompareOpIR::Lt),
            vec![float(f64::NAN), float(1.0)],
            loc(),
        );
        assert_eq!(expect_const(node), ConstValue::Bool(false));
    }

    #[test]
    fn constant_list_construction_folds() {
        let node = Node::new(NodeKind::BuildList, vec![int(1), int(2), int(3)], loc());
        assert_eq!(
            expect_const(node),
            ConstValue::List(vec![
                ConstValue::int(1),
                ConstValue::int(2),
                ConstValue::int(3)
            ])
        );
    }

    #[test]
    fn construction_stamps_arity_hint() {
        let mut node = Node::new(NodeKind::BuildList, vec![int(1), int(2)], loc());
        let mut trace = TraceCollector::new();
        fold_node(&mut node, &mut trace);
        // The node folded to a constant, but the hint was stamped first and
        // survives on the rewritten node only via the constant's length;
        // unfolded constructions keep the hint itself.
        let mut unfoldable = Node::new(
            NodeKind::BuildList,
            vec![Node::leaf(NodeKind::Name { id: "x".into() }, loc())],
            loc(),
        );
        fold_node(&mut unfoldable, &mut trace);
        assert_eq!(unfoldable.arity_hint, Some(1));
    }

    #[test]
    fn starred_constant_sequences_splice() {
        let inner = Node::constant(
            ConstValue::Tuple(vec![ConstValue::int(2), ConstValue::int(3)]),
            loc(),
        );
        let starred = Node::new(NodeKind::Starred, vec![inner], loc());
        let node = Node::new(NodeKind::BuildList, vec![int(1), starred], loc());
        assert_eq!(
            expect_const(node),
            ConstValue::List(vec![
                ConstValue::int(1),
                ConstValue::int(2),
                ConstValue::int(3)
            ])
        );
    }

    #[test]
    fn starred_non_iterable_becomes_type_error() {
        let starred = Node::new(NodeKind::Starred, vec![int(7)], loc());
        let node = Node::new(NodeKind::BuildList, vec![starred], loc());
        assert_eq!(expect_raise(node), RuntimeErrorKind::Type);
    }

    #[test]
    fn set_construction_dedupes_first_wins() {
        let node = Node::new(
            NodeKind::BuildSet,
            vec![int(1), Node::constant(ConstValue::Bool(true), loc()), int(2)],
            loc(),
        );
        // True == 1, so the set keeps the first occurrence only.
        assert_eq!(
            expect_const(node),
            ConstValue::Set(vec![ConstValue::int(1), ConstValue::int(2)])
        );
    }

    #[test]
    fn dict_construction_last_key_wins() {
        let node = Node::new(
            NodeKind::BuildDict,
            vec![string("k"), int(1), string("k"), int(2)],
            loc(),
        );
        assert_eq!(
            expect_const(node),
            ConstValue::Dict(vec![(ConstValue::str("k"), ConstValue::int(2))])
        );
    }

    #[test]
    fn dict_with_unhashable_key_becomes_type_error() {
        let key = Node::constant(ConstValue::List(vec![]), loc());
        let node = Node::new(NodeKind::BuildDict, vec![key, int(1)], loc());
        assert_eq!(expect_raise(node), RuntimeErrorKind::Type);
    }

    #[test]
    fn subscript_of_constant_sequence_folds_with_negative_index() {
        let list = Node::constant(
            ConstValue::List(vec![ConstValue::int(10), ConstValue::int(20)]),
            loc(),
        );
        let node = Node::new(NodeKind::Subscript, vec![list, int(-1)], loc());
        assert_eq!(expect_const(node), ConstValue::int(20));
    }

    #[test]
    fn subscript_out_of_range_becomes_index_error() {
        let list = Node::constant(ConstValue::List(vec![ConstValue::int(10)]), loc());
        let node = Node::new(NodeKind::Subscript, vec![list, int(5)], loc());
        assert_eq!(expect_raise(node), RuntimeErrorKind::Index);
    }

    #[test]
    fn dict_lookup_folds_or_raises_key_error() {
        let dict = ConstValue::Dict(vec![(ConstValue::str("a"), ConstValue::int(1))]);
        let hit = Node::new(
            NodeKind::Subscript,
            vec![Node::constant(dict.clone(), loc()), string("a")],
            loc(),
        );
        assert_eq!(expect_const(hit), ConstValue::int(1));

        let miss = Node::new(
            NodeKind::Subscript,
            vec![Node::constant(dict, loc()), string("b")],
            loc(),
        );
        assert_eq!(expect_raise(miss), RuntimeErrorKind::Key);
    }

    #[test]
    fn string_subscript_counts_characters_not_bytes() {
        let node = Node::new(NodeKind::Subscript, vec![string("héllo"), int(1)], loc());
        assert_eq!(expect_const(node), ConstValue::str("é"));
    }

    #[test]
    fn raise_terminal_hoists_through_pure_operands() {
        let raise = Node::raise_error(RuntimeErrorKind::ZeroDivision, "division by zero", loc());
        let node = binary(BinaryOpIR::Add, int(1), raise);
        let folded = fold_once(node);
        assert!(matches!(
            folded.kind,
            NodeKind::RaiseError {
                error: RuntimeErrorKind::ZeroDivision,
                ..
            }
        ));
    }

    #[test]
    fn raise_terminal_does_not_hoist_past_escaping_operands() {
        let call = Node::new(
            NodeKind::Call,
            vec![Node::leaf(NodeKind::Name { id: "f".into() }, loc())],
            loc(),
        );
        let raise = Node::raise_error(RuntimeErrorKind::ZeroDivision, "division by zero", loc());
        let node = binary(BinaryOpIR::Add, call, raise);
        let folded = fold_once(node);
        assert!(matches!(folded.kind, NodeKind::Binary(_)));
    }

    #[test]
    fn unary_folds() {
        let neg = Node::new(NodeKind::Unary(UnaryOpIR::Neg), vec![int(5)], loc());
        assert_eq!(expect_const(neg), ConstValue::int(-5));

        let not = Node::new(NodeKind::Unary(UnaryOpIR::Not), vec![string("")], loc());
        assert_eq!(expect_const(not), ConstValue::Bool(true));

        let invert = Node::new(NodeKind::Unary(UnaryOpIR::Invert), vec![int(5)], loc());
        assert_eq!(expect_const(invert), ConstValue::int(-6));
    }

    #[test]
    fn constant_left_operand_selects_short_circuit_result() {
        // 0 and f()  ==>  0, without evaluating the right operand.
        let call = Node::new(
            NodeKind::Call,
            vec![Node::leaf(NodeKind::Name { id: "f".into() }, loc())],
            loc(),
        );
        let node = Node::new(NodeKind::BoolChain(BoolOpIR::And), vec![int(0), call], loc());
        assert_eq!(expect_const(node), ConstValue::int(0));

        // 1 or x  ==>  1
        let name = Node::leaf(NodeKind::Name { id: "x".into() }, loc());
        let node = Node::new(NodeKind::BoolChain(BoolOpIR::Or), vec![int(1), name], loc());
        assert_eq!(expect_const(node), ConstValue::int(1));
    }

    #[test]
    fn constant_test_selects_conditional_branch() {
        let name = Node::leaf(NodeKind::Name { id: "x".into() }, loc());
        let node = Node::new(
            NodeKind::IfExpr,
            vec![Node::constant(ConstValue::Bool(false), loc()), name, int(9)],
            loc(),
        );
        assert_eq!(expect_const(node), ConstValue::int(9));
    }

    #[test]
    fn unknown_test_leaves_conditional_alone() {
        let test = Node::leaf(NodeKind::Name { id: "c".into() }, loc());
        let node = Node::new(NodeKind::IfExpr, vec![test, int(1), int(2)], loc());
        let folded = fold_once(node);
        assert!(matches!(folded.kind, NodeKind::IfExpr));
    }

    #[test]
    fn mutable_elements_block_tuple_folding() {
        let inner_list = Node::constant(ConstValue::List(vec![ConstValue::int(1)]), loc());
        let node = Node::new(NodeKind::BuildTuple, vec![inner_list, int(2)], loc());
        let folded = fold_once(node);
        assert!(matches!(folded.kind, NodeKind::BuildTuple));
        assert_eq!(folded.arity_hint, Some(2));
    }
}
