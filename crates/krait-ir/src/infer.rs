//! # Shape inference pass
//!
//! Abstract interpretation over the module body: walks statements in
//! program order with an environment of name facts, derives a type-level
//! shape for every expression node from its operands, and refines node
//! shapes in place. Value-level knowledge (actual folding) is the folder's
//! job; this pass only narrows types.
//!
//! Loop-assigned names are widened to unknown before the loop body is
//! analyzed, and a fully escaping evaluation invalidates the whole
//! environment (arbitrary code may have rebound any module name) unless the
//! configuration promises otherwise. Both choices keep every per-node fact
//! stable across sweeps, which is what makes refinement monotonic.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::CompileError;
use crate::escape::{comparable_types, subtree_contains_full_escape};
use crate::node::{BinaryOpIR, BoolOpIR, Node, NodeKind, UnaryOpIR};
use crate::shape::{ConstValue, Shape, TypeSet, ValueType};
use crate::trace::{TraceCollector, TraceVerdict};

const PASS: &str = "shape-infer";

type Env = FxHashMap<String, Shape>;

/// Runs one inference sweep over the module. Returns the number of nodes
/// whose shape was refined.
pub fn run(
    root: &mut Node,
    assume_no_external_mutation: bool,
    trace: &mut TraceCollector,
) -> Result<usize, CompileError> {
    let mut env = Env::default();
    let mut changes = 0;
    for stmt in &mut root.children {
        changes += infer_stmt(stmt, &mut env, assume_no_external_mutation, trace)?;
    }
    Ok(changes)
}

fn infer_stmt(
    stmt: &mut Node,
    env: &mut Env,
    assume: bool,
    trace: &mut TraceCollector,
) -> Result<usize, CompileError> {
    let mut changes = 0;
    match &stmt.kind {
        NodeKind::Assign { target } => {
            let target = target.clone();
            changes += infer_expr(&mut stmt.children[0], env, trace)?;
            let value_shape = stmt.children[0].shape.clone();
            if !assume && subtree_contains_full_escape(&stmt.children[0]) {
                env.clear();
            }
            env.insert(target, value_shape);
        }
        NodeKind::ExprStmt | NodeKind::Return => {
            for child in &mut stmt.children {
                changes += infer_expr(child, env, trace)?;
            }
            if !assume && subtree_contains_full_escape(stmt) {
                env.clear();
            }
        }
        NodeKind::If => {
            changes += infer_expr(&mut stmt.children[0], env, trace)?;
            if !assume && subtree_contains_full_escape(&stmt.children[0]) {
                env.clear();
            }
            let mut env_then = env.clone();
            let mut env_else = env.clone();
            changes += infer_block(&mut stmt.children[1], &mut env_then, assume, trace)?;
            changes += infer_block(&mut stmt.children[2], &mut env_else, assume, trace)?;
            *env = merge_branches(&env_then, &env_else);
        }
        NodeKind::While => {
            // The body may run any number of times; names it assigns are
            // unknown both inside the loop and after it.
            for name in assigned_names(&stmt.children[1]) {
                env.remove(&name);
            }
            changes += infer_expr(&mut stmt.children[0], env, trace)?;
            let mut env_body = env.clone();
            changes += infer_block(&mut stmt.children[1], &mut env_body, assume, trace)?;
            if !assume && subtree_contains_full_escape(stmt) {
                env.clear();
            }
        }
        NodeKind::Pass => {}
        _ => {
            changes += infer_expr(stmt, env, trace)?;
        }
    }
    Ok(changes)
}

fn infer_block(
    block: &mut Node,
    env: &mut Env,
    assume: bool,
    trace: &mut TraceCollector,
) -> Result<usize, CompileError> {
    let mut changes = 0;
    for stmt in &mut block.children {
        changes += infer_stmt(stmt, env, assume, trace)?;
    }
    Ok(changes)
}

/// Facts surviving an if/else merge: names bound in both branches join;
/// names bound in only one may be unbound on the other path and are
/// dropped.
fn merge_branches(then_env: &Env, else_env: &Env) -> Env {
    let mut merged = Env::default();
    for (name, then_shape) in then_env {
        if let Some(else_shape) = else_env.get(name) {
            let joined = then_shape.join(else_shape);
            if joined != Shape::Unknown {
                merged.insert(name.clone(), joined);
            }
        }
    }
    merged
}

/// All names assigned anywhere in the subtree, including nested suites.
fn assigned_names(node: &Node) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    node.visit(&mut |n| {
        if let NodeKind::Assign { target } = &n.kind {
            names.insert(target.clone());
        }
    });
    names
}

fn infer_expr(
    node: &mut Node,
    env: &Env,
    trace: &mut TraceCollector,
) -> Result<usize, CompileError> {
    let mut changes = 0;
    for child in &mut node.children {
        changes += infer_expr(child, env, trace)?;
    }

    let derived = derive_shape(node, env);
    match node.shape.refine(derived) {
        Ok(true) => {
            trace.record(PASS, node.location, TraceVerdict::Applied);
            changes += 1;
        }
        Ok(false) => {}
        Err(conflict) => {
            debug_assert!(false, "shape de-refinement: {}", conflict);
            return Err(CompileError::lattice_violation(
                conflict.to_string(),
                node.location,
            ));
        }
    }
    Ok(changes)
}

/// The type-level fact this node's kind and operand shapes support.
fn derive_shape(node: &Node, env: &Env) -> Shape {
    let child = |i: usize| node.children.get(i).map(|c| &c.shape);
    match &node.kind {
        NodeKind::Constant(_) => node.shape.clone(),
        NodeKind::Name { id } => env.get(id).cloned().unwrap_or(Shape::Unknown),
        NodeKind::Unary(op) => match child(0) {
            Some(operand) => unary_shape(*op, operand),
            None => Shape::Unknown,
        },
        NodeKind::Binary(op) => match (child(0), child(1)) {
            (Some(left), Some(right)) => binary_shape(*op, left, right),
            _ => Shape::Unknown,
        },
        NodeKind::Compare(op) => match (child(0), child(1)) {
            (Some(left), Some(right)) => match (left.exact_type(), right.exact_type()) {
                (Some(l), Some(r)) if op.is_equality() || comparable_types(l, r) => {
                    Shape::Exact(ValueType::Bool)
                }
                _ => Shape::Unknown,
            },
            _ => Shape::Unknown,
        },
        NodeKind::BoolChain(op) => match (child(0), child(1)) {
            (Some(left), Some(right)) => match left.constant_value() {
                Some(v) => {
                    let takes_left = match op {
                        BoolOpIR::And => !v.truthiness(),
                        BoolOpIR::Or => v.truthiness(),
                    };
                    if takes_left {
                        left.clone()
                    } else {
                        right.clone()
                    }
                }
                None => left.join(right),
            },
            _ => Shape::Unknown,
        },
        NodeKind::Call | NodeKind::Attribute { .. } | NodeKind::Starred => Shape::Unknown,
        NodeKind::Subscript => match (child(0), child(1)) {
            (Some(object), Some(index)) => subscript_shape(object, index),
            _ => Shape::Unknown,
        },
        NodeKind::BuildList => Shape::Exact(ValueType::List),
        NodeKind::BuildTuple => Shape::Exact(ValueType::Tuple),
        NodeKind::BuildSet => Shape::Exact(ValueType::Set),
        NodeKind::BuildDict => Shape::Exact(ValueType::Dict),
        NodeKind::IfExpr => match (child(0), child(1), child(2)) {
            (Some(test), Some(then), Some(orelse)) => match test.constant_value() {
                Some(v) => {
                    if v.truthiness() {
                        then.clone()
                    } else {
                        orelse.clone()
                    }
                }
                None => then.join(orelse),
            },
            _ => Shape::Unknown,
        },
        // Statements and terminals produce no value to constrain.
        _ => Shape::Unknown,
    }
}

fn unary_shape(op: UnaryOpIR, operand: &Shape) -> Shape {
    let Some(ty) = operand.exact_type() else {
        return Shape::Unknown;
    };
    match op {
        UnaryOpIR::Not => Shape::Exact(ValueType::Bool),
        UnaryOpIR::Neg | UnaryOpIR::Pos => match ty {
            ValueType::Int | ValueType::Bool => Shape::Exact(ValueType::Int),
            ValueType::Float => Shape::Exact(ValueType::Float),
            _ => Shape::Unknown,
        },
        UnaryOpIR::Invert => match ty {
            ValueType::Int | ValueType::Bool => Shape::Exact(ValueType::Int),
            _ => Shape::Unknown,
        },
    }
}

fn binary_shape(op: BinaryOpIR, left: &Shape, right: &Shape) -> Shape {
    let (Some(l), Some(r)) = (left.exact_type(), right.exact_type()) else {
        return Shape::Unknown;
    };

    if l.is_numeric() && r.is_numeric() {
        let has_float = l == ValueType::Float || r == ValueType::Float;
        return match op {
            BinaryOpIR::TrueDiv => Shape::Exact(ValueType::Float),
            BinaryOpIR::Add
            | BinaryOpIR::Sub
            | BinaryOpIR::Mul
            | BinaryOpIR::FloorDiv
            | BinaryOpIR::Mod => {
                if has_float {
                    Shape::Exact(ValueType::Float)
                } else {
                    Shape::Exact(ValueType::Int)
                }
            }
            BinaryOpIR::Pow => pow_shape(left, right, has_float),
            BinaryOpIR::BitAnd
            | BinaryOpIR::BitOr
            | BinaryOpIR::BitXor
            | BinaryOpIR::Shl
            | BinaryOpIR::Shr => {
                if has_float {
                    // Certain TypeError; the folder rewrites it.
                    Shape::Unknown
                } else {
                    Shape::Exact(ValueType::Int)
                }
            }
        };
    }

    let sequence = |ty: ValueType| {
        matches!(
            ty,
            ValueType::Str | ValueType::Bytes | ValueType::List | ValueType::Tuple
        )
    };
    match op {
        BinaryOpIR::Add if l == r && sequence(l) => Shape::Exact(l),
        BinaryOpIR::Mul if sequence(l) && matches!(r, ValueType::Int | ValueType::Bool) => {
            Shape::Exact(l)
        }
        BinaryOpIR::Mul if sequence(r) && matches!(l, ValueType::Int | ValueType::Bool) => {
            Shape::Exact(r)
        }
        _ => Shape::Unknown,
    }
}

/// `**` result typing. Int bases with non-negative integer exponents stay
/// int; a negative exponent produces a float; a float anywhere gives float
/// except that a negative base with a fractional exponent leaves the reals
/// entirely, so nothing is claimed.
fn pow_shape(left: &Shape, right: &Shape, has_float: bool) -> Shape {
    if has_float {
        let base_non_negative = match left.constant_value() {
            Some(ConstValue::Int(v)) => !num_traits::Signed::is_negative(v),
            Some(ConstValue::Float(v)) => *v >= 0.0,
            Some(ConstValue::Bool(_)) => true,
            _ => false,
        };
        return if base_non_negative {
            Shape::Exact(ValueType::Float)
        } else {
            Shape::Unknown
        };
    }
    match right.constant_value() {
        Some(ConstValue::Int(e)) => {
            if num_traits::Signed::is_negative(e) {
                Shape::Exact(ValueType::Float)
            } else {
                Shape::Exact(ValueType::Int)
            }
        }
        Some(ConstValue::Bool(_)) => Shape::Exact(ValueType::Int),
        _ => Shape::possible(TypeSet::of(&[ValueType::Int, ValueType::Float])),
    }
}

fn subscript_shape(object: &Shape, index: &Shape) -> Shape {
    let index_is_int = matches!(
        index.exact_type(),
        Some(ValueType::Int | ValueType::Bool)
    );
    match object.exact_type() {
        Some(ValueType::Str) if index_is_int => Shape::Exact(ValueType::Str),
        Some(ValueType::Bytes) if index_is_int => Shape::Exact(ValueType::Int),
        _ => Shape::Unknown,
    }
}
