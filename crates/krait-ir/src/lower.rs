//! # AST-to-IR lowering
//!
//! Builds the IR tree from a validated syntax tree, one node per syntactic
//! construct or via defined multi-node expansions (augmented assignment
//! becomes read + binary-op + write). Every lowered node carries its AST
//! source location and starts at the bottom of knowledge; the optimization
//! driver refines from there.

use krait_frontend::ast::{DisplayItem, ExprAst, ModuleAst, StmtAst};

use crate::node::{Node, NodeKind};
use crate::shape::ConstValue;

/// Lowers a validated module. Total: validation has already rejected
/// malformed parser output, and every AST construct has an IR form.
pub fn lower_module(module: &ModuleAst) -> Node {
    let body = lower_block(&module.body);
    let location = module
        .body
        .first()
        .map(StmtAst::location)
        .unwrap_or(krait_frontend::SourceLocation::UNKNOWN);
    Node::new(
        NodeKind::Module {
            name: module.name.clone(),
        },
        body,
        location,
    )
}

fn lower_block(body: &[StmtAst]) -> Vec<Node> {
    body.iter().map(lower_stmt).collect()
}

fn lower_stmt(stmt: &StmtAst) -> Node {
    match stmt {
        StmtAst::Assign {
            target,
            value,
            location,
        } => Node::new(
            NodeKind::Assign {
                target: target.clone(),
            },
            vec![lower_expr(value)],
            *location,
        ),
        StmtAst::AugAssign {
            target,
            op,
            value,
            location,
        } => {
            // x += e  ==>  x = x <op> e
            let read = Node::leaf(
                NodeKind::Name {
                    id: target.clone(),
                },
                *location,
            );
            let combined = Node::new(
                NodeKind::Binary((*op).into()),
                vec![read, lower_expr(value)],
                *location,
            );
            Node::new(
                NodeKind::Assign {
                    target: target.clone(),
                },
                vec![combined],
                *location,
            )
        }
        StmtAst::Expr { value, location } => {
            Node::new(NodeKind::ExprStmt, vec![lower_expr(value)], *location)
        }
        StmtAst::If {
            test,
            body,
            orelse,
            location,
        } => Node::new(
            NodeKind::If,
            vec![
                lower_expr(test),
                Node::new(NodeKind::Block, lower_block(body), *location),
                Node::new(NodeKind::Block, lower_block(orelse), *location),
            ],
            *location,
        ),
        StmtAst::While {
            test,
            body,
            location,
        } => Node::new(
            NodeKind::While,
            vec![
                lower_expr(test),
                Node::new(NodeKind::Block, lower_block(body), *location),
            ],
            *location,
        ),
        StmtAst::Return { value, location } => {
            let children = match value {
                Some(expr) => vec![lower_expr(expr)],
                None => vec![],
            };
            Node::new(NodeKind::Return, children, *location)
        }
        StmtAst::Pass { location } => Node::leaf(NodeKind::Pass, *location),
    }
}

fn lower_expr(expr: &ExprAst) -> Node {
    match expr {
        ExprAst::Int { value, location } => {
            Node::constant(ConstValue::Int(value.clone()), *location)
        }
        ExprAst::Float { value, location } => Node::constant(ConstValue::Float(*value), *location),
        ExprAst::Str { value, location } => {
            Node::constant(ConstValue::Str(value.clone()), *location)
        }
        ExprAst::Bytes { value, location } => {
            Node::constant(ConstValue::Bytes(value.clone()), *location)
        }
        ExprAst::Bool { value, location } => Node::constant(ConstValue::Bool(*value), *location),
        ExprAst::NoneLiteral { location } => Node::constant(ConstValue::None, *location),
        ExprAst::Name { id, location } => {
            Node::leaf(NodeKind::Name { id: id.clone() }, *location)
        }
        ExprAst::Unary {
            op,
            operand,
            location,
        } => Node::new(
            NodeKind::Unary((*op).into()),
            vec![lower_expr(operand)],
            *location,
        ),
        ExprAst::Binary {
            op,
            left,
            right,
            location,
        } => Node::new(
            NodeKind::Binary((*op).into()),
            vec![lower_expr(left), lower_expr(right)],
            *location,
        ),
        ExprAst::Compare {
            op,
            left,
            right,
            location,
        } => Node::new(
            NodeKind::Compare((*op).into()),
            vec![lower_expr(left), lower_expr(right)],
            *location,
        ),
        ExprAst::BoolChain {
            op,
            left,
            right,
            location,
        } => Node::new(
            NodeKind::BoolChain((*op).into()),
            vec![lower_expr(left), lower_expr(right)],
            *location,
        ),
        ExprAst::Call {
            func,
            args,
            location,
        } => {
            let mut children = Vec::with_capacity(args.len() + 1);
            children.push(lower_expr(func));
            children.extend(args.iter().map(lower_expr));
            Node::new(NodeKind::Call, children, *location)
        }
        ExprAst::Attribute {
            value,
            attr,
            location,
        } => Node::new(
            NodeKind::Attribute { name: attr.clone() },
            vec![lower_expr(value)],
            *location,
        ),
        ExprAst::Subscript {
            value,
            index,
            location,
        } => Node::new(
            NodeKind::Subscript,
            vec![lower_expr(value), lower_expr(index)],
            *location,
        ),
        ExprAst::List { elements, location } => Node::new(
            NodeKind::BuildList,
            lower_display_items(elements),
            *location,
        ),
        ExprAst::Tuple { elements, location } => Node::new(
            NodeKind::BuildTuple,
            lower_display_items(elements),
            *location,
        ),
        ExprAst::Set { elements, location } => Node::new(
            NodeKind::BuildSet,
            lower_display_items(elements),
            *location,
        ),
        ExprAst::Dict { entries, location } => {
            let mut children = Vec::with_capacity(entries.len() * 2);
            for (key, value) in entries {
                children.push(lower_expr(key));
                children.push(lower_expr(value));
            }
            Node::new(NodeKind::BuildDict, children, *location)
        }
        ExprAst::Conditional {
            test,
            body,
            orelse,
            location,
        } => Node::new(
            NodeKind::IfExpr,
            vec![lower_expr(test), lower_expr(body), lower_expr(orelse)],
            *location,
        ),
    }
}

fn lower_display_items(elements: &[DisplayItem]) -> Vec<Node> {
    elements
        .iter()
        .map(|element| match element {
            DisplayItem::Plain(expr) => lower_expr(expr),
            DisplayItem::Starred(expr) => {
                let inner = lower_expr(expr);
                let location = inner.location;
                Node::new(NodeKind::Starred, vec![inner], location)
            }
        })
        .collect()
}
