//! Shared syntax-tree builders for the integration test suite.
//!
//! The parser is external to this workspace, so tests construct input
//! trees directly; these helpers keep that terse.

use krait_frontend::ast::{
    BinaryOp, BoolOp, CompareOp, DisplayItem, ExprAst, ModuleAst, StmtAst, UnaryOp,
};
use krait_frontend::SourceLocation;
use num_bigint::BigInt;

pub fn loc(line: u32) -> SourceLocation {
    SourceLocation::new(line, 1)
}

pub fn int(v: i64, line: u32) -> ExprAst {
    ExprAst::Int {
        value: BigInt::from(v),
        location: loc(line),
    }
}

pub fn big(v: BigInt, line: u32) -> ExprAst {
    ExprAst::Int {
        value: v,
        location: loc(line),
    }
}

pub fn float(v: f64, line: u32) -> ExprAst {
    ExprAst::Float {
        value: v,
        location: loc(line),
    }
}

pub fn text(v: &str, line: u32) -> ExprAst {
    ExprAst::Str {
        value: v.into(),
        location: loc(line),
    }
}

pub fn boolean(v: bool, line: u32) -> ExprAst {
    ExprAst::Bool {
        value: v,
        location: loc(line),
    }
}

pub fn name(id: &str, line: u32) -> ExprAst {
    ExprAst::Name {
        id: id.into(),
        location: loc(line),
    }
}

pub fn bin(op: BinaryOp, left: ExprAst, right: ExprAst, line: u32) -> ExprAst {
    ExprAst::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        location: loc(line),
    }
}

pub fn cmp(op: CompareOp, left: ExprAst, right: ExprAst, line: u32) -> ExprAst {
    ExprAst::Compare {
        op,
        left: Box::new(left),
        right: Box::new(right),
        location: loc(line),
    }
}

pub fn unary(op: UnaryOp, operand: ExprAst, line: u32) -> ExprAst {
    ExprAst::Unary {
        op,
        operand: Box::new(operand),
        location: loc(line),
    }
}

pub fn chain(op: BoolOp, left: ExprAst, right: ExprAst, line: u32) -> ExprAst {
    ExprAst::BoolChain {
        op,
        left: Box::new(left),
        right: Box::new(right),
        location: loc(line),
    }
}

pub fn call(func: ExprAst, args: Vec<ExprAst>, line: u32) -> ExprAst {
    ExprAst::Call {
        func: Box::new(func),
        args,
        location: loc(line),
    }
}

pub fn list(elements: Vec<ExprAst>, line: u32) -> ExprAst {
    ExprAst::List {
        elements: elements.into_iter().map(DisplayItem::Plain).collect(),
        location: loc(line),
    }
}

pub fn subscript(value: ExprAst, index: ExprAst, line: u32) -> ExprAst {
    ExprAst::Subscript {
        value: Box::new(value),
        index: Box::new(index),
        location: loc(line),
    }
}

pub fn assign(target: &str, value: ExprAst, line: u32) -> StmtAst {
    StmtAst::Assign {
        target: target.into(),
        value,
        location: loc(line),
    }
}

pub fn expr_stmt(value: ExprAst, line: u32) -> StmtAst {
    StmtAst::Expr {
        value,
        location: loc(line),
    }
}

pub fn module(body: Vec<StmtAst>) -> ModuleAst {
    ModuleAst {
        name: "test_module".into(),
        body,
    }
}
