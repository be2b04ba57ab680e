//! # Abstract Syntax Tree
//!
//! This module defines the syntax-tree data structures the external parser
//! produces and the IR core consumes. The tree is unannotated: no type or
//! data-flow facts, just syntactic structure with source locations.
//!
//! ## Structure
//!
//! A module is a named sequence of statements. Statements cover assignment
//! (plain and augmented), expression statements, `if`/`else`, `while`,
//! `return`, and `pass`. Expressions cover:
//! - Literals: arbitrary-precision integers, floats, strings, bytes,
//!   booleans, `None`
//! - Name references, attribute access, subscripts, calls
//! - Unary, binary, comparison, and short-circuit boolean operations
//! - List / tuple / set / dict displays, with starred (unpacking) elements
//! - Conditional (ternary) expressions
//!
//! Integer literals are stored as parsed `BigInt` values, never as native
//! machine integers, so downstream folding reproduces exact runtime
//! arithmetic.

use num_bigint::BigInt;

use crate::errors::SourceLocation;

/// The root of a parsed module.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleAst {
    /// The module name (import path leaf).
    pub name: String,
    /// Top-level statements in source order.
    pub body: Vec<StmtAst>,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation (`-x`).
    Neg,
    /// Arithmetic identity (`+x`).
    Pos,
    /// Logical negation (`not x`).
    Not,
    /// Bitwise inversion (`~x`).
    Invert,
}

/// Binary arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// True division (`/`), always producing a float for numeric operands.
    TrueDiv,
    /// Floor division (`//`).
    FloorDiv,
    /// Modulo with the sign of the divisor (`%`).
    Mod,
    /// Exponentiation (`**`).
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

/// Short-circuit boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// An element of a list/tuple/set display.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayItem {
    /// A single element expression.
    Plain(ExprAst),
    /// A starred element (`*xs`) unpacked into the container, making the
    /// final element count statically unknown.
    Starred(ExprAst),
}

impl DisplayItem {
    /// The wrapped expression, starred or not.
    pub fn expr(&self) -> &ExprAst {
        match self {
            Self::Plain(expr) | Self::Starred(expr) => expr,
        }
    }

    pub fn is_starred(&self) -> bool {
        matches!(self, Self::Starred(_))
    }
}

/// Expression AST.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprAst {
    /// Arbitrary-precision integer literal.
    Int {
        value: BigInt,
        location: SourceLocation,
    },
    /// Float literal. The parser only produces finite values.
    Float {
        value: f64,
        location: SourceLocation,
    },
    /// String literal.
    Str {
        value: String,
        location: SourceLocation,
    },
    /// Bytes literal.
    Bytes {
        value: Vec<u8>,
        location: SourceLocation,
    },
    /// Boolean literal.
    Bool {
        value: bool,
        location: SourceLocation,
    },
    /// The `None` literal.
    NoneLiteral { location: SourceLocation },
    /// A name reference.
    Name {
        id: String,
        location: SourceLocation,
    },
    /// A unary operation.
    Unary {
        op: UnaryOp,
        operand: Box<ExprAst>,
        location: SourceLocation,
    },
    /// A binary operation.
    Binary {
        op: BinaryOp,
        left: Box<ExprAst>,
        right: Box<ExprAst>,
        location: SourceLocation,
    },
    /// A comparison.
    Compare {
        op: CompareOp,
        left: Box<ExprAst>,
        right: Box<ExprAst>,
        location: SourceLocation,
    },
    /// A short-circuit boolean operation.
    BoolChain {
        op: BoolOp,
        left: Box<ExprAst>,
        right: Box<ExprAst>,
        location: SourceLocation,
    },
    /// A call with positional arguments.
    Call {
        func: Box<ExprAst>,
        args: Vec<ExprAst>,
        location: SourceLocation,
    },
    /// Attribute access (`obj.attr`).
    Attribute {
        value: Box<ExprAst>,
        attr: String,
        location: SourceLocation,
    },
    /// Subscript access (`obj[index]`).
    Subscript {
        value: Box<ExprAst>,
        index: Box<ExprAst>,
        location: SourceLocation,
    },
    /// A list display (`[a, b, *c]`).
    List {
        elements: Vec<DisplayItem>,
        location: SourceLocation,
    },
    /// A tuple display (`(a, b, *c)`).
    Tuple {
        elements: Vec<DisplayItem>,
        location: SourceLocation,
    },
    /// A set display (`{a, b, *c}`).
    Set {
        elements: Vec<DisplayItem>,
        location: SourceLocation,
    },
    /// A dict display (`{k: v, ...}`).
    Dict {
        entries: Vec<(ExprAst, ExprAst)>,
        location: SourceLocation,
    },
    /// A conditional expression (`body if test else orelse`).
    Conditional {
        test: Box<ExprAst>,
        body: Box<ExprAst>,
        orelse: Box<ExprAst>,
        location: SourceLocation,
    },
}

impl ExprAst {
    /// The source location of this expression.
    pub fn location(&self) -> SourceLocation {
        match self {
            Self::Int { location, .. }
            | Self::Float { location, .. }
            | Self::Str { location, .. }
            | Self::Bytes { location, .. }
            | Self::Bool { location, .. }
            | Self::NoneLiteral { location }
            | Self::Name { location, .. }
            | Self::Unary { location, .. }
            | Self::Binary { location, .. }
            | Self::Compare { location, .. }
            | Self::BoolChain { location, .. }
            | Self::Call { location, .. }
            | Self::Attribute { location, .. }
            | Self::Subscript { location, .. }
            | Self::List { location, .. }
            | Self::Tuple { location, .. }
            | Self::Set { location, .. }
            | Self::Dict { location, .. }
            | Self::Conditional { location, .. } => *location,
        }
    }
}

/// Statement AST.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtAst {
    /// Plain assignment to a name (`x = expr`).
    Assign {
        target: String,
        value: ExprAst,
        location: SourceLocation,
    },
    /// Augmented assignment (`x += expr`), expanded during lowering into
    /// read + binary-op + write.
    AugAssign {
        target: String,
        op: BinaryOp,
        value: ExprAst,
        location: SourceLocation,
    },
    /// An expression evaluated for its effects.
    Expr {
        value: ExprAst,
        location: SourceLocation,
    },
    /// An `if`/`else` statement. `elif` chains arrive nested in `orelse`.
    If {
        test: ExprAst,
        body: Vec<StmtAst>,
        orelse: Vec<StmtAst>,
        location: SourceLocation,
    },
    /// A `while` loop.
    While {
        test: ExprAst,
        body: Vec<StmtAst>,
        location: SourceLocation,
    },
    /// A `return` statement.
    Return {
        value: Option<ExprAst>,
        location: SourceLocation,
    },
    /// A `pass` statement.
    Pass { location: SourceLocation },
}

impl StmtAst {
    /// The source location of this statement.
    pub fn location(&self) -> SourceLocation {
        match self {
            Self::Assign { location, .. }
            | Self::AugAssign { location, .. }
            | Self::Expr { location, .. }
            | Self::If { location, .. }
            | Self::While { location, .. }
            | Self::Return { location, .. }
            | Self::Pass { location } => *location,
        }
    }
}
