//! # IR node graph
//!
//! The mutable tree of expression and statement nodes between lowering and
//! code generation. Every node owns its children; the IR is a tree, never a
//! DAG, which keeps in-place rewriting unambiguous. The single rewrite
//! primitive is [`Node::replace_with`]: all optimization passes are
//! expressed as applications of it plus local shape/escape refinement.

use std::fmt;

use krait_frontend::ast;
use krait_frontend::SourceLocation;

use crate::errors::CompileError;
use crate::escape::EscapeDescriptor;
use crate::shape::{ConstValue, Shape};

/// Unary operators in IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOpIR {
    Neg,
    Pos,
    Not,
    Invert,
}

impl From<ast::UnaryOp> for UnaryOpIR {
    fn from(value: ast::UnaryOp) -> Self {
        match value {
            ast::UnaryOp::Neg => Self::Neg,
            ast::UnaryOp::Pos => Self::Pos,
            ast::UnaryOp::Not => Self::Not,
            ast::UnaryOp::Invert => Self::Invert,
        }
    }
}

impl UnaryOpIR {
    /// Source-level spelling, used in runtime-error messages.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Pos => "+",
            Self::Not => "not",
            Self::Invert => "~",
        }
    }
}

/// Binary arithmetic and bitwise operators in IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOpIR {
    Add,
    Sub,
    Mul,
    TrueDiv,
    FloorDiv,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl From<ast::BinaryOp> for BinaryOpIR {
    fn from(value: ast::BinaryOp) -> Self {
        match value {
            ast::BinaryOp::Add => Self::Add,
            ast::BinaryOp::Sub => Self::Sub,
            ast::BinaryOp::Mul => Self::Mul,
            ast::BinaryOp::TrueDiv => Self::TrueDiv,
            ast::BinaryOp::FloorDiv => Self::FloorDiv,
            ast::BinaryOp::Mod => Self::Mod,
            ast::BinaryOp::Pow => Self::Pow,
            ast::BinaryOp::BitAnd => Self::BitAnd,
            ast::BinaryOp::BitOr => Self::BitOr,
            ast::BinaryOp::BitXor => Self::BitXor,
            ast::BinaryOp::Shl => Self::Shl,
            ast::BinaryOp::Shr => Self::Shr,
        }
    }
}

impl BinaryOpIR {
    /// Source-level spelling, used in runtime-error messages.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::TrueDiv => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::Shl => "<<",
            Self::Shr => ">>",
        }
    }

    /// True for `/`, `//`, and `%`, which raise on a zero divisor.
    pub fn divides(self) -> bool {
        matches!(self, Self::TrueDiv | Self::FloorDiv | Self::Mod)
    }
}

/// Comparison operators in IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOpIR {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

impl From<ast::CompareOp> for CompareOpIR {
    fn from(value: ast::CompareOp) -> Self {
        match value {
            ast::CompareOp::Eq => Self::Eq,
            ast::CompareOp::NotEq => Self::NotEq,
            ast::CompareOp::Lt => Self::Lt,
            ast::CompareOp::LtE => Self::LtE,
            ast::CompareOp::Gt => Self::Gt,
            ast::CompareOp::GtE => Self::GtE,
        }
    }
}

impl CompareOpIR {
    /// True for `==`/`!=`, which never raise on builtin operands.
    pub fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::NotEq)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
        }
    }
}

/// Short-circuit boolean operators in IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOpIR {
    And,
    Or,
}

impl From<ast::BoolOp> for BoolOpIR {
    fn from(value: ast::BoolOp) -> Self {
        match value {
            ast::BoolOp::And => Self::And,
            ast::BoolOp::Or => Self::Or,
        }
    }
}

/// The closed set of runtime exceptions a guaranteed-error terminal can
/// name. Coarse by design: the escape model only distinguishes "raises"
/// from "cannot raise", not a full exception-type lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    ZeroDivision,
    Type,
    Index,
    Key,
    Value,
    Name,
}

impl RuntimeErrorKind {
    /// The runtime exception class name.
    pub fn class_name(self) -> &'static str {
        match self {
            Self::ZeroDivision => "ZeroDivisionError",
            Self::Type => "TypeError",
            Self::Index => "IndexError",
            Self::Key => "KeyError",
            Self::Value => "ValueError",
            Self::Name => "NameError",
        }
    }
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Expected child count for a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
    /// Any even count (dict constructions store alternating key/value).
    EvenCount,
    Any,
}

impl Arity {
    pub fn admits(self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::EvenCount => count % 2 == 0,
            Arity::Any => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "exactly {}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
            Arity::EvenCount => write!(f, "an even number of"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// The kind of an IR node, with the child layout each kind implies.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Module root. Children: top-level statements.
    Module { name: String },
    /// Statement sequence (an `if`/`while` suite). Children: statements.
    Block,
    /// Assignment to a name. Children: `[value]`.
    Assign { target: String },
    /// Expression evaluated for effect. Children: `[value]`.
    ExprStmt,
    /// Conditional statement. Children: `[test, then-block, else-block]`.
    If,
    /// Loop. Children: `[test, body-block]`.
    While,
    /// Return. Children: `[value]` or `[]` for a bare `return`.
    Return,
    /// No-op statement. No children.
    Pass,
    /// A compile-time-known value. No children.
    Constant(ConstValue),
    /// A name reference. No children.
    Name { id: String },
    /// Unary operation. Children: `[operand]`.
    Unary(UnaryOpIR),
    /// Binary operation. Children: `[left, right]`.
    Binary(BinaryOpIR),
    /// Comparison. Children: `[left, right]`.
    Compare(CompareOpIR),
    /// Short-circuit boolean operation. Children: `[left, right]`.
    BoolChain(BoolOpIR),
    /// Call. Children: `[callee, args...]`.
    Call,
    /// Attribute access. Children: `[object]`.
    Attribute { name: String },
    /// Subscript. Children: `[object, index]`.
    Subscript,
    /// List construction. Children: elements, possibly `Starred`.
    BuildList,
    /// Tuple construction. Children: elements, possibly `Starred`.
    BuildTuple,
    /// Set construction. Children: elements, possibly `Starred`.
    BuildSet,
    /// Dict construction. Children: alternating `[k, v, k, v, ...]`.
    BuildDict,
    /// Iterable-unpacking element inside a construction. Children:
    /// `[iterable]`.
    Starred,
    /// Conditional expression. Children: `[test, then, else]`.
    IfExpr,
    /// Guaranteed-runtime-error terminal: evaluation certainly raises.
    /// Produced by rewrites of statically proven failures. No children.
    RaiseError {
        error: RuntimeErrorKind,
        message: String,
    },
}

impl NodeKind {
    /// The child count this kind requires.
    pub fn arity(&self) -> Arity {
        match self {
            NodeKind::Module { .. } | NodeKind::Block => Arity::Any,
            NodeKind::Assign { .. } | NodeKind::ExprStmt => Arity::Exactly(1),
            NodeKind::If => Arity::Exactly(3),
            NodeKind::While => Arity::Exactly(2),
            NodeKind::Return => Arity::AtLeast(0),
            NodeKind::Pass => Arity::Exactly(0),
            NodeKind::Constant(_) => Arity::Exactly(0),
            NodeKind::Name { .. } => Arity::Exactly(0),
            NodeKind::Unary(_) => Arity::Exactly(1),
            NodeKind::Binary(_) | NodeKind::Compare(_) | NodeKind::BoolChain(_) => {
                Arity::Exactly(2)
            }
            NodeKind::Call => Arity::AtLeast(1),
            NodeKind::Attribute { .. } => Arity::Exactly(1),
            NodeKind::Subscript => Arity::Exactly(2),
            NodeKind::BuildList | NodeKind::BuildTuple | NodeKind::BuildSet => Arity::Any,
            NodeKind::BuildDict => Arity::EvenCount,
            NodeKind::Starred => Arity::Exactly(1),
            NodeKind::IfExpr => Arity::Exactly(3),
            NodeKind::RaiseError { .. } => Arity::Exactly(0),
        }
    }

    /// Short kind label for diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Module { .. } => "module",
            NodeKind::Block => "block",
            NodeKind::Assign { .. } => "assign",
            NodeKind::ExprStmt => "expr-stmt",
            NodeKind::If => "if",
            NodeKind::While => "while",
            NodeKind::Return => "return",
            NodeKind::Pass => "pass",
            NodeKind::Constant(_) => "constant",
            NodeKind::Name { .. } => "name",
            NodeKind::Unary(_) => "unary",
            NodeKind::Binary(_) => "binary",
            NodeKind::Compare(_) => "compare",
            NodeKind::BoolChain(_) => "bool-chain",
            NodeKind::Call => "call",
            NodeKind::Attribute { .. } => "attribute",
            NodeKind::Subscript => "subscript",
            NodeKind::BuildList => "build-list",
            NodeKind::BuildTuple => "build-tuple",
            NodeKind::BuildSet => "build-set",
            NodeKind::BuildDict => "build-dict",
            NodeKind::Starred => "starred",
            NodeKind::IfExpr => "if-expr",
            NodeKind::RaiseError { .. } => "raise-error",
        }
    }

    /// True for kinds that may carry starred children.
    fn admits_starred_children(&self) -> bool {
        matches!(
            self,
            NodeKind::BuildList | NodeKind::BuildTuple | NodeKind::BuildSet
        )
    }
}

/// A node of the IR tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Owned children, ordered; layout dictated by `kind`.
    pub children: Vec<Node>,
    /// Abstract-type fact, refined monotonically across passes.
    pub shape: Shape,
    /// Control-flow escape fact, refined monotonically across passes.
    pub escape: EscapeDescriptor,
    /// Container-specialization index: the statically known element count
    /// stamped by the folder, consumed by code-spec queries.
    pub arity_hint: Option<u32>,
    /// Where the construct came from. Immutable; synthesized replacements
    /// inherit it through [`Node::replace_with`].
    pub location: SourceLocation,
}

impl Node {
    /// A node with children, starting at the bottom of knowledge: shape
    /// unknown, escape maximal.
    pub fn new(kind: NodeKind, children: Vec<Node>, location: SourceLocation) -> Self {
        Self {
            kind,
            children,
            shape: Shape::Unknown,
            escape: EscapeDescriptor::FullEscape,
            arity_hint: None,
            location,
        }
    }

    /// A childless node.
    pub fn leaf(kind: NodeKind, location: SourceLocation) -> Self {
        Self::new(kind, Vec::new(), location)
    }

    /// A constant leaf. Its shape is `Constant(value)` from birth and a
    /// constant can neither raise nor touch outer state.
    pub fn constant(value: ConstValue, location: SourceLocation) -> Self {
        Self {
            shape: Shape::Constant(value.clone()),
            kind: NodeKind::Constant(value),
            children: Vec::new(),
            escape: EscapeDescriptor::NoEscape,
            arity_hint: None,
            location,
        }
    }

    /// A guaranteed-runtime-error terminal.
    pub fn raise_error(
        error: RuntimeErrorKind,
        message: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Self {
            kind: NodeKind::RaiseError {
                error,
                message: message.into(),
            },
            children: Vec::new(),
            shape: Shape::Unknown,
            escape: EscapeDescriptor::FullEscape,
            arity_hint: None,
            location,
        }
    }

    /// The single rewrite primitive: replace the subtree rooted here with a
    /// newly constructed subtree. Parent linkage is untouched (the node
    /// stays in place); the original source location is preserved unless
    /// the replacement explicitly carries its own.
    pub fn replace_with(&mut self, mut replacement: Node) {
        if replacement.location.is_unknown() {
            replacement.location = self.location;
        }
        *self = replacement;
    }

    /// Post-order traversal over the subtree, including this node.
    pub fn visit<F: FnMut(&Node)>(&self, f: &mut F) {
        for child in &self.children {
            child.visit(f);
        }
        f(self);
    }

    /// Node count of the subtree.
    pub fn size(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |_| count += 1);
        count
    }

    /// Finds a descendant (or this node) by predicate, pre-order.
    pub fn find(&self, predicate: &dyn Fn(&Node) -> bool) -> Option<&Node> {
        if predicate(self) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(predicate))
    }
}

/// Checks the structural invariants of a whole tree: child arity per kind,
/// starred elements only inside list/tuple/set constructions, and the
/// module kind only at the root.
///
/// Run after lowering and (in debug builds) after every sweep; a violation
/// is a defect in lowering or in a rewrite, reported as fatal.
pub fn validate_tree(root: &Node) -> Result<(), CompileError> {
    if !matches!(root.kind, NodeKind::Module { .. }) {
        return Err(CompileError::structural(
            format!("tree root must be a module, found {}", root.kind.label()),
            root.location,
        ));
    }
    validate_node(root)
}

fn validate_node(node: &Node) -> Result<(), CompileError> {
    let arity = node.kind.arity();
    if !arity.admits(node.children.len()) {
        return Err(CompileError::structural(
            format!(
                "{} node expects {} children, found {}",
                node.kind.label(),
                arity,
                node.children.len()
            ),
            node.location,
        ));
    }
    if matches!(node.kind, NodeKind::Return) && node.children.len() > 1 {
        return Err(CompileError::structural(
            format!("return node expects 0 or 1 children, found {}", node.children.len()),
            node.location,
        ));
    }
    for child in &node.children {
        if matches!(child.kind, NodeKind::Module { .. }) {
            return Err(CompileError::structural(
                "module node nested below the root",
                child.location,
            ));
        }
        if matches!(child.kind, NodeKind::Starred) && !node.kind.admits_starred_children() {
            return Err(CompileError::structural(
                format!("starred element under {} node", node.kind.label()),
                child.location,
            ));
        }
        validate_node(child)?;
    }
    Ok(())
}
