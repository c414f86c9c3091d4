//! Instruction-level units of a control flow graph.

use std::fmt;

use super::block::BlockId;

/// A node identifier: index into the node arena of a [`ControlFlowGraph`][super::ControlFlowGraph].
///
/// Node identity is by id. Structural ("same expression") comparison goes through
/// [`Expression`][crate::expression::Expression] instead.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a node id from a raw index.
    pub fn new(index: u32) -> Self {
        NodeId(index)
    }

    /// Returns the arena index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<NodeId> for usize {
    fn from(id: NodeId) -> Self {
        id.index()
    }
}

/// Arithmetic operators.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}

/// Comparison operators.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "==",
            ComparisonOp::Ne => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
        }
    }
}

/// The kind of a node, with its operands.
///
/// Operands are ids of nodes evaluated earlier in the graph.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum NodeKind {
    LocalVariable(String),
    IntegerLiteral(i64),
    BooleanLiteral(bool),
    StringLiteral(String),
    NullLiteral,
    FieldAccess {
        receiver: NodeId,
        field: String,
    },
    Assignment {
        target: NodeId,
        expression: NodeId,
    },
    Binary {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Comparison {
        op: ComparisonOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    ConditionalNot(NodeId),
    MethodInvocation {
        method: String,
        receiver: Option<NodeId>,
        arguments: Vec<NodeId>,
    },
    Return(Option<NodeId>),
    /// No-op node carrying a label, e.g. the start of a loop.
    Marker(String),
}

impl NodeKind {
    /// Short name of the kind, used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::LocalVariable(_) => "local variable",
            NodeKind::IntegerLiteral(_) => "integer literal",
            NodeKind::BooleanLiteral(_) => "boolean literal",
            NodeKind::StringLiteral(_) => "string literal",
            NodeKind::NullLiteral => "null literal",
            NodeKind::FieldAccess { .. } => "field access",
            NodeKind::Assignment { .. } => "assignment",
            NodeKind::Binary { .. } => "binary operation",
            NodeKind::Comparison { .. } => "comparison",
            NodeKind::ConditionalNot(_) => "conditional not",
            NodeKind::MethodInvocation { .. } => "method invocation",
            NodeKind::Return(_) => "return",
            NodeKind::Marker(_) => "marker",
        }
    }

    /// Immediate operands, in evaluation order.
    pub fn operands(&self) -> Vec<NodeId> {
        match self {
            NodeKind::LocalVariable(_)
            | NodeKind::IntegerLiteral(_)
            | NodeKind::BooleanLiteral(_)
            | NodeKind::StringLiteral(_)
            | NodeKind::NullLiteral
            | NodeKind::Marker(_) => vec![],
            NodeKind::FieldAccess { receiver, .. } => vec![*receiver],
            NodeKind::Assignment { target, expression } => vec![*target, *expression],
            NodeKind::Binary { lhs, rhs, .. } | NodeKind::Comparison { lhs, rhs, .. } => vec![*lhs, *rhs],
            NodeKind::ConditionalNot(operand) => vec![*operand],
            NodeKind::MethodInvocation { receiver, arguments, .. } => receiver.iter().chain(arguments).copied().collect(),
            NodeKind::Return(result) => result.iter().copied().collect(),
        }
    }
}

/// A node of the control flow graph.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Block holding this node. `None` only while the graph is being built.
    pub block: Option<BlockId>,
    /// Whether the node is written to rather than evaluated (an assignment target).
    pub lvalue: bool,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            block: None,
            lvalue: false,
        }
    }

    pub fn is_lvalue(&self) -> bool {
        self.lvalue
    }
}
