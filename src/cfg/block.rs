//! Basic blocks and their successor topology.

use std::collections::BTreeMap;
use std::fmt;

use super::node::NodeId;

/// A block identifier: index into the block arena of a [`ControlFlowGraph`][super::ControlFlowGraph].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BlockId(u32);

impl BlockId {
    /// Creates a block id from a raw index.
    pub fn new(index: u32) -> Self {
        BlockId(index)
    }

    /// Returns the arena index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Which stores flow along an edge.
///
/// A predecessor may provide a regular store or a pair of then/else stores
/// (after a boolean test). The rule decides how those reach the successor.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum FlowRule {
    /// Then store flows to the then store, else to else (or the regular store to both).
    #[default]
    EachToEach,
    /// The then store flows to both stores of the successor.
    ThenToBoth,
    /// The else store flows to both stores of the successor.
    ElseToBoth,
    /// Only the then store flows, into the then store.
    ThenToThen,
    /// Only the else store flows, into the else store.
    ElseToElse,
}

impl fmt::Display for FlowRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowRule::EachToEach => "EACH_TO_EACH",
            FlowRule::ThenToBoth => "THEN_TO_BOTH",
            FlowRule::ElseToBoth => "ELSE_TO_BOTH",
            FlowRule::ThenToThen => "THEN_TO_THEN",
            FlowRule::ElseToElse => "ELSE_TO_ELSE",
        };
        write!(f, "{}", name)
    }
}

/// Kinds of special (empty) blocks.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SpecialKind {
    Entry,
    Exit,
    ExceptionalExit,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Block {
    /// A non-empty straight-line sequence of nodes.
    Regular {
        nodes: Vec<NodeId>,
        successor: Option<BlockId>,
        flow_rule: FlowRule,
    },
    /// A two-way branch on the outcome of the preceding boolean node.
    Conditional {
        then_successor: Option<BlockId>,
        else_successor: Option<BlockId>,
        then_flow_rule: FlowRule,
        else_flow_rule: FlowRule,
    },
    /// A single node that may throw, with one edge per exception cause.
    Exception {
        node: Option<NodeId>,
        successor: Option<BlockId>,
        flow_rule: FlowRule,
        exceptional_successors: BTreeMap<String, Vec<BlockId>>,
    },
    Special {
        kind: SpecialKind,
        successor: Option<BlockId>,
        flow_rule: FlowRule,
    },
}

impl Block {
    pub fn regular() -> Self {
        Block::Regular {
            nodes: Vec::new(),
            successor: None,
            flow_rule: FlowRule::EachToEach,
        }
    }

    pub fn conditional() -> Self {
        Block::Conditional {
            then_successor: None,
            else_successor: None,
            then_flow_rule: FlowRule::ThenToBoth,
            else_flow_rule: FlowRule::ElseToBoth,
        }
    }

    pub fn exception() -> Self {
        Block::Exception {
            node: None,
            successor: None,
            flow_rule: FlowRule::EachToEach,
            exceptional_successors: BTreeMap::new(),
        }
    }

    pub fn special(kind: SpecialKind) -> Self {
        Block::Special {
            kind,
            successor: None,
            flow_rule: FlowRule::EachToEach,
        }
    }

    /// Nodes of the block, in execution order.
    pub fn nodes(&self) -> &[NodeId] {
        match self {
            Block::Regular { nodes, .. } => nodes,
            Block::Exception { node: Some(node), .. } => std::slice::from_ref(node),
            _ => &[],
        }
    }

    pub fn first_node(&self) -> Option<NodeId> {
        self.nodes().first().copied()
    }

    pub fn last_node(&self) -> Option<NodeId> {
        self.nodes().last().copied()
    }

    /// All successors: regular, then/else, and exceptional ones.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Block::Regular { successor, .. } | Block::Special { successor, .. } => successor.iter().copied().collect(),
            Block::Conditional {
                then_successor,
                else_successor,
                ..
            } => then_successor.iter().chain(else_successor).copied().collect(),
            Block::Exception {
                successor,
                exceptional_successors,
                ..
            } => successor
                .iter()
                .copied()
                .chain(exceptional_successors.values().flatten().copied())
                .collect(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Block::Regular { .. } => "REGULAR_BLOCK",
            Block::Conditional { .. } => "CONDITIONAL_BLOCK",
            Block::Exception { .. } => "EXCEPTION_BLOCK",
            Block::Special { .. } => "SPECIAL_BLOCK",
        }
    }
}
