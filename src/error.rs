//! Error types.
//!
//! Missing information is never an error: it is represented inside the lattice.
//! The variants below are internal-consistency violations that abort an analysis run.

use thiserror::Error;

use crate::cfg::{BlockId, NodeId};

/// Malformed control flow graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CfgError {
    #[error("unknown block {0}")]
    UnknownBlock(BlockId),

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("regular block {0} has no nodes")]
    EmptyRegularBlock(BlockId),

    #[error("block {0} has no successor")]
    MissingSuccessor(BlockId),

    #[error("node {node} is placed in both {first} and {second}")]
    NodeInTwoBlocks {
        node: NodeId,
        first: BlockId,
        second: BlockId,
    },

    #[error("node {0} is not placed in any block")]
    DetachedNode(NodeId),

    #[error("exception block {0} has no node")]
    EmptyExceptionBlock(BlockId),

    #[error("exception block {0} already holds a node")]
    ExceptionBlockFull(BlockId),

    #[error("block {0} cannot hold nodes")]
    NotANodeBlock(BlockId),

    #[error("node {node} reads {operand}, which is not evaluated before it")]
    OperandNotEvaluatedBefore { node: NodeId, operand: NodeId },
}

/// Invalid qualifier hierarchy declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("unknown qualifier `{0}`")]
    UnknownQualifier(String),

    #[error("qualifier `{0}` is declared twice")]
    DuplicateQualifier(String),

    #[error("subtype edges form a cycle through `{0}`")]
    Cycle(String),

    #[error("`{qualifier}` is not a subtype of the top qualifier `{top}`")]
    NotBelowTop { qualifier: String, top: String },

    #[error("the bottom qualifier `{bottom}` is not a subtype of `{qualifier}`")]
    NotAboveBottom { qualifier: String, bottom: String },

    #[error("`{0}` and `{1}` have no unique least upper bound")]
    NoUniqueLub(String, String),

    #[error("`{0}` and `{1}` have no unique greatest lower bound")]
    NoUniqueGlb(String, String),
}

/// Fatal failure of an analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Cfg(#[from] CfgError),

    #[error("widening is not supported by {store}")]
    WideningUnsupported { store: &'static str },

    #[error("{transfer} cannot handle node {node} ({kind})")]
    UnexpectedNode {
        transfer: &'static str,
        node: NodeId,
        kind: &'static str,
    },

    #[error("no exit block is reachable, backward analysis has no starting point")]
    NoReachableExit,

    #[error("{0}")]
    Internal(String),
}
