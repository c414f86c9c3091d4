//! Control flow graph: the input consumed by the analyses.
//!
//! A graph is an arena of [`Node`]s grouped into [`Block`]s. Blocks are connected by
//! regular, conditional (then/else) and exceptional (per cause) edges.

mod block;
mod builder;
mod graph;
mod node;

pub use block::{Block, BlockId, FlowRule, SpecialKind};
pub use builder::CfgBuilder;
pub use graph::{ControlFlowGraph, UnderlyingAst};
pub use node::{BinaryOp, ComparisonOp, Node, NodeId, NodeKind};
