use std::fmt;

use super::block::{Block, BlockId, SpecialKind};
use super::node::{Node, NodeId, NodeKind};
use crate::expression::Expression;

/// The code a control flow graph was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnderlyingAst {
    Method { name: String, parameters: Vec<String> },
    Lambda { parameters: Vec<String> },
    /// A field initializer or an initializer block: no parameters.
    Arbitrary,
}

impl UnderlyingAst {
    /// Formal parameter names, in declaration order.
    pub fn parameters(&self) -> &[String] {
        match self {
            UnderlyingAst::Method { parameters, .. } | UnderlyingAst::Lambda { parameters } => parameters,
            UnderlyingAst::Arbitrary => &[],
        }
    }
}

/// A control flow graph over an arena of nodes and blocks.
///
/// Graphs are produced by [`CfgBuilder`][super::CfgBuilder], which validates that every
/// id stored in the graph refers to an element of the graph. Passing an id obtained
/// from another graph to any accessor panics.
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) blocks: Vec<Block>,
    pub(crate) predecessors: Vec<Vec<BlockId>>,
    pub(crate) entry: BlockId,
    pub(crate) regular_exit: BlockId,
    pub(crate) exceptional_exit: BlockId,
    pub(crate) ast: UnderlyingAst,
}

impl ControlFlowGraph {
    pub fn underlying_ast(&self) -> &UnderlyingAst {
        &self.ast
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// Block holding the node.
    pub fn block_of(&self, id: NodeId) -> BlockId {
        // `build` rejects detached nodes.
        self.node(id).block.unwrap_or(self.entry)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(|i| NodeId::new(i as u32))
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (BlockId::new(i as u32), b))
    }

    pub fn entry_block(&self) -> BlockId {
        self.entry
    }

    pub fn regular_exit_block(&self) -> BlockId {
        self.regular_exit
    }

    pub fn exceptional_exit_block(&self) -> BlockId {
        self.exceptional_exit
    }

    pub fn successors(&self, id: BlockId) -> Vec<BlockId> {
        self.block(id).successors()
    }

    pub fn predecessors(&self, id: BlockId) -> &[BlockId] {
        &self.predecessors[id.index()]
    }

    /// All return nodes, in arena order.
    pub fn return_nodes(&self) -> Vec<NodeId> {
        self.node_ids()
            .filter(|&id| matches!(self.node(id).kind, NodeKind::Return(_)))
            .collect()
    }

    /// Blocks reachable from the entry, in depth-first order (reverse postorder).
    ///
    /// In this order every block comes before its successors, except along back edges.
    pub fn depth_first_order(&self) -> Vec<BlockId> {
        let mut visited = vec![false; self.blocks.len()];
        let mut postorder = Vec::with_capacity(self.blocks.len());
        // Stack of (block, index of the next successor to visit).
        let mut stack: Vec<(BlockId, usize)> = vec![(self.entry, 0)];
        visited[self.entry.index()] = true;

        while let Some(top) = stack.last_mut() {
            let block = top.0;
            let successors = self.successors(block);
            if let Some(&succ) = successors.get(top.1) {
                top.1 += 1;
                if !visited[succ.index()] {
                    visited[succ.index()] = true;
                    stack.push((succ, 0));
                }
            } else {
                postorder.push(block);
                stack.pop();
            }
        }

        postorder.reverse();
        postorder
    }

    /// Structural rendering of the subtree rooted at `id`.
    pub fn expression(&self, id: NodeId) -> Expression {
        match &self.node(id).kind {
            NodeKind::LocalVariable(name) => Expression::Local(name.clone()),
            NodeKind::IntegerLiteral(n) => Expression::Integer(*n),
            NodeKind::BooleanLiteral(b) => Expression::Boolean(*b),
            NodeKind::StringLiteral(s) => Expression::Str(s.clone()),
            NodeKind::NullLiteral => Expression::Null,
            NodeKind::FieldAccess { receiver, field } => Expression::field(self.expression(*receiver), field.clone()),
            NodeKind::Assignment { target, expression } => Expression::Assignment {
                target: Box::new(self.expression(*target)),
                value: Box::new(self.expression(*expression)),
            },
            NodeKind::Binary { op, lhs, rhs } => Expression::Binary {
                op: *op,
                lhs: Box::new(self.expression(*lhs)),
                rhs: Box::new(self.expression(*rhs)),
            },
            NodeKind::Comparison { op, lhs, rhs } => Expression::Comparison {
                op: *op,
                lhs: Box::new(self.expression(*lhs)),
                rhs: Box::new(self.expression(*rhs)),
            },
            NodeKind::ConditionalNot(operand) => Expression::Not(Box::new(self.expression(*operand))),
            NodeKind::MethodInvocation {
                method,
                receiver,
                arguments,
            } => Expression::MethodCall {
                method: method.clone(),
                receiver: receiver.map(|r| Box::new(self.expression(r))),
                arguments: arguments.iter().map(|&a| self.expression(a)).collect(),
            },
            NodeKind::Return(Some(result)) => Expression::Opaque(format!("return {}", self.expression(*result))),
            NodeKind::Return(None) => Expression::Opaque("return".to_string()),
            NodeKind::Marker(text) => Expression::Opaque(text.clone()),
        }
    }

    /// Name of the block for dumps: `b3` or `b0 (entry)`.
    pub fn block_label(&self, id: BlockId) -> String {
        match self.block(id) {
            Block::Special { kind, .. } => {
                let kind = match kind {
                    SpecialKind::Entry => "entry",
                    SpecialKind::Exit => "exit",
                    SpecialKind::ExceptionalExit => "exceptional exit",
                };
                format!("{} ({})", id, kind)
            }
            _ => id.to_string(),
        }
    }
}

impl fmt::Display for ControlFlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, block) in self.blocks() {
            writeln!(f, "{} [{}]", self.block_label(id), block.type_name())?;
            for &node in block.nodes() {
                let lvalue = if self.node(node).is_lvalue() { " (lvalue)" } else { "" };
                writeln!(f, "  {}: {}{}", node, self.expression(node), lvalue)?;
            }
            match block {
                Block::Conditional {
                    then_successor,
                    else_successor,
                    ..
                } => {
                    if let Some(succ) = then_successor {
                        writeln!(f, "  then -> {}", succ)?;
                    }
                    if let Some(succ) = else_successor {
                        writeln!(f, "  else -> {}", succ)?;
                    }
                }
                Block::Exception {
                    successor,
                    exceptional_successors,
                    ..
                } => {
                    if let Some(succ) = successor {
                        writeln!(f, "  -> {}", succ)?;
                    }
                    for (cause, succs) in exceptional_successors {
                        for succ in succs {
                            writeln!(f, "  {} -> {}", cause, succ)?;
                        }
                    }
                }
                Block::Regular { successor, .. } | Block::Special { successor, .. } => {
                    if let Some(succ) = successor {
                        writeln!(f, "  -> {}", succ)?;
                    }
                }
            }
        }
        Ok(())
    }
}
