//! Incremental construction of control flow graphs.
//!
//! The builder is a thin stand-in for a compiler front end: nodes are created
//! in evaluation order (operands first) and appended to a block.
//!
//! ```
//! use dataflow_rs::cfg::CfgBuilder;
//!
//! // x = 1; return x;
//! let mut b = CfgBuilder::method("f", &[]);
//! let block = b.regular_block();
//! let one = b.int(block, 1);
//! b.assign(block, "x", one);
//! let x = b.local(block, "x");
//! b.ret(block, Some(x));
//! b.connect(b.entry(), block);
//! b.connect(block, b.exit());
//! let cfg = b.build().unwrap();
//! assert_eq!(cfg.return_nodes().len(), 1);
//! ```

use log::debug;

use super::block::{Block, BlockId, FlowRule, SpecialKind};
use super::graph::{ControlFlowGraph, UnderlyingAst};
use super::node::{BinaryOp, ComparisonOp, Node, NodeId, NodeKind};
use crate::error::CfgError;

#[derive(Debug, Clone)]
pub struct CfgBuilder {
    nodes: Vec<Node>,
    blocks: Vec<Block>,
    entry: BlockId,
    exit: BlockId,
    exceptional_exit: BlockId,
    ast: UnderlyingAst,
    errors: Vec<CfgError>,
}

impl CfgBuilder {
    pub fn new(ast: UnderlyingAst) -> Self {
        let mut builder = Self {
            nodes: Vec::new(),
            blocks: Vec::new(),
            entry: BlockId::new(0),
            exit: BlockId::new(0),
            exceptional_exit: BlockId::new(0),
            ast,
            errors: Vec::new(),
        };
        builder.entry = builder.add_block(Block::special(SpecialKind::Entry));
        builder.exit = builder.add_block(Block::special(SpecialKind::Exit));
        builder.exceptional_exit = builder.add_block(Block::special(SpecialKind::ExceptionalExit));
        builder
    }

    /// Builder for a method body with the given parameter names.
    pub fn method(name: &str, parameters: &[&str]) -> Self {
        Self::new(UnderlyingAst::Method {
            name: name.to_string(),
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
        })
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn exit(&self) -> BlockId {
        self.exit
    }

    pub fn exceptional_exit(&self) -> BlockId {
        self.exceptional_exit
    }

    fn add_block(&mut self, block: Block) -> BlockId {
        let id = BlockId::new(self.blocks.len() as u32);
        self.blocks.push(block);
        id
    }

    pub fn regular_block(&mut self) -> BlockId {
        self.add_block(Block::regular())
    }

    pub fn conditional_block(&mut self) -> BlockId {
        self.add_block(Block::conditional())
    }

    pub fn exception_block(&mut self) -> BlockId {
        self.add_block(Block::exception())
    }

    fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        if id.index() >= self.blocks.len() {
            self.errors.push(CfgError::UnknownBlock(id));
            return None;
        }
        Some(&mut self.blocks[id.index()])
    }

    /// Creates a node and appends it to `block`.
    pub fn add_node(&mut self, block: BlockId, kind: NodeKind) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        let mut node = Node::new(kind);
        node.block = Some(block);
        self.nodes.push(node);
        self.place(block, id);
        id
    }

    fn place(&mut self, block: BlockId, id: NodeId) {
        let Some(b) = self.block_mut(block) else {
            return;
        };
        match b {
            Block::Regular { nodes, .. } => nodes.push(id),
            Block::Exception { node, .. } => {
                if node.replace(id).is_some() {
                    self.errors.push(CfgError::ExceptionBlockFull(block));
                }
            }
            _ => self.errors.push(CfgError::NotANodeBlock(block)),
        }
    }

    pub fn local(&mut self, block: BlockId, name: &str) -> NodeId {
        self.add_node(block, NodeKind::LocalVariable(name.to_string()))
    }

    pub fn int(&mut self, block: BlockId, value: i64) -> NodeId {
        self.add_node(block, NodeKind::IntegerLiteral(value))
    }

    pub fn boolean(&mut self, block: BlockId, value: bool) -> NodeId {
        self.add_node(block, NodeKind::BooleanLiteral(value))
    }

    pub fn string(&mut self, block: BlockId, value: &str) -> NodeId {
        self.add_node(block, NodeKind::StringLiteral(value.to_string()))
    }

    pub fn null(&mut self, block: BlockId) -> NodeId {
        self.add_node(block, NodeKind::NullLiteral)
    }

    pub fn field(&mut self, block: BlockId, receiver: NodeId, field: &str) -> NodeId {
        self.add_node(
            block,
            NodeKind::FieldAccess {
                receiver,
                field: field.to_string(),
            },
        )
    }

    pub fn binary(&mut self, block: BlockId, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.add_node(block, NodeKind::Binary { op, lhs, rhs })
    }

    pub fn compare(&mut self, block: BlockId, op: ComparisonOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.add_node(block, NodeKind::Comparison { op, lhs, rhs })
    }

    pub fn not(&mut self, block: BlockId, operand: NodeId) -> NodeId {
        self.add_node(block, NodeKind::ConditionalNot(operand))
    }

    pub fn call(&mut self, block: BlockId, method: &str, receiver: Option<NodeId>, arguments: &[NodeId]) -> NodeId {
        self.add_node(
            block,
            NodeKind::MethodInvocation {
                method: method.to_string(),
                receiver,
                arguments: arguments.to_vec(),
            },
        )
    }

    pub fn ret(&mut self, block: BlockId, result: Option<NodeId>) -> NodeId {
        self.add_node(block, NodeKind::Return(result))
    }

    pub fn marker(&mut self, block: BlockId, text: &str) -> NodeId {
        self.add_node(block, NodeKind::Marker(text.to_string()))
    }

    /// Appends `target = expression` where `target` is an arbitrary l-value node
    /// already placed in the block.
    pub fn assign_to(&mut self, block: BlockId, target: NodeId, expression: NodeId) -> NodeId {
        if let Some(node) = self.nodes.get_mut(target.index()) {
            node.lvalue = true;
        } else {
            self.errors.push(CfgError::UnknownNode(target));
        }
        self.add_node(block, NodeKind::Assignment { target, expression })
    }

    /// Appends `name = expression`: an l-value local node followed by the assignment.
    pub fn assign(&mut self, block: BlockId, name: &str, expression: NodeId) -> NodeId {
        let target = self.local(block, name);
        self.assign_to(block, target, expression)
    }

    /// Sets the regular successor of `from`.
    pub fn connect(&mut self, from: BlockId, to: BlockId) {
        self.connect_with(from, to, FlowRule::EachToEach);
    }

    pub fn connect_with(&mut self, from: BlockId, to: BlockId, rule: FlowRule) {
        let Some(block) = self.block_mut(from) else {
            return;
        };
        match block {
            Block::Regular {
                successor, flow_rule, ..
            }
            | Block::Exception {
                successor, flow_rule, ..
            }
            | Block::Special {
                successor, flow_rule, ..
            } => {
                *successor = Some(to);
                *flow_rule = rule;
            }
            Block::Conditional { .. } => self.errors.push(CfgError::MissingSuccessor(from)),
        }
    }

    /// Sets both successors of a conditional block.
    pub fn branch(&mut self, cond: BlockId, then_block: BlockId, else_block: BlockId) {
        if let Some(Block::Conditional {
            then_successor,
            else_successor,
            ..
        }) = self.block_mut(cond)
        {
            *then_successor = Some(then_block);
            *else_successor = Some(else_block);
        } else {
            self.errors.push(CfgError::MissingSuccessor(cond));
        }
    }

    /// Overrides the flow rules of a conditional block.
    pub fn branch_rules(&mut self, cond: BlockId, then_rule: FlowRule, else_rule: FlowRule) {
        if let Some(Block::Conditional {
            then_flow_rule,
            else_flow_rule,
            ..
        }) = self.block_mut(cond)
        {
            *then_flow_rule = then_rule;
            *else_flow_rule = else_rule;
        }
    }

    /// Adds an exceptional edge from an exception block.
    pub fn throws(&mut self, block: BlockId, cause: &str, target: BlockId) {
        if let Some(Block::Exception {
            exceptional_successors,
            ..
        }) = self.block_mut(block)
        {
            exceptional_successors
                .entry(cause.to_string())
                .or_default()
                .push(target);
        } else {
            self.errors.push(CfgError::NotANodeBlock(block));
        }
    }

    pub fn build(self) -> Result<ControlFlowGraph, CfgError> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }

        let num_blocks = self.blocks.len();
        let check_block = |id: BlockId| {
            if id.index() < num_blocks {
                Ok(())
            } else {
                Err(CfgError::UnknownBlock(id))
            }
        };

        let mut owner: Vec<Option<BlockId>> = vec![None; self.nodes.len()];
        for (i, block) in self.blocks.iter().enumerate() {
            let id = BlockId::new(i as u32);
            for succ in block.successors() {
                check_block(succ)?;
            }
            match block {
                Block::Regular { nodes, successor, .. } => {
                    if nodes.is_empty() {
                        return Err(CfgError::EmptyRegularBlock(id));
                    }
                    if successor.is_none() {
                        return Err(CfgError::MissingSuccessor(id));
                    }
                }
                Block::Conditional {
                    then_successor,
                    else_successor,
                    ..
                } => {
                    if then_successor.is_none() || else_successor.is_none() {
                        return Err(CfgError::MissingSuccessor(id));
                    }
                }
                Block::Exception { node, .. } => {
                    if node.is_none() {
                        return Err(CfgError::EmptyExceptionBlock(id));
                    }
                }
                Block::Special { kind, successor, .. } => {
                    if *kind == SpecialKind::Entry && successor.is_none() {
                        return Err(CfgError::MissingSuccessor(id));
                    }
                }
            }
            for &node in block.nodes() {
                let slot = owner.get_mut(node.index()).ok_or(CfgError::UnknownNode(node))?;
                if let Some(first) = slot.replace(id) {
                    return Err(CfgError::NodeInTwoBlocks {
                        node,
                        first,
                        second: id,
                    });
                }
            }
        }

        for (i, node) in self.nodes.iter().enumerate() {
            let id = NodeId::new(i as u32);
            if owner[i].is_none() {
                return Err(CfgError::DetachedNode(id));
            }
            // Operands are created before their users, so ids order the operand graph.
            for operand in node.kind.operands() {
                if operand.index() >= self.nodes.len() {
                    return Err(CfgError::UnknownNode(operand));
                }
                if operand >= id {
                    return Err(CfgError::OperandNotEvaluatedBefore { node: id, operand });
                }
            }
        }

        let mut predecessors = vec![Vec::new(); num_blocks];
        for (i, block) in self.blocks.iter().enumerate() {
            for succ in block.successors() {
                let preds: &mut Vec<BlockId> = &mut predecessors[succ.index()];
                let pred = BlockId::new(i as u32);
                if !preds.contains(&pred) {
                    preds.push(pred);
                }
            }
        }

        debug!("Built CFG with {} blocks and {} nodes", num_blocks, self.nodes.len());

        Ok(ControlFlowGraph {
            nodes: self.nodes,
            blocks: self.blocks,
            predecessors,
            entry: self.entry,
            regular_exit: self.exit,
            exceptional_exit: self.exceptional_exit,
            ast: self.ast,
        })
    }
}
