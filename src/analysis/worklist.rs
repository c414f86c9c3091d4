use std::collections::{BTreeSet, HashMap};

use crate::cfg::{BlockId, ControlFlowGraph};

use super::Direction;

/// Blocks waiting to be (re)analyzed, prioritized by depth-first order.
///
/// A forward worklist yields the block earliest in depth-first order, a
/// backward worklist the latest one. A block is held at most once. Blocks not
/// reachable from the entry have no order and are never enqueued.
#[derive(Debug, Clone)]
pub struct Worklist {
    direction: Direction,
    depth_first_order: HashMap<BlockId, usize>,
    queue: BTreeSet<(usize, BlockId)>,
}

impl Worklist {
    pub fn new(cfg: &ControlFlowGraph, direction: Direction) -> Self {
        let depth_first_order = cfg
            .depth_first_order()
            .into_iter()
            .enumerate()
            .map(|(i, block)| (block, i))
            .collect();
        Self {
            direction,
            depth_first_order,
            queue: BTreeSet::new(),
        }
    }

    /// Position of the block in depth-first order, if it is reachable.
    pub fn order_of(&self, block: BlockId) -> Option<usize> {
        self.depth_first_order.get(&block).copied()
    }

    /// Enqueues the block. Returns `false` if it is unreachable.
    pub fn add(&mut self, block: BlockId) -> bool {
        match self.order_of(block) {
            Some(order) => {
                self.queue.insert((order, block));
                true
            }
            None => false,
        }
    }

    pub fn poll(&mut self) -> Option<BlockId> {
        let next = match self.direction {
            Direction::Forward => self.queue.pop_first(),
            Direction::Backward => self.queue.pop_last(),
        };
        next.map(|(_, block)| block)
    }

    pub fn contains(&self, block: BlockId) -> bool {
        self.order_of(block)
            .is_some_and(|order| self.queue.contains(&(order, block)))
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
