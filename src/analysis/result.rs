use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

use crate::cfg::{BlockId, NodeId};
use crate::store::Store;
use crate::transfer::{Stores, TransferInput};
use crate::value::AbstractValue;
use crate::visualize::{render_input, StringCfgVisualizer};

use super::{BeforeOrAfter, Direction};

/// Stores around a single node.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NodeStores<S> {
    pub(crate) before: S,
    pub(crate) after: S,
    /// Then and else stores after a boolean test.
    pub(crate) branches: Option<(S, S)>,
}

impl<S: Store> NodeStores<S> {
    pub(crate) fn regular(before: S, after: S) -> Self {
        Self {
            before,
            after,
            branches: None,
        }
    }

    pub(crate) fn new(before: S, after: &Stores<S>) -> Self {
        let branches = match after {
            Stores::Regular(_) => None,
            Stores::Conditional { then_store, else_store } => Some((then_store.clone(), else_store.clone())),
        };
        Self {
            before,
            after: after.regular_store(),
            branches,
        }
    }
}

/// The fixed point of one analysis run.
///
/// Holds the value computed for every node, the store flowing into every
/// analyzed block (before it for a forward analysis, after it for a backward
/// one) and, for every analyzed node, the stores immediately before and after
/// it. Nodes in blocks the analysis never reached have no entries.
#[derive(Debug, Clone)]
pub struct AnalysisResult<V, S> {
    pub(crate) direction: Direction,
    pub(crate) node_values: HashMap<NodeId, V>,
    pub(crate) block_inputs: BTreeMap<BlockId, TransferInput<S>>,
    pub(crate) block_stores: BTreeMap<BlockId, (S, S)>,
    pub(crate) node_stores: HashMap<NodeId, NodeStores<S>>,
    pub(crate) return_stores: Vec<(NodeId, Option<S>)>,
    pub(crate) regular_exit_store: Option<S>,
    pub(crate) exceptional_exit_store: Option<S>,
    pub(crate) entry_store: Option<S>,
}

impl<V: AbstractValue, S: Store> AnalysisResult<V, S> {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The abstract value computed for the node, if any.
    pub fn value(&self, node: NodeId) -> Option<&V> {
        self.node_values.get(&node)
    }

    pub fn node_values(&self) -> &HashMap<NodeId, V> {
        &self.node_values
    }

    /// The input the engine last computed for the block.
    pub fn block_input(&self, block: BlockId) -> Option<&TransferInput<S>> {
        self.block_inputs.get(&block)
    }

    pub fn store_at(&self, node: NodeId, when: BeforeOrAfter) -> Option<&S> {
        let stores = self.node_stores.get(&node)?;
        Some(match when {
            BeforeOrAfter::Before => &stores.before,
            BeforeOrAfter::After => &stores.after,
        })
    }

    /// The store immediately before the node, in execution order.
    pub fn store_before(&self, node: NodeId) -> Option<&S> {
        self.store_at(node, BeforeOrAfter::Before)
    }

    /// The store immediately after the node, in execution order.
    ///
    /// After a boolean test this is the join of the then and else stores.
    pub fn store_after(&self, node: NodeId) -> Option<&S> {
        self.store_at(node, BeforeOrAfter::After)
    }

    pub fn then_store_after(&self, node: NodeId) -> Option<&S> {
        let stores = self.node_stores.get(&node)?;
        Some(stores.branches.as_ref().map_or(&stores.after, |(then_store, _)| then_store))
    }

    pub fn else_store_after(&self, node: NodeId) -> Option<&S> {
        let stores = self.node_stores.get(&node)?;
        Some(stores.branches.as_ref().map_or(&stores.after, |(_, else_store)| else_store))
    }

    pub fn store_before_block(&self, block: BlockId) -> Option<&S> {
        self.block_stores.get(&block).map(|(before, _)| before)
    }

    pub fn store_after_block(&self, block: BlockId) -> Option<&S> {
        self.block_stores.get(&block).map(|(_, after)| after)
    }

    /// The store reaching the regular exit.
    pub fn regular_exit_store(&self) -> Option<&S> {
        self.regular_exit_store.as_ref()
    }

    /// The store reaching the exceptional exit.
    pub fn exceptional_exit_store(&self) -> Option<&S> {
        self.exceptional_exit_store.as_ref()
    }

    /// The store after every return node, `None` for unreached returns.
    pub fn return_statement_stores(&self) -> &[(NodeId, Option<S>)] {
        &self.return_stores
    }

    /// The store at the entry of the graph. Only a backward analysis has one.
    pub fn entry_store(&self) -> Option<&S> {
        self.entry_store.as_ref()
    }

    /// Merges another result into this one. Entries of `other` win on conflict.
    pub fn combine(&mut self, other: AnalysisResult<V, S>) {
        self.node_values.extend(other.node_values);
        self.block_inputs.extend(other.block_inputs);
        self.block_stores.extend(other.block_stores);
        self.node_stores.extend(other.node_stores);
        self.return_stores.extend(other.return_stores);
        if other.regular_exit_store.is_some() {
            self.regular_exit_store = other.regular_exit_store;
        }
        if other.exceptional_exit_store.is_some() {
            self.exceptional_exit_store = other.exceptional_exit_store;
        }
        if other.entry_store.is_some() {
            self.entry_store = other.entry_store;
        }
    }
}

impl<V: AbstractValue + Display, S: Store> AnalysisResult<V, S> {
    /// Multi-line dump of values and block inputs, sorted by id.
    pub fn to_string_debug(&self) -> String {
        let viz = StringCfgVisualizer;
        let mut out = format!("AnalysisResult({:?})\n", self.direction);

        out.push_str("node values:\n");
        let mut values: Vec<_> = self.node_values.iter().collect();
        values.sort_by_key(|(node, _)| **node);
        for (node, value) in values {
            out.push_str(&format!("  {} > {}\n", node, value));
        }

        out.push_str("block inputs:\n");
        for (block, input) in &self.block_inputs {
            let rendered = render_input(input, &viz);
            out.push_str(&format!("  {}: {}\n", block, rendered.replace('\n', "\n    ")));
        }
        out
    }
}
