use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;

use log::{debug, trace};

use crate::cfg::{Block, BlockId, ControlFlowGraph, FlowRule, NodeId};
use crate::error::{AnalysisError, CfgError};
use crate::store::{Store, StoreKind};
use crate::transfer::{ForwardTransferFunction, TransferInput};
use crate::value::AbstractValue;

use super::result::{AnalysisResult, NodeStores};
use super::{call_transfer_function, update_node_values, AnalysisConfig, Direction, Worklist};

/// A forward dataflow analysis: stores flow from the entry along control flow.
#[derive(Debug, Clone)]
pub struct ForwardAnalysis<V, S, T> {
    transfer: T,
    config: AnalysisConfig,
    _marker: PhantomData<fn() -> (V, S)>,
}

impl<V, S, T> ForwardAnalysis<V, S, T>
where
    V: AbstractValue,
    S: Store,
    T: ForwardTransferFunction<V, S>,
{
    pub fn new(transfer: T, config: AnalysisConfig) -> Self {
        Self {
            transfer,
            config,
            _marker: PhantomData,
        }
    }

    pub fn transfer_function(&self) -> &T {
        &self.transfer
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Runs the analysis on `cfg` to its fixed point.
    pub fn perform_analysis(&self, cfg: &ControlFlowGraph) -> Result<AnalysisResult<V, S>, AnalysisError> {
        debug!(
            "Forward analysis of {} blocks, {} nodes",
            cfg.num_blocks(),
            cfg.num_nodes()
        );
        let mut run = ForwardRun::new(cfg, &self.transfer, &self.config);
        run.init();
        let mut visits = 0usize;
        while let Some(block) = run.worklist.poll() {
            trace!("Visiting {}", cfg.block_label(block));
            visits += 1;
            run.perform_analysis_block(block)?;
        }
        debug!("Forward analysis converged after {} block visits", visits);
        run.into_result()
    }
}

/// Mutable state of one forward run.
struct ForwardRun<'a, V, S, T> {
    cfg: &'a ControlFlowGraph,
    transfer: &'a T,
    config: &'a AnalysisConfig,
    worklist: Worklist,
    inputs: BTreeMap<BlockId, TransferInput<S>>,
    then_stores: HashMap<BlockId, S>,
    else_stores: HashMap<BlockId, S>,
    block_count: HashMap<BlockId, usize>,
    node_values: HashMap<NodeId, V>,
}

impl<'a, V, S, T> ForwardRun<'a, V, S, T>
where
    V: AbstractValue,
    S: Store,
    T: ForwardTransferFunction<V, S>,
{
    fn new(cfg: &'a ControlFlowGraph, transfer: &'a T, config: &'a AnalysisConfig) -> Self {
        Self {
            cfg,
            transfer,
            config,
            worklist: Worklist::new(cfg, Direction::Forward),
            inputs: BTreeMap::new(),
            then_stores: HashMap::new(),
            else_stores: HashMap::new(),
            block_count: HashMap::new(),
            node_values: HashMap::new(),
        }
    }

    fn init(&mut self) {
        let entry = self.cfg.entry_block();
        let ast = self.cfg.underlying_ast();
        let initial = self.transfer.initial_store(ast, ast.parameters());
        self.then_stores.insert(entry, initial.clone());
        self.else_stores.insert(entry, initial.clone());
        self.inputs.insert(entry, TransferInput::regular(None, initial));
        self.worklist.add(entry);
    }

    fn input_before(&self, block: BlockId) -> Result<TransferInput<S>, AnalysisError> {
        self.inputs
            .get(&block)
            .cloned()
            .ok_or_else(|| AnalysisError::Internal(format!("{} was scheduled without an input", block)))
    }

    fn perform_analysis_block(&mut self, block: BlockId) -> Result<(), AnalysisError> {
        let cfg = self.cfg;
        match cfg.block(block) {
            Block::Regular {
                nodes,
                successor,
                flow_rule,
            } => {
                let mut current = self.input_before(block)?;
                let mut add_to_worklist_again = false;
                for &node in nodes {
                    let result = call_transfer_function(cfg, self.transfer, &self.node_values, node, current)?;
                    add_to_worklist_again |= update_node_values(&mut self.node_values, node, &result);
                    current = TransferInput::from_result(node, result);
                }
                let succ = successor.ok_or(CfgError::MissingSuccessor(block))?;
                self.propagate_stores_to(succ, current.node, &current, *flow_rule, add_to_worklist_again)?;
            }

            Block::Exception {
                node,
                successor,
                flow_rule,
                exceptional_successors,
            } => {
                let node = node.ok_or(CfgError::EmptyExceptionBlock(block))?;
                let input_before = self.input_before(block)?;
                let result =
                    call_transfer_function(cfg, self.transfer, &self.node_values, node, input_before.clone())?;
                let add_to_worklist_again = update_node_values(&mut self.node_values, node, &result);

                for (cause, targets) in exceptional_successors {
                    if self.config.is_ignored_exception_type(cause) {
                        continue;
                    }
                    let store = match result.exceptional_store(cause) {
                        Some(store) => store.clone(),
                        None => input_before.regular_store(),
                    };
                    for &target in targets {
                        self.add_store_before(target, Some(node), store.clone(), StoreKind::Both, add_to_worklist_again)?;
                    }
                }

                if let Some(succ) = successor {
                    let current = TransferInput::from_result(node, result);
                    self.propagate_stores_to(*succ, Some(node), &current, *flow_rule, add_to_worklist_again)?;
                }
            }

            Block::Conditional {
                then_successor,
                else_successor,
                then_flow_rule,
                else_flow_rule,
            } => {
                let input = self.input_before(block)?;
                let then_succ = then_successor.ok_or(CfgError::MissingSuccessor(block))?;
                let else_succ = else_successor.ok_or(CfgError::MissingSuccessor(block))?;
                self.propagate_stores_to(then_succ, None, &input, *then_flow_rule, false)?;
                self.propagate_stores_to(else_succ, None, &input, *else_flow_rule, false)?;
            }

            Block::Special {
                successor, flow_rule, ..
            } => {
                if let Some(succ) = successor {
                    let input = self.input_before(block)?;
                    self.propagate_stores_to(*succ, None, &input, *flow_rule, false)?;
                }
            }
        }
        Ok(())
    }

    /// Sends the stores of `current` along one edge, as selected by the flow rule.
    fn propagate_stores_to(
        &mut self,
        succ: BlockId,
        node: Option<NodeId>,
        current: &TransferInput<S>,
        flow_rule: FlowRule,
        add_to_worklist_again: bool,
    ) -> Result<(), AnalysisError> {
        match flow_rule {
            FlowRule::EachToEach => {
                if current.contains_two_stores() {
                    self.add_store_before(succ, node, current.then_store().clone(), StoreKind::Then, add_to_worklist_again)?;
                    self.add_store_before(succ, node, current.else_store().clone(), StoreKind::Else, add_to_worklist_again)
                } else {
                    self.add_store_before(succ, node, current.regular_store(), StoreKind::Both, add_to_worklist_again)
                }
            }
            FlowRule::ThenToBoth => {
                self.add_store_before(succ, node, current.then_store().clone(), StoreKind::Both, add_to_worklist_again)
            }
            FlowRule::ElseToBoth => {
                self.add_store_before(succ, node, current.else_store().clone(), StoreKind::Both, add_to_worklist_again)
            }
            FlowRule::ThenToThen => {
                self.add_store_before(succ, node, current.then_store().clone(), StoreKind::Then, add_to_worklist_again)
            }
            FlowRule::ElseToElse => {
                self.add_store_before(succ, node, current.else_store().clone(), StoreKind::Else, add_to_worklist_again)
            }
        }
    }

    /// Merges `store` into the then, else, or both stores before `block`.
    ///
    /// The block is scheduled if its input changed or `add_block_to_worklist` is set.
    /// A block only has an input once both its then and else stores are known.
    fn add_store_before(
        &mut self,
        block: BlockId,
        node: Option<NodeId>,
        store: S,
        kind: StoreKind,
        mut add_block_to_worklist: bool,
    ) -> Result<(), AnalysisError> {
        let then_store = self.then_stores.get(&block).cloned();
        let else_store = self.else_stores.get(&block).cloned();

        let should_widen = match self.config.max_count_before_widening {
            Some(max) => {
                let count = self.block_count.entry(block).or_insert(0);
                if *count >= max {
                    *count = 0;
                    true
                } else {
                    *count += 1;
                    false
                }
            }
            None => false,
        };
        if should_widen {
            trace!("Widening before {}", block);
        }

        match kind {
            StoreKind::Then => {
                let new_then = merge_stores(store, then_store.as_ref(), should_widen)?;
                if then_store.as_ref() != Some(&new_then) {
                    self.then_stores.insert(block, new_then.clone());
                    if let Some(else_store) = else_store {
                        trace!("Then store before {} changed", block);
                        self.inputs.insert(block, TransferInput::conditional(node, new_then, else_store));
                        add_block_to_worklist = true;
                    }
                }
            }
            StoreKind::Else => {
                let new_else = merge_stores(store, else_store.as_ref(), should_widen)?;
                if else_store.as_ref() != Some(&new_else) {
                    self.else_stores.insert(block, new_else.clone());
                    if let Some(then_store) = then_store {
                        trace!("Else store before {} changed", block);
                        self.inputs.insert(block, TransferInput::conditional(node, then_store, new_else));
                        add_block_to_worklist = true;
                    }
                }
            }
            StoreKind::Both => {
                if then_store == else_store {
                    let new_store = merge_stores(store, then_store.as_ref(), should_widen)?;
                    if then_store.as_ref() != Some(&new_store) {
                        trace!("Store before {} changed", block);
                        self.then_stores.insert(block, new_store.clone());
                        self.else_stores.insert(block, new_store.clone());
                        self.inputs.insert(block, TransferInput::regular(node, new_store));
                        add_block_to_worklist = true;
                    }
                } else {
                    let mut store_changed = false;
                    let new_then = merge_stores(store.clone(), then_store.as_ref(), should_widen)?;
                    if then_store.as_ref() != Some(&new_then) {
                        self.then_stores.insert(block, new_then.clone());
                        store_changed = true;
                    }
                    let new_else = merge_stores(store, else_store.as_ref(), should_widen)?;
                    if else_store.as_ref() != Some(&new_else) {
                        self.else_stores.insert(block, new_else.clone());
                        store_changed = true;
                    }
                    if store_changed {
                        trace!("Then/else stores before {} changed", block);
                        self.inputs.insert(block, TransferInput::conditional(node, new_then, new_else));
                        add_block_to_worklist = true;
                    }
                }
            }
        }

        if add_block_to_worklist && self.inputs.contains_key(&block) {
            self.worklist.add(block);
        }
        Ok(())
    }

    /// Replays every analyzed block once to record the stores around each node.
    fn into_result(self) -> Result<AnalysisResult<V, S>, AnalysisError> {
        let cfg = self.cfg;
        let mut node_stores = HashMap::new();
        let mut block_stores = BTreeMap::new();

        for (&block, input) in &self.inputs {
            let before_block = input.regular_store();
            let after_block = match cfg.block(block) {
                Block::Regular { nodes, .. } => {
                    let mut current = input.clone();
                    for &node in nodes {
                        let before = current.regular_store();
                        let result = call_transfer_function(cfg, self.transfer, &self.node_values, node, current)?;
                        node_stores.insert(node, NodeStores::new(before, result.stores()));
                        current = TransferInput::from_result(node, result);
                    }
                    current.regular_store()
                }
                Block::Exception { node: Some(node), .. } => {
                    let result = call_transfer_function(cfg, self.transfer, &self.node_values, *node, input.clone())?;
                    node_stores.insert(*node, NodeStores::new(before_block.clone(), result.stores()));
                    result.regular_store()
                }
                _ => before_block.clone(),
            };
            block_stores.insert(block, (before_block, after_block));
        }

        let return_stores = cfg
            .return_nodes()
            .into_iter()
            .map(|node| (node, node_stores.get(&node).map(|s: &NodeStores<S>| s.after.clone())))
            .collect();
        let regular_exit_store = self.inputs.get(&cfg.regular_exit_block()).map(|i| i.regular_store());
        let exceptional_exit_store = self.inputs.get(&cfg.exceptional_exit_block()).map(|i| i.regular_store());

        Ok(AnalysisResult {
            direction: Direction::Forward,
            node_values: self.node_values,
            block_inputs: self.inputs,
            block_stores,
            node_stores,
            return_stores,
            regular_exit_store,
            exceptional_exit_store,
            entry_store: None,
        })
    }
}

fn merge_stores<S: Store>(new_store: S, previous: Option<&S>, should_widen: bool) -> Result<S, AnalysisError> {
    match previous {
        None => Ok(new_store),
        Some(previous) if should_widen => new_store.widened_upper_bound(previous),
        Some(previous) => Ok(new_store.least_upper_bound(previous)),
    }
}
