use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;

use log::{debug, trace};

use crate::cfg::{Block, BlockId, ControlFlowGraph, NodeId, SpecialKind};
use crate::error::{AnalysisError, CfgError};
use crate::store::Store;
use crate::transfer::{BackwardTransferFunction, TransferInput};
use crate::value::AbstractValue;

use super::result::{AnalysisResult, NodeStores};
use super::{call_transfer_function, update_node_values, AnalysisConfig, Direction, Worklist};

/// A backward dataflow analysis: stores flow from the exits against control flow.
///
/// Every block receives the join of the stores before its successors. An
/// exception block transfers the store of its regular successor through its
/// node, then joins in the stores of its exceptional successors.
///
/// Backward runs always join and never widen:
/// [`AnalysisConfig::max_count_before_widening`] is not consulted.
#[derive(Debug, Clone)]
pub struct BackwardAnalysis<V, S, T> {
    transfer: T,
    config: AnalysisConfig,
    _marker: PhantomData<fn() -> (V, S)>,
}

impl<V, S, T> BackwardAnalysis<V, S, T>
where
    V: AbstractValue,
    S: Store,
    T: BackwardTransferFunction<V, S>,
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
    ///
    /// Fails with [`AnalysisError::NoReachableExit`] if neither exit block is
    /// reachable from the entry.
    pub fn perform_analysis(&self, cfg: &ControlFlowGraph) -> Result<AnalysisResult<V, S>, AnalysisError> {
        debug!(
            "Backward analysis of {} blocks, {} nodes",
            cfg.num_blocks(),
            cfg.num_nodes()
        );
        let mut run = BackwardRun::new(cfg, &self.transfer, &self.config);
        run.init()?;
        let mut visits = 0usize;
        while let Some(block) = run.worklist.poll() {
            trace!("Visiting {}", cfg.block_label(block));
            visits += 1;
            run.perform_analysis_block(block)?;
        }
        debug!("Backward analysis converged after {} block visits", visits);
        run.into_result()
    }
}

struct BackwardRun<'a, V, S, T> {
    cfg: &'a ControlFlowGraph,
    transfer: &'a T,
    config: &'a AnalysisConfig,
    worklist: Worklist,
    /// Store after each block, as seen from its regular successors.
    out_stores: BTreeMap<BlockId, S>,
    /// Join of the stores before the exceptional successors of an exception block.
    exception_stores: BTreeMap<BlockId, S>,
    node_values: HashMap<NodeId, V>,
}

impl<'a, V, S, T> BackwardRun<'a, V, S, T>
where
    V: AbstractValue,
    S: Store,
    T: BackwardTransferFunction<V, S>,
{
    fn new(cfg: &'a ControlFlowGraph, transfer: &'a T, config: &'a AnalysisConfig) -> Self {
        Self {
            cfg,
            transfer,
            config,
            worklist: Worklist::new(cfg, Direction::Backward),
            out_stores: BTreeMap::new(),
            exception_stores: BTreeMap::new(),
            node_values: HashMap::new(),
        }
    }

    fn init(&mut self) -> Result<(), AnalysisError> {
        let ast = self.cfg.underlying_ast();
        let regular_exit = self.cfg.regular_exit_block();
        let exceptional_exit = self.cfg.exceptional_exit_block();

        if self.worklist.add(regular_exit) {
            let returns = self.cfg.return_nodes();
            let store = self.transfer.initial_normal_exit_store(ast, &returns);
            self.out_stores.insert(regular_exit, store);
        }
        if self.worklist.add(exceptional_exit) {
            let store = self.transfer.initial_exceptional_exit_store(ast);
            self.out_stores.insert(exceptional_exit, store);
        }
        if self.worklist.is_empty() {
            return Err(AnalysisError::NoReachableExit);
        }
        Ok(())
    }

    /// The store the block's last node sees: its regular out store, or, for an
    /// exception block only reached through exceptional edges, the exception store.
    fn input_after(&self, block: BlockId) -> Result<TransferInput<S>, AnalysisError> {
        self.out_stores
            .get(&block)
            .or_else(|| self.exception_stores.get(&block))
            .cloned()
            .map(|store| TransferInput::regular(None, store))
            .ok_or_else(|| AnalysisError::Internal(format!("{} was scheduled without an input", block)))
    }

    fn perform_analysis_block(&mut self, block: BlockId) -> Result<(), AnalysisError> {
        let cfg = self.cfg;
        match cfg.block(block) {
            Block::Regular { nodes, .. } => {
                let mut current = self.input_after(block)?;
                let mut add_to_worklist_again = false;
                for &node in nodes.iter().rev() {
                    let result = call_transfer_function(cfg, self.transfer, &self.node_values, node, current)?;
                    add_to_worklist_again |= update_node_values(&mut self.node_values, node, &result);
                    current = TransferInput::from_result(node, result);
                }
                let store = current.into_regular_store();
                for &pred in cfg.predecessors(block) {
                    self.add_store_after(pred, block, store.clone(), add_to_worklist_again);
                }
            }

            Block::Exception { node, .. } => {
                let node = node.ok_or(CfgError::EmptyExceptionBlock(block))?;
                let input = self.input_after(block)?;
                let result = call_transfer_function(cfg, self.transfer, &self.node_values, node, input)?;
                let add_to_worklist_again = update_node_values(&mut self.node_values, node, &result);
                let mut store = result.regular_store();
                if let Some(exception_store) = self.exception_stores.get(&block) {
                    store = store.least_upper_bound(exception_store);
                }
                for &pred in cfg.predecessors(block) {
                    self.add_store_after(pred, block, store.clone(), add_to_worklist_again);
                }
            }

            Block::Conditional { .. } => {
                let store = self.input_after(block)?.into_regular_store();
                for &pred in cfg.predecessors(block) {
                    self.add_store_after(pred, block, store.clone(), false);
                }
            }

            Block::Special { kind, .. } => {
                if *kind != SpecialKind::Entry {
                    let store = self.input_after(block)?.into_regular_store();
                    for &pred in cfg.predecessors(block) {
                        self.add_store_after(pred, block, store.clone(), false);
                    }
                }
            }
        }
        Ok(())
    }

    /// Joins `store`, the store before `succ`, into the store after `pred`.
    fn add_store_after(&mut self, pred: BlockId, succ: BlockId, store: S, mut add_block_to_worklist: bool) {
        let exceptional_edge = match self.cfg.block(pred) {
            Block::Exception {
                successor,
                exceptional_successors,
                ..
            } if *successor != Some(succ) => {
                let mut causes = exceptional_successors
                    .iter()
                    .filter(|(_, targets)| targets.contains(&succ))
                    .map(|(cause, _)| cause);
                if causes.all(|cause| self.config.is_ignored_exception_type(cause)) {
                    trace!("Ignoring exceptional edge {} -> {}", pred, succ);
                    return;
                }
                true
            }
            _ => false,
        };

        let slot = if exceptional_edge {
            &mut self.exception_stores
        } else {
            &mut self.out_stores
        };
        let old: Option<&S> = slot.get(&pred);
        let new_store = match old {
            Some(old) => old.least_upper_bound(&store),
            None => store,
        };
        if old != Some(&new_store) {
            trace!(
                "{} store after {} changed",
                if exceptional_edge { "Exception" } else { "Out" },
                pred
            );
            slot.insert(pred, new_store);
            add_block_to_worklist = true;
        }

        if add_block_to_worklist {
            self.worklist.add(pred);
        }
    }

    fn into_result(self) -> Result<AnalysisResult<V, S>, AnalysisError> {
        let cfg = self.cfg;
        let mut node_stores = HashMap::new();
        let mut block_stores = BTreeMap::new();
        let mut block_inputs = BTreeMap::new();

        let analyzed: Vec<BlockId> = cfg
            .blocks()
            .map(|(id, _)| id)
            .filter(|id| self.out_stores.contains_key(id) || self.exception_stores.contains_key(id))
            .collect();

        for block in analyzed {
            let input = self.input_after(block)?;
            let after_block = input.regular_store();
            let before_block = match cfg.block(block) {
                Block::Regular { nodes, .. } => {
                    let mut current = input.clone();
                    for &node in nodes.iter().rev() {
                        let after = current.regular_store();
                        let result = call_transfer_function(cfg, self.transfer, &self.node_values, node, current)?;
                        node_stores.insert(node, NodeStores::regular(result.regular_store(), after));
                        current = TransferInput::from_result(node, result);
                    }
                    current.into_regular_store()
                }
                Block::Exception { node: Some(node), .. } => {
                    let result = call_transfer_function(cfg, self.transfer, &self.node_values, *node, input.clone())?;
                    let before = result.regular_store();
                    node_stores.insert(*node, NodeStores::regular(before.clone(), after_block.clone()));
                    match self.exception_stores.get(&block) {
                        Some(exception_store) => before.least_upper_bound(exception_store),
                        None => before,
                    }
                }
                _ => after_block.clone(),
            };
            block_stores.insert(block, (before_block, after_block));
            block_inputs.insert(block, input);
        }

        let return_stores = cfg
            .return_nodes()
            .into_iter()
            .map(|node| (node, node_stores.get(&node).map(|s: &NodeStores<S>| s.after.clone())))
            .collect();
        let entry_store = self.out_stores.get(&cfg.entry_block()).cloned();
        let regular_exit_store = self.out_stores.get(&cfg.regular_exit_block()).cloned();
        let exceptional_exit_store = self.out_stores.get(&cfg.exceptional_exit_block()).cloned();

        Ok(AnalysisResult {
            direction: Direction::Backward,
            node_values: self.node_values,
            block_inputs,
            block_stores,
            node_stores,
            return_stores,
            regular_exit_store,
            exceptional_exit_store,
            entry_store,
        })
    }
}
