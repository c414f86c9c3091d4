//! The fixed-point engine.
//!
//! An analysis pairs a transfer function with a direction. Running it on a
//! [`ControlFlowGraph`] iterates blocks in worklist order until no store before
//! (forward) or after (backward) any block changes, and returns an
//! [`AnalysisResult`] mapping every analyzed node to its stores and value.
//!
//! ```
//! use dataflow_rs::analysis::{AnalysisConfig, ForwardAnalysis};
//! use dataflow_rs::cfg::CfgBuilder;
//! use dataflow_rs::constant_propagation::{Constant, ConstantPropagationTransfer};
//!
//! let mut b = CfgBuilder::method("m", &[]);
//! let block = b.regular_block();
//! let one = b.int(block, 1);
//! let assign = b.assign(block, "x", one);
//! b.connect(b.entry(), block);
//! b.connect(block, b.exit());
//! let cfg = b.build().unwrap();
//!
//! let analysis = ForwardAnalysis::new(ConstantPropagationTransfer, AnalysisConfig::default());
//! let result = analysis.perform_analysis(&cfg).unwrap();
//! let store = result.store_after(assign).unwrap();
//! assert_eq!(store.information("x"), Constant::value(1));
//! ```

use std::collections::BTreeSet;
use std::collections::HashMap;

use crate::cfg::{ControlFlowGraph, NodeId};
use crate::error::AnalysisError;
use crate::store::Store;
use crate::transfer::{accept, NodeVisitor, TransferContext, TransferInput, TransferResult};
use crate::value::AbstractValue;

mod backward;
mod forward;
mod result;
mod worklist;

pub use backward::BackwardAnalysis;
pub use forward::ForwardAnalysis;
pub use result::AnalysisResult;
pub use worklist::Worklist;

/// Direction in which stores flow through the graph.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

/// Whether a query asks for the store before or after a node.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BeforeOrAfter {
    Before,
    After,
}

/// Engine settings.
///
/// # Examples
///
/// ```
/// use dataflow_rs::analysis::AnalysisConfig;
///
/// let config = AnalysisConfig::default()
///     .with_widening(3)
///     .ignore_exception_type("java.lang.Error");
/// assert_eq!(config.max_count_before_widening, Some(3));
/// assert!(config.is_ignored_exception_type("java.lang.Error"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Number of store updates before a block after which the next update
    /// widens instead of joining (default: `None`, never widen). Only forward
    /// runs widen; [`BackwardAnalysis`] ignores this setting.
    pub max_count_before_widening: Option<usize>,
    /// Exception causes whose edges carry no store (default: empty)
    pub ignored_exception_types: BTreeSet<String>,
}

impl AnalysisConfig {
    pub fn with_widening(mut self, max_count_before_widening: usize) -> Self {
        self.max_count_before_widening = Some(max_count_before_widening);
        self
    }

    pub fn ignore_exception_type(mut self, cause: &str) -> Self {
        self.ignored_exception_types.insert(cause.to_string());
        self
    }

    pub fn is_ignored_exception_type(&self, cause: &str) -> bool {
        self.ignored_exception_types.contains(cause)
    }
}

/// Applies the transfer function to one node.
///
/// L-value nodes are not evaluated: their input passes through as a regular store.
pub(crate) fn call_transfer_function<V, S, T>(
    cfg: &ControlFlowGraph,
    transfer: &T,
    node_values: &HashMap<NodeId, V>,
    node: NodeId,
    input: TransferInput<S>,
) -> Result<TransferResult<V, S>, AnalysisError>
where
    V: AbstractValue,
    S: Store,
    T: NodeVisitor<V, S> + ?Sized,
{
    if cfg.node(node).is_lvalue() {
        return Ok(TransferResult::regular(None, input.into_regular_store()));
    }
    let cx = TransferContext::new(cfg, node_values, node);
    accept(transfer, &cx, input)
}

/// Records the value produced for `node`.
///
/// Returns whether the block must be revisited: the value changed, or the
/// transfer function reported a store change.
pub(crate) fn update_node_values<V, S>(
    node_values: &mut HashMap<NodeId, V>,
    node: NodeId,
    result: &TransferResult<V, S>,
) -> bool
where
    V: AbstractValue,
    S: Store,
{
    let mut changed = false;
    if let Some(value) = result.value() {
        let old = node_values.insert(node, value.clone());
        changed = old.as_ref() != Some(value);
    }
    changed || result.store_changed()
}
