//! # dataflow-rs: Fixed-Point Dataflow Analysis over Control Flow Graphs
//!
//! **`dataflow-rs`** is the flow-sensitive engine behind pluggable type checkers.
//! A checker describes *what* it tracks (an abstract value lattice and a store),
//! and *how* each kind of node changes it (a transfer function). The engine walks
//! the control flow graph of one method and iterates to a fixed point.
//!
//! ## How it works
//!
//! Every block of the graph receives the join of the stores flowing into it.
//! The transfer function is applied to each node in turn, producing the store
//! after the node and, optionally, an abstract value for the node itself.
//! Boolean tests may split the outgoing state into a *then* and an *else* store,
//! which are routed along the corresponding branches. Blocks are revisited until
//! no store changes; on loops the engine switches to widening once a block has
//! been visited often enough.
//!
//! Missing information is never an error: an absent fact is the bottom of the
//! lattice. Internal-consistency violations abort the run with an
//! [`AnalysisError`][crate::error::AnalysisError].
//!
//! ## Basic Usage
//!
//! ```rust
//! use dataflow_rs::analysis::{AnalysisConfig, ForwardAnalysis};
//! use dataflow_rs::cfg::CfgBuilder;
//! use dataflow_rs::reaching_definitions::ReachingDefinitionTransfer;
//!
//! // x = 1; x = 2;
//! let mut b = CfgBuilder::method("m", &[]);
//! let block = b.regular_block();
//! let one = b.int(block, 1);
//! b.assign(block, "x", one);
//! let two = b.int(block, 2);
//! b.assign(block, "x", two);
//! b.connect(b.entry(), block);
//! b.connect(block, b.exit());
//! let cfg = b.build().unwrap();
//!
//! let analysis = ForwardAnalysis::new(ReachingDefinitionTransfer, AnalysisConfig::default());
//! let result = analysis.perform_analysis(&cfg).unwrap();
//! let exit = result.regular_exit_store().unwrap();
//! assert_eq!(exit.len(), 1);
//! ```
//!
//! ## Core Components
//!
//! - **[`cfg`]**: The input model: nodes, blocks, and a validating builder.
//! - **[`analysis`]**: The forward and backward fixed-point engines and their results.
//! - **[`transfer`]**, **[`store`]**, **[`value`]**: The contracts a checker implements.
//! - **[`constant_propagation`]**, **[`reaching_definitions`]**, **[`live_variables`]**: Reference analyses.
//! - **[`qualifier`]**: Generic machinery for qualifier hierarchies (nullness, tainting, ...).
//! - **[`visualize`]**: Text and Graphviz renderings of graphs with their analysis results.

pub mod analysis;
pub mod cfg;
pub mod constant_propagation;
pub mod error;
pub mod expression;
pub mod live_variables;
pub mod qualifier;
pub mod reaching_definitions;
pub mod store;
pub mod transfer;
pub mod value;
pub mod visualize;
