//! Textual and Graphviz rendering of control flow graphs and analysis results.
//!
//! Rendering is pure presentation: nothing here feeds back into an analysis.
//! Stores describe themselves through the [`StoreVisualizer`] callbacks, so the
//! same store renders as plain text or as a DOT label.
//!
//! # DOT Format
//!
//! The generated DOT output follows these conventions:
//! - **Regular and exception blocks** are rectangles listing their nodes
//! - **Conditional blocks** are octagons
//! - **Special blocks** (entry, exit, exceptional exit) are ovals
//! - **Edges** are labeled with their flow rule, `then`/`else` for branches,
//!   and the exception cause for exceptional edges (dashed)

use std::fmt::{self, Display, Write as _};

use crate::analysis::{AnalysisResult, Direction};
use crate::cfg::{Block, BlockId, ControlFlowGraph, SpecialKind};
use crate::store::Store;
use crate::transfer::{Stores, TransferInput};
use crate::value::AbstractValue;

/// Callbacks a store uses to describe its contents.
pub trait StoreVisualizer {
    fn visualize_store_header(&self, class_name: &str) -> String;

    fn visualize_store_local_var(&self, name: &str, value: &dyn Display) -> String;

    fn visualize_store_key_val(&self, key: &str, value: &dyn Display) -> String;

    fn visualize_store_footer(&self) -> String;
}

/// Plain-text rendering, one line per block element.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCfgVisualizer;

impl StoreVisualizer for StringCfgVisualizer {
    fn visualize_store_header(&self, class_name: &str) -> String {
        format!("{} (\n", class_name)
    }

    fn visualize_store_local_var(&self, name: &str, value: &dyn Display) -> String {
        format!("  {} > {}\n", name, value)
    }

    fn visualize_store_key_val(&self, key: &str, value: &dyn Display) -> String {
        format!("  {} = {}\n", key, value)
    }

    fn visualize_store_footer(&self) -> String {
        ")".to_string()
    }
}

impl StringCfgVisualizer {
    /// Renders every block of `cfg`, with stores and node values from `result` if given.
    pub fn visualize<V, S>(&self, cfg: &ControlFlowGraph, result: Option<&AnalysisResult<V, S>>) -> String
    where
        V: AbstractValue + Display,
        S: Store,
    {
        let mut out = String::new();
        for (id, block) in cfg.blocks() {
            out.push_str(&format!("{} [{}]\n", cfg.block_label(id), block.type_name()));
            for line in block_lines(cfg, id, result, self) {
                for part in line.lines() {
                    out.push_str("  ");
                    out.push_str(part);
                    out.push('\n');
                }
            }
            for (label, succ, _) in edge_labels(block) {
                out.push_str(&format!("  {} -> {}\n", label, succ));
            }
        }
        out
    }
}

/// Configuration options for DOT output generation.
///
/// Use `DotConfig::default()` for standard settings.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for regular and exception blocks (default: "rectangle")
    pub block_shape: &'static str,
    /// Shape for conditional blocks (default: "polygon sides=8")
    pub conditional_shape: &'static str,
    /// Shape for entry and exit blocks (default: "oval")
    pub special_shape: &'static str,
    /// Style for regular edges (default: "solid")
    pub edge_style: &'static str,
    /// Style for exceptional edges (default: "dashed")
    pub exceptional_edge_style: &'static str,
    /// Whether to include stores in block labels (default: true)
    pub show_stores: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            block_shape: "rectangle",
            conditional_shape: "polygon sides=8",
            special_shape: "oval",
            edge_style: "solid",
            exceptional_edge_style: "dashed",
            show_stores: true,
        }
    }
}

/// Graphviz rendering of a control flow graph.
#[derive(Debug, Clone, Default)]
pub struct DotCfgVisualizer {
    pub config: DotConfig,
}

impl StoreVisualizer for DotCfgVisualizer {
    fn visualize_store_header(&self, class_name: &str) -> String {
        format!("{} (\\l", class_name)
    }

    fn visualize_store_local_var(&self, name: &str, value: &dyn Display) -> String {
        format!("  {} > {}\\l", name, value)
    }

    fn visualize_store_key_val(&self, key: &str, value: &dyn Display) -> String {
        format!("  {} = {}\\l", key, value)
    }

    fn visualize_store_footer(&self) -> String {
        ")".to_string()
    }
}

impl DotCfgVisualizer {
    pub fn new(config: DotConfig) -> Self {
        Self { config }
    }

    /// Converts a control flow graph to DOT format.
    ///
    /// Only blocks reachable from the entry are drawn.
    pub fn visualize<V, S>(&self, cfg: &ControlFlowGraph, result: Option<&AnalysisResult<V, S>>) -> Result<String, fmt::Error>
    where
        V: AbstractValue + Display,
        S: Store,
    {
        let config = &self.config;
        let result = if config.show_stores { result } else { None };
        let order = cfg.depth_first_order();

        let mut dot = String::new();
        writeln!(dot, "digraph {{")?;
        writeln!(dot, "    node [shape={}];", config.block_shape)?;
        writeln!(dot)?;

        for &id in &order {
            let block = cfg.block(id);
            let shape = match block {
                Block::Conditional { .. } => format!("shape={} ", config.conditional_shape),
                Block::Special { .. } => format!("shape={} ", config.special_shape),
                _ => String::new(),
            };
            let mut label = String::new();
            for line in block_lines(cfg, id, result, self) {
                label.push_str(&escape_line(&line));
                label.push_str("\\l");
            }
            writeln!(dot, "    {} [{}label=\"{}\"];", id.index(), shape, label)?;
        }
        writeln!(dot)?;

        for &id in &order {
            let block = cfg.block(id);
            for (label, succ, exceptional) in edge_labels(block) {
                let style = if exceptional {
                    config.exceptional_edge_style
                } else {
                    config.edge_style
                };
                writeln!(
                    dot,
                    "    {} -> {} [label=\"{}\", style={}];",
                    id.index(),
                    succ.index(),
                    label.replace('\n', "\\n"),
                    style
                )?;
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}

/// Escapes quotes, keeping the `\l` line breaks produced by the store callbacks.
fn escape_line(s: &str) -> String {
    s.replace("\\l", "\u{0}")
        .replace('"', "\\\"")
        .replace('\n', "\\l")
        .replace('\u{0}', "\\l")
}

/// Labeled outgoing edges of a block, flagging exceptional ones.
fn edge_labels(block: &Block) -> Vec<(String, BlockId, bool)> {
    let mut edges = Vec::new();
    match block {
        Block::Regular { successor, flow_rule, .. } | Block::Special { successor, flow_rule, .. } => {
            if let Some(succ) = successor {
                edges.push((flow_rule.to_string(), *succ, false));
            }
        }
        Block::Conditional {
            then_successor,
            else_successor,
            then_flow_rule,
            else_flow_rule,
        } => {
            if let Some(succ) = then_successor {
                edges.push((format!("then\n{}", then_flow_rule), *succ, false));
            }
            if let Some(succ) = else_successor {
                edges.push((format!("else\n{}", else_flow_rule), *succ, false));
            }
        }
        Block::Exception {
            successor,
            flow_rule,
            exceptional_successors,
            ..
        } => {
            if let Some(succ) = successor {
                edges.push((flow_rule.to_string(), *succ, false));
            }
            for (cause, succs) in exceptional_successors {
                let cause = cause.strip_prefix("java.lang.").unwrap_or(cause);
                for succ in succs {
                    edges.push((cause.to_string(), *succ, true));
                }
            }
        }
    }
    edges
}

pub(crate) fn render_input<S: Store>(input: &TransferInput<S>, viz: &dyn StoreVisualizer) -> String {
    match &input.stores {
        Stores::Regular(store) => format!("[{}]", store.visualize(viz)),
        Stores::Conditional { then_store, else_store } => {
            format!("[then={}, else={}]", then_store.visualize(viz), else_store.visualize(viz))
        }
    }
}

/// Content lines of one block: stores around the nodes, one line per node.
fn block_lines<V, S>(
    cfg: &ControlFlowGraph,
    id: BlockId,
    result: Option<&AnalysisResult<V, S>>,
    viz: &dyn StoreVisualizer,
) -> Vec<String>
where
    V: AbstractValue + Display,
    S: Store,
{
    let block = cfg.block(id);
    let mut lines = Vec::new();

    if let Block::Special { kind, .. } = block {
        lines.push(
            match kind {
                SpecialKind::Entry => "<entry>",
                SpecialKind::Exit => "<exit>",
                SpecialKind::ExceptionalExit => "<exceptional-exit>",
            }
            .to_string(),
        );
    }

    for &node in block.nodes() {
        let kind = cfg.node(node).kind.name();
        let value = result
            .and_then(|r| r.value(node))
            .map(|v| format!("    > {}", v))
            .unwrap_or_default();
        lines.push(format!("{}: {}   [ {} ]{}", node, cfg.expression(node), kind, value));
    }

    if let Some(result) = result {
        match result.direction() {
            Direction::Forward => {
                if let Some(input) = result.block_input(id) {
                    lines.insert(0, format!("Before: {}", render_input(input, viz)));
                    lines.insert(1, "~~~~~~~~~".to_string());
                }
                if let Some(last) = block.last_node() {
                    if let (Some(then_store), Some(else_store)) = (result.then_store_after(last), result.else_store_after(last)) {
                        lines.push("~~~~~~~~~".to_string());
                        let after = if then_store == else_store {
                            format!("[{}]", then_store.visualize(viz))
                        } else {
                            format!("[then={}, else={}]", then_store.visualize(viz), else_store.visualize(viz))
                        };
                        lines.push(format!("After: {}", after));
                    }
                }
            }
            Direction::Backward => {
                if let Some(before) = block.first_node().and_then(|n| result.store_before(n)) {
                    lines.insert(0, format!("Before: [{}]", before.visualize(viz)));
                    lines.insert(1, "~~~~~~~~~".to_string());
                }
                if let Some(input) = result.block_input(id) {
                    lines.push("~~~~~~~~~".to_string());
                    lines.push(format!("After: {}", render_input(input, viz)));
                }
            }
        }
    }

    lines
}
