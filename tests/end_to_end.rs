//! End-to-end tests: graphs built through the public API, analyzed to a fixed point.
//!
//! Tests cover the reference analyses, exceptional control flow, widening, and
//! the failure modes of the engine.

use dataflow_rs::analysis::{AnalysisConfig, BackwardAnalysis, ForwardAnalysis};
use dataflow_rs::cfg::{BinaryOp, BlockId, CfgBuilder, ControlFlowGraph, NodeId};
use dataflow_rs::constant_propagation::{Constant, ConstantPropagationTransfer};
use dataflow_rs::error::AnalysisError;
use dataflow_rs::expression::Expression;
use dataflow_rs::live_variables::LiveVariableTransfer;
use dataflow_rs::reaching_definitions::{ReachingDefinition, ReachingDefinitionTransfer};
use dataflow_rs::store::Store;
use dataflow_rs::visualize::StringCfgVisualizer;
use test_log::test;

// ─── Graphs ────────────────────────────────────────────────────────────────────

/// `x = 1; y = 2; if (cond) { x = 3; } z = x;`
///
/// Returns the graph and the `z = x` assignment.
fn branch_graph() -> (ControlFlowGraph, NodeId) {
    let mut b = CfgBuilder::method("m", &["cond"]);
    let start = b.regular_block();
    let one = b.int(start, 1);
    b.assign(start, "x", one);
    let two = b.int(start, 2);
    b.assign(start, "y", two);
    b.local(start, "cond");
    let test = b.conditional_block();
    let then_block = b.regular_block();
    let three = b.int(then_block, 3);
    b.assign(then_block, "x", three);
    let join = b.regular_block();
    let x = b.local(join, "x");
    let assign_z = b.assign(join, "z", x);
    b.connect(b.entry(), start);
    b.connect(start, test);
    b.branch(test, then_block, join);
    b.connect(then_block, join);
    b.connect(join, b.exit());
    (b.build().unwrap(), assign_z)
}

/// `x = 0; while (cond) { x = x + 1; }`
///
/// Returns the graph, the loop body and the block after the loop.
fn counting_loop() -> (ControlFlowGraph, BlockId, BlockId) {
    let mut b = CfgBuilder::method("m", &["cond"]);
    let init = b.regular_block();
    let zero = b.int(init, 0);
    b.assign(init, "x", zero);
    let head = b.regular_block();
    b.local(head, "cond");
    let test = b.conditional_block();
    let body = b.regular_block();
    let x = b.local(body, "x");
    let one = b.int(body, 1);
    let sum = b.binary(body, BinaryOp::Add, x, one);
    b.assign(body, "x", sum);
    let after = b.regular_block();
    b.marker(after, "after loop");
    b.connect(b.entry(), init);
    b.connect(init, head);
    b.connect(head, test);
    b.branch(test, body, after);
    b.connect(body, head);
    b.connect(after, b.exit());
    (b.build().unwrap(), body, after)
}

/// `x = 1; try { foo(); x = 2; } catch (RuntimeException e) { y = x; }`
///
/// Returns the graph and the `y = x` assignment.
fn try_catch() -> (ControlFlowGraph, NodeId) {
    let mut b = CfgBuilder::method("m", &[]);
    let start = b.regular_block();
    let one = b.int(start, 1);
    b.assign(start, "x", one);
    let call = b.exception_block();
    b.call(call, "foo", None, &[]);
    let rest = b.regular_block();
    let two = b.int(rest, 2);
    b.assign(rest, "x", two);
    let handler = b.regular_block();
    let x = b.local(handler, "x");
    let assign_y = b.assign(handler, "y", x);
    b.connect(b.entry(), start);
    b.connect(start, call);
    b.connect(call, rest);
    b.throws(call, "java.lang.RuntimeException", handler);
    b.connect(rest, b.exit());
    b.connect(handler, b.exit());
    (b.build().unwrap(), assign_y)
}

// ─── Constant Propagation ──────────────────────────────────────────────────────

#[test]
fn constant_propagation_merges_branches() {
    let (cfg, assign_z) = branch_graph();
    let analysis = ForwardAnalysis::new(ConstantPropagationTransfer, AnalysisConfig::default());
    let result = analysis.perform_analysis(&cfg).unwrap();

    let before = result.store_before(assign_z).unwrap();
    assert_eq!(before.information("x"), Constant::Top);
    assert_eq!(before.information("y"), Constant::value(2));
    assert_eq!(result.value(assign_z), Some(&Constant::Top));

    let exit = result.regular_exit_store().unwrap();
    assert_eq!(exit.information("z"), Constant::Top);
}

#[test]
fn constant_propagation_loop_converges_to_top() {
    let (cfg, body, after) = counting_loop();
    let analysis = ForwardAnalysis::new(ConstantPropagationTransfer, AnalysisConfig::default());
    let result = analysis.perform_analysis(&cfg).unwrap();

    assert_eq!(result.store_before_block(body).unwrap().information("x"), Constant::Top);
    assert_eq!(result.store_before_block(after).unwrap().information("x"), Constant::Top);
    assert_eq!(result.regular_exit_store().unwrap().information("x"), Constant::Top);
}

#[test]
fn constant_propagation_loop_with_widening() {
    let (cfg, body, _) = counting_loop();
    let config = AnalysisConfig::default().with_widening(1);
    let analysis = ForwardAnalysis::new(ConstantPropagationTransfer, config);
    let result = analysis.perform_analysis(&cfg).unwrap();
    assert_eq!(result.store_before_block(body).unwrap().information("x"), Constant::Top);
}

// ─── Reaching Definitions ──────────────────────────────────────────────────────

#[test]
fn reaching_definitions_second_write_shadows_first() {
    // x = 1; x = 2;
    let mut b = CfgBuilder::method("m", &[]);
    let block = b.regular_block();
    let one = b.int(block, 1);
    b.assign(block, "x", one);
    let two = b.int(block, 2);
    let second = b.assign(block, "x", two);
    b.connect(b.entry(), block);
    b.connect(block, b.exit());
    let cfg = b.build().unwrap();

    let analysis = ForwardAnalysis::new(ReachingDefinitionTransfer, AnalysisConfig::default());
    let result = analysis.perform_analysis(&cfg).unwrap();

    let store = result.store_after(second).unwrap();
    let x = Expression::local("x");
    let definitions: Vec<_> = store.definitions_of(&x).collect();
    assert_eq!(definitions, vec![&ReachingDefinition::new(x.clone(), Expression::Integer(2))]);
}

#[test]
fn reaching_definitions_join_both_paths() {
    let (cfg, assign_z) = branch_graph();
    let analysis = ForwardAnalysis::new(ReachingDefinitionTransfer, AnalysisConfig::default());
    let result = analysis.perform_analysis(&cfg).unwrap();

    let store = result.store_before(assign_z).unwrap();
    let x = Expression::local("x");
    assert_eq!(store.definitions_of(&x).count(), 2);
    assert_eq!(store.definitions_of(&Expression::local("y")).count(), 1);
}

#[test]
fn reaching_definitions_reject_widening() {
    let (cfg, _, _) = counting_loop();
    let config = AnalysisConfig::default().with_widening(1);
    let analysis = ForwardAnalysis::new(ReachingDefinitionTransfer, config);
    let error = analysis.perform_analysis(&cfg).unwrap_err();
    assert_eq!(
        error,
        AnalysisError::WideningUnsupported {
            store: "ReachingDefinitionStore"
        }
    );
}

// ─── Exceptional Flow ──────────────────────────────────────────────────────────

#[test]
fn exceptional_edge_carries_store_before_throwing_node() {
    let (cfg, assign_y) = try_catch();
    let analysis = ForwardAnalysis::new(ConstantPropagationTransfer, AnalysisConfig::default());
    let result = analysis.perform_analysis(&cfg).unwrap();

    assert_eq!(result.value(assign_y), Some(&Constant::value(1)));
    assert_eq!(result.regular_exit_store().unwrap().information("x"), Constant::Top);
}

#[test]
fn ignored_exception_type_is_not_followed() {
    let (cfg, assign_y) = try_catch();
    let config = AnalysisConfig::default().ignore_exception_type("java.lang.RuntimeException");
    let analysis = ForwardAnalysis::new(ConstantPropagationTransfer, config);
    let result = analysis.perform_analysis(&cfg).unwrap();

    assert_eq!(result.value(assign_y), None);
    assert_eq!(result.store_before(assign_y), None);
    assert_eq!(result.regular_exit_store().unwrap().information("x"), Constant::value(2));
}

// ─── Backward Analysis ─────────────────────────────────────────────────────────

/// `a = p; try { foo(); return; } catch (IOException e) { return a; }`
fn live_across_handler() -> (ControlFlowGraph, BlockId) {
    let mut b = CfgBuilder::method("m", &["p"]);
    let start = b.regular_block();
    let p = b.local(start, "p");
    b.assign(start, "a", p);
    let call = b.exception_block();
    b.call(call, "foo", None, &[]);
    let normal = b.regular_block();
    b.ret(normal, None);
    let handler = b.regular_block();
    let a = b.local(handler, "a");
    b.ret(handler, Some(a));
    b.connect(b.entry(), start);
    b.connect(start, call);
    b.connect(call, normal);
    b.throws(call, "java.io.IOException", handler);
    b.connect(normal, b.exit());
    b.connect(handler, b.exit());
    (b.build().unwrap(), start)
}

#[test]
fn live_variables_flow_back_from_handler() {
    let (cfg, start) = live_across_handler();
    let analysis = BackwardAnalysis::new(LiveVariableTransfer, AnalysisConfig::default());
    let result = analysis.perform_analysis(&cfg).unwrap();

    assert!(result.store_after_block(start).unwrap().is_live("a"));
    let entry = result.entry_store().unwrap();
    assert!(entry.is_live("p"));
    assert!(!entry.is_live("a"));
    assert_eq!(result.return_statement_stores().len(), 2);
}

#[test]
fn live_variables_skip_ignored_handler() {
    let (cfg, start) = live_across_handler();
    let config = AnalysisConfig::default().ignore_exception_type("java.io.IOException");
    let analysis = BackwardAnalysis::new(LiveVariableTransfer, config);
    let result = analysis.perform_analysis(&cfg).unwrap();
    assert!(!result.store_after_block(start).unwrap().is_live("a"));
}

#[test]
fn backward_analysis_ignores_widening_threshold() {
    let (cfg, body, after) = counting_loop();
    let plain = BackwardAnalysis::new(LiveVariableTransfer, AnalysisConfig::default())
        .perform_analysis(&cfg)
        .unwrap();
    let widened = BackwardAnalysis::new(LiveVariableTransfer, AnalysisConfig::default().with_widening(1))
        .perform_analysis(&cfg)
        .unwrap();

    assert!(widened.store_before_block(body).unwrap().is_live("x"));
    assert_eq!(widened.store_before_block(body), plain.store_before_block(body));
    assert_eq!(widened.store_before_block(after), plain.store_before_block(after));
    assert_eq!(widened.entry_store(), plain.entry_store());
}

#[test]
fn backward_analysis_needs_reachable_exit() {
    // while (true) {}
    let mut b = CfgBuilder::method("m", &[]);
    let spin = b.regular_block();
    b.marker(spin, "spin");
    b.connect(b.entry(), spin);
    b.connect(spin, spin);
    let cfg = b.build().unwrap();

    let analysis = BackwardAnalysis::new(LiveVariableTransfer, AnalysisConfig::default());
    assert_eq!(analysis.perform_analysis(&cfg).unwrap_err(), AnalysisError::NoReachableExit);
}

// ─── Results ───────────────────────────────────────────────────────────────────

#[test]
fn stores_join_monotonically_along_the_graph() {
    let (cfg, assign_z) = branch_graph();
    let analysis = ForwardAnalysis::new(ConstantPropagationTransfer, AnalysisConfig::default());
    let result = analysis.perform_analysis(&cfg).unwrap();

    // The store before the join is above the stores arriving from both paths.
    let join = cfg.block_of(assign_z);
    let before_join = result.store_before_block(join).unwrap();
    for &pred in cfg.predecessors(join) {
        let incoming = result.store_after_block(pred).unwrap();
        assert_eq!(&incoming.least_upper_bound(before_join), before_join);
    }
}

#[test]
fn text_dump_shows_values_and_stores() {
    let (cfg, _) = branch_graph();
    let analysis = ForwardAnalysis::new(ConstantPropagationTransfer, AnalysisConfig::default());
    let result = analysis.perform_analysis(&cfg).unwrap();

    let text = StringCfgVisualizer.visualize(&cfg, Some(&result));
    assert!(text.contains("x = 3   [ assignment ]    > 3"));
    assert!(text.contains("    x > T"));

    let debug = result.to_string_debug();
    assert!(debug.starts_with("AnalysisResult(Forward)"));
}
