use crate::cfg::{ComparisonOp, NodeId, UnderlyingAst};
use crate::error::AnalysisError;
use crate::transfer::{BackwardTransferFunction, NodeVisitor, TransferContext, TransferInput, TransferResult};
use crate::value::UnusedValue;

use super::LiveVariableStore;

type Transferred = Result<TransferResult<UnusedValue, LiveVariableStore>, AnalysisError>;

/// Live variables, computed backward from the exits.
///
/// An assignment to a local kills it, then the locals read on its right-hand
/// side become live. Operands of calls, returns and tests are uses.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveVariableTransfer;

impl LiveVariableTransfer {
    fn uses(cx: &TransferContext<'_, UnusedValue>, input: TransferInput<LiveVariableStore>, operands: &[NodeId]) -> Transferred {
        let mut store = input.into_regular_store();
        for &operand in operands {
            store.add_use_in_expression(&cx.expression(operand));
        }
        Ok(TransferResult::regular(None, store))
    }
}

impl NodeVisitor<UnusedValue, LiveVariableStore> for LiveVariableTransfer {
    fn visit_assignment(
        &self,
        target: NodeId,
        expression: NodeId,
        cx: &TransferContext<'_, UnusedValue>,
        input: TransferInput<LiveVariableStore>,
    ) -> Transferred {
        let mut store = input.into_regular_store();
        let target = cx.expression(target);
        match target.local_name() {
            Some(name) => store.kill_live_var(name),
            // Writing `o.f` reads `o`.
            None => store.add_use_in_expression(&target),
        }
        store.add_use_in_expression(&cx.expression(expression));
        Ok(TransferResult::regular(None, store))
    }

    fn visit_method_invocation(
        &self,
        _method: &str,
        receiver: Option<NodeId>,
        arguments: &[NodeId],
        cx: &TransferContext<'_, UnusedValue>,
        input: TransferInput<LiveVariableStore>,
    ) -> Transferred {
        let operands: Vec<NodeId> = receiver.into_iter().chain(arguments.iter().copied()).collect();
        Self::uses(cx, input, &operands)
    }

    fn visit_return(
        &self,
        result: Option<NodeId>,
        cx: &TransferContext<'_, UnusedValue>,
        input: TransferInput<LiveVariableStore>,
    ) -> Transferred {
        let operands: Vec<NodeId> = result.into_iter().collect();
        Self::uses(cx, input, &operands)
    }

    fn visit_comparison(
        &self,
        _op: ComparisonOp,
        lhs: NodeId,
        rhs: NodeId,
        cx: &TransferContext<'_, UnusedValue>,
        input: TransferInput<LiveVariableStore>,
    ) -> Transferred {
        Self::uses(cx, input, &[lhs, rhs])
    }

    fn visit_conditional_not(
        &self,
        operand: NodeId,
        cx: &TransferContext<'_, UnusedValue>,
        input: TransferInput<LiveVariableStore>,
    ) -> Transferred {
        Self::uses(cx, input, &[operand])
    }
}

impl BackwardTransferFunction<UnusedValue, LiveVariableStore> for LiveVariableTransfer {
    fn initial_normal_exit_store(&self, _ast: &UnderlyingAst, _return_nodes: &[NodeId]) -> LiveVariableStore {
        LiveVariableStore::new()
    }

    fn initial_exceptional_exit_store(&self, _ast: &UnderlyingAst) -> LiveVariableStore {
        LiveVariableStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisConfig, BackwardAnalysis};
    use crate::cfg::{BinaryOp, CfgBuilder};
    use test_log::test;

    fn analysis() -> BackwardAnalysis<UnusedValue, LiveVariableStore, LiveVariableTransfer> {
        BackwardAnalysis::new(LiveVariableTransfer, AnalysisConfig::default())
    }

    #[test]
    fn test_assignment_kills_then_uses() {
        // a = 1; b = a + 1; a = 2; return b;
        let mut b = CfgBuilder::method("m", &[]);
        let block = b.regular_block();
        let one = b.int(block, 1);
        let assign_a = b.assign(block, "a", one);
        let a = b.local(block, "a");
        let one_more = b.int(block, 1);
        let sum = b.binary(block, BinaryOp::Add, a, one_more);
        let assign_b = b.assign(block, "b", sum);
        let two = b.int(block, 2);
        let reassign_a = b.assign(block, "a", two);
        let b_read = b.local(block, "b");
        let ret = b.ret(block, Some(b_read));
        b.connect(b.entry(), block);
        b.connect(block, b.exit());
        let cfg = b.build().unwrap();

        let result = analysis().perform_analysis(&cfg).unwrap();

        let after_ret = result.store_after(ret).unwrap();
        assert_eq!(after_ret.iter().count(), 0);
        let before_ret = result.store_before(ret).unwrap();
        assert!(before_ret.is_live("b"));

        // `a = 2` is dead: `a` is not live after it.
        assert!(!result.store_after(reassign_a).unwrap().is_live("a"));
        assert!(result.store_after(assign_a).unwrap().is_live("a"));
        assert!(!result.store_before(assign_b).unwrap().is_live("b"));
        assert!(result.store_before(assign_b).unwrap().is_live("a"));

        let entry = result.entry_store().unwrap();
        assert_eq!(entry.iter().count(), 0);
    }

    #[test]
    fn test_loop_keeps_variable_live() {
        // i = 0; while (i < n) { i = i + 1; } return;
        let mut b = CfgBuilder::method("m", &["n"]);
        let init = b.regular_block();
        let zero = b.int(init, 0);
        b.assign(init, "i", zero);
        let head = b.regular_block();
        let i = b.local(head, "i");
        let n = b.local(head, "n");
        b.compare(head, ComparisonOp::Lt, i, n);
        let cond = b.conditional_block();
        let body = b.regular_block();
        let i_body = b.local(body, "i");
        let one = b.int(body, 1);
        let inc = b.binary(body, BinaryOp::Add, i_body, one);
        b.assign(body, "i", inc);
        let done = b.regular_block();
        b.ret(done, None);
        b.connect(b.entry(), init);
        b.connect(init, head);
        b.connect(head, cond);
        b.branch(cond, body, done);
        b.connect(body, head);
        b.connect(done, b.exit());
        let cfg = b.build().unwrap();

        let result = analysis().perform_analysis(&cfg).unwrap();
        let after_body = result.store_after_block(body).unwrap();
        assert!(after_body.is_live("i"));
        assert!(after_body.is_live("n"));
        let before_init = result.store_before_block(init).unwrap();
        assert!(!before_init.is_live("i"));
        assert!(before_init.is_live("n"));
        assert!(result.entry_store().unwrap().is_live("n"));
    }
}
