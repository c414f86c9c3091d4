use crate::cfg::{BinaryOp, ComparisonOp, NodeId, UnderlyingAst};
use crate::error::AnalysisError;
use crate::transfer::{ForwardTransferFunction, NodeVisitor, TransferContext, TransferInput, TransferResult};

use super::{Constant, ConstantPropagationStore};

type Transferred = Result<TransferResult<Constant, ConstantPropagationStore>, AnalysisError>;

/// Constant propagation over local variables.
///
/// Parameters start out unknown. Integer literals and arithmetic on constants
/// produce constants, and an equality test between a local and a constant
/// pins the local in the then branch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantPropagationTransfer;

impl ConstantPropagationTransfer {
    /// Value of an operand, Top if the operand produced none.
    fn operand(cx: &TransferContext<'_, Constant>, id: NodeId) -> Constant {
        cx.value_of(id).cloned().unwrap_or(Constant::Top)
    }

    fn refine(store: &mut ConstantPropagationStore, local: Option<&str>, value: Option<&Constant>) {
        if let (Some(name), Some(value)) = (local, value) {
            if !value.is_constant() {
                return;
            }
            match store.information(name) {
                Constant::Top | Constant::Bottom => store.set_information(name, value.clone()),
                // Conflicting constants: the branch cannot be taken, keep the fact.
                Constant::Value(_) => {}
            }
        }
    }
}

impl NodeVisitor<Constant, ConstantPropagationStore> for ConstantPropagationTransfer {
    fn visit_local_variable(
        &self,
        name: &str,
        _cx: &TransferContext<'_, Constant>,
        input: TransferInput<ConstantPropagationStore>,
    ) -> Transferred {
        let store = input.into_regular_store();
        let value = store.information(name);
        Ok(TransferResult::regular(Some(value), store))
    }

    fn visit_integer_literal(
        &self,
        value: i64,
        _cx: &TransferContext<'_, Constant>,
        input: TransferInput<ConstantPropagationStore>,
    ) -> Transferred {
        Ok(TransferResult::regular(Some(Constant::value(value)), input.into_regular_store()))
    }

    fn visit_assignment(
        &self,
        target: NodeId,
        expression: NodeId,
        cx: &TransferContext<'_, Constant>,
        input: TransferInput<ConstantPropagationStore>,
    ) -> Transferred {
        let mut store = input.into_regular_store();
        match cx.local_name(target) {
            Some(name) => {
                let value = Self::operand(cx, expression);
                store.set_information(name, value.clone());
                Ok(TransferResult::regular(Some(value), store))
            }
            None => Ok(TransferResult::regular(None, store)),
        }
    }

    fn visit_binary(
        &self,
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
        cx: &TransferContext<'_, Constant>,
        input: TransferInput<ConstantPropagationStore>,
    ) -> Transferred {
        let value = Self::operand(cx, lhs).apply(op, &Self::operand(cx, rhs));
        Ok(TransferResult::regular(Some(value), input.into_regular_store()))
    }

    fn visit_comparison(
        &self,
        op: ComparisonOp,
        lhs: NodeId,
        rhs: NodeId,
        cx: &TransferContext<'_, Constant>,
        input: TransferInput<ConstantPropagationStore>,
    ) -> Transferred {
        let store = input.into_regular_store();
        if op != ComparisonOp::Eq {
            return Ok(TransferResult::regular(None, store));
        }
        let mut then_store = store.clone();
        Self::refine(&mut then_store, cx.local_name(lhs), cx.value_of(rhs));
        Self::refine(&mut then_store, cx.local_name(rhs), cx.value_of(lhs));
        Ok(TransferResult::conditional(None, then_store, store))
    }
}

impl ForwardTransferFunction<Constant, ConstantPropagationStore> for ConstantPropagationTransfer {
    fn initial_store(&self, _ast: &UnderlyingAst, parameters: &[String]) -> ConstantPropagationStore {
        let mut store = ConstantPropagationStore::new();
        for parameter in parameters {
            store.set_information(parameter, Constant::Top);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisConfig, ForwardAnalysis};
    use crate::cfg::CfgBuilder;
    use test_log::test;

    fn analysis() -> ForwardAnalysis<Constant, ConstantPropagationStore, ConstantPropagationTransfer> {
        ForwardAnalysis::new(ConstantPropagationTransfer, AnalysisConfig::default())
    }

    #[test]
    fn test_straight_line_folding() {
        let mut b = CfgBuilder::method("m", &[]);
        let block = b.regular_block();
        let two = b.int(block, 2);
        b.assign(block, "x", two);
        let x = b.local(block, "x");
        let three = b.int(block, 3);
        let product = b.binary(block, BinaryOp::Mul, x, three);
        let assign_y = b.assign(block, "y", product);
        b.connect(b.entry(), block);
        b.connect(block, b.exit());
        let cfg = b.build().unwrap();

        let result = analysis().perform_analysis(&cfg).unwrap();
        assert_eq!(result.value(product), Some(&Constant::value(6)));
        let store = result.store_after(assign_y).unwrap();
        assert_eq!(store.information("x"), Constant::value(2));
        assert_eq!(store.information("y"), Constant::value(6));
    }

    #[test]
    fn test_parameters_are_unknown() {
        let mut b = CfgBuilder::method("m", &["p"]);
        let block = b.regular_block();
        let p = b.local(block, "p");
        let one = b.int(block, 1);
        let sum = b.binary(block, BinaryOp::Add, p, one);
        b.assign(block, "q", sum);
        b.connect(b.entry(), block);
        b.connect(block, b.exit());
        let cfg = b.build().unwrap();

        let result = analysis().perform_analysis(&cfg).unwrap();
        assert_eq!(result.value(sum), Some(&Constant::Top));
        let exit = result.regular_exit_store().unwrap();
        assert_eq!(exit.information("p"), Constant::Top);
        assert_eq!(exit.information("q"), Constant::Top);
    }

    #[test]
    fn test_method_result_is_unknown() {
        let mut b = CfgBuilder::method("m", &[]);
        let block = b.regular_block();
        let call = b.call(block, "f", None, &[]);
        b.assign(block, "x", call);
        b.connect(b.entry(), block);
        b.connect(block, b.exit());
        let cfg = b.build().unwrap();

        let result = analysis().perform_analysis(&cfg).unwrap();
        assert_eq!(result.value(call), None);
        assert_eq!(result.regular_exit_store().unwrap().information("x"), Constant::Top);
    }

    #[test]
    fn test_equality_refines_then_branch() {
        // if (p == 4) { a = p; } else { b = p; }
        let mut b = CfgBuilder::method("m", &["p"]);
        let test = b.regular_block();
        let p = b.local(test, "p");
        let four = b.int(test, 4);
        let eq = b.compare(test, ComparisonOp::Eq, p, four);
        let cond = b.conditional_block();
        let then_block = b.regular_block();
        let p_then = b.local(then_block, "p");
        let assign_a = b.assign(then_block, "a", p_then);
        let else_block = b.regular_block();
        let p_else = b.local(else_block, "p");
        let assign_b = b.assign(else_block, "b", p_else);
        b.connect(b.entry(), test);
        b.connect(test, cond);
        b.branch(cond, then_block, else_block);
        b.connect(then_block, b.exit());
        b.connect(else_block, b.exit());
        let cfg = b.build().unwrap();

        let result = analysis().perform_analysis(&cfg).unwrap();
        assert_eq!(result.then_store_after(eq).unwrap().information("p"), Constant::value(4));
        assert_eq!(result.else_store_after(eq).unwrap().information("p"), Constant::Top);
        assert_eq!(result.store_after(assign_a).unwrap().information("a"), Constant::value(4));
        assert_eq!(result.store_after(assign_b).unwrap().information("b"), Constant::Top);
        assert_eq!(result.regular_exit_store().unwrap().information("p"), Constant::Top);
    }

    #[test]
    fn test_equality_keeps_conflicting_constant() {
        // x = 3; if (x == 4) { a = x; }
        let mut b = CfgBuilder::method("m", &[]);
        let test = b.regular_block();
        let three = b.int(test, 3);
        b.assign(test, "x", three);
        let x = b.local(test, "x");
        let four = b.int(test, 4);
        let eq = b.compare(test, ComparisonOp::Eq, x, four);
        let cond = b.conditional_block();
        let then_block = b.regular_block();
        let x_then = b.local(then_block, "x");
        let assign_a = b.assign(then_block, "a", x_then);
        b.connect(b.entry(), test);
        b.connect(test, cond);
        b.branch(cond, then_block, b.exit());
        b.connect(then_block, b.exit());
        let cfg = b.build().unwrap();

        let result = analysis().perform_analysis(&cfg).unwrap();
        assert_eq!(result.then_store_after(eq).unwrap().information("x"), Constant::value(3));
        assert_eq!(result.else_store_after(eq).unwrap().information("x"), Constant::value(3));
        assert_eq!(result.store_after(assign_a).unwrap().information("a"), Constant::value(3));
    }
}
