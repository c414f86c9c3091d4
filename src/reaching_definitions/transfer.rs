use crate::cfg::{NodeId, UnderlyingAst};
use crate::error::AnalysisError;
use crate::expression::Expression;
use crate::transfer::{ForwardTransferFunction, NodeVisitor, TransferContext, TransferInput, TransferResult};
use crate::value::UnusedValue;

use super::{ReachingDefinition, ReachingDefinitionStore};

/// Reaching definitions: each assignment kills the definitions of its target,
/// then adds itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReachingDefinitionTransfer;

impl NodeVisitor<UnusedValue, ReachingDefinitionStore> for ReachingDefinitionTransfer {
    fn visit_assignment(
        &self,
        target: NodeId,
        expression: NodeId,
        cx: &TransferContext<'_, UnusedValue>,
        input: TransferInput<ReachingDefinitionStore>,
    ) -> Result<TransferResult<UnusedValue, ReachingDefinitionStore>, AnalysisError> {
        let target = cx.expression(target);
        if !matches!(target, Expression::Local(_) | Expression::FieldAccess { .. }) {
            return Err(cx.unexpected("ReachingDefinitionTransfer"));
        }
        let mut store = input.into_regular_store();
        let definition = ReachingDefinition::new(target, cx.expression(expression));
        store.kill_def(&definition.target);
        store.put_def(definition);
        Ok(TransferResult::regular(None, store))
    }
}

impl ForwardTransferFunction<UnusedValue, ReachingDefinitionStore> for ReachingDefinitionTransfer {
    fn initial_store(&self, _ast: &UnderlyingAst, _parameters: &[String]) -> ReachingDefinitionStore {
        ReachingDefinitionStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisConfig, ForwardAnalysis};
    use crate::cfg::CfgBuilder;
    use test_log::test;

    #[test]
    fn test_field_definitions_are_tracked_by_target() {
        // o.f = 1; o.g = 2; o.f = 3;
        let mut b = CfgBuilder::method("m", &["o"]);
        let block = b.regular_block();
        for (field, value) in [("f", 1), ("g", 2), ("f", 3)] {
            let o = b.local(block, "o");
            let target = b.field(block, o, field);
            let value = b.int(block, value);
            b.assign_to(block, target, value);
        }
        b.connect(b.entry(), block);
        b.connect(block, b.exit());
        let cfg = b.build().unwrap();

        let analysis = ForwardAnalysis::new(ReachingDefinitionTransfer, AnalysisConfig::default());
        let result = analysis.perform_analysis(&cfg).unwrap();
        let exit = result.regular_exit_store().unwrap();
        let o_f = Expression::field(Expression::local("o"), "f");
        let o_g = Expression::field(Expression::local("o"), "g");
        assert!(exit.contains(&ReachingDefinition::new(o_f.clone(), Expression::Integer(3))));
        assert!(!exit.contains(&ReachingDefinition::new(o_f, Expression::Integer(1))));
        assert!(exit.contains(&ReachingDefinition::new(o_g, Expression::Integer(2))));
        assert_eq!(exit.len(), 2);
    }

    #[test]
    fn test_assignment_to_non_location_is_rejected() {
        // f() = 1;
        let mut b = CfgBuilder::method("m", &[]);
        let block = b.regular_block();
        let call = b.call(block, "f", None, &[]);
        let one = b.int(block, 1);
        let assign = b.assign_to(block, call, one);
        b.connect(b.entry(), block);
        b.connect(block, b.exit());
        let cfg = b.build().unwrap();

        let analysis = ForwardAnalysis::new(ReachingDefinitionTransfer, AnalysisConfig::default());
        let error = analysis.perform_analysis(&cfg).unwrap_err();
        assert_eq!(
            error,
            AnalysisError::UnexpectedNode {
                transfer: "ReachingDefinitionTransfer",
                node: assign,
                kind: "assignment",
            }
        );
    }
}
