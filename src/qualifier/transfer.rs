use std::sync::Arc;

use crate::cfg::{BinaryOp, ComparisonOp, NodeId, UnderlyingAst};
use crate::error::AnalysisError;
use crate::expression::Expression;
use crate::transfer::{ForwardTransferFunction, NodeVisitor, TransferContext, TransferInput, TransferResult};

use super::{QualifierHierarchy, QualifierStore, QualifierValue};

type Transferred = Result<TransferResult<QualifierValue, QualifierStore>, AnalysisError>;

/// A literal, as seen by [`QualifierRules::literal_value`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Literal<'a> {
    Integer(i64),
    Boolean(bool),
    Str(&'a str),
    Null,
}

/// Facts learned from a boolean test, per branch.
#[derive(Debug, Clone, Default)]
pub struct Refinement {
    pub then_facts: Vec<(Expression, QualifierValue)>,
    pub else_facts: Vec<(Expression, QualifierValue)>,
}

impl Refinement {
    pub fn is_empty(&self) -> bool {
        self.then_facts.is_empty() && self.else_facts.is_empty()
    }
}

/// The checker-specific part of a qualifier analysis.
///
/// Every method has a conservative default, so a checker overrides only the
/// rules its qualifiers need.
pub trait QualifierRules {
    fn hierarchy(&self) -> &Arc<QualifierHierarchy>;

    /// Qualifier of anything the rules say nothing about. Top by default.
    fn default_value(&self) -> QualifierValue {
        QualifierValue::top(self.hierarchy())
    }

    fn literal_value(&self, _literal: Literal<'_>) -> QualifierValue {
        self.default_value()
    }

    fn method_result(&self, _method: &str) -> QualifierValue {
        self.default_value()
    }

    fn binary_result(&self, _op: BinaryOp, _lhs: Option<&QualifierValue>, _rhs: Option<&QualifierValue>) -> QualifierValue {
        self.default_value()
    }

    fn refine_comparison(&self, _op: ComparisonOp, _lhs: &Expression, _rhs: &Expression) -> Refinement {
        Refinement::default()
    }

    /// Calls to a side-effect-free method leave the store untouched.
    fn is_side_effect_free(&self, _method: &str) -> bool {
        false
    }

    /// Repeated calls to a deterministic method with the same operands return
    /// the same value, so facts about the call result are tracked.
    fn is_deterministic(&self, _method: &str) -> bool {
        false
    }

    /// Fields no call can write, such as final fields.
    fn is_unmodifiable_field(&self, _field: &str) -> bool {
        false
    }
}

/// Flow-sensitive refinement of qualifiers, driven by [`QualifierRules`].
///
/// Reads of locals and fields yield the refined fact from the store, or the
/// default qualifier when there is none. Assignments propagate the value of the
/// right-hand side to the target. Calls with side effects forget field facts,
/// and results of deterministic calls are tracked like locals.
#[derive(Debug, Clone)]
pub struct QualifierTransfer<R> {
    rules: R,
}

impl<R: QualifierRules> QualifierTransfer<R> {
    pub fn new(rules: R) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    fn read(&self, expression: &Expression, input: TransferInput<QualifierStore>) -> Transferred {
        let value = input
            .regular_store()
            .value(expression)
            .cloned()
            .unwrap_or_else(|| self.rules.default_value());
        Ok(TransferResult::passthrough(Some(value), input))
    }

    fn is_trackable(&self, expression: &Expression) -> bool {
        expression.is_trackable_with(&|method| self.rules.is_deterministic(method))
    }

    fn literal(&self, literal: Literal<'_>, input: TransferInput<QualifierStore>) -> Transferred {
        Ok(TransferResult::passthrough(Some(self.rules.literal_value(literal)), input))
    }
}

impl<R: QualifierRules> NodeVisitor<QualifierValue, QualifierStore> for QualifierTransfer<R> {
    fn visit_local_variable(
        &self,
        name: &str,
        _cx: &TransferContext<'_, QualifierValue>,
        input: TransferInput<QualifierStore>,
    ) -> Transferred {
        self.read(&Expression::local(name), input)
    }

    fn visit_field_access(
        &self,
        _receiver: NodeId,
        _field: &str,
        cx: &TransferContext<'_, QualifierValue>,
        input: TransferInput<QualifierStore>,
    ) -> Transferred {
        self.read(&cx.expression(cx.node()), input)
    }

    fn visit_integer_literal(&self, value: i64, _cx: &TransferContext<'_, QualifierValue>, input: TransferInput<QualifierStore>) -> Transferred {
        self.literal(Literal::Integer(value), input)
    }

    fn visit_boolean_literal(&self, value: bool, _cx: &TransferContext<'_, QualifierValue>, input: TransferInput<QualifierStore>) -> Transferred {
        self.literal(Literal::Boolean(value), input)
    }

    fn visit_string_literal(&self, value: &str, _cx: &TransferContext<'_, QualifierValue>, input: TransferInput<QualifierStore>) -> Transferred {
        self.literal(Literal::Str(value), input)
    }

    fn visit_null_literal(&self, _cx: &TransferContext<'_, QualifierValue>, input: TransferInput<QualifierStore>) -> Transferred {
        self.literal(Literal::Null, input)
    }

    fn visit_binary(
        &self,
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
        cx: &TransferContext<'_, QualifierValue>,
        input: TransferInput<QualifierStore>,
    ) -> Transferred {
        let value = self.rules.binary_result(op, cx.value_of(lhs), cx.value_of(rhs));
        Ok(TransferResult::passthrough(Some(value), input))
    }

    fn visit_assignment(
        &self,
        target: NodeId,
        expression: NodeId,
        cx: &TransferContext<'_, QualifierValue>,
        input: TransferInput<QualifierStore>,
    ) -> Transferred {
        let target = cx.expression(target);
        if !matches!(target, Expression::Local(_) | Expression::FieldAccess { .. }) {
            return Err(cx.unexpected("QualifierTransfer"));
        }
        let value = cx.value_of(expression).cloned();
        let mut store = input.into_regular_store();
        store.update_for_assignment(&target, value.clone());
        Ok(TransferResult::regular(value, store))
    }

    fn visit_comparison(
        &self,
        op: ComparisonOp,
        lhs: NodeId,
        rhs: NodeId,
        cx: &TransferContext<'_, QualifierValue>,
        input: TransferInput<QualifierStore>,
    ) -> Transferred {
        let refinement = self.rules.refine_comparison(op, &cx.expression(lhs), &cx.expression(rhs));
        let value = Some(self.rules.default_value());
        if refinement.is_empty() {
            return Ok(TransferResult::passthrough(value, input));
        }
        let mut then_store = input.then_store().clone();
        for (expression, fact) in refinement.then_facts {
            if self.is_trackable(&expression) {
                then_store.insert_value(expression, fact);
            }
        }
        let mut else_store = input.else_store().clone();
        for (expression, fact) in refinement.else_facts {
            if self.is_trackable(&expression) {
                else_store.insert_value(expression, fact);
            }
        }
        Ok(TransferResult::conditional(value, then_store, else_store))
    }

    fn visit_method_invocation(
        &self,
        method: &str,
        _receiver: Option<NodeId>,
        _arguments: &[NodeId],
        cx: &TransferContext<'_, QualifierValue>,
        input: TransferInput<QualifierStore>,
    ) -> Transferred {
        let mut store = input.into_regular_store();
        if !self.rules.is_side_effect_free(method) {
            store.update_for_method_call(|field| self.rules.is_unmodifiable_field(field));
        }
        let mut value = self.rules.method_result(method);
        let call = cx.expression(cx.node());
        if self.is_trackable(&call) {
            if let Some(known) = store.value(&call) {
                value = value.greatest_lower_bound(known);
            }
            store.replace_value(call, value.clone());
        }
        Ok(TransferResult::regular(Some(value), store))
    }
}

impl<R: QualifierRules> ForwardTransferFunction<QualifierValue, QualifierStore> for QualifierTransfer<R> {
    fn initial_store(&self, _ast: &UnderlyingAst, parameters: &[String]) -> QualifierStore {
        let mut store = QualifierStore::new();
        for parameter in parameters {
            store.replace_value(Expression::local(parameter.as_str()), QualifierValue::top(self.rules.hierarchy()));
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisConfig, ForwardAnalysis};
    use crate::cfg::{CfgBuilder, ControlFlowGraph};
    use crate::qualifier::HierarchyConfig;
    use test_log::test;

    #[derive(Default)]
    struct Purity {
        side_effect_free: Vec<&'static str>,
        deterministic: Vec<&'static str>,
        final_fields: Vec<&'static str>,
    }

    struct Nullness {
        hierarchy: Arc<QualifierHierarchy>,
        purity: Purity,
    }

    impl Nullness {
        fn new() -> Self {
            Self::with_purity(Purity::default())
        }

        fn with_purity(purity: Purity) -> Self {
            let hierarchy = HierarchyConfig::new("Nullable", "NullBottom")
                .qualifier("NonNull")
                .subtype("NonNull", "Nullable")
                .subtype("NullBottom", "NonNull")
                .build()
                .unwrap();
            Self {
                hierarchy: Arc::new(hierarchy),
                purity,
            }
        }

        fn get(&self, name: &str) -> QualifierValue {
            QualifierValue::by_name(&self.hierarchy, name).unwrap()
        }
    }

    impl QualifierRules for Nullness {
        fn hierarchy(&self) -> &Arc<QualifierHierarchy> {
            &self.hierarchy
        }

        fn literal_value(&self, literal: Literal<'_>) -> QualifierValue {
            match literal {
                Literal::Null => self.get("Nullable"),
                _ => self.get("NonNull"),
            }
        }

        fn refine_comparison(&self, op: ComparisonOp, lhs: &Expression, rhs: &Expression) -> Refinement {
            let checked = match (lhs, rhs) {
                (e, Expression::Null) | (Expression::Null, e) => e.clone(),
                _ => return Refinement::default(),
            };
            let facts = vec![(checked, self.get("NonNull"))];
            match op {
                ComparisonOp::Ne => Refinement {
                    then_facts: facts,
                    else_facts: vec![],
                },
                ComparisonOp::Eq => Refinement {
                    then_facts: vec![],
                    else_facts: facts,
                },
                _ => Refinement::default(),
            }
        }

        fn is_side_effect_free(&self, method: &str) -> bool {
            self.purity.side_effect_free.iter().any(|&m| m == method)
        }

        fn is_deterministic(&self, method: &str) -> bool {
            self.purity.deterministic.iter().any(|&m| m == method)
        }

        fn is_unmodifiable_field(&self, field: &str) -> bool {
            self.purity.final_fields.iter().any(|&m| m == field)
        }
    }

    fn analysis() -> ForwardAnalysis<QualifierValue, QualifierStore, QualifierTransfer<Nullness>> {
        analysis_with(Purity::default())
    }

    fn analysis_with(purity: Purity) -> ForwardAnalysis<QualifierValue, QualifierStore, QualifierTransfer<Nullness>> {
        ForwardAnalysis::new(QualifierTransfer::new(Nullness::with_purity(purity)), AnalysisConfig::default())
    }

    #[test]
    fn test_null_check_refines_then_branch() {
        // x = p; if (x != null) { y = x; } else { y = "s"; } z = y; return z;
        let mut b = CfgBuilder::method("m", &["p"]);
        let start = b.regular_block();
        let p = b.local(start, "p");
        b.assign(start, "x", p);
        let x = b.local(start, "x");
        let null = b.null(start);
        b.compare(start, ComparisonOp::Ne, x, null);
        let cond = b.conditional_block();
        let then_block = b.regular_block();
        let x_then = b.local(then_block, "x");
        let y_then = b.assign(then_block, "y", x_then);
        let else_block = b.regular_block();
        let s = b.string(else_block, "s");
        b.assign(else_block, "y", s);
        let join = b.regular_block();
        let y = b.local(join, "y");
        b.assign(join, "z", y);
        let z = b.local(join, "z");
        b.ret(join, Some(z));
        b.connect(b.entry(), start);
        b.connect(start, cond);
        b.branch(cond, then_block, else_block);
        b.connect(then_block, join);
        b.connect(else_block, join);
        b.connect(join, b.exit());
        let cfg = b.build().unwrap();

        let result = analysis().perform_analysis(&cfg).unwrap();
        let rules = Nullness::new();

        assert_eq!(result.value(x_then), Some(&rules.get("NonNull")));
        assert_eq!(result.value(y_then), Some(&rules.get("NonNull")));

        let exit = result.regular_exit_store().unwrap();
        assert_eq!(exit.value(&Expression::local("z")), Some(&rules.get("NonNull")));
        assert_eq!(exit.value(&Expression::local("x")), Some(&rules.get("Nullable")));
        assert_eq!(exit.value(&Expression::local("p")), Some(&rules.get("Nullable")));
    }

    #[test]
    fn test_call_forgets_field_facts() {
        // o.f = "a"; w = o.f; foo(); v = o.f;
        let mut b = CfgBuilder::method("m", &["o"]);
        let block = b.regular_block();
        let o = b.local(block, "o");
        let target = b.field(block, o, "f");
        let a = b.string(block, "a");
        b.assign_to(block, target, a);
        let o = b.local(block, "o");
        let read_before = b.field(block, o, "f");
        b.assign(block, "w", read_before);
        b.call(block, "foo", None, &[]);
        let o = b.local(block, "o");
        let read_after = b.field(block, o, "f");
        b.assign(block, "v", read_after);
        b.connect(b.entry(), block);
        b.connect(block, b.exit());
        let cfg = b.build().unwrap();

        let result = analysis().perform_analysis(&cfg).unwrap();
        let rules = Nullness::new();
        assert_eq!(result.value(read_before), Some(&rules.get("NonNull")));
        assert_eq!(result.value(read_after), Some(&rules.get("Nullable")));

        let exit = result.regular_exit_store().unwrap();
        assert_eq!(exit.value(&Expression::local("w")), Some(&rules.get("NonNull")));
        assert_eq!(exit.value(&Expression::local("v")), Some(&rules.get("Nullable")));
    }

    #[test]
    fn test_join_forgets_one_sided_refinement() {
        // if (c) { if (o.f != null) { .. } } v = o.f;
        let mut b = CfgBuilder::method("m", &["c", "o"]);
        let start = b.regular_block();
        b.local(start, "c");
        let outer = b.conditional_block();
        let check = b.regular_block();
        let o = b.local(check, "o");
        let f = b.field(check, o, "f");
        let null = b.null(check);
        let ne = b.compare(check, ComparisonOp::Ne, f, null);
        let inner = b.conditional_block();
        let checked = b.regular_block();
        b.marker(checked, "checked");
        let join = b.regular_block();
        let o = b.local(join, "o");
        let read = b.field(join, o, "f");
        b.assign(join, "v", read);
        b.connect(b.entry(), start);
        b.connect(start, outer);
        b.branch(outer, check, join);
        b.connect(check, inner);
        b.branch(inner, checked, join);
        b.connect(checked, join);
        b.connect(join, b.exit());
        let cfg = b.build().unwrap();

        let result = analysis().perform_analysis(&cfg).unwrap();
        let rules = Nullness::new();
        let field = Expression::field(Expression::local("o"), "f");
        assert_eq!(result.then_store_after(ne).unwrap().value(&field), Some(&rules.get("NonNull")));
        assert_eq!(result.store_before_block(join).unwrap().value(&field), None);
        assert_eq!(result.value(read), Some(&rules.get("Nullable")));
    }

    /// `o.f = "a"; o.id = "b"; foo(); v = o.f; w = o.id;`
    fn call_between_field_reads() -> (ControlFlowGraph, NodeId, NodeId) {
        let mut b = CfgBuilder::method("m", &["o"]);
        let block = b.regular_block();
        let o = b.local(block, "o");
        let f = b.field(block, o, "f");
        let a = b.string(block, "a");
        b.assign_to(block, f, a);
        let o = b.local(block, "o");
        let id = b.field(block, o, "id");
        let s = b.string(block, "b");
        b.assign_to(block, id, s);
        b.call(block, "foo", None, &[]);
        let o = b.local(block, "o");
        let read_f = b.field(block, o, "f");
        b.assign(block, "v", read_f);
        let o = b.local(block, "o");
        let read_id = b.field(block, o, "id");
        b.assign(block, "w", read_id);
        b.connect(b.entry(), block);
        b.connect(block, b.exit());
        (b.build().unwrap(), read_f, read_id)
    }

    #[test]
    fn test_side_effect_free_call_keeps_field_facts() {
        let (cfg, read_f, read_id) = call_between_field_reads();
        let rules = Nullness::new();

        let pure = Purity {
            side_effect_free: vec!["foo"],
            ..Purity::default()
        };
        let result = analysis_with(pure).perform_analysis(&cfg).unwrap();
        assert_eq!(result.value(read_f), Some(&rules.get("NonNull")));
        assert_eq!(result.value(read_id), Some(&rules.get("NonNull")));

        let final_id = Purity {
            final_fields: vec!["id"],
            ..Purity::default()
        };
        let result = analysis_with(final_id).perform_analysis(&cfg).unwrap();
        assert_eq!(result.value(read_f), Some(&rules.get("Nullable")));
        assert_eq!(result.value(read_id), Some(&rules.get("NonNull")));
    }

    /// `if (o.get() != null) { v = o.get(); }`
    fn checked_call() -> (ControlFlowGraph, NodeId) {
        let mut b = CfgBuilder::method("m", &["o"]);
        let start = b.regular_block();
        let o = b.local(start, "o");
        let get = b.call(start, "get", Some(o), &[]);
        let null = b.null(start);
        b.compare(start, ComparisonOp::Ne, get, null);
        let cond = b.conditional_block();
        let then_block = b.regular_block();
        let o = b.local(then_block, "o");
        let again = b.call(then_block, "get", Some(o), &[]);
        b.assign(then_block, "v", again);
        b.connect(b.entry(), start);
        b.connect(start, cond);
        b.branch(cond, then_block, b.exit());
        b.connect(then_block, b.exit());
        (b.build().unwrap(), again)
    }

    #[test]
    fn test_deterministic_call_result_is_tracked() {
        let (cfg, again) = checked_call();
        let rules = Nullness::new();

        let pure = Purity {
            side_effect_free: vec!["get"],
            deterministic: vec!["get"],
            ..Purity::default()
        };
        let result = analysis_with(pure).perform_analysis(&cfg).unwrap();
        assert_eq!(result.value(again), Some(&rules.get("NonNull")));
        let get = Expression::MethodCall {
            method: "get".to_string(),
            receiver: Some(Box::new(Expression::local("o"))),
            arguments: vec![],
        };
        assert_eq!(result.store_after(again).unwrap().value(&get), Some(&rules.get("NonNull")));

        // A call with side effects may change the result of the next one.
        let impure = Purity {
            deterministic: vec!["get"],
            ..Purity::default()
        };
        let result = analysis_with(impure).perform_analysis(&cfg).unwrap();
        assert_eq!(result.value(again), Some(&rules.get("Nullable")));

        // Without determinism the test refines nothing.
        let result = analysis().perform_analysis(&cfg).unwrap();
        assert_eq!(result.value(again), Some(&rules.get("Nullable")));
        assert_eq!(result.store_after(again).unwrap().value(&get), None);
    }
}
