//! Transfer functions: per-node abstract semantics.
//!
//! A transfer function receives the store(s) before a node and produces the
//! store(s) after it, plus an optional abstract value for the node itself.
//! Boolean tests may split the outgoing state into a "then" and an "else" store,
//! which the engine routes along the corresponding branches.
//!
//! Dispatch is an exhaustive match over [`NodeKind`] in [`accept`]. Every
//! `visit_*` method of [`NodeVisitor`] defaults to [`NodeVisitor::visit_node`],
//! which produces no value and passes the stores through unchanged, so a
//! transfer function only overrides the node kinds it refines.

use std::collections::{BTreeMap, HashMap};

use crate::cfg::{BinaryOp, ComparisonOp, ControlFlowGraph, NodeId, NodeKind, UnderlyingAst};
use crate::error::AnalysisError;
use crate::expression::Expression;
use crate::store::Store;
use crate::value::AbstractValue;

/// Either one regular store, or a then/else pair after a boolean test.
#[derive(Debug, Clone, PartialEq)]
pub enum Stores<S> {
    Regular(S),
    Conditional { then_store: S, else_store: S },
}

impl<S: Store> Stores<S> {
    pub fn contains_two_stores(&self) -> bool {
        matches!(self, Stores::Conditional { .. })
    }

    /// The regular store, or the join of the then and else stores.
    pub fn regular_store(&self) -> S {
        match self {
            Stores::Regular(store) => store.clone(),
            Stores::Conditional { then_store, else_store } => then_store.least_upper_bound(else_store),
        }
    }

    pub fn into_regular_store(self) -> S {
        match self {
            Stores::Regular(store) => store,
            Stores::Conditional { then_store, else_store } => then_store.least_upper_bound(&else_store),
        }
    }

    pub fn then_store(&self) -> &S {
        match self {
            Stores::Regular(store) => store,
            Stores::Conditional { then_store, .. } => then_store,
        }
    }

    pub fn else_store(&self) -> &S {
        match self {
            Stores::Regular(store) => store,
            Stores::Conditional { else_store, .. } => else_store,
        }
    }

    /// Branch-wise join. A regular store joins into both branches.
    pub fn least_upper_bound(&self, other: &Self) -> Self {
        match (self, other) {
            (Stores::Regular(a), Stores::Regular(b)) => Stores::Regular(a.least_upper_bound(b)),
            _ => Stores::Conditional {
                then_store: self.then_store().least_upper_bound(other.then_store()),
                else_store: self.else_store().least_upper_bound(other.else_store()),
            },
        }
    }
}

/// The stores flowing into a node or a block.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferInput<S> {
    /// The node these stores were produced by, if any.
    pub node: Option<NodeId>,
    pub stores: Stores<S>,
}

impl<S: Store> TransferInput<S> {
    pub fn regular(node: Option<NodeId>, store: S) -> Self {
        Self {
            node,
            stores: Stores::Regular(store),
        }
    }

    pub fn conditional(node: Option<NodeId>, then_store: S, else_store: S) -> Self {
        Self {
            node,
            stores: Stores::Conditional { then_store, else_store },
        }
    }

    /// Input for the node following `node`, which produced `result`.
    pub fn from_result<V>(node: NodeId, result: TransferResult<V, S>) -> Self {
        Self {
            node: Some(node),
            stores: result.stores,
        }
    }

    pub fn contains_two_stores(&self) -> bool {
        self.stores.contains_two_stores()
    }

    pub fn regular_store(&self) -> S {
        self.stores.regular_store()
    }

    pub fn into_regular_store(self) -> S {
        self.stores.into_regular_store()
    }

    pub fn then_store(&self) -> &S {
        self.stores.then_store()
    }

    pub fn else_store(&self) -> &S {
        self.stores.else_store()
    }

    pub fn least_upper_bound(&self, other: &Self) -> Self {
        Self {
            node: self.node,
            stores: self.stores.least_upper_bound(&other.stores),
        }
    }
}

/// The outcome of applying a transfer function to one node.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferResult<V, S> {
    value: Option<V>,
    stores: Stores<S>,
    store_changed: bool,
    exceptional_stores: BTreeMap<String, S>,
}

impl<V, S: Store> TransferResult<V, S> {
    pub fn regular(value: Option<V>, store: S) -> Self {
        Self {
            value,
            stores: Stores::Regular(store),
            store_changed: false,
            exceptional_stores: BTreeMap::new(),
        }
    }

    pub fn conditional(value: Option<V>, then_store: S, else_store: S) -> Self {
        Self {
            value,
            stores: Stores::Conditional { then_store, else_store },
            store_changed: false,
            exceptional_stores: BTreeMap::new(),
        }
    }

    /// Result that keeps the shape (regular or then/else) of the input.
    pub fn passthrough(value: Option<V>, input: TransferInput<S>) -> Self {
        Self {
            value,
            stores: input.stores,
            store_changed: false,
            exceptional_stores: BTreeMap::new(),
        }
    }

    /// Marks that the transfer function changed a store in a way the engine
    /// cannot see by comparing stores, forcing the block to be revisited.
    pub fn with_store_changed(mut self) -> Self {
        self.store_changed = true;
        self
    }

    /// Attaches the store that flows along exceptional edges for `cause`.
    pub fn with_exceptional_store(mut self, cause: &str, store: S) -> Self {
        self.exceptional_stores.insert(cause.to_string(), store);
        self
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: Option<V>) {
        self.value = value;
    }

    pub fn stores(&self) -> &Stores<S> {
        &self.stores
    }

    pub fn contains_two_stores(&self) -> bool {
        self.stores.contains_two_stores()
    }

    pub fn regular_store(&self) -> S {
        self.stores.regular_store()
    }

    pub fn then_store(&self) -> &S {
        self.stores.then_store()
    }

    pub fn else_store(&self) -> &S {
        self.stores.else_store()
    }

    pub fn store_changed(&self) -> bool {
        self.store_changed
    }

    pub fn exceptional_store(&self, cause: &str) -> Option<&S> {
        self.exceptional_stores.get(cause)
    }
}

/// What a transfer function may look at besides its input stores.
pub struct TransferContext<'a, V> {
    cfg: &'a ControlFlowGraph,
    node_values: &'a HashMap<NodeId, V>,
    node: NodeId,
}

impl<'a, V> TransferContext<'a, V> {
    pub fn new(cfg: &'a ControlFlowGraph, node_values: &'a HashMap<NodeId, V>, node: NodeId) -> Self {
        Self { cfg, node_values, node }
    }

    pub fn cfg(&self) -> &'a ControlFlowGraph {
        self.cfg
    }

    /// The node being transferred.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The value computed for an operand of the current node, if any.
    pub fn value_of(&self, operand: NodeId) -> Option<&'a V> {
        self.node_values.get(&operand)
    }

    pub fn expression(&self, id: NodeId) -> Expression {
        self.cfg.expression(id)
    }

    /// Name of the local variable `id` refers to, if it is one.
    pub fn local_name(&self, id: NodeId) -> Option<&'a str> {
        match &self.cfg.node(id).kind {
            NodeKind::LocalVariable(name) => Some(name),
            _ => None,
        }
    }

    /// The error a transfer function reports for a node it cannot handle.
    pub fn unexpected(&self, transfer: &'static str) -> AnalysisError {
        AnalysisError::UnexpectedNode {
            transfer,
            node: self.node,
            kind: self.cfg.node(self.node).kind.name(),
        }
    }
}

type Transferred<V, S> = Result<TransferResult<V, S>, AnalysisError>;

/// One method per node kind.
pub trait NodeVisitor<V: AbstractValue, S: Store> {
    /// Fallback for every node kind: no value, stores unchanged.
    fn visit_node(&self, _cx: &TransferContext<'_, V>, input: TransferInput<S>) -> Transferred<V, S> {
        Ok(TransferResult::passthrough(None, input))
    }

    fn visit_local_variable(&self, _name: &str, cx: &TransferContext<'_, V>, input: TransferInput<S>) -> Transferred<V, S> {
        self.visit_node(cx, input)
    }

    fn visit_integer_literal(&self, _value: i64, cx: &TransferContext<'_, V>, input: TransferInput<S>) -> Transferred<V, S> {
        self.visit_node(cx, input)
    }

    fn visit_boolean_literal(&self, _value: bool, cx: &TransferContext<'_, V>, input: TransferInput<S>) -> Transferred<V, S> {
        self.visit_node(cx, input)
    }

    fn visit_string_literal(&self, _value: &str, cx: &TransferContext<'_, V>, input: TransferInput<S>) -> Transferred<V, S> {
        self.visit_node(cx, input)
    }

    fn visit_null_literal(&self, cx: &TransferContext<'_, V>, input: TransferInput<S>) -> Transferred<V, S> {
        self.visit_node(cx, input)
    }

    fn visit_field_access(
        &self,
        _receiver: NodeId,
        _field: &str,
        cx: &TransferContext<'_, V>,
        input: TransferInput<S>,
    ) -> Transferred<V, S> {
        self.visit_node(cx, input)
    }

    fn visit_assignment(
        &self,
        _target: NodeId,
        _expression: NodeId,
        cx: &TransferContext<'_, V>,
        input: TransferInput<S>,
    ) -> Transferred<V, S> {
        self.visit_node(cx, input)
    }

    fn visit_binary(
        &self,
        _op: BinaryOp,
        _lhs: NodeId,
        _rhs: NodeId,
        cx: &TransferContext<'_, V>,
        input: TransferInput<S>,
    ) -> Transferred<V, S> {
        self.visit_node(cx, input)
    }

    fn visit_comparison(
        &self,
        _op: ComparisonOp,
        _lhs: NodeId,
        _rhs: NodeId,
        cx: &TransferContext<'_, V>,
        input: TransferInput<S>,
    ) -> Transferred<V, S> {
        self.visit_node(cx, input)
    }

    /// Swaps the then and else stores of a preceding test.
    fn visit_conditional_not(&self, _operand: NodeId, _cx: &TransferContext<'_, V>, input: TransferInput<S>) -> Transferred<V, S> {
        Ok(match input.stores {
            Stores::Conditional { then_store, else_store } => TransferResult::conditional(None, else_store, then_store),
            Stores::Regular(store) => TransferResult::regular(None, store),
        })
    }

    fn visit_method_invocation(
        &self,
        _method: &str,
        _receiver: Option<NodeId>,
        _arguments: &[NodeId],
        cx: &TransferContext<'_, V>,
        input: TransferInput<S>,
    ) -> Transferred<V, S> {
        self.visit_node(cx, input)
    }

    fn visit_return(&self, _result: Option<NodeId>, cx: &TransferContext<'_, V>, input: TransferInput<S>) -> Transferred<V, S> {
        self.visit_node(cx, input)
    }

    fn visit_marker(&self, _text: &str, cx: &TransferContext<'_, V>, input: TransferInput<S>) -> Transferred<V, S> {
        self.visit_node(cx, input)
    }
}

/// Dispatches the current node of `cx` to the matching `visit_*` method.
pub fn accept<V, S, T>(visitor: &T, cx: &TransferContext<'_, V>, input: TransferInput<S>) -> Transferred<V, S>
where
    V: AbstractValue,
    S: Store,
    T: NodeVisitor<V, S> + ?Sized,
{
    match &cx.cfg().node(cx.node()).kind {
        NodeKind::LocalVariable(name) => visitor.visit_local_variable(name, cx, input),
        NodeKind::IntegerLiteral(value) => visitor.visit_integer_literal(*value, cx, input),
        NodeKind::BooleanLiteral(value) => visitor.visit_boolean_literal(*value, cx, input),
        NodeKind::StringLiteral(value) => visitor.visit_string_literal(value, cx, input),
        NodeKind::NullLiteral => visitor.visit_null_literal(cx, input),
        NodeKind::FieldAccess { receiver, field } => visitor.visit_field_access(*receiver, field, cx, input),
        NodeKind::Assignment { target, expression } => visitor.visit_assignment(*target, *expression, cx, input),
        NodeKind::Binary { op, lhs, rhs } => visitor.visit_binary(*op, *lhs, *rhs, cx, input),
        NodeKind::Comparison { op, lhs, rhs } => visitor.visit_comparison(*op, *lhs, *rhs, cx, input),
        NodeKind::ConditionalNot(operand) => visitor.visit_conditional_not(*operand, cx, input),
        NodeKind::MethodInvocation {
            method,
            receiver,
            arguments,
        } => visitor.visit_method_invocation(method, *receiver, arguments, cx, input),
        NodeKind::Return(result) => visitor.visit_return(*result, cx, input),
        NodeKind::Marker(text) => visitor.visit_marker(text, cx, input),
    }
}

/// Transfer function of a forward analysis.
pub trait ForwardTransferFunction<V: AbstractValue, S: Store>: NodeVisitor<V, S> {
    /// The store at the entry of the graph.
    fn initial_store(&self, ast: &UnderlyingAst, parameters: &[String]) -> S;
}

/// Transfer function of a backward analysis.
pub trait BackwardTransferFunction<V: AbstractValue, S: Store>: NodeVisitor<V, S> {
    /// The store at the regular exit of the graph.
    fn initial_normal_exit_store(&self, ast: &UnderlyingAst, return_nodes: &[NodeId]) -> S;

    /// The store at the exceptional exit of the graph.
    fn initial_exceptional_exit_store(&self, ast: &UnderlyingAst) -> S;
}
