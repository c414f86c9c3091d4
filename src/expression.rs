//! Structural expressions.
//!
//! Nodes are identified by id, so two evaluations of `x + 1` are different nodes.
//! An [`Expression`] is the value-equal rendering of a node subtree: stores that
//! want facts about "the same expression" on different paths key on it.

use std::collections::BTreeSet;
use std::fmt;

use crate::cfg::{BinaryOp, ComparisonOp};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Expression {
    Local(String),
    FieldAccess {
        receiver: Box<Expression>,
        field: String,
    },
    Integer(i64),
    Boolean(bool),
    Str(String),
    Null,
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Comparison {
        op: ComparisonOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Not(Box<Expression>),
    MethodCall {
        method: String,
        receiver: Option<Box<Expression>>,
        arguments: Vec<Expression>,
    },
    Assignment {
        target: Box<Expression>,
        value: Box<Expression>,
    },
    /// Anything without a value of its own (returns, markers).
    Opaque(String),
}

impl Expression {
    pub fn local(name: impl Into<String>) -> Self {
        Expression::Local(name.into())
    }

    pub fn field(receiver: Expression, field: impl Into<String>) -> Self {
        Expression::FieldAccess {
            receiver: Box::new(receiver),
            field: field.into(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Expression::Local(_))
    }

    pub fn local_name(&self) -> Option<&str> {
        match self {
            Expression::Local(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expression::Integer(_) | Expression::Boolean(_) | Expression::Str(_) | Expression::Null
        )
    }

    /// Whether the value of this expression is determined by its subexpressions alone,
    /// so that it may be tracked in a store: a local, or a field access on a
    /// trackable receiver.
    pub fn is_trackable(&self) -> bool {
        self.is_trackable_with(&|_| false)
    }

    /// Like [`is_trackable`](Self::is_trackable), but also admits calls to methods
    /// for which `deterministic` holds, provided the receiver and every argument
    /// are literals or trackable themselves.
    pub fn is_trackable_with(&self, deterministic: &dyn Fn(&str) -> bool) -> bool {
        match self {
            Expression::Local(_) => true,
            Expression::FieldAccess { receiver, .. } => receiver.is_trackable_with(deterministic),
            Expression::MethodCall {
                method,
                receiver,
                arguments,
            } => {
                deterministic(method)
                    && receiver
                        .as_deref()
                        .into_iter()
                        .chain(arguments)
                        .all(|operand| operand.is_literal() || operand.is_trackable_with(deterministic))
            }
            _ => false,
        }
    }

    /// Whether a method call occurs anywhere in this expression.
    pub fn contains_call(&self) -> bool {
        match self {
            Expression::MethodCall { .. } => true,
            Expression::FieldAccess { receiver, .. } | Expression::Not(receiver) => receiver.contains_call(),
            Expression::Binary { lhs, rhs, .. } | Expression::Comparison { lhs, rhs, .. } => {
                lhs.contains_call() || rhs.contains_call()
            }
            Expression::Assignment { target, value } => target.contains_call() || value.contains_call(),
            Expression::Local(_)
            | Expression::Integer(_)
            | Expression::Boolean(_)
            | Expression::Str(_)
            | Expression::Null
            | Expression::Opaque(_) => false,
        }
    }

    /// Names of all local variables read by this expression.
    pub fn locals(&self) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        self.collect_locals(&mut result);
        result
    }

    fn collect_locals(&self, acc: &mut BTreeSet<String>) {
        match self {
            Expression::Local(name) => {
                acc.insert(name.clone());
            }
            Expression::FieldAccess { receiver, .. } | Expression::Not(receiver) => receiver.collect_locals(acc),
            Expression::Binary { lhs, rhs, .. } | Expression::Comparison { lhs, rhs, .. } => {
                lhs.collect_locals(acc);
                rhs.collect_locals(acc);
            }
            Expression::MethodCall { receiver, arguments, .. } => {
                if let Some(receiver) = receiver {
                    receiver.collect_locals(acc);
                }
                for arg in arguments {
                    arg.collect_locals(acc);
                }
            }
            Expression::Assignment { target, value } => {
                target.collect_locals(acc);
                value.collect_locals(acc);
            }
            Expression::Integer(_)
            | Expression::Boolean(_)
            | Expression::Str(_)
            | Expression::Null
            | Expression::Opaque(_) => {}
        }
    }

    /// Whether the local `name` occurs anywhere in this expression.
    pub fn contains_local(&self, name: &str) -> bool {
        self.locals().contains(name)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Local(name) => write!(f, "{}", name),
            Expression::FieldAccess { receiver, field } => write!(f, "{}.{}", receiver, field),
            Expression::Integer(n) => write!(f, "{}", n),
            Expression::Boolean(b) => write!(f, "{}", b),
            Expression::Str(s) => write!(f, "{:?}", s),
            Expression::Null => write!(f, "null"),
            Expression::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            Expression::Comparison { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            Expression::Not(operand) => write!(f, "!{}", operand),
            Expression::MethodCall {
                method,
                receiver,
                arguments,
            } => {
                if let Some(receiver) = receiver {
                    write!(f, "{}.", receiver)?;
                }
                write!(f, "{}(", method)?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expression::Assignment { target, value } => write!(f, "{} = {}", target, value),
            Expression::Opaque(text) => write!(f, "<{}>", text),
        }
    }
}
