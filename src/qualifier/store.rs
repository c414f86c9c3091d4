use std::collections::BTreeMap;

use log::trace;

use crate::error::AnalysisError;
use crate::expression::Expression;
use crate::store::Store;
use crate::value::AbstractValue;
use crate::visualize::StoreVisualizer;

use super::QualifierValue;

/// Refined qualifiers of locals, field accesses and deterministic calls.
///
/// Only trackable expressions are stored; requests about anything else are
/// ignored. Calls are admitted as keys when their operands are trackable, and
/// the caller decides which methods are deterministic. A missing key means
/// nothing is known: readers fall back to the default qualifier, so the join
/// keeps only the keys both stores hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualifierStore {
    values: BTreeMap<Expression, QualifierValue>,
}

fn is_storable(expression: &Expression) -> bool {
    expression.is_trackable_with(&|_| true)
}

impl QualifierStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, expression: &Expression) -> Option<&QualifierValue> {
        self.values.get(expression)
    }

    /// Refines the fact about `expression` with `value`: the result is the meet
    /// of the old fact, if any, and the new one.
    pub fn insert_value(&mut self, expression: Expression, value: QualifierValue) {
        if !is_storable(&expression) {
            return;
        }
        let refined = match self.values.get(&expression) {
            Some(old) => old.greatest_lower_bound(&value),
            None => value,
        };
        self.values.insert(expression, refined);
    }

    /// Overwrites the fact about `expression`.
    pub fn replace_value(&mut self, expression: Expression, value: QualifierValue) {
        if is_storable(&expression) {
            self.values.insert(expression, value);
        }
    }

    pub fn clear_value(&mut self, expression: &Expression) {
        self.values.remove(expression);
    }

    /// Records `target = <value>`, dropping the facts the write may invalidate.
    ///
    /// Writing a local invalidates every other fact that reads it. Writing a
    /// field invalidates every fact mentioning a field it may alias, and every
    /// fact involving a call.
    pub fn update_for_assignment(&mut self, target: &Expression, value: Option<QualifierValue>) {
        match target {
            Expression::Local(name) => {
                self.values.retain(|key, _| key.is_local() || !key.contains_local(name));
            }
            Expression::FieldAccess { .. } => {
                let stale: Vec<Expression> = self
                    .values
                    .keys()
                    .filter(|key| key.contains_call() || field_accesses(key).any(|access| self.can_alias(target, access)))
                    .cloned()
                    .collect();
                for key in stale {
                    trace!("Write to {} invalidates {}", target, key);
                    self.values.remove(&key);
                }
            }
            _ => {
                trace!("Ignoring write to {}", target);
                return;
            }
        }
        match value {
            Some(value) => self.replace_value(target.clone(), value),
            None => self.clear_value(target),
        }
    }

    /// Forgets what a call with side effects may change: every call result and
    /// every field fact, except field accesses on locals through fields for
    /// which `unmodifiable` holds.
    pub fn update_for_method_call(&mut self, unmodifiable: impl Fn(&str) -> bool) {
        self.values.retain(|key, _| is_unmodifiable(key, &unmodifiable));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Expression, &QualifierValue)> {
        self.values.iter()
    }
}

fn is_unmodifiable(expression: &Expression, unmodifiable: &impl Fn(&str) -> bool) -> bool {
    match expression {
        Expression::Local(_) => true,
        Expression::FieldAccess { receiver, field } => unmodifiable(field) && is_unmodifiable(receiver, unmodifiable),
        _ => false,
    }
}

/// Every field access on the receiver chain of `expression`, outermost first.
fn field_accesses(expression: &Expression) -> impl Iterator<Item = &Expression> {
    std::iter::successors(Some(expression), |e| match *e {
        Expression::FieldAccess { receiver, .. } => Some(receiver.as_ref()),
        _ => None,
    })
    .filter(|e| matches!(e, Expression::FieldAccess { .. }))
}

impl Store for QualifierStore {
    /// Key-wise join over the keys present in both stores. A fact only one side
    /// holds is dropped, since the other side implicitly holds the default.
    fn least_upper_bound(&self, other: &Self) -> Self {
        let values = self
            .values
            .iter()
            .filter_map(|(key, value)| {
                other
                    .values
                    .get(key)
                    .map(|theirs| (key.clone(), value.least_upper_bound(theirs)))
            })
            .collect();
        Self { values }
    }

    /// Qualifier hierarchies are finite, so the join terminates.
    fn widened_upper_bound(&self, previous: &Self) -> Result<Self, AnalysisError> {
        Ok(self.least_upper_bound(previous))
    }

    /// Locals alias only themselves. Field accesses alias any access to a field
    /// of the same name, whatever the receiver.
    fn can_alias(&self, a: &Expression, b: &Expression) -> bool {
        match (a, b) {
            (Expression::Local(x), Expression::Local(y)) => x == y,
            (Expression::FieldAccess { field: f, .. }, Expression::FieldAccess { field: g, .. }) => f == g,
            _ => false,
        }
    }

    fn visualize(&self, viz: &dyn StoreVisualizer) -> String {
        let mut out = viz.visualize_store_header("QualifierStore");
        for (key, value) in self.iter() {
            match key.local_name() {
                Some(name) => out.push_str(&viz.visualize_store_local_var(name, value)),
                None => out.push_str(&viz.visualize_store_key_val(&key.to_string(), value)),
            }
        }
        out.push_str(&viz.visualize_store_footer());
        out
    }
}
