use std::collections::BTreeSet;

use crate::error::AnalysisError;
use crate::expression::Expression;
use crate::store::Store;
use crate::visualize::StoreVisualizer;

/// Names of the locals that may be read before their next write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveVariableStore {
    live: BTreeSet<String>,
}

impl LiveVariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_live_var(&mut self, name: &str) {
        self.live.insert(name.to_string());
    }

    pub fn kill_live_var(&mut self, name: &str) {
        self.live.remove(name);
    }

    /// Marks every local read by `expression` as live.
    pub fn add_use_in_expression(&mut self, expression: &Expression) {
        self.live.extend(expression.locals());
    }

    pub fn is_live(&self, name: &str) -> bool {
        self.live.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.live.iter().map(String::as_str)
    }
}

impl Store for LiveVariableStore {
    fn least_upper_bound(&self, other: &Self) -> Self {
        Self {
            live: self.live.union(&other.live).cloned().collect(),
        }
    }

    /// Only the finitely many locals of a graph can be live, so widening is the join.
    fn widened_upper_bound(&self, previous: &Self) -> Result<Self, AnalysisError> {
        Ok(self.least_upper_bound(previous))
    }

    fn can_alias(&self, _a: &Expression, _b: &Expression) -> bool {
        true
    }

    fn visualize(&self, viz: &dyn StoreVisualizer) -> String {
        let mut out = viz.visualize_store_header("LiveVariableStore");
        let names: Vec<&str> = self.iter().collect();
        out.push_str(&viz.visualize_store_key_val("live variables", &names.join(", ")));
        out.push_str(&viz.visualize_store_footer());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::BinaryOp;
    use test_log::test;

    #[test]
    fn test_put_kill_and_uses() {
        let mut store = LiveVariableStore::new();
        store.put_live_var("x");
        store.kill_live_var("x");
        assert!(!store.is_live("x"));

        let use_site = Expression::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(Expression::field(Expression::local("o"), "f")),
            rhs: Box::new(Expression::local("y")),
        };
        store.add_use_in_expression(&use_site);
        assert_eq!(store.iter().collect::<Vec<_>>(), vec!["o", "y"]);
    }

    #[test]
    fn test_join_is_union() {
        let mut a = LiveVariableStore::new();
        a.put_live_var("x");
        let mut b = LiveVariableStore::new();
        b.put_live_var("y");
        let joined = a.least_upper_bound(&b);
        assert!(joined.is_live("x") && joined.is_live("y"));
    }

    #[test]
    fn test_visualize() {
        let mut store = LiveVariableStore::new();
        store.put_live_var("a");
        store.put_live_var("b");
        let text = store.visualize(&crate::visualize::StringCfgVisualizer);
        assert_eq!(text, "LiveVariableStore (\n  live variables = a, b\n)");
    }
}
