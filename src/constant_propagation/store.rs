use std::collections::BTreeMap;

use crate::error::AnalysisError;
use crate::expression::Expression;
use crate::store::Store;
use crate::value::AbstractValue;
use crate::visualize::StoreVisualizer;

use super::Constant;

/// Constant facts about local variables.
///
/// A local without an entry is [`Constant::Bottom`]. Equality ignores
/// explicit bottom entries.
#[derive(Debug, Clone, Default)]
pub struct ConstantPropagationStore {
    contents: BTreeMap<String, Constant>,
}

impl ConstantPropagationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fact for a local; bottom if there is none.
    pub fn information(&self, name: &str) -> Constant {
        self.contents.get(name).cloned().unwrap_or(Constant::Bottom)
    }

    /// Joins `value` into the existing fact for `name`.
    pub fn merge_information(&mut self, name: &str, value: Constant) {
        let merged = match self.contents.get(name) {
            Some(old) => value.least_upper_bound(old),
            None => value,
        };
        self.contents.insert(name.to_string(), merged);
    }

    /// Replaces the fact for `name`.
    pub fn set_information(&mut self, name: &str, value: Constant) {
        self.contents.insert(name.to_string(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Constant)> {
        self.contents
            .iter()
            .filter(|(_, value)| !value.is_bottom())
            .map(|(name, value)| (name.as_str(), value))
    }
}

impl PartialEq for ConstantPropagationStore {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Store for ConstantPropagationStore {
    fn least_upper_bound(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for (name, value) in &other.contents {
            result.merge_information(name, value.clone());
        }
        result
    }

    /// The lattice has finite height, so widening is the join.
    fn widened_upper_bound(&self, previous: &Self) -> Result<Self, AnalysisError> {
        Ok(self.least_upper_bound(previous))
    }

    fn can_alias(&self, _a: &Expression, _b: &Expression) -> bool {
        true
    }

    fn visualize(&self, viz: &dyn StoreVisualizer) -> String {
        let mut out = viz.visualize_store_header("ConstantPropagationStore");
        for (name, value) in self.iter() {
            out.push_str(&viz.visualize_store_local_var(name, value));
        }
        out.push_str(&viz.visualize_store_footer());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualize::StringCfgVisualizer;
    use test_log::test;

    fn store(entries: &[(&str, Constant)]) -> ConstantPropagationStore {
        let mut store = ConstantPropagationStore::new();
        for (name, value) in entries {
            store.set_information(name, value.clone());
        }
        store
    }

    #[test]
    fn test_equality_ignores_bottom() {
        let a = store(&[("x", Constant::value(1))]);
        let b = store(&[("x", Constant::value(1)), ("y", Constant::Bottom)]);
        assert_eq!(a, b);
        assert_ne!(a, store(&[("x", Constant::value(2))]));
    }

    #[test]
    fn test_join_keeps_every_key_above_both_inputs() {
        let s1 = store(&[("x", Constant::value(1)), ("y", Constant::value(2))]);
        let s2 = store(&[("x", Constant::value(3)), ("z", Constant::Top)]);
        let joined = s1.least_upper_bound(&s2);
        assert_eq!(joined.information("x"), Constant::Top);
        assert_eq!(joined.information("y"), Constant::value(2));
        assert_eq!(joined.information("z"), Constant::Top);
        for s in [&s1, &s2] {
            for (name, value) in s.iter() {
                let j = joined.information(name);
                assert_eq!(value.least_upper_bound(&j), j);
            }
        }
        assert_eq!(joined, s2.least_upper_bound(&s1));
    }

    #[test]
    fn test_merge_and_set_information() {
        let mut s = ConstantPropagationStore::new();
        s.merge_information("x", Constant::value(1));
        assert_eq!(s.information("x"), Constant::value(1));
        s.merge_information("x", Constant::value(1));
        assert_eq!(s.information("x"), Constant::value(1));
        s.merge_information("x", Constant::value(2));
        assert_eq!(s.information("x"), Constant::Top);
        s.set_information("x", Constant::value(5));
        assert_eq!(s.information("x"), Constant::value(5));
        assert_eq!(s.information("missing"), Constant::Bottom);
    }

    #[test]
    fn test_clone_is_independent() {
        let original = store(&[("x", Constant::value(1))]);
        let mut copy = original.clone();
        copy.set_information("x", Constant::value(2));
        assert_eq!(original.information("x"), Constant::value(1));
    }

    #[test]
    fn test_widening_is_join() {
        let s1 = store(&[("x", Constant::value(1))]);
        let s2 = store(&[("x", Constant::value(2))]);
        assert_eq!(s1.widened_upper_bound(&s2).unwrap(), s1.least_upper_bound(&s2));
    }

    #[test]
    fn test_visualize() {
        let s = store(&[("x", Constant::value(1)), ("y", Constant::Top), ("z", Constant::Bottom)]);
        assert_eq!(
            s.visualize(&StringCfgVisualizer),
            "ConstantPropagationStore (\n  x > 1\n  y > T\n)"
        );
    }
}
