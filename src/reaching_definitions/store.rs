use std::collections::BTreeSet;
use std::fmt;

use crate::error::AnalysisError;
use crate::expression::Expression;
use crate::store::Store;
use crate::visualize::StoreVisualizer;

/// An assignment `target = value`, compared structurally.
///
/// Two assignments that write the same value to the same target are the same
/// definition, wherever they appear in the graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReachingDefinition {
    pub target: Expression,
    pub value: Expression,
}

impl ReachingDefinition {
    pub fn new(target: Expression, value: Expression) -> Self {
        Self { target, value }
    }
}

impl fmt::Display for ReachingDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.target, self.value)
    }
}

/// The set of definitions that may reach a program point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReachingDefinitionStore {
    definitions: BTreeSet<ReachingDefinition>,
}

impl ReachingDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_def(&mut self, definition: ReachingDefinition) {
        self.definitions.insert(definition);
    }

    /// Removes every definition of `target`.
    pub fn kill_def(&mut self, target: &Expression) {
        self.definitions.retain(|d| d.target != *target);
    }

    pub fn contains(&self, definition: &ReachingDefinition) -> bool {
        self.definitions.contains(definition)
    }

    /// Definitions of `target` reaching this point.
    pub fn definitions_of<'a>(&'a self, target: &'a Expression) -> impl Iterator<Item = &'a ReachingDefinition> + 'a {
        self.definitions.iter().filter(move |d| d.target == *target)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReachingDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Store for ReachingDefinitionStore {
    fn least_upper_bound(&self, other: &Self) -> Self {
        Self {
            definitions: self.definitions.union(&other.definitions).cloned().collect(),
        }
    }

    fn widened_upper_bound(&self, _previous: &Self) -> Result<Self, AnalysisError> {
        Err(AnalysisError::WideningUnsupported {
            store: "ReachingDefinitionStore",
        })
    }

    fn can_alias(&self, _a: &Expression, _b: &Expression) -> bool {
        true
    }

    fn visualize(&self, viz: &dyn StoreVisualizer) -> String {
        let mut out = viz.visualize_store_header("ReachingDefinitionStore");
        for definition in &self.definitions {
            out.push_str(&viz.visualize_store_key_val("def", definition));
        }
        out.push_str(&viz.visualize_store_footer());
        out
    }
}
