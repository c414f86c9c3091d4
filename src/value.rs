//! Abstract values: the per-node payload tracked by an analysis.

use std::fmt::{self, Debug};

/// An element of a join semi-lattice.
///
/// The lattice must have a bottom element (no information) and a top element
/// (unknown or conflicting information). Values are immutable: the join always
/// produces a new value, so a value may be shared freely between the stores of
/// different program points.
///
/// # Lattice Properties
///
/// `least_upper_bound` must be:
/// - Idempotent: `a ⊔ a = a`
/// - Commutative: `a ⊔ b = b ⊔ a`
/// - Associative: `(a ⊔ b) ⊔ c = a ⊔ (b ⊔ c)`
/// - Total: defined for every pair of values
pub trait AbstractValue: Clone + Debug + PartialEq {
    /// Join (`⊔`): the least value that is above both inputs.
    fn least_upper_bound(&self, other: &Self) -> Self;
}

/// Value type of analyses that track stores only.
///
/// It has no inhabitants, so such an analysis never records a node value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedValue {}

impl AbstractValue for UnusedValue {
    fn least_upper_bound(&self, _other: &Self) -> Self {
        match *self {}
    }
}

impl fmt::Display for UnusedValue {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}
