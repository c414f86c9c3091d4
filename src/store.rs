//! Stores: the abstract machine state at one program point.

use std::fmt::Debug;

use crate::error::AnalysisError;
use crate::expression::Expression;
use crate::visualize::StoreVisualizer;

/// Which of the two stores before a block is meant.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StoreKind {
    Then,
    Else,
    Both,
}

/// A mapping from tracked program references to abstract values.
///
/// Copying is [`Clone`]: a clone must be fully independent of the original, so
/// that a store published for a program point is never affected by later
/// mutation of a copy. The engine only mutates private copies.
///
/// Equality must ignore entries whose value is the lattice bottom, so that a key
/// that was never inserted and a key explicitly mapped to bottom compare equal.
/// Stores that read a missing key as top instead compare exactly.
/// The engine detects the fixed point by store equality.
pub trait Store: Clone + Debug + PartialEq {
    /// Key-wise join. A key present in only one store is carried through
    /// unchanged, or dropped by stores that read a missing key as top.
    fn least_upper_bound(&self, other: &Self) -> Self;

    /// Join used on back edges once a block has been visited often enough.
    ///
    /// For lattices of finite height this may be the plain join. Stores over
    /// lattices with infinite ascending chains must extrapolate here. Stores that
    /// never expect a loop back edge return [`AnalysisError::WideningUnsupported`].
    fn widened_upper_bound(&self, previous: &Self) -> Result<Self, AnalysisError>;

    /// Whether a write to `a` may change the value of `b`.
    fn can_alias(&self, a: &Expression, b: &Expression) -> bool;

    /// Read-only rendering for debugging and graph export.
    fn visualize(&self, viz: &dyn StoreVisualizer) -> String;
}
