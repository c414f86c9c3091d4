//! The constant lattice.
//!
//! ```text
//!           ⊤ (Top - Unknown)
//!          / | \
//!    ... Value(n) ...
//!          \ | /
//!           ⊥ (Bottom - No information)
//! ```
//!
//! Values are arbitrary-precision integers, so folding never overflows.

use std::fmt;

use num_bigint::BigInt;

use crate::cfg::BinaryOp;
use crate::value::AbstractValue;

/// Constant value in the lattice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    /// Unknown or conflicting values.
    Top,
    /// No information.
    Bottom,
    /// Exactly this value.
    Value(BigInt),
}

impl Constant {
    pub fn value(n: impl Into<BigInt>) -> Self {
        Constant::Value(n.into())
    }

    pub fn is_top(&self) -> bool {
        matches!(self, Constant::Top)
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, Constant::Bottom)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Constant::Value(_))
    }

    /// The value, if this is a constant.
    pub fn as_value(&self) -> Option<&BigInt> {
        match self {
            Constant::Value(n) => Some(n),
            _ => None,
        }
    }

    /// Folds a binary arithmetic operation.
    ///
    /// Bottom absorbs, Top dominates the remaining cases, and division or
    /// remainder by zero is Top.
    pub fn apply(&self, op: BinaryOp, other: &Constant) -> Constant {
        match (self, other) {
            (Constant::Bottom, _) | (_, Constant::Bottom) => Constant::Bottom,
            (Constant::Top, _) | (_, Constant::Top) => Constant::Top,
            (Constant::Value(a), Constant::Value(b)) => match op {
                BinaryOp::Add => Constant::Value(a + b),
                BinaryOp::Sub => Constant::Value(a - b),
                BinaryOp::Mul => Constant::Value(a * b),
                BinaryOp::Div | BinaryOp::Rem if *b == BigInt::from(0) => Constant::Top,
                // Truncating division, sign of the remainder follows the dividend.
                BinaryOp::Div => Constant::Value(a / b),
                BinaryOp::Rem => Constant::Value(a % b),
            },
        }
    }
}

impl AbstractValue for Constant {
    fn least_upper_bound(&self, other: &Self) -> Self {
        match (self, other) {
            (Constant::Bottom, x) | (x, Constant::Bottom) => x.clone(),
            (Constant::Top, _) | (_, Constant::Top) => Constant::Top,
            (Constant::Value(a), Constant::Value(b)) if a == b => self.clone(),
            _ => Constant::Top,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Top => write!(f, "T"),
            Constant::Bottom => write!(f, "B"),
            Constant::Value(n) => write!(f, "{}", n),
        }
    }
}
