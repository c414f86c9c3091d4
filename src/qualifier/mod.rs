//! Qualifier analyses.
//!
//! A checker declares a qualifier lattice with [`HierarchyConfig`] and supplies
//! [`QualifierRules`] for literals, method results and boolean tests.
//! [`QualifierTransfer`] turns those rules into a forward analysis over a
//! [`QualifierStore`] of refined facts about locals and fields.

mod hierarchy;
mod store;
mod transfer;
mod value;

pub use hierarchy::{HierarchyConfig, Qualifier, QualifierHierarchy};
pub use store::QualifierStore;
pub use transfer::{Literal, QualifierRules, QualifierTransfer, Refinement};
pub use value::QualifierValue;
