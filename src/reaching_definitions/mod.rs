//! Reaching definitions: a forward analysis over sets of assignments.

mod store;
mod transfer;

pub use store::{ReachingDefinition, ReachingDefinitionStore};
pub use transfer::ReachingDefinitionTransfer;
