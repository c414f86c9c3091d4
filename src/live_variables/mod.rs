//! Live variables: a backward analysis over sets of local names.

mod store;
mod transfer;

pub use store::LiveVariableStore;
pub use transfer::LiveVariableTransfer;
