//! Constant propagation: a forward analysis tracking integer locals.

mod constant;
mod store;
mod transfer;

pub use constant::Constant;
pub use store::ConstantPropagationStore;
pub use transfer::ConstantPropagationTransfer;
