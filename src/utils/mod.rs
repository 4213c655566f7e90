mod convert;
mod format;
mod sync;

pub use convert::lovelace_to_ada;
pub use format::format_tx_id;
pub use format::format_address;
pub(crate) use sync::lock;
