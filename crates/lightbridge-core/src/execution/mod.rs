pub mod header;
pub mod proof;
pub mod receipt;

pub use header::*;
pub use proof::*;
pub use receipt::encode_receipt;
