pub mod committee;
pub mod light_client;
pub mod verifier;

pub use committee::*;
pub use light_client::*;
pub use verifier::*;
