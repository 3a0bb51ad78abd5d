pub mod codec;
pub mod error;
pub mod header;
pub mod message;

pub use codec::*;
pub use error::*;
pub use header::*;
pub use message::*;
