// mkv-common - Meta protocol encoding and decoding for MetaKV
//
// This crate has no I/O: it turns logical operations into wire bytes and
// wire bytes back into responses.

pub mod codec;
pub mod error;
pub mod flags;
pub mod response;

// Re-export for convenience
pub use codec::*;
pub use error::*;
pub use flags::*;
pub use response::*;
