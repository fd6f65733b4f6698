//! Byte-level plumbing shared by every column codec: the accumulating,
//! never-rewinding [`ByteSource`] the readers decode from, and the LEB128
//! variable-length integer kernels used for string length prefixes.

pub mod source;
pub mod varint;

pub use source::ByteSource;
