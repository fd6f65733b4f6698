//! This file is the root of the `colwire` Rust crate.
//!
//! colwire is the resumable column codec engine for a columnar database's
//! binary wire protocol: it turns a stream of raw bytes arriving in
//! arbitrarily-sized network chunks into typed column values, and typed
//! column values back into bytes for upload.
//!
//! The flow is: ask [`registry::descriptor_for`] to parse the server's wire
//! type string, ask [`registry::codec_for`] for the matching [`ColumnCodec`],
//! then drive a [`ColumnReader`] with [`ColumnReader::read_column`] as bytes
//! arrive — it reports [`DecodeProgress::NeedMoreData`] until the column is
//! complete, after which [`ColumnReader::element`] extracts typed values.
//! Writing is the mirror image through [`ColumnWriter::serialize`].
//!
//! Everything here is single-threaded and cooperative: "suspend" is a return
//! value, not a blocked thread, so the readers are safe to drive from a
//! single-threaded event loop. Fetching bytes, framing, authentication and
//! connection management belong to the transport layer on top.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
pub mod columns;
pub mod config;
pub mod registry;
pub mod types;
pub mod value;
pub mod wire;

mod error;

//==================================================================================
// 2. Re-exports
//==================================================================================
pub use columns::{ColumnCodec, ColumnReader, ColumnWriter, DecodeProgress, Row};
pub use config::{CodecConfig, EnumResolution};
pub use error::CodecError;
pub use types::{ColumnDescriptor, WireCategory};
pub use value::{Decimal, Value, ValueRepr};
pub use wire::ByteSource;
