//! This module defines the core, strongly-typed description of a wire column.
//!
//! It currently includes the immutable [`ColumnDescriptor`] record and the
//! closed [`WireCategory`] enum which replaces fragile string-based dispatch
//! with a safe, exhaustive tagged union over the transport's type categories.

pub mod descriptor;

// Re-export the main type(s) for easier access.
pub use descriptor::{ColumnDescriptor, WireCategory};
