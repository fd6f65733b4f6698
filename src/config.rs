//! The single source of truth for all colwire codec configuration.
//!
//! This module defines the unified `CodecConfig` struct, which is designed to be
//! created once at the connection boundary (e.g., from a user's connection
//! options or a JSON blob) and then passed down through the registry into the
//! codecs that need it.
//!
//! The server normally supplies some of these values through its metadata
//! exchange (default time-zone, calendar interval lengths); callers that have
//! that metadata available should copy it in here before building codecs.

use serde::{Deserialize, Serialize};

//==================================================================================
// I. Core Configuration Enums & Structs
//==================================================================================

/// How an enumeration wire value maps to and from a caller-visible value.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnumResolution {
    /// **Default:** the wire value selects the Nth declared entry, independent
    /// of the entry's numeric key.
    #[default]
    Ordinal,

    /// The wire value is surfaced (and accepted) as the declared integer key.
    Key,

    /// The wire value is resolved to the declared name through the key -> name
    /// table sent by the server.
    Name,
}

/// Defines the unified configuration for building column codecs.
///
/// All fields have serde defaults so a partial JSON document (or an empty one)
/// is a valid configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case")]
pub struct CodecConfig {
    /// Strategy used by `Enum8`/`Enum16` codecs to resolve wire values.
    pub enum_resolution: EnumResolution,

    /// When `true`, string readers materialize decoded `String`s once the
    /// column completes. Only worthwhile for low-cardinality dictionary
    /// columns, where the same entry is surfaced for many rows.
    pub cache_dictionary_strings: bool,

    /// When `true`, `DateTime64` precisions greater than nanoseconds are
    /// clamped to the nanosecond range instead of failing.
    pub saturate_extra_nanos: bool,

    /// Length of an `IntervalYear` tick, in seconds. The server's calendar
    /// metadata is authoritative; this default matches a 365-day year.
    pub year_duration_secs: u64,

    /// Length of an `IntervalQuarter` tick, in seconds (default: 91 days).
    pub quarter_duration_secs: u64,

    /// Length of an `IntervalMonth` tick, in seconds (default: 30 days).
    pub month_duration_secs: u64,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            enum_resolution: EnumResolution::default(),
            cache_dictionary_strings: false,
            saturate_extra_nanos: false,
            year_duration_secs: 365 * 24 * 3600,
            quarter_duration_secs: 91 * 24 * 3600,
            month_duration_secs: 30 * 24 * 3600,
        }
    }
}

impl CodecConfig {
    /// Loads a configuration from a JSON document. Missing fields fall back to
    /// their defaults, so `"{}"` yields `CodecConfig::default()`.
    pub fn from_json_str(json: &str) -> Result<Self, crate::error::CodecError> {
        Ok(serde_json::from_str(json)?)
    }
}
