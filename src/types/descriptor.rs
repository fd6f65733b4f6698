//! The immutable per-column type record produced by the registry.
//!
//! A descriptor is a pure parse result: it captures everything the codecs need
//! to know about one column's wire type (width, bounds, modifiers, nesting)
//! and nothing about any in-flight decode. Descriptors are cloned freely into
//! readers and writers; once constructed they are never mutated.

use std::fmt;

/// Coarse wire-type category, in the style of a SQL driver's type codes.
///
/// Dispatch selects on this first; the element byte width then disambiguates
/// same-category codecs (64- vs 128-bit integers, the four decimal widths,
/// the two enum widths, second- vs sub-second date-times).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireCategory {
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Varchar,
    Timestamp,
    TimestampWithTimezone,
    Decimal,
    Real,
    Double,
    Date,
    Uuid,
    Enum,
    Interval,
    Ipv4,
    Ipv6,
    /// The degenerate `Nothing` type: one placeholder byte per row, all NULL.
    Null,
    Array,
}

/// An immutable record of one column's wire type.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub(crate) name: String,
    pub(crate) raw_type: String,
    pub(crate) normalized_type: String,
    pub(crate) category: WireCategory,
    /// Element byte width; `None` for variable-width payloads.
    pub(crate) element_size: Option<usize>,
    pub(crate) is_array: bool,
    /// Number of `Array(...)` wrappers unwound during parsing; 0 for scalars.
    pub(crate) array_dims: usize,
    /// Element descriptor for arrays; absent otherwise.
    pub(crate) nested: Option<Box<ColumnDescriptor>>,
    pub(crate) nullable: bool,
    pub(crate) unsigned: bool,
    pub(crate) low_cardinality: bool,
    /// Inclusive bounds for range-checked integer writes; `i128` is wide
    /// enough for every wire integer up to `UInt64`/`Int128`.
    pub(crate) min_value: Option<i128>,
    pub(crate) max_value: Option<i128>,
    pub(crate) precision: Option<u32>,
    pub(crate) scale: Option<u32>,
}

impl ColumnDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The unparsed type string as sent by the server, wrappers included.
    pub fn raw_type(&self) -> &str {
        &self.raw_type
    }

    /// The base type spec with `Array`/`LowCardinality`/`Nullable` stripped.
    pub fn normalized_type(&self) -> &str {
        &self.normalized_type
    }

    pub fn category(&self) -> WireCategory {
        self.category
    }

    pub fn element_size(&self) -> Option<usize> {
        self.element_size
    }

    pub fn is_array(&self) -> bool {
        self.is_array
    }

    pub fn array_dims(&self) -> usize {
        self.array_dims
    }

    pub fn nested(&self) -> Option<&ColumnDescriptor> {
        self.nested.as_deref()
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_unsigned(&self) -> bool {
        self.unsigned
    }

    pub fn is_low_cardinality(&self) -> bool {
        self.low_cardinality
    }

    pub fn min_value(&self) -> Option<i128> {
        self.min_value
    }

    pub fn max_value(&self) -> Option<i128> {
        self.max_value
    }

    pub fn precision(&self) -> Option<u32> {
        self.precision
    }

    pub fn scale(&self) -> Option<u32> {
        self.scale
    }

    /// A copy with the low-cardinality and nullability modifiers replaced.
    /// The dictionary sub-column of a low-cardinality column is exactly this
    /// descriptor with both modifiers cleared.
    pub fn with_modifiers(&self, low_cardinality: bool, nullable: bool) -> ColumnDescriptor {
        ColumnDescriptor {
            low_cardinality,
            nullable,
            ..self.clone()
        }
    }
}

impl fmt::Display for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.raw_type)
    }
}

#[cfg(test)]
mod tests {
    use crate::registry;

    #[test]
    fn test_with_modifiers_clears_dictionary_wrapping() {
        let descr = registry::descriptor_for("LowCardinality(Nullable(String))", "tag").unwrap();
        assert!(descr.is_low_cardinality());
        assert!(descr.is_nullable());

        let index = descr.with_modifiers(false, false);
        assert!(!index.is_low_cardinality());
        assert!(!index.is_nullable());
        // Everything else is untouched.
        assert_eq!(index.normalized_type(), descr.normalized_type());
        assert_eq!(index.category(), descr.category());
    }
}
