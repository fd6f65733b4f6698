//! The wire type registry: parses server type strings into immutable
//! [`ColumnDescriptor`]s and instantiates the matching column codecs.
//!
//! Parsing runs left to right — `Array(...)` wrappers are unwound first
//! (counting dimensions), then `LowCardinality(...)`, then `Nullable(...)`,
//! then the base type name is matched against the fixed set the transport
//! supports. Codec dispatch mirrors that priority: the array wrapper first,
//! then low-cardinality, then the base category, with the element byte width
//! disambiguating same-category codecs. Both functions are pure; the same
//! input always yields the same descriptor, codec or error.

use std::sync::Arc;

use crate::columns::array::ArrayCodec;
use crate::columns::date::{DateSpec, DateTime64Spec, DateTimeSpec};
use crate::columns::decimal::{
    Decimal256Spec, DecimalSpec, MAX_PRECISION_128, MAX_PRECISION_256, MAX_PRECISION_32,
    MAX_PRECISION_64,
};
use crate::columns::enums::{parse_enum_values, EnumSpec};
use crate::columns::fixed::FixedCodec;
use crate::columns::interval::{tick_seconds, IntervalSpec};
use crate::columns::ip::{Ipv4Spec, Ipv6Spec};
use crate::columns::low_cardinality::LowCardinalityCodec;
use crate::columns::numeric::{Float32Spec, Float64Spec, Int128Spec, IntSpec};
use crate::columns::string::{FixedStringCodec, StringCodec};
use crate::columns::uuid::UuidSpec;
use crate::columns::ColumnCodec;
use crate::config::CodecConfig;
use crate::error::CodecError;
use crate::types::{ColumnDescriptor, WireCategory};

const ARRAY_PREFIX: &str = "Array(";
const LOW_CARDINALITY_PREFIX: &str = "LowCardinality(";
const NULLABLE_PREFIX: &str = "Nullable(";
const FIXED_STRING_PREFIX: &str = "FixedString(";
const DECIMAL_PREFIX: &str = "Decimal(";
const ENUM_PREFIX: &str = "Enum";
const INTERVAL_PREFIX: &str = "Interval";

//==================================================================================
// I. Descriptor parsing
//==================================================================================

/// Parses a wire type string (e.g. `Array(Nullable(String))`) into a
/// descriptor for the named column.
pub fn descriptor_for(raw_type: &str, column_name: &str) -> Result<ColumnDescriptor, CodecError> {
    let (dims, inner) = unwrap_array_wrappers(raw_type, column_name)?;
    if dims > 0 {
        let nested = descriptor_for(inner, column_name)?;
        return Ok(ColumnDescriptor {
            name: column_name.to_string(),
            raw_type: raw_type.to_string(),
            normalized_type: inner.to_string(),
            category: WireCategory::Array,
            element_size: None,
            is_array: true,
            array_dims: dims,
            nested: Some(Box::new(nested)),
            nullable: false,
            unsigned: false,
            low_cardinality: false,
            min_value: None,
            max_value: None,
            precision: None,
            scale: None,
        });
    }

    let mut spec = raw_type;
    let mut low_cardinality = false;
    if let Some(inner) = strip_wrapper(spec, LOW_CARDINALITY_PREFIX, column_name)? {
        spec = inner;
        low_cardinality = true;
    }
    let mut nullable = false;
    if let Some(inner) = strip_wrapper(spec, NULLABLE_PREFIX, column_name)? {
        spec = inner;
        nullable = true;
    }
    base_descriptor(raw_type, spec, column_name, nullable, low_cardinality)
}

fn unwrap_array_wrappers<'a>(
    mut spec: &'a str,
    column_name: &str,
) -> Result<(usize, &'a str), CodecError> {
    let mut dims = 0;
    while let Some(inner) = strip_wrapper(spec, ARRAY_PREFIX, column_name)? {
        spec = inner;
        dims += 1;
    }
    Ok((dims, spec))
}

fn strip_wrapper<'a>(
    spec: &'a str,
    prefix: &str,
    column_name: &str,
) -> Result<Option<&'a str>, CodecError> {
    if !spec.starts_with(prefix) {
        return Ok(None);
    }
    spec.strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(')'))
        .map(Some)
        .ok_or_else(|| CodecError::UnsupportedType {
            spec: spec.to_string(),
            column: column_name.to_string(),
        })
}

#[allow(clippy::too_many_arguments)]
fn scalar_descriptor(
    raw_type: &str,
    spec: &str,
    name: &str,
    category: WireCategory,
    element_size: Option<usize>,
    nullable: bool,
    unsigned: bool,
    low_cardinality: bool,
    bounds: Option<(i128, i128)>,
    precision: Option<u32>,
    scale: Option<u32>,
) -> ColumnDescriptor {
    ColumnDescriptor {
        name: name.to_string(),
        raw_type: raw_type.to_string(),
        normalized_type: spec.to_string(),
        category,
        element_size,
        is_array: false,
        array_dims: 0,
        nested: None,
        nullable,
        unsigned,
        low_cardinality,
        min_value: bounds.map(|(min, _)| min),
        max_value: bounds.map(|(_, max)| max),
        precision,
        scale,
    }
}

fn base_descriptor(
    raw_type: &str,
    spec: &str,
    name: &str,
    nullable: bool,
    low_cardinality: bool,
) -> Result<ColumnDescriptor, CodecError> {
    let unsupported = || CodecError::UnsupportedType {
        spec: raw_type.to_string(),
        column: name.to_string(),
    };
    let descr = |category, size, unsigned, bounds, precision, scale| {
        scalar_descriptor(
            raw_type, spec, name, category, size, nullable, unsigned, low_cardinality, bounds,
            precision, scale,
        )
    };

    let unsigned = spec.starts_with('U') && spec != "UUID";
    Ok(match spec {
        "UInt8" | "Int8" => descr(
            WireCategory::TinyInt,
            Some(1),
            unsigned,
            Some(if unsigned { (0, 255) } else { (-128, 127) }),
            None,
            None,
        ),
        "UInt16" | "Int16" => descr(
            WireCategory::SmallInt,
            Some(2),
            unsigned,
            Some(if unsigned { (0, 65_535) } else { (-32_768, 32_767) }),
            None,
            None,
        ),
        "UInt32" | "Int32" => descr(
            WireCategory::Integer,
            Some(4),
            unsigned,
            Some(if unsigned {
                (0, u32::MAX as i128)
            } else {
                (i32::MIN as i128, i32::MAX as i128)
            }),
            None,
            None,
        ),
        "UInt64" | "Int64" => descr(
            WireCategory::BigInt,
            Some(8),
            unsigned,
            Some(if unsigned {
                (0, u64::MAX as i128)
            } else {
                (i64::MIN as i128, i64::MAX as i128)
            }),
            None,
            None,
        ),
        "Int128" => descr(
            WireCategory::BigInt,
            Some(16),
            false,
            Some((i128::MIN, i128::MAX)),
            None,
            None,
        ),
        "String" => descr(WireCategory::Varchar, None, false, None, None, None),
        "Float32" => descr(WireCategory::Real, Some(4), false, None, None, None),
        "Float64" => descr(WireCategory::Double, Some(8), false, None, None, None),
        "Date" => descr(
            WireCategory::Date,
            Some(2),
            true,
            Some((0, 65_535)),
            None,
            None,
        ),
        "UUID" => descr(WireCategory::Uuid, Some(16), false, None, None, None),
        "IPv4" => descr(WireCategory::Ipv4, Some(4), true, None, None, None),
        "IPv6" => descr(WireCategory::Ipv6, Some(16), true, None, None, None),
        "Nothing" => descr(WireCategory::Null, Some(1), false, None, None, None),
        _ => {
            if let Some(len_str) = spec
                .strip_prefix(FIXED_STRING_PREFIX)
                .and_then(|rest| rest.strip_suffix(')'))
            {
                let width: usize = len_str.trim().parse().map_err(|_| unsupported())?;
                descr(WireCategory::Varchar, Some(width), false, None, None, None)
            } else if spec.starts_with("DateTime64") {
                let category = if spec.ends_with(')') {
                    WireCategory::TimestampWithTimezone
                } else {
                    WireCategory::Timestamp
                };
                let precision = datetime64_precision(spec).ok_or_else(unsupported)?;
                if precision > 18 {
                    return Err(unsupported());
                }
                descr(category, Some(8), false, None, Some(precision), None)
            } else if spec.starts_with("DateTime") {
                let category = if spec.ends_with(')') {
                    WireCategory::TimestampWithTimezone
                } else {
                    WireCategory::Timestamp
                };
                descr(category, Some(4), false, None, None, None)
            } else if let Some(args) = spec
                .strip_prefix(DECIMAL_PREFIX)
                .and_then(|rest| rest.strip_suffix(')'))
            {
                let (precision, scale) = decimal_args(args).ok_or_else(unsupported)?;
                let size = decimal_size(precision).ok_or_else(unsupported)?;
                descr(
                    WireCategory::Decimal,
                    Some(size),
                    false,
                    None,
                    Some(precision),
                    Some(scale),
                )
            } else if spec.starts_with(ENUM_PREFIX) {
                let open = spec.find('(').ok_or_else(unsupported)?;
                let bits: usize = spec[ENUM_PREFIX.len()..open]
                    .parse()
                    .map_err(|_| unsupported())?;
                if bits != 8 && bits != 16 {
                    return Err(unsupported());
                }
                descr(WireCategory::Enum, Some(bits / 8), false, None, None, None)
            } else if spec.starts_with(INTERVAL_PREFIX) {
                descr(WireCategory::Interval, Some(8), false, None, None, None)
            } else {
                return Err(unsupported());
            }
        }
    })
}

fn datetime64_precision(spec: &str) -> Option<u32> {
    let args = match spec.strip_prefix("DateTime64") {
        // A bare `DateTime64` defaults to millisecond precision.
        Some("") => return Some(3),
        Some(args) => args.strip_prefix('(')?.strip_suffix(')')?,
        None => return None,
    };
    let first = args.split(',').next()?;
    first.trim().parse().ok()
}

fn decimal_args(args: &str) -> Option<(u32, u32)> {
    let mut parts = args.split(',');
    let precision = parts.next()?.trim().parse().ok()?;
    let scale = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((precision, scale))
}

fn decimal_size(precision: u32) -> Option<usize> {
    if precision == 0 {
        None
    } else if precision <= MAX_PRECISION_32 {
        Some(4)
    } else if precision <= MAX_PRECISION_64 {
        Some(8)
    } else if precision <= MAX_PRECISION_128 {
        Some(16)
    } else if precision <= MAX_PRECISION_256 {
        Some(32)
    } else {
        None
    }
}

//==================================================================================
// II. Codec dispatch
//==================================================================================

/// Instantiates the codec for a descriptor. Pure: equal inputs yield equal
/// codec shapes, and every failure is deterministic.
pub fn codec_for(
    descr: &ColumnDescriptor,
    config: &CodecConfig,
) -> Result<Arc<dyn ColumnCodec>, CodecError> {
    codec_with_cache(descr, config, false)
}

fn codec_with_cache(
    descr: &ColumnDescriptor,
    config: &CodecConfig,
    string_cache: bool,
) -> Result<Arc<dyn ColumnCodec>, CodecError> {
    if descr.is_array() {
        let nested = descr.nested().ok_or_else(|| {
            CodecError::InternalError(format!("array descriptor '{}' has no element type", descr))
        })?;
        let element = codec_with_cache(nested, config, false)?;
        return Ok(Arc::new(ArrayCodec::new(descr.clone(), element)));
    }
    if descr.is_low_cardinality() {
        let index_descr = descr.with_modifiers(false, false);
        let index = codec_with_cache(&index_descr, config, config.cache_dictionary_strings)?;
        return Ok(Arc::new(LowCardinalityCodec::new(descr.clone(), index)));
    }

    let unsupported = || CodecError::UnsupportedType {
        spec: descr.raw_type().to_string(),
        column: descr.name().to_string(),
    };
    let unsigned = descr.is_unsigned();

    Ok(match descr.category() {
        WireCategory::TinyInt | WireCategory::Null => Arc::new(FixedCodec::new(
            descr.clone(),
            IntSpec::<u8>::new(unsigned, bound(descr, -128), bound_max(descr, 255)),
        )),
        WireCategory::SmallInt => Arc::new(FixedCodec::new(
            descr.clone(),
            IntSpec::<u16>::new(unsigned, bound(descr, -32_768), bound_max(descr, 65_535)),
        )),
        WireCategory::Integer => Arc::new(FixedCodec::new(
            descr.clone(),
            IntSpec::<u32>::new(unsigned, bound(descr, i32::MIN as i128), bound_max(descr, u32::MAX as i128)),
        )),
        WireCategory::BigInt => match descr.element_size() {
            Some(8) => Arc::new(FixedCodec::new(
                descr.clone(),
                IntSpec::<u64>::new(unsigned, bound(descr, i64::MIN as i128), bound_max(descr, u64::MAX as i128)),
            )),
            Some(16) => Arc::new(FixedCodec::new(descr.clone(), Int128Spec)),
            _ => return Err(unsupported()),
        },
        WireCategory::Varchar => match descr.element_size() {
            None => Arc::new(StringCodec::new(descr.clone(), string_cache)),
            Some(width) => Arc::new(FixedStringCodec::new(descr.clone(), width, string_cache)),
        },
        WireCategory::Timestamp | WireCategory::TimestampWithTimezone => {
            match descr.element_size() {
                Some(4) => Arc::new(FixedCodec::new(descr.clone(), DateTimeSpec)),
                Some(8) => {
                    let precision = descr.precision().ok_or_else(unsupported)?;
                    Arc::new(FixedCodec::new(
                        descr.clone(),
                        DateTime64Spec {
                            precision,
                            saturate_extra_nanos: config.saturate_extra_nanos,
                        },
                    ))
                }
                _ => return Err(unsupported()),
            }
        }
        WireCategory::Decimal => {
            let precision = descr.precision().ok_or_else(unsupported)?;
            let scale = descr.scale().ok_or_else(unsupported)?;
            match descr.element_size() {
                Some(4) => Arc::new(FixedCodec::new(descr.clone(), DecimalSpec::<i32>::new(precision, scale))),
                Some(8) => Arc::new(FixedCodec::new(descr.clone(), DecimalSpec::<i64>::new(precision, scale))),
                Some(16) => Arc::new(FixedCodec::new(descr.clone(), DecimalSpec::<i128>::new(precision, scale))),
                Some(32) => Arc::new(FixedCodec::new(descr.clone(), Decimal256Spec { precision, scale })),
                _ => return Err(unsupported()),
            }
        }
        WireCategory::Real => Arc::new(FixedCodec::new(descr.clone(), Float32Spec)),
        WireCategory::Double => Arc::new(FixedCodec::new(descr.clone(), Float64Spec)),
        WireCategory::Date => Arc::new(FixedCodec::new(descr.clone(), DateSpec)),
        WireCategory::Uuid => Arc::new(FixedCodec::new(descr.clone(), UuidSpec)),
        WireCategory::Enum => {
            let values = Arc::new(parse_enum_values(descr.normalized_type())?);
            match descr.element_size() {
                Some(1) => Arc::new(FixedCodec::new(
                    descr.clone(),
                    EnumSpec::<i8>::new(values, config.enum_resolution),
                )),
                Some(2) => Arc::new(FixedCodec::new(
                    descr.clone(),
                    EnumSpec::<i16>::new(values, config.enum_resolution),
                )),
                _ => return Err(unsupported()),
            }
        }
        WireCategory::Interval => {
            let unit = descr
                .normalized_type()
                .strip_prefix(INTERVAL_PREFIX)
                .unwrap_or_default();
            let tick_secs = tick_seconds(unit, config).ok_or_else(unsupported)?;
            Arc::new(FixedCodec::new(descr.clone(), IntervalSpec { tick_secs }))
        }
        WireCategory::Ipv4 => Arc::new(FixedCodec::new(descr.clone(), Ipv4Spec)),
        WireCategory::Ipv6 => Arc::new(FixedCodec::new(descr.clone(), Ipv6Spec)),
        WireCategory::Array => {
            return Err(CodecError::InternalError(
                "array descriptors are dispatched before category matching".to_string(),
            ))
        }
    })
}

fn bound(descr: &ColumnDescriptor, fallback: i128) -> i128 {
    descr.min_value().unwrap_or(fallback)
}

fn bound_max(descr: &ColumnDescriptor, fallback: i128) -> i128 {
    descr.max_value().unwrap_or(fallback)
}

//==================================================================================
// III. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_wrappers_count_dimensions() {
        let descr = descriptor_for("Array(Array(Nullable(Int32)))", "m").unwrap();
        assert!(descr.is_array());
        assert_eq!(descr.array_dims(), 2);
        assert_eq!(descr.normalized_type(), "Nullable(Int32)");
        let nested = descr.nested().unwrap();
        assert!(!nested.is_array());
        assert!(nested.is_nullable());
        assert!(!nested.is_unsigned());
        assert_eq!(nested.element_size(), Some(4));
    }

    #[test]
    fn test_modifier_order_low_cardinality_then_nullable() {
        let descr = descriptor_for("LowCardinality(Nullable(String))", "s").unwrap();
        assert!(descr.is_low_cardinality());
        assert!(descr.is_nullable());
        assert_eq!(descr.normalized_type(), "String");
        assert_eq!(descr.element_size(), None);
    }

    #[test]
    fn test_integer_bounds() {
        let descr = descriptor_for("UInt64", "n").unwrap();
        assert!(descr.is_unsigned());
        assert_eq!(descr.min_value(), Some(0));
        assert_eq!(descr.max_value(), Some(u64::MAX as i128));

        let descr = descriptor_for("Int8", "n").unwrap();
        assert_eq!(descr.min_value(), Some(-128));
        assert_eq!(descr.max_value(), Some(127));

        // `UUID` starts with `U` but is not unsigned.
        assert!(!descriptor_for("UUID", "u").unwrap().is_unsigned());
    }

    #[test]
    fn test_decimal_width_by_precision() {
        assert_eq!(descriptor_for("Decimal(9, 2)", "d").unwrap().element_size(), Some(4));
        assert_eq!(descriptor_for("Decimal(18, 2)", "d").unwrap().element_size(), Some(8));
        assert_eq!(descriptor_for("Decimal(38, 2)", "d").unwrap().element_size(), Some(16));
        assert_eq!(descriptor_for("Decimal(76, 0)", "d").unwrap().element_size(), Some(32));
        assert!(descriptor_for("Decimal(77, 0)", "d").is_err());
    }

    #[test]
    fn test_datetime_variants() {
        let descr = descriptor_for("DateTime", "t").unwrap();
        assert_eq!(descr.category(), WireCategory::Timestamp);
        assert_eq!(descr.element_size(), Some(4));

        let descr = descriptor_for("DateTime('Europe/Oslo')", "t").unwrap();
        assert_eq!(descr.category(), WireCategory::TimestampWithTimezone);
        assert_eq!(descr.element_size(), Some(4));

        let descr = descriptor_for("DateTime64(6, 'UTC')", "t").unwrap();
        assert_eq!(descr.category(), WireCategory::TimestampWithTimezone);
        assert_eq!(descr.element_size(), Some(8));
        assert_eq!(descr.precision(), Some(6));
    }

    #[test]
    fn test_enum_width() {
        assert_eq!(
            descriptor_for("Enum8('a' = 1)", "e").unwrap().element_size(),
            Some(1)
        );
        assert_eq!(
            descriptor_for("Enum16('a' = 1)", "e").unwrap().element_size(),
            Some(2)
        );
    }

    #[test]
    fn test_unknown_spec_is_unsupported() {
        let err = descriptor_for("Ring(Float64)", "geo").unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedType { .. }));
        assert!(err.to_string().contains("Ring(Float64)"));
        assert!(err.to_string().contains("geo"));

        // Deterministic: the same input fails the same way.
        let again = descriptor_for("Ring(Float64)", "geo").unwrap_err();
        assert_eq!(err.to_string(), again.to_string());
    }

    #[test]
    fn test_codec_dispatch_width_disambiguation() {
        let config = CodecConfig::default();
        for spec in [
            "UInt8", "Int16", "UInt32", "Int64", "Int128", "Float32", "Float64", "String",
            "FixedString(8)", "Date", "DateTime", "DateTime64(3)", "UUID", "IPv4", "IPv6",
            "Decimal(5, 2)", "Decimal(40, 5)", "Enum8('a' = 1)", "IntervalDay", "Nothing",
            "Nullable(String)", "Array(UInt8)", "LowCardinality(String)",
            "Array(LowCardinality(Nullable(String)))",
        ] {
            let descr = descriptor_for(spec, "c").unwrap();
            let codec = codec_for(&descr, &config);
            assert!(codec.is_ok(), "no codec for {}", spec);
        }
    }

    #[test]
    fn test_unknown_interval_unit_is_unsupported() {
        let descr = descriptor_for("IntervalFortnight", "i").unwrap();
        assert!(codec_for(&descr, &CodecConfig::default()).is_err());
    }
}
