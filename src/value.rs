//! The canonical, type-safe representation of a single column element.
//!
//! Every codec in the crate decodes into — and encodes out of — the closed
//! [`Value`] enum. This replaces the fragile "runtime class token" dispatch a
//! dynamically-typed client would use with a tagged union over the finite set
//! of wire categories, so adding a type is a compile-time-checked change.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use arrow_buffer::i256;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

//==================================================================================
// I. Requested representation
//==================================================================================

/// How the caller wants NULL rows surfaced by `element()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRepr {
    /// Substitute the column type's null representative (0, empty bytes, ...)
    /// so the caller always receives a concrete value.
    Native,
    /// Surface NULL rows as [`Value::Null`].
    Nullable,
}

//==================================================================================
// II. Value
//==================================================================================

/// One decoded column element.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    UInt8(u8),
    Int8(i8),
    UInt16(u16),
    Int16(i16),
    UInt32(u32),
    Int32(i32),
    UInt64(u64),
    Int64(i64),
    Int128(i128),
    Float32(f32),
    Float64(f64),
    /// Raw string payload bytes. The transport does not promise UTF-8; use
    /// [`Value::as_str`] / [`Value::into_string`] when text is expected.
    Bytes(Vec<u8>),
    /// Validated text (enum names, cached dictionary strings).
    String(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Interval(Duration),
    Uuid(Uuid),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Decimal(Decimal),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Widens any integer variant to `i64`. The unsigned 32-bit wire width is
    /// narrower than the safe signed range, so this is always exact for it;
    /// `UInt64`/`Int128` values outside `i64` return `None`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::UInt8(v) => Some(v as i64),
            Value::Int8(v) => Some(v as i64),
            Value::UInt16(v) => Some(v as i64),
            Value::Int16(v) => Some(v as i64),
            Value::UInt32(v) => Some(v as i64),
            Value::Int32(v) => Some(v as i64),
            Value::UInt64(v) => i64::try_from(v).ok(),
            Value::Int64(v) => Some(v),
            Value::Int128(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Widens any integer variant to `i128` (always exact; `u64` fits).
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Value::UInt64(v) => Some(v as i128),
            Value::Int128(v) => Some(v),
            _ => self.as_i64().map(|v| v as i128),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float32(v) => Some(v as f64),
            Value::Float64(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// Borrows the value as text, if it is (valid UTF-8) text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Converts a `Bytes`/`String` value into an owned `String` (lossy for
    /// non-UTF-8 payloads, mirroring a best-effort text view).
    pub fn into_string(self) -> Option<String> {
        match self {
            Value::String(s) => Some(s),
            Value::Bytes(b) => Some(String::from_utf8_lossy(&b).into_owned()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

//==================================================================================
// III. Decimal
//==================================================================================

/// An exact decimal: an unscaled 256-bit integer plus a base-10 scale.
///
/// The wire stores the unscaled integer in 4/8/16/32 little-endian bytes
/// depending on the column's declared precision; this type is wide enough for
/// all four widths. Equality is exact on (unscaled, scale): `1.10` and `1.1`
/// are different values, which is what "round-trip preserves scale" requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    unscaled: i256,
    scale: u32,
}

impl Decimal {
    pub fn new(unscaled: i128, scale: u32) -> Self {
        Decimal {
            unscaled: i256::from_i128(unscaled),
            scale,
        }
    }

    pub fn from_i256(unscaled: i256, scale: u32) -> Self {
        Decimal { unscaled, scale }
    }

    pub fn unscaled(&self) -> i256 {
        self.unscaled
    }

    /// The unscaled integer, when it fits the 128-bit fast path.
    pub fn unscaled_i128(&self) -> Option<i128> {
        self.unscaled.to_i128()
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Number of significant base-10 digits in the unscaled integer (>= 1).
    pub fn precision(&self) -> u32 {
        let digits = self.unscaled.wrapping_abs().to_string();
        digits.trim_start_matches('-').len() as u32
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let negative = self.unscaled < i256::ZERO;
        let digits = self.unscaled.wrapping_abs().to_string();
        let digits = digits.trim_start_matches('-');
        let scale = self.scale as usize;
        let sign = if negative { "-" } else { "" };
        if scale == 0 {
            return write!(f, "{}{}", sign, digits);
        }
        if digits.len() <= scale {
            // All digits are fractional; left-pad with zeros.
            write!(f, "{}0.{}{}", sign, "0".repeat(scale - digits.len()), digits)
        } else {
            let (int_part, frac_part) = digits.split_at(digits.len() - scale);
            write!(f, "{}{}.{}", sign, int_part, frac_part)
        }
    }
}

//==================================================================================
// IV. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widening() {
        assert_eq!(Value::UInt32(4_000_000_000).as_i64(), Some(4_000_000_000));
        assert_eq!(Value::UInt64(u64::MAX).as_i64(), None);
        assert_eq!(Value::UInt64(u64::MAX).as_i128(), Some(u64::MAX as i128));
        assert_eq!(Value::Int8(-5).as_i64(), Some(-5));
    }

    #[test]
    fn test_text_views() {
        assert_eq!(Value::Bytes(b"abc".to_vec()).as_str(), Some("abc"));
        assert_eq!(Value::Bytes(vec![0xFF, 0xFE]).as_str(), None);
        assert_eq!(
            Value::Bytes(b"ok".to_vec()).into_string(),
            Some("ok".to_string())
        );
    }

    #[test]
    fn test_decimal_display() {
        assert_eq!(Decimal::new(123_45, 2).to_string(), "123.45");
        assert_eq!(Decimal::new(-5, 3).to_string(), "-0.005");
        assert_eq!(Decimal::new(7, 0).to_string(), "7");
        assert_eq!(Decimal::new(0, 2).to_string(), "0.00");
    }

    #[test]
    fn test_decimal_precision_and_scale_are_exact() {
        let a = Decimal::new(110, 2); // 1.10
        let b = Decimal::new(11, 1); // 1.1
        assert_ne!(a, b);
        assert_eq!(a.precision(), 3);
        assert_eq!(b.precision(), 2);
        assert_eq!(Decimal::new(0, 4).precision(), 1);
    }
}
