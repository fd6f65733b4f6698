//! `Decimal(p, s)` column codecs.
//!
//! The wire value is a fixed-width signed scaled integer: value * 10^s stored
//! in 4, 8, 16 or 32 little-endian bytes, the width chosen from the declared
//! precision at type-registration time. Negative values in the wide paths are
//! simply the two's-complement little-endian byte pattern, which
//! `from_le_bytes` reconstructs directly.
//!
//! Writes validate that the supplied value's precision and scale fit the
//! declared ones; values with a smaller scale are rescaled up exactly.

use arrow_buffer::i256;
use bytes::{BufMut, BytesMut};

use crate::columns::fixed::{le_array, FixedSpec};
use crate::error::CodecError;
use crate::value::{Decimal, Value};

pub(crate) const MAX_PRECISION_32: u32 = 9;
pub(crate) const MAX_PRECISION_64: u32 = 18;
pub(crate) const MAX_PRECISION_128: u32 = 38;
pub(crate) const MAX_PRECISION_256: u32 = 76;

fn pow10_i256(exp: u32) -> Option<i256> {
    let ten = i256::from_i128(10);
    let mut result = i256::from_i128(1);
    for _ in 0..exp {
        result = result.checked_mul(ten)?;
    }
    Some(result)
}

fn digit_count(unscaled: i256) -> u32 {
    let digits = unscaled.wrapping_abs().to_string();
    digits.trim_start_matches('-').len() as u32
}

/// Converts a caller value to the column's unscaled integer, enforcing the
/// declared precision and scale.
fn unscaled_for_column(val: &Value, precision: u32, scale: u32) -> Result<i256, String> {
    let dec = match val {
        Value::Decimal(dec) => *dec,
        other => {
            let int = other
                .as_i128()
                .ok_or_else(|| format!("expected a decimal, got {:?}", other))?;
            Decimal::new(int, 0)
        }
    };
    if dec.scale() > scale {
        return Err(format!(
            "scale {} exceeds the declared scale {}",
            dec.scale(),
            scale
        ));
    }
    let mult = pow10_i256(scale - dec.scale())
        .ok_or_else(|| "rescaling overflows 256 bits".to_string())?;
    let unscaled = dec
        .unscaled()
        .checked_mul(mult)
        .ok_or_else(|| "rescaling overflows 256 bits".to_string())?;
    let digits = digit_count(unscaled);
    if digits > precision {
        return Err(format!(
            "{} digits exceed the declared precision {}",
            digits, precision
        ));
    }
    Ok(unscaled)
}

//==================================================================================
// I. Narrow paths (4/8/16 bytes, native integer arithmetic)
//==================================================================================

#[derive(Clone)]
pub(crate) struct DecimalSpec<T> {
    pub(crate) precision: u32,
    pub(crate) scale: u32,
    pub(crate) _elem: std::marker::PhantomData<T>,
}

impl<T> DecimalSpec<T> {
    pub(crate) fn new(precision: u32, scale: u32) -> Self {
        DecimalSpec {
            precision,
            scale,
            _elem: std::marker::PhantomData,
        }
    }
}

macro_rules! impl_decimal_spec {
    ($elem:ty, $width:expr) => {
        impl FixedSpec for DecimalSpec<$elem> {
            type Elem = $elem;

            const WIDTH: usize = $width;

            fn decode_elem(&self, chunk: &[u8]) -> $elem {
                <$elem>::from_le_bytes(le_array(chunk))
            }

            fn encode_elem(&self, elem: $elem, sink: &mut BytesMut) {
                sink.put_slice(&elem.to_le_bytes());
            }

            fn to_value(&self, elem: $elem) -> Result<Value, CodecError> {
                Ok(Value::Decimal(Decimal::new(elem as i128, self.scale)))
            }

            fn from_value(&self, val: &Value) -> Result<$elem, String> {
                let unscaled = unscaled_for_column(val, self.precision, self.scale)?;
                // The precision check bounds the magnitude below this width's range.
                unscaled
                    .to_i128()
                    .and_then(|v| <$elem>::try_from(v).ok())
                    .ok_or_else(|| "unscaled value does not fit the column width".to_string())
            }

            fn null_elem(&self) -> $elem {
                0
            }
        }
    };
}

impl_decimal_spec!(i32, 4);
impl_decimal_spec!(i64, 8);
impl_decimal_spec!(i128, 16);

//==================================================================================
// II. Wide path (32 bytes, 256-bit arithmetic)
//==================================================================================

#[derive(Clone)]
pub(crate) struct Decimal256Spec {
    pub(crate) precision: u32,
    pub(crate) scale: u32,
}

impl FixedSpec for Decimal256Spec {
    type Elem = i256;

    const WIDTH: usize = 32;

    fn decode_elem(&self, chunk: &[u8]) -> i256 {
        i256::from_le_bytes(le_array(chunk))
    }

    fn encode_elem(&self, elem: i256, sink: &mut BytesMut) {
        sink.put_slice(&elem.to_le_bytes());
    }

    fn to_value(&self, elem: i256) -> Result<Value, CodecError> {
        Ok(Value::Decimal(Decimal::from_i256(elem, self.scale)))
    }

    fn from_value(&self, val: &Value) -> Result<i256, String> {
        unscaled_for_column(val, self.precision, self.scale)
    }

    fn null_elem(&self) -> i256 {
        i256::from_i128(0)
    }
}

//==================================================================================
// III. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::fixed::FixedCodec;
    use crate::columns::{ColumnCodec, DecodeProgress};
    use crate::registry;
    use crate::value::ValueRepr;
    use crate::wire::ByteSource;

    #[test]
    fn test_decimal64_roundtrip_preserves_scale() {
        let descr = registry::descriptor_for("Decimal(12, 4)", "amount").unwrap();
        let codec = FixedCodec::new(descr, DecimalSpec::<i64>::new(12, 4));
        let dec = Decimal::new(-1_234_5678, 4); // -1234.5678
        let mut sink = BytesMut::new();
        codec
            .writer(vec![vec![Value::Decimal(dec)]], 0)
            .serialize(&mut sink, 0, 1)
            .unwrap();
        assert_eq!(&sink[..], &(-12_345_678i64).to_le_bytes());

        let mut reader = codec.reader(1);
        let mut src = ByteSource::new();
        src.feed(&sink);
        assert_eq!(reader.read_column(&mut src).unwrap(), DecodeProgress::Complete);
        let back = reader.element(0, ValueRepr::Native).unwrap();
        assert_eq!(back, Value::Decimal(dec));
        match back {
            Value::Decimal(d) => assert_eq!(d.scale(), 4),
            other => panic!("expected a decimal, got {:?}", other),
        }
    }

    #[test]
    fn test_smaller_scale_is_rescaled_exactly() {
        let spec = DecimalSpec::<i32>::new(9, 3);
        // 1.5 at scale 1 becomes 1500 at scale 3.
        let elem = spec.from_value(&Value::Decimal(Decimal::new(15, 1))).unwrap();
        assert_eq!(elem, 1500);
    }

    #[test]
    fn test_precision_and_scale_violations_fail() {
        let spec = DecimalSpec::<i32>::new(5, 2);
        // Six digits after rescale.
        assert!(spec
            .from_value(&Value::Decimal(Decimal::new(123_456, 2)))
            .is_err());
        // Scale 3 cannot be represented at declared scale 2.
        assert!(spec
            .from_value(&Value::Decimal(Decimal::new(1, 3)))
            .is_err());
    }

    #[test]
    fn test_decimal256_negative_roundtrip() {
        let spec = Decimal256Spec {
            precision: 45,
            scale: 10,
        };
        // A 40-digit negative value that does not fit 128 bits.
        let big = i256::from_i128(-1_000_000_000_000_000_000_000_000_000_000_000_000i128)
            .checked_mul(i256::from_i128(10_000))
            .unwrap();
        let mut sink = BytesMut::new();
        spec.encode_elem(big, &mut sink);
        assert_eq!(sink.len(), 32);
        let back = spec.decode_elem(&sink);
        assert_eq!(back, big);
        assert_eq!(
            spec.to_value(back).unwrap(),
            Value::Decimal(Decimal::from_i256(big, 10))
        );
    }

    #[test]
    fn test_integer_values_are_whole_decimals() {
        let spec = DecimalSpec::<i64>::new(10, 2);
        assert_eq!(spec.from_value(&Value::Int64(7)).unwrap(), 700);
    }
}
