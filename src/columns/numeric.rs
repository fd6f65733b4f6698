//! Fixed-width integer and floating-point column codecs.
//!
//! All integer widths are stored internally as their unsigned bit patterns;
//! the descriptor's signedness flag decides which `Value` variant an element
//! surfaces as, and writes are range-checked against the descriptor bounds.
//! The bulk decode path reinterprets the payload with `bytemuck` and then
//! normalizes byte order per element (a no-op on little-endian hosts).

use std::marker::PhantomData;

use bytes::{BufMut, BytesMut};

use crate::columns::fixed::{le_array, FixedSpec};
use crate::value::Value;

//==================================================================================
// I. Integers (8/16/32/64-bit, signed and unsigned share a codec per width)
//==================================================================================

/// Spec for one integer width. `unsigned` mirrors the descriptor flag; the
/// optional bounds come from the descriptor and gate writes.
#[derive(Clone)]
pub(crate) struct IntSpec<T> {
    pub(crate) unsigned: bool,
    pub(crate) min: i128,
    pub(crate) max: i128,
    pub(crate) _elem: PhantomData<T>,
}

impl<T> IntSpec<T> {
    pub(crate) fn new(unsigned: bool, min: i128, max: i128) -> Self {
        IntSpec {
            unsigned,
            min,
            max,
            _elem: PhantomData,
        }
    }

    fn check_range(&self, int: i128) -> Result<(), String> {
        if int < self.min || int > self.max {
            return Err(format!(
                "value {} is out of range [{}, {}]",
                int, self.min, self.max
            ));
        }
        Ok(())
    }
}

macro_rules! impl_int_spec {
    ($elem:ty, $signed:ty, $unsigned_variant:ident, $signed_variant:ident, $width:expr) => {
        impl FixedSpec for IntSpec<$elem> {
            type Elem = $elem;

            const WIDTH: usize = $width;

            fn decode_elem(&self, chunk: &[u8]) -> $elem {
                <$elem>::from_le_bytes(le_array(chunk))
            }

            fn decode_items(&self, payload: &[u8], _n_rows: usize) -> Vec<$elem> {
                let mut items: Vec<$elem> = bytemuck::pod_collect_to_vec(payload);
                if cfg!(target_endian = "big") {
                    for item in &mut items {
                        *item = <$elem>::from_le(*item);
                    }
                }
                items
            }

            fn encode_elem(&self, elem: $elem, sink: &mut BytesMut) {
                sink.put_slice(&elem.to_le_bytes());
            }

            fn to_value(&self, elem: $elem) -> Result<Value, crate::error::CodecError> {
                Ok(if self.unsigned {
                    Value::$unsigned_variant(elem)
                } else {
                    Value::$signed_variant(elem as $signed)
                })
            }

            fn from_value(&self, val: &Value) -> Result<$elem, String> {
                let int = val
                    .as_i128()
                    .ok_or_else(|| format!("expected an integer, got {:?}", val))?;
                self.check_range(int)?;
                Ok(if self.unsigned {
                    int as $elem
                } else {
                    (int as $signed) as $elem
                })
            }

            fn null_elem(&self) -> $elem {
                0
            }
        }
    };
}

impl_int_spec!(u8, i8, UInt8, Int8, 1);
impl_int_spec!(u16, i16, UInt16, Int16, 2);
impl_int_spec!(u32, i32, UInt32, Int32, 4);
impl_int_spec!(u64, i64, UInt64, Int64, 8);

//==================================================================================
// II. Int128
//==================================================================================

#[derive(Clone)]
pub(crate) struct Int128Spec;

impl FixedSpec for Int128Spec {
    type Elem = i128;

    const WIDTH: usize = 16;

    fn decode_elem(&self, chunk: &[u8]) -> i128 {
        i128::from_le_bytes(le_array(chunk))
    }

    fn encode_elem(&self, elem: i128, sink: &mut BytesMut) {
        sink.put_slice(&elem.to_le_bytes());
    }

    fn to_value(&self, elem: i128) -> Result<Value, crate::error::CodecError> {
        Ok(Value::Int128(elem))
    }

    fn from_value(&self, val: &Value) -> Result<i128, String> {
        val.as_i128()
            .ok_or_else(|| format!("expected an integer, got {:?}", val))
    }

    fn null_elem(&self) -> i128 {
        0
    }
}

//==================================================================================
// III. Floats
//==================================================================================

#[derive(Clone)]
pub(crate) struct Float32Spec;

impl FixedSpec for Float32Spec {
    type Elem = f32;

    const WIDTH: usize = 4;

    fn decode_elem(&self, chunk: &[u8]) -> f32 {
        f32::from_le_bytes(le_array(chunk))
    }

    fn decode_items(&self, payload: &[u8], _n_rows: usize) -> Vec<f32> {
        // Cast through the same-width unsigned pattern, then reinterpret.
        let bits: Vec<u32> = bytemuck::pod_collect_to_vec(payload);
        bits.into_iter()
            .map(|b| f32::from_bits(u32::from_le(b)))
            .collect()
    }

    fn encode_elem(&self, elem: f32, sink: &mut BytesMut) {
        sink.put_f32_le(elem);
    }

    fn to_value(&self, elem: f32) -> Result<Value, crate::error::CodecError> {
        Ok(Value::Float32(elem))
    }

    fn from_value(&self, val: &Value) -> Result<f32, String> {
        val.as_f64()
            .map(|f| f as f32)
            .ok_or_else(|| format!("expected a float, got {:?}", val))
    }

    fn null_elem(&self) -> f32 {
        0.0
    }
}

#[derive(Clone)]
pub(crate) struct Float64Spec;

impl FixedSpec for Float64Spec {
    type Elem = f64;

    const WIDTH: usize = 8;

    fn decode_elem(&self, chunk: &[u8]) -> f64 {
        f64::from_le_bytes(le_array(chunk))
    }

    fn decode_items(&self, payload: &[u8], _n_rows: usize) -> Vec<f64> {
        let bits: Vec<u64> = bytemuck::pod_collect_to_vec(payload);
        bits.into_iter()
            .map(|b| f64::from_bits(u64::from_le(b)))
            .collect()
    }

    fn encode_elem(&self, elem: f64, sink: &mut BytesMut) {
        sink.put_f64_le(elem);
    }

    fn to_value(&self, elem: f64) -> Result<Value, crate::error::CodecError> {
        Ok(Value::Float64(elem))
    }

    fn from_value(&self, val: &Value) -> Result<f64, String> {
        val.as_f64()
            .ok_or_else(|| format!("expected a float, got {:?}", val))
    }

    fn null_elem(&self) -> f64 {
        0.0
    }
}

//==================================================================================
// IV. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::fixed::FixedCodec;
    use crate::columns::{ColumnCodec, DecodeProgress};
    use crate::registry;
    use crate::value::ValueRepr;
    use crate::wire::ByteSource;
    use bytes::BytesMut;

    fn uint32_codec() -> FixedCodec<IntSpec<u32>> {
        let descr = registry::descriptor_for("UInt32", "n").unwrap();
        FixedCodec::new(descr, IntSpec::new(true, 0, u32::MAX as i128))
    }

    #[test]
    fn test_fixed_width_roundtrip() {
        let codec = uint32_codec();
        let rows: Vec<Vec<Value>> = vec![
            vec![Value::UInt32(0)],
            vec![Value::UInt32(4_000_000_000)],
            vec![Value::UInt32(7)],
        ];
        let mut sink = BytesMut::new();
        codec.writer(rows, 0).serialize(&mut sink, 0, 3).unwrap();
        assert_eq!(sink.len(), 12);

        let mut reader = codec.reader(3);
        let mut src = ByteSource::new();
        src.feed(&sink);
        assert_eq!(reader.read_column(&mut src).unwrap(), DecodeProgress::Complete);
        assert_eq!(
            reader.element(1, ValueRepr::Native).unwrap(),
            Value::UInt32(4_000_000_000)
        );
    }

    #[test]
    fn test_items_phase_is_atomic() {
        let codec = uint32_codec();
        let mut reader = codec.reader(2);
        let mut src = ByteSource::new();
        src.feed(&[1, 0, 0, 0, 2, 0, 0]); // 7 of the 8 required bytes
        assert_eq!(
            reader.read_column(&mut src).unwrap(),
            DecodeProgress::NeedMoreData
        );
        assert_eq!(src.readable_bytes(), 7);

        src.feed(&[0]);
        assert_eq!(reader.read_column(&mut src).unwrap(), DecodeProgress::Complete);
        assert_eq!(reader.element(0, ValueRepr::Native).unwrap(), Value::UInt32(1));
        assert_eq!(reader.element(1, ValueRepr::Native).unwrap(), Value::UInt32(2));
    }

    #[test]
    fn test_signedness_follows_descriptor() {
        let descr = registry::descriptor_for("Int16", "t").unwrap();
        let codec = FixedCodec::new(descr, IntSpec::<u16>::new(false, i16::MIN as i128, i16::MAX as i128));
        let mut sink = BytesMut::new();
        codec
            .writer(vec![vec![Value::Int16(-2)]], 0)
            .serialize(&mut sink, 0, 1)
            .unwrap();
        assert_eq!(&sink[..], &[0xFE, 0xFF]);

        let mut reader = codec.reader(1);
        let mut src = ByteSource::new();
        src.feed(&sink);
        reader.read_column(&mut src).unwrap();
        assert_eq!(reader.element(0, ValueRepr::Native).unwrap(), Value::Int16(-2));
    }

    #[test]
    fn test_out_of_range_write_fails() {
        let codec = uint32_codec();
        let mut sink = BytesMut::new();
        let err = codec
            .writer(vec![vec![Value::Int64(-1)]], 0)
            .serialize(&mut sink, 0, 1)
            .unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_float64_roundtrip_bits() {
        let descr = registry::descriptor_for("Float64", "f").unwrap();
        let codec = FixedCodec::new(descr, Float64Spec);
        let mut sink = BytesMut::new();
        codec
            .writer(vec![vec![Value::Float64(-0.5)], vec![Value::Float64(f64::MIN_POSITIVE)]], 0)
            .serialize(&mut sink, 0, 2)
            .unwrap();
        let mut reader = codec.reader(2);
        let mut src = ByteSource::new();
        src.feed(&sink);
        reader.read_column(&mut src).unwrap();
        assert_eq!(reader.element(0, ValueRepr::Native).unwrap(), Value::Float64(-0.5));
        assert_eq!(
            reader.element(1, ValueRepr::Native).unwrap(),
            Value::Float64(f64::MIN_POSITIVE)
        );
    }
}
