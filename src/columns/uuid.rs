//! `UUID` column codec.
//!
//! The wire stores each UUID as two little-endian 64-bit halves, most
//! significant half first.

use bytes::{BufMut, BytesMut};
use uuid::Uuid;

use crate::columns::fixed::{le_array, FixedSpec};
use crate::error::CodecError;
use crate::value::Value;

#[derive(Clone)]
pub(crate) struct UuidSpec;

impl FixedSpec for UuidSpec {
    type Elem = Uuid;

    const WIDTH: usize = 16;

    fn decode_elem(&self, chunk: &[u8]) -> Uuid {
        let high = u64::from_le_bytes(le_array(&chunk[..8]));
        let low = u64::from_le_bytes(le_array(&chunk[8..]));
        Uuid::from_u64_pair(high, low)
    }

    fn encode_elem(&self, elem: Uuid, sink: &mut BytesMut) {
        let (high, low) = elem.as_u64_pair();
        sink.put_u64_le(high);
        sink.put_u64_le(low);
    }

    fn to_value(&self, elem: Uuid) -> Result<Value, CodecError> {
        Ok(Value::Uuid(elem))
    }

    fn from_value(&self, val: &Value) -> Result<Uuid, String> {
        match val {
            Value::Uuid(u) => Ok(*u),
            Value::String(s) => Uuid::parse_str(s).map_err(|e| format!("invalid UUID '{}': {}", s, e)),
            other => Err(format!("expected a UUID, got {:?}", other)),
        }
    }

    fn null_elem(&self) -> Uuid {
        Uuid::nil()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::fixed::FixedCodec;
    use crate::columns::{ColumnCodec, DecodeProgress};
    use crate::registry;
    use crate::value::ValueRepr;
    use crate::wire::ByteSource;

    #[test]
    fn test_uuid_roundtrip() {
        let descr = registry::descriptor_for("UUID", "id").unwrap();
        let codec = FixedCodec::new(descr, UuidSpec);
        let id = Uuid::parse_str("6d9cd875-2a5d-4e3c-8f3a-2f8a4d6b1c9e").unwrap();
        let mut sink = BytesMut::new();
        codec
            .writer(vec![vec![Value::Uuid(id)]], 0)
            .serialize(&mut sink, 0, 1)
            .unwrap();
        assert_eq!(sink.len(), 16);

        let mut reader = codec.reader(1);
        let mut src = ByteSource::new();
        src.feed(&sink);
        assert_eq!(reader.read_column(&mut src).unwrap(), DecodeProgress::Complete);
        assert_eq!(reader.element(0, ValueRepr::Native).unwrap(), Value::Uuid(id));
    }

    #[test]
    fn test_uuid_wire_layout_is_two_le_halves() {
        let spec = UuidSpec;
        let id = Uuid::from_u64_pair(0x0102_0304_0506_0708, 0x090A_0B0C_0D0E_0F10);
        let mut sink = BytesMut::new();
        spec.encode_elem(id, &mut sink);
        assert_eq!(
            &sink[..],
            &[8, 7, 6, 5, 4, 3, 2, 1, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 9]
        );
        assert_eq!(spec.decode_elem(&sink), id);
    }
}
