//! `IPv4` and `IPv6` column codecs.
//!
//! IPv4 addresses travel as their numeric value in a little-endian 32-bit
//! word; IPv6 addresses as their 16 raw bytes.

use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, BytesMut};

use crate::columns::fixed::{le_array, FixedSpec};
use crate::error::CodecError;
use crate::value::Value;

#[derive(Clone)]
pub(crate) struct Ipv4Spec;

impl FixedSpec for Ipv4Spec {
    type Elem = u32;

    const WIDTH: usize = 4;

    fn decode_elem(&self, chunk: &[u8]) -> u32 {
        u32::from_le_bytes(le_array(chunk))
    }

    fn encode_elem(&self, elem: u32, sink: &mut BytesMut) {
        sink.put_u32_le(elem);
    }

    fn to_value(&self, elem: u32) -> Result<Value, CodecError> {
        Ok(Value::Ipv4(Ipv4Addr::from(elem)))
    }

    fn from_value(&self, val: &Value) -> Result<u32, String> {
        match val {
            Value::Ipv4(addr) => Ok(u32::from(*addr)),
            Value::String(s) => s
                .parse::<Ipv4Addr>()
                .map(u32::from)
                .map_err(|e| format!("invalid IPv4 address '{}': {}", s, e)),
            other => other
                .as_i64()
                .filter(|v| (0..=u32::MAX as i64).contains(v))
                .map(|v| v as u32)
                .ok_or_else(|| format!("expected an IPv4 address, got {:?}", other)),
        }
    }

    fn null_elem(&self) -> u32 {
        0
    }
}

#[derive(Clone)]
pub(crate) struct Ipv6Spec;

impl FixedSpec for Ipv6Spec {
    type Elem = [u8; 16];

    const WIDTH: usize = 16;

    fn decode_elem(&self, chunk: &[u8]) -> [u8; 16] {
        le_array(chunk)
    }

    fn encode_elem(&self, elem: [u8; 16], sink: &mut BytesMut) {
        sink.put_slice(&elem);
    }

    fn to_value(&self, elem: [u8; 16]) -> Result<Value, CodecError> {
        Ok(Value::Ipv6(Ipv6Addr::from(elem)))
    }

    fn from_value(&self, val: &Value) -> Result<[u8; 16], String> {
        match val {
            Value::Ipv6(addr) => Ok(addr.octets()),
            Value::String(s) => s
                .parse::<Ipv6Addr>()
                .map(|a| a.octets())
                .map_err(|e| format!("invalid IPv6 address '{}': {}", s, e)),
            other => Err(format!("expected an IPv6 address, got {:?}", other)),
        }
    }

    fn null_elem(&self) -> [u8; 16] {
        [0u8; 16]
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
    fn test_ipv4_numeric_order() {
        let spec = Ipv4Spec;
        let addr: Ipv4Addr = "10.20.30.40".parse().unwrap();
        let mut sink = BytesMut::new();
        spec.encode_elem(spec.from_value(&Value::Ipv4(addr)).unwrap(), &mut sink);
        // 10.20.30.40 == 0x0A141E28, stored little-endian.
        assert_eq!(&sink[..], &[0x28, 0x1E, 0x14, 0x0A]);
        assert_eq!(spec.to_value(spec.decode_elem(&sink)).unwrap(), Value::Ipv4(addr));
    }

    #[test]
    fn test_ipv6_roundtrip() {
        let descr = registry::descriptor_for("IPv6", "ip").unwrap();
        let codec = FixedCodec::new(descr, Ipv6Spec);
        let addr: Ipv6Addr = "2001:db8::8a2e:370:7334".parse().unwrap();
        let mut sink = BytesMut::new();
        codec
            .writer(vec![vec![Value::Ipv6(addr)]], 0)
            .serialize(&mut sink, 0, 1)
            .unwrap();

        let mut reader = codec.reader(1);
        let mut src = ByteSource::new();
        src.feed(&sink);
        assert_eq!(reader.read_column(&mut src).unwrap(), DecodeProgress::Complete);
        assert_eq!(reader.element(0, ValueRepr::Native).unwrap(), Value::Ipv6(addr));
    }
}
