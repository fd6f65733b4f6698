//! `LowCardinality(...)` column codec — dictionary (index + keys) encoding
//! over any element codec.
//!
//! Wire layout: an 8-byte serialization version (always 1), then an 8-byte
//! flags/key-width word, an 8-byte dictionary size, the dictionary as a
//! nested column of that size, an 8-byte key count, and the keys as a nested
//! unsigned integer column whose width the flags word selects. When the
//! column is nullable, key 0 is reserved for the null sentinel and the
//! dictionary's slot 0 holds the element type's null representative; there is
//! no per-row null bitmap.

use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use hashbrown::HashMap;
use log::debug;

use crate::columns::{
    ColumnCodec, ColumnReader, ColumnWriter, DecodeProgress, ReaderBase, Row, WriterCore,
};
use crate::config::CodecConfig;
use crate::error::CodecError;
use crate::registry;
use crate::types::ColumnDescriptor;
use crate::value::{Value, ValueRepr};
use crate::wire::ByteSource;

/// The only dictionary serialization version this client understands.
pub(crate) const SUPPORTED_SERIALIZATION_VERSION: u64 = 1;

/// Additional keys are stored inline, before the indexes.
const HAS_ADDITIONAL_KEYS_BIT: u64 = 1 << 9;
/// The previous granule's dictionary does not carry over.
const NEED_UPDATE_DICTIONARY: u64 = 1 << 10;
const SERIALIZATION_TYPE: u64 = HAS_ADDITIONAL_KEYS_BIT | NEED_UPDATE_DICTIONARY;

const MAX_DICTIONARY_SIZE: u64 = i32::MAX as u64;

/// The key sub-column codec for a width code (0..=3 selecting 1/2/4/8 bytes).
fn key_codec(code: u64) -> Result<Arc<dyn ColumnCodec>, CodecError> {
    let spec = match code {
        0 => "UInt8",
        1 => "UInt16",
        2 => "UInt32",
        3 => "UInt64",
        other => {
            return Err(CodecError::MalformedPayload(format!(
                "unknown low-cardinality key width code {}",
                other
            )))
        }
    };
    let descr = registry::descriptor_for(spec, "lc_key")?;
    registry::codec_for(&descr, &CodecConfig::default())
}

/// The smallest width code whose address space covers `dict_size` entries.
pub(crate) fn key_width_code(dict_size: u64) -> u64 {
    if dict_size <= 1 << 8 {
        0
    } else if dict_size <= 1 << 16 {
        1
    } else if dict_size <= 1 << 32 {
        2
    } else {
        3
    }
}

pub(crate) struct LowCardinalityCodec {
    descr: ColumnDescriptor,
    /// Codec for the dictionary sub-column: this type with the
    /// low-cardinality and nullability modifiers cleared.
    index: Arc<dyn ColumnCodec>,
}

impl LowCardinalityCodec {
    pub(crate) fn new(descr: ColumnDescriptor, index: Arc<dyn ColumnCodec>) -> Self {
        LowCardinalityCodec { descr, index }
    }
}

impl ColumnCodec for LowCardinalityCodec {
    fn descriptor(&self) -> &ColumnDescriptor {
        &self.descr
    }

    fn reader(&self, n_rows: usize) -> Box<dyn ColumnReader> {
        Box::new(LowCardinalityReader {
            base: ReaderBase::new(self.descr.clone(), n_rows),
            index_codec: Arc::clone(&self.index),
            ser_type: None,
            index_size: None,
            index_reader: None,
            key_count: None,
            keys_reader: None,
        })
    }

    fn writer(&self, rows: Vec<Row>, column_index: usize) -> Box<dyn ColumnWriter> {
        Box::new(LowCardinalityWriter {
            core: WriterCore::new(self.descr.clone(), rows, column_index),
            index_codec: Arc::clone(&self.index),
        })
    }

    fn null_value(&self) -> Value {
        self.index.null_value()
    }
}

//==================================================================================
// I. Reader
//==================================================================================

struct LowCardinalityReader {
    base: ReaderBase,
    index_codec: Arc<dyn ColumnCodec>,
    ser_type: Option<u64>,
    index_size: Option<u64>,
    index_reader: Option<Box<dyn ColumnReader>>,
    key_count: Option<u64>,
    keys_reader: Option<Box<dyn ColumnReader>>,
}

impl ColumnReader for LowCardinalityReader {
    fn base(&self) -> &ReaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ReaderBase {
        &mut self.base
    }

    fn read_prefix(&mut self, src: &mut ByteSource) -> Result<bool, CodecError> {
        if src.readable_bytes() < 8 {
            return Ok(false);
        }
        let version = src.read_u64_le();
        if version != SUPPORTED_SERIALIZATION_VERSION {
            return Err(CodecError::MalformedPayload(format!(
                "unsupported low-cardinality serialization version {}",
                version
            )));
        }
        Ok(true)
    }

    fn mark_prefix_consumed(&mut self, prefix: Option<u64>) -> Result<(), CodecError> {
        let version = prefix.ok_or_else(|| {
            CodecError::InternalError(
                "low-cardinality reader handed no serialization version".to_string(),
            )
        })?;
        if version != SUPPORTED_SERIALIZATION_VERSION {
            return Err(CodecError::MalformedPayload(format!(
                "unsupported low-cardinality serialization version {}",
                version
            )));
        }
        self.base.prefix_done = true;
        Ok(())
    }

    fn has_nulls_map(&self) -> bool {
        // Nullability lives in key 0; there is no wire bitmap.
        false
    }

    fn read_items(&mut self, src: &mut ByteSource) -> Result<bool, CodecError> {
        if self.index_size.is_none() {
            if src.readable_bytes() < 8 + 8 {
                return Ok(false);
            }
            let ser_type = src.read_u64_le();
            let index_size = src.read_u64_le();
            if index_size > MAX_DICTIONARY_SIZE {
                return Err(CodecError::size_too_big(
                    "low cardinality index",
                    index_size,
                    MAX_DICTIONARY_SIZE,
                ));
            }
            // Fail on an unknown width code before any dictionary byte is read.
            key_codec(ser_type & 0xF)?;
            self.ser_type = Some(ser_type);
            self.index_size = Some(index_size);
            debug!(
                "column '{}': low-cardinality dictionary holds {} entries",
                self.base.descr.name(),
                index_size
            );
        }
        if self.index_reader.is_none() {
            let size = self.index_size.unwrap_or(0) as usize;
            self.index_reader = Some(self.index_codec.reader(size));
        }
        if let Some(index_reader) = self.index_reader.as_mut() {
            if index_reader.is_partial()
                && index_reader.read_column(src)? == DecodeProgress::NeedMoreData
            {
                return Ok(false);
            }
        }
        if self.key_count.is_none() {
            if src.readable_bytes() < 8 {
                return Ok(false);
            }
            self.key_count = Some(src.read_u64_le());
        }
        if self.keys_reader.is_none() {
            let code = self.ser_type.unwrap_or(0) & 0xF;
            self.keys_reader = Some(key_codec(code)?.reader(self.base.n_rows));
        }
        match self.keys_reader.as_mut() {
            Some(keys_reader) => Ok(keys_reader.read_column(src)? == DecodeProgress::Complete),
            None => Ok(false),
        }
    }

    fn is_partial(&self) -> bool {
        let index_partial = match self.index_reader.as_ref() {
            Some(reader) => reader.is_partial(),
            None => true,
        };
        let keys_partial = match self.keys_reader.as_ref() {
            Some(reader) => reader.is_partial(),
            None => true,
        };
        self.index_size.is_none() || index_partial || self.key_count.is_none() || keys_partial
    }

    fn null_value(&self) -> Value {
        self.index_codec.null_value()
    }

    fn element_internal(&self, row: usize, repr: ValueRepr) -> Result<Value, CodecError> {
        let keys_reader = self.keys_reader.as_ref().ok_or_else(|| {
            CodecError::InternalError("low-cardinality keys accessed before decode".to_string())
        })?;
        let index_reader = self.index_reader.as_ref().ok_or_else(|| {
            CodecError::InternalError("low-cardinality index accessed before decode".to_string())
        })?;
        let key = keys_reader
            .element(row, ValueRepr::Native)?
            .as_i64()
            .unwrap_or(-1);
        if self.base.descr.is_nullable() && key == 0 {
            return Ok(match repr {
                ValueRepr::Native => self.null_value(),
                ValueRepr::Nullable => Value::Null,
            });
        }
        if key < 0 || key as u64 >= self.index_size.unwrap_or(0) {
            return Err(CodecError::MalformedPayload(format!(
                "low-cardinality key {} is outside the dictionary of {} entries",
                key,
                self.index_size.unwrap_or(0)
            )));
        }
        index_reader.element(key as usize, repr)
    }
}

//==================================================================================
// II. Writer
//==================================================================================

struct LowCardinalityWriter {
    core: WriterCore,
    index_codec: Arc<dyn ColumnCodec>,
}

/// A canonical byte fingerprint for dictionary deduplication. Text and raw
/// bytes share a fingerprint, so a `String` and its `Bytes` twin land on the
/// same key — equality on the wire is byte equality.
fn value_fingerprint(val: &Value) -> Vec<u8> {
    match val {
        Value::Bytes(_) | Value::String(_) => val.as_bytes().unwrap_or_default().to_vec(),
        Value::Float32(f) => f.to_bits().to_le_bytes().to_vec(),
        Value::Float64(f) => f.to_bits().to_le_bytes().to_vec(),
        Value::Uuid(u) => u.as_bytes().to_vec(),
        Value::Ipv4(a) => u32::from(*a).to_le_bytes().to_vec(),
        Value::Ipv6(a) => a.octets().to_vec(),
        Value::Date(d) => d.to_string().into_bytes(),
        Value::DateTime(dt) => dt.to_rfc3339().into_bytes(),
        Value::Interval(d) => d.num_seconds().to_le_bytes().to_vec(),
        Value::Decimal(d) => {
            let mut bytes = d.unscaled().to_le_bytes().to_vec();
            bytes.extend_from_slice(&d.scale().to_le_bytes());
            bytes
        }
        other => other
            .as_i128()
            .map(|v| v.to_le_bytes().to_vec())
            .unwrap_or_default(),
    }
}

impl ColumnWriter for LowCardinalityWriter {
    fn core(&self) -> &WriterCore {
        &self.core
    }

    fn serialize_prefix(&self, sink: &mut BytesMut, _from: usize, _to: usize) -> Result<(), CodecError> {
        sink.put_u64_le(SUPPORTED_SERIALIZATION_VERSION);
        Ok(())
    }

    fn serialize_nulls_map(&self, _sink: &mut BytesMut, _from: usize, _to: usize) -> Result<(), CodecError> {
        Ok(())
    }

    fn serialize_payload(&self, sink: &mut BytesMut, from: usize, to: usize) -> Result<(), CodecError> {
        let nullable = self.core.descr.is_nullable();
        let null_addon: u64 = nullable as u64;

        // One scan builds the insertion-ordered dictionary and the key list;
        // the key width cannot be known before the scan completes.
        let mut dictionary: HashMap<Vec<u8>, u64> = HashMap::new();
        let mut dictionary_values: Vec<Value> = Vec::new();
        let mut keys: Vec<u64> = Vec::with_capacity(to - from);
        for row in from..to {
            let val = self.core.value_at(row)?;
            if val.is_null() {
                if !nullable {
                    return Err(CodecError::IllegalNull {
                        column: self.core.descr.name().to_string(),
                        row,
                    });
                }
                keys.push(0);
                continue;
            }
            let next_key = dictionary.len() as u64 + null_addon;
            let key = *dictionary
                .entry(value_fingerprint(val))
                .or_insert_with(|| {
                    dictionary_values.push(val.clone());
                    next_key
                });
            keys.push(key);
        }

        let dict_size = dictionary_values.len() as u64 + null_addon;
        // An empty row range emits nothing beyond the prefix.
        if dict_size == 0 {
            return Ok(());
        }

        let code = key_width_code(dict_size);
        sink.put_u64_le(SERIALIZATION_TYPE | code);
        sink.put_u64_le(dict_size);

        let mut dictionary_rows: Vec<Row> = Vec::with_capacity(dict_size as usize);
        if nullable {
            dictionary_rows.push(vec![self.index_codec.null_value()]);
        }
        dictionary_rows.extend(dictionary_values.into_iter().map(|v| vec![v]));
        let n_dict_rows = dictionary_rows.len();
        self.index_codec
            .writer(dictionary_rows, 0)
            .serialize_data(sink, 0, n_dict_rows)?;

        sink.put_u64_le(keys.len() as u64);
        let key_rows: Vec<Row> = keys.into_iter().map(|k| vec![Value::UInt64(k)]).collect();
        let n_key_rows = key_rows.len();
        key_codec(code)?
            .writer(key_rows, 0)
            .serialize_data(sink, 0, n_key_rows)
    }

    fn serialize_element(&self, _sink: &mut BytesMut, _val: &Value, _row: usize) -> Result<(), CodecError> {
        // Never reached: serialize_payload handles whole rows.
        Ok(())
    }

    fn serialize_null(&self, _sink: &mut BytesMut) -> Result<(), CodecError> {
        Ok(())
    }
}

//==================================================================================
// III. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn codec_for(spec: &str, config: &CodecConfig) -> Arc<dyn ColumnCodec> {
        let descr = registry::descriptor_for(spec, "tag").unwrap();
        registry::codec_for(&descr, config).unwrap()
    }

    fn roundtrip(codec: &Arc<dyn ColumnCodec>, rows: Vec<Row>) -> (BytesMut, Box<dyn ColumnReader>) {
        let n_rows = rows.len();
        let mut sink = BytesMut::new();
        codec.writer(rows, 0).serialize(&mut sink, 0, n_rows).unwrap();
        let mut reader = codec.reader(n_rows);
        let mut src = ByteSource::new();
        src.feed(&sink);
        assert_eq!(reader.read_column(&mut src).unwrap(), DecodeProgress::Complete);
        assert_eq!(src.readable_bytes(), 0);
        (sink, reader)
    }

    #[test]
    fn test_dictionary_deduplicates_and_preserves_order() {
        let codec = codec_for("LowCardinality(String)", &CodecConfig::default());
        let rows: Vec<Row> = ["a", "b", "a", "c", "b", "a"]
            .iter()
            .map(|s| vec![Value::from(*s)])
            .collect();
        let (sink, reader) = roundtrip(&codec, rows);

        // version + flags + dict size + 3 entries of (1 len byte + 1 byte)
        // + key count + 6 single-byte keys.
        assert_eq!(sink.len(), 8 + 8 + 8 + 6 + 8 + 6);
        // Flags word: additional-keys | update-dictionary | width code 0.
        assert_eq!(
            u64::from_le_bytes(sink[8..16].try_into().unwrap()),
            (1 << 9) | (1 << 10)
        );
        assert_eq!(u64::from_le_bytes(sink[16..24].try_into().unwrap()), 3);

        let expect = ["a", "b", "a", "c", "b", "a"];
        for (row, want) in expect.iter().enumerate() {
            assert_eq!(
                reader.element(row, ValueRepr::Native).unwrap(),
                Value::Bytes(want.as_bytes().to_vec()),
                "row {}",
                row
            );
        }
    }

    #[test]
    fn test_nullable_reserves_key_zero() {
        let codec = codec_for("LowCardinality(Nullable(String))", &CodecConfig::default());
        let rows: Vec<Row> = vec![
            vec![Value::from("x")],
            vec![Value::Null],
            vec![Value::from("x")],
        ];
        let (sink, reader) = roundtrip(&codec, rows);
        // Dictionary size includes the null sentinel slot.
        assert_eq!(u64::from_le_bytes(sink[16..24].try_into().unwrap()), 2);

        assert_eq!(
            reader.element(0, ValueRepr::Nullable).unwrap(),
            Value::Bytes(b"x".to_vec())
        );
        assert_eq!(reader.element(1, ValueRepr::Nullable).unwrap(), Value::Null);
        // Native representation substitutes the element null representative.
        assert_eq!(
            reader.element(1, ValueRepr::Native).unwrap(),
            Value::Bytes(vec![])
        );
    }

    #[test]
    fn test_key_width_follows_dictionary_size() {
        assert_eq!(key_width_code(1), 0);
        assert_eq!(key_width_code(256), 0);
        assert_eq!(key_width_code(257), 1);
        assert_eq!(key_width_code(1 << 16), 1);
        assert_eq!(key_width_code((1 << 16) + 1), 2);
        assert_eq!(key_width_code(1 << 32), 2);
        assert_eq!(key_width_code((1u64 << 32) + 1), 3);
    }

    #[test]
    fn test_wide_dictionary_uses_two_byte_keys() {
        let codec = codec_for("LowCardinality(UInt32)", &CodecConfig::default());
        let rows: Vec<Row> = (0..300u32).map(|v| vec![Value::UInt32(v)]).collect();
        let (sink, reader) = roundtrip(&codec, rows);
        let flags = u64::from_le_bytes(sink[8..16].try_into().unwrap());
        assert_eq!(flags & 0xF, 1, "300 distinct values need 2-byte keys");
        assert_eq!(
            reader.element(299, ValueRepr::Native).unwrap(),
            Value::UInt32(299)
        );
    }

    #[test]
    fn test_unsupported_serialization_version_fails_before_consuming_more() {
        let codec = codec_for("LowCardinality(String)", &CodecConfig::default());
        let mut reader = codec.reader(1);
        let mut src = ByteSource::new();
        src.feed(&2u64.to_le_bytes());
        src.feed(&[0xAA; 24]);
        let err = reader.read_column(&mut src).unwrap_err();
        assert!(err.to_string().contains("serialization version"));
        // Only the version word itself was consumed.
        assert_eq!(src.readable_bytes(), 24);
    }

    #[test]
    fn test_unknown_key_width_code_fails() {
        let codec = codec_for("LowCardinality(String)", &CodecConfig::default());
        let mut reader = codec.reader(1);
        let mut src = ByteSource::new();
        src.feed(&1u64.to_le_bytes()); // version
        src.feed(&0x0Fu64.to_le_bytes()); // flags with width code 15
        src.feed(&1u64.to_le_bytes()); // dictionary size
        let err = reader.read_column(&mut src).unwrap_err();
        assert!(err.to_string().contains("key width code"));
    }

    #[test]
    fn test_dictionary_strings_can_be_cached() {
        let config = CodecConfig {
            cache_dictionary_strings: true,
            ..CodecConfig::default()
        };
        let codec = codec_for("LowCardinality(String)", &config);
        let rows: Vec<Row> = vec![vec![Value::from("hot")], vec![Value::from("hot")]];
        let (_, reader) = roundtrip(&codec, rows);
        assert_eq!(
            reader.element(1, ValueRepr::Native).unwrap(),
            Value::String("hot".to_string())
        );
    }
}
