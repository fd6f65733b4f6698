//! `String` and `FixedString(n)` column codecs.
//!
//! Plain strings are the one variable-width payload on the wire: each row is
//! a LEB128 length prefix followed by that many raw bytes. The reader decodes
//! row by row and must therefore remember an in-progress length across calls —
//! once a length prefix has been consumed it is never re-read, so a payload
//! split across network chunks resumes exactly where it stopped.
//!
//! Both codecs can optionally materialize decoded `String`s once the column
//! completes; the registry enables that for low-cardinality dictionary
//! columns, where each entry is surfaced for many rows.

use bytes::{BufMut, Bytes, BytesMut};

use crate::columns::{
    ColumnCodec, ColumnReader, ColumnWriter, ReaderBase, Row, WriterCore,
};
use crate::error::CodecError;
use crate::types::ColumnDescriptor;
use crate::value::{Value, ValueRepr};
use crate::wire::{varint, ByteSource};

/// Hard bound on a single string payload, mirroring the maximum addressable
/// element count elsewhere in the protocol.
const MAX_STRING_BYTES: u64 = i32::MAX as u64;

//==================================================================================
// I. Variable-width String
//==================================================================================

pub(crate) struct StringCodec {
    descr: ColumnDescriptor,
    cache_strings: bool,
}

impl StringCodec {
    pub(crate) fn new(descr: ColumnDescriptor, cache_strings: bool) -> Self {
        StringCodec {
            descr,
            cache_strings,
        }
    }
}

impl ColumnCodec for StringCodec {
    fn descriptor(&self) -> &ColumnDescriptor {
        &self.descr
    }

    fn reader(&self, n_rows: usize) -> Box<dyn ColumnReader> {
        Box::new(StringReader {
            base: ReaderBase::new(self.descr.clone(), n_rows),
            items: Vec::with_capacity(n_rows),
            pending_len: None,
            cache: if self.cache_strings { Some(Vec::new()) } else { None },
        })
    }

    fn writer(&self, rows: Vec<Row>, column_index: usize) -> Box<dyn ColumnWriter> {
        Box::new(StringWriter {
            core: WriterCore::new(self.descr.clone(), rows, column_index),
        })
    }

    fn null_value(&self) -> Value {
        Value::Bytes(Vec::new())
    }
}

struct StringReader {
    base: ReaderBase,
    items: Vec<Bytes>,
    /// A length prefix whose payload was not yet available. Kept across calls
    /// so the prefix is consumed exactly once.
    pending_len: Option<u64>,
    /// Populated by the completion hook when caching is on.
    cache: Option<Vec<Value>>,
}

impl ColumnReader for StringReader {
    fn base(&self) -> &ReaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ReaderBase {
        &mut self.base
    }

    fn read_items(&mut self, src: &mut ByteSource) -> Result<bool, CodecError> {
        while self.items.len() < self.base.n_rows {
            let len = match self.pending_len.take() {
                Some(len) => len,
                None => match varint::try_read(src)? {
                    Some(len) => len,
                    None => return Ok(false),
                },
            };
            if len > MAX_STRING_BYTES {
                return Err(CodecError::size_too_big("string length", len, MAX_STRING_BYTES));
            }
            match src.try_read_bytes(len as usize) {
                Some(payload) => self.items.push(payload),
                None => {
                    self.pending_len = Some(len);
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn post_process(&mut self) -> Result<(), CodecError> {
        if let Some(cache) = self.cache.as_mut() {
            cache.reserve_exact(self.items.len());
            for payload in &self.items {
                cache.push(Value::String(String::from_utf8_lossy(payload).into_owned()));
            }
        }
        Ok(())
    }

    fn null_value(&self) -> Value {
        Value::Bytes(Vec::new())
    }

    fn element_internal(&self, row: usize, _repr: ValueRepr) -> Result<Value, CodecError> {
        if let Some(cache) = self.cache.as_ref() {
            return Ok(cache[row].clone());
        }
        Ok(Value::Bytes(self.items[row].to_vec()))
    }
}

struct StringWriter {
    core: WriterCore,
}

impl ColumnWriter for StringWriter {
    fn core(&self) -> &WriterCore {
        &self.core
    }

    fn serialize_element(&self, sink: &mut BytesMut, val: &Value, row: usize) -> Result<(), CodecError> {
        let payload = val
            .as_bytes()
            .ok_or_else(|| self.core.illegal_value(row, format!("expected a string, got {:?}", val)))?;
        varint::write(payload.len() as u64, sink);
        sink.put_slice(payload);
        Ok(())
    }

    fn serialize_null(&self, sink: &mut BytesMut) -> Result<(), CodecError> {
        varint::write(0u64, sink);
        Ok(())
    }
}

//==================================================================================
// II. FixedString(n)
//==================================================================================

pub(crate) struct FixedStringCodec {
    descr: ColumnDescriptor,
    width: usize,
    cache_strings: bool,
}

impl FixedStringCodec {
    pub(crate) fn new(descr: ColumnDescriptor, width: usize, cache_strings: bool) -> Self {
        FixedStringCodec {
            descr,
            width,
            cache_strings,
        }
    }
}

impl ColumnCodec for FixedStringCodec {
    fn descriptor(&self) -> &ColumnDescriptor {
        &self.descr
    }

    fn reader(&self, n_rows: usize) -> Box<dyn ColumnReader> {
        Box::new(FixedStringReader {
            base: ReaderBase::new(self.descr.clone(), n_rows),
            width: self.width,
            items: Vec::new(),
            cache: if self.cache_strings { Some(Vec::new()) } else { None },
        })
    }

    fn writer(&self, rows: Vec<Row>, column_index: usize) -> Box<dyn ColumnWriter> {
        Box::new(FixedStringWriter {
            core: WriterCore::new(self.descr.clone(), rows, column_index),
            width: self.width,
        })
    }

    fn null_value(&self) -> Value {
        Value::Bytes(Vec::new())
    }
}

struct FixedStringReader {
    base: ReaderBase,
    width: usize,
    items: Vec<Bytes>,
    cache: Option<Vec<Value>>,
}

impl ColumnReader for FixedStringReader {
    fn base(&self) -> &ReaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ReaderBase {
        &mut self.base
    }

    fn read_items(&mut self, src: &mut ByteSource) -> Result<bool, CodecError> {
        let total = self.width * self.base.n_rows;
        let payload = match src.try_read_bytes(total) {
            Some(bytes) => bytes,
            None => return Ok(false),
        };
        self.items.reserve_exact(self.base.n_rows);
        for row in 0..self.base.n_rows {
            self.items.push(payload.slice(row * self.width..(row + 1) * self.width));
        }
        Ok(true)
    }

    fn post_process(&mut self) -> Result<(), CodecError> {
        if let Some(cache) = self.cache.as_mut() {
            cache.reserve_exact(self.items.len());
            for payload in &self.items {
                cache.push(Value::String(String::from_utf8_lossy(payload).into_owned()));
            }
        }
        Ok(())
    }

    fn null_value(&self) -> Value {
        Value::Bytes(Vec::new())
    }

    fn element_internal(&self, row: usize, _repr: ValueRepr) -> Result<Value, CodecError> {
        if let Some(cache) = self.cache.as_ref() {
            return Ok(cache[row].clone());
        }
        Ok(Value::Bytes(self.items[row].to_vec()))
    }
}

struct FixedStringWriter {
    core: WriterCore,
    width: usize,
}

impl ColumnWriter for FixedStringWriter {
    fn core(&self) -> &WriterCore {
        &self.core
    }

    fn serialize_element(&self, sink: &mut BytesMut, val: &Value, row: usize) -> Result<(), CodecError> {
        let payload = val
            .as_bytes()
            .ok_or_else(|| self.core.illegal_value(row, format!("expected a string, got {:?}", val)))?;
        if payload.len() > self.width {
            return Err(self.core.illegal_value(
                row,
                format!(
                    "payload of {} bytes exceeds FixedString width {}",
                    payload.len(),
                    self.width
                ),
            ));
        }
        sink.put_slice(payload);
        // Short payloads are zero-padded to the declared width.
        sink.put_bytes(0, self.width - payload.len());
        Ok(())
    }

    fn serialize_null(&self, sink: &mut BytesMut) -> Result<(), CodecError> {
        sink.put_bytes(0, self.width);
        Ok(())
    }
}
