//! `Array(...)` column codec — recursive N-dimensional arrays over any
//! element codec.
//!
//! On the wire an array column of depth D is: the element type's prefix (if
//! any), then D offsets tables of cumulative 64-bit counts (one table per
//! dimension, outer to inner), then the flattened element column. The reader
//! turns the offsets tables into per-row slice boundaries — relative within
//! the row for outer dimensions, absolute into the flattened payload for the
//! innermost — and reslices them back into nested values on access. The
//! writer runs the same arithmetic in reverse: offsets are computed from the
//! nested row data, never parsed.

use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use log::debug;

use crate::columns::{
    ColumnCodec, ColumnReader, ColumnWriter, DecodeProgress, ReaderBase, Row, WriterCore,
};
use crate::error::CodecError;
use crate::types::ColumnDescriptor;
use crate::value::{Value, ValueRepr};
use crate::wire::ByteSource;

/// Largest per-dimension element count the client accepts.
const MAX_ARRAY_ELEMENTS: u64 = i32::MAX as u64;

pub(crate) struct ArrayCodec {
    descr: ColumnDescriptor,
    element: Arc<dyn ColumnCodec>,
}

impl ArrayCodec {
    pub(crate) fn new(descr: ColumnDescriptor, element: Arc<dyn ColumnCodec>) -> Self {
        ArrayCodec { descr, element }
    }
}

impl ColumnCodec for ArrayCodec {
    fn descriptor(&self) -> &ColumnDescriptor {
        &self.descr
    }

    fn reader(&self, n_rows: usize) -> Box<dyn ColumnReader> {
        Box::new(ArrayReader {
            base: ReaderBase::new(self.descr.clone(), n_rows),
            element: Arc::clone(&self.element),
            element_prefix: None,
            per_row_slices: Vec::new(),
            cur_dimension: 0,
            cur_level_count: 0,
            n_items: None,
            nested: None,
        })
    }

    fn writer(&self, rows: Vec<Row>, column_index: usize) -> Box<dyn ColumnWriter> {
        Box::new(ArrayWriter {
            core: WriterCore::new(self.descr.clone(), rows, column_index),
            element: Arc::clone(&self.element),
        })
    }

    fn null_value(&self) -> Value {
        // Arrays are not nullable on the wire; an empty array stands in.
        self.empty_array()
    }
}

//==================================================================================
// I. Reader
//==================================================================================

struct ArrayReader {
    base: ReaderBase,
    element: Arc<dyn ColumnCodec>,
    /// Element-type prefix consumed before the offsets tables (the
    /// low-cardinality serialization version, when the element needs one).
    element_prefix: Option<u64>,
    /// `per_row_slices[row][dim]` holds the slice boundaries for `row` at
    /// `dim`: outer dimensions relative to the row start, the innermost
    /// absolute into the flattened element payload.
    per_row_slices: Vec<Vec<Vec<u64>>>,
    cur_dimension: usize,
    /// Offsets expected in the current dimension's table (one per slice of
    /// the previous dimension).
    cur_level_count: usize,
    /// Flattened element count, known once all offsets tables are read.
    n_items: Option<usize>,
    nested: Option<Box<dyn ColumnReader>>,
}

impl ArrayReader {
    fn slices_done(&self) -> bool {
        self.n_items.is_some()
    }

    /// Whether the element column carries bytes even with zero elements. A
    /// nullable low-cardinality element always serializes its dictionary
    /// scaffolding (the null sentinel makes the dictionary non-empty), so the
    /// reader must consume it; every other element type writes nothing.
    fn needs_nested_when_empty(&self) -> bool {
        let elem = self.element.descriptor();
        elem.is_low_cardinality() && elem.is_nullable()
    }

    /// Decodes offsets tables dimension by dimension. Each dimension's table
    /// is read atomically: all `cur_level_count` 64-bit offsets must be
    /// available before any of them is consumed.
    fn read_slices(&mut self, src: &mut ByteSource) -> Result<(), CodecError> {
        let dims = self.base.descr.array_dims();
        let n_rows = self.base.n_rows;

        if n_rows == 0 {
            // A zero-row batch carries no offsets at all; short-circuit
            // without touching further dimension bytes.
            self.cur_dimension = dims;
            self.n_items = Some(0);
            return Ok(());
        }
        if self.per_row_slices.is_empty() {
            self.per_row_slices = vec![Vec::with_capacity(dims); n_rows];
            self.cur_level_count = n_rows;
        }

        while self.cur_dimension < dims {
            if src.readable_bytes() < self.cur_level_count * 8 {
                return Ok(());
            }
            let last_dimension = self.cur_dimension == dims - 1;
            let mut prev_offset: u64 = 0;
            for row in 0..n_rows {
                let slices_to_read = if self.cur_dimension == 0 {
                    1
                } else {
                    let prev = &self.per_row_slices[row][self.cur_dimension - 1];
                    (prev[prev.len() - 1] - prev[0]) as usize
                };
                let first = prev_offset;
                // Offsets at the last dimension stay absolute; outer
                // dimensions are rebased to the row start.
                let rebase = if last_dimension { 0 } else { first };
                let mut bounds = Vec::with_capacity(slices_to_read + 1);
                bounds.push(first - rebase);
                for _ in 0..slices_to_read {
                    let offset = src.read_u64_le();
                    if offset > MAX_ARRAY_ELEMENTS {
                        return Err(CodecError::size_too_big(
                            "nested size",
                            offset,
                            MAX_ARRAY_ELEMENTS,
                        ));
                    }
                    if offset < prev_offset {
                        return Err(CodecError::MalformedPayload(format!(
                            "array offsets must be non-decreasing (got {} after {})",
                            offset, prev_offset
                        )));
                    }
                    prev_offset = offset;
                    bounds.push(offset - rebase);
                }
                self.per_row_slices[row].push(bounds);
            }
            self.cur_dimension += 1;
            self.cur_level_count = prev_offset as usize;
            debug!(
                "column '{}': array dimension {}/{} read, next level holds {} slices",
                self.base.descr.name(),
                self.cur_dimension,
                dims,
                self.cur_level_count
            );
        }
        self.n_items = Some(self.cur_level_count);
        Ok(())
    }
}

impl ColumnReader for ArrayReader {
    fn base(&self) -> &ReaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ReaderBase {
        &mut self.base
    }

    fn read_prefix(&mut self, src: &mut ByteSource) -> Result<bool, CodecError> {
        // The element type's prefix appears once, before the first offsets
        // table. Only low-cardinality elements have one.
        if !self.element.descriptor().is_low_cardinality() {
            return Ok(true);
        }
        if src.readable_bytes() < 8 {
            return Ok(false);
        }
        let version = src.read_u64_le();
        if version != crate::columns::low_cardinality::SUPPORTED_SERIALIZATION_VERSION {
            return Err(CodecError::MalformedPayload(format!(
                "unsupported low-cardinality serialization version {}",
                version
            )));
        }
        self.element_prefix = Some(version);
        Ok(true)
    }

    fn read_items(&mut self, src: &mut ByteSource) -> Result<bool, CodecError> {
        if !self.slices_done() {
            self.read_slices(src)?;
            if !self.slices_done() {
                return Ok(false);
            }
        }
        let n_items = self.n_items.unwrap_or(0);
        if n_items == 0 && !self.needs_nested_when_empty() {
            // No elements anywhere; reslicing alone reconstructs the rows.
            return Ok(true);
        }
        if self.nested.is_none() {
            let mut nested = self.element.reader(n_items);
            nested.mark_prefix_consumed(self.element_prefix)?;
            self.nested = Some(nested);
        }
        let nested = match self.nested.as_mut() {
            Some(nested) => nested,
            None => return Ok(false),
        };
        Ok(nested.read_column(src)? == DecodeProgress::Complete)
    }

    fn is_partial(&self) -> bool {
        if !self.slices_done() {
            return true;
        }
        match self.n_items {
            Some(0) if !self.needs_nested_when_empty() => false,
            _ => match self.nested.as_ref() {
                Some(nested) => nested.is_partial(),
                None => true,
            },
        }
    }

    fn null_value(&self) -> Value {
        Value::Array(Vec::new())
    }

    fn element_internal(&self, row: usize, repr: ValueRepr) -> Result<Value, CodecError> {
        let row_slices = self.per_row_slices.get(row).ok_or_else(|| {
            CodecError::InternalError(format!("array row {} has no slice data", row))
        })?;

        // Innermost dimension: copy element ranges out of the flattened
        // payload so each row owns independent nested arrays.
        let innermost = &row_slices[row_slices.len() - 1];
        let mut level: Vec<Value> = Vec::with_capacity(innermost.len() - 1);
        for window in innermost.windows(2) {
            let (start, end) = (window[0] as usize, window[1] as usize);
            let mut items = Vec::with_capacity(end - start);
            if end > start {
                let nested = self.nested.as_ref().ok_or_else(|| {
                    CodecError::InternalError("array elements accessed before decode".to_string())
                })?;
                for idx in start..end {
                    items.push(nested.element(idx, repr)?);
                }
            }
            level.push(Value::Array(items));
        }

        // Outer dimensions regroup the level below using the relative bounds.
        for dim in (0..row_slices.len() - 1).rev() {
            let bounds = &row_slices[dim];
            let mut regrouped = Vec::with_capacity(bounds.len() - 1);
            for window in bounds.windows(2) {
                let (start, end) = (window[0] as usize, window[1] as usize);
                regrouped.push(Value::Array(level[start..end].to_vec()));
            }
            level = regrouped;
        }

        // Dimension 0 always has exactly one slice per row.
        level.pop().ok_or_else(|| {
            CodecError::InternalError(format!("array row {} resliced to nothing", row))
        })
    }
}

//==================================================================================
// II. Writer
//==================================================================================

struct ArrayWriter {
    core: WriterCore,
    element: Arc<dyn ColumnCodec>,
}

impl ArrayWriter {
    /// Computes the per-dimension cumulative offsets and the fully flattened
    /// element rows in one bottom-up pass over `[from, to)`.
    fn flatten(&self, from: usize, to: usize) -> Result<(Vec<Vec<u64>>, Vec<Row>), CodecError> {
        let dims = self.core.descr.array_dims();
        let mut sizes_per_dim: Vec<Vec<u64>> = Vec::with_capacity(dims);

        let mut level: Vec<&Value> = Vec::with_capacity(to - from);
        for row in from..to {
            level.push(self.core.value_at(row)?);
        }

        for _ in 0..dims {
            let mut offsets = Vec::with_capacity(level.len());
            let mut next: Vec<&Value> = Vec::new();
            let mut offset: u64 = 0;
            for (pos, val) in level.iter().enumerate() {
                let items = val.as_array().ok_or_else(|| {
                    self.core
                        .illegal_value(pos, format!("expected an array, got {:?}", val))
                })?;
                offset += items.len() as u64;
                offsets.push(offset);
                next.extend(items.iter());
            }
            sizes_per_dim.push(offsets);
            level = next;
        }

        let flattened: Vec<Row> = level.into_iter().map(|v| vec![v.clone()]).collect();
        Ok((sizes_per_dim, flattened))
    }
}

impl ColumnWriter for ArrayWriter {
    fn core(&self) -> &WriterCore {
        &self.core
    }

    fn serialize_prefix(&self, sink: &mut BytesMut, from: usize, to: usize) -> Result<(), CodecError> {
        self.element
            .writer(Vec::new(), 0)
            .serialize_prefix(sink, from, to)
    }

    fn serialize_payload(&self, sink: &mut BytesMut, from: usize, to: usize) -> Result<(), CodecError> {
        let (sizes_per_dim, flattened) = self.flatten(from, to)?;
        for offsets in &sizes_per_dim {
            for offset in offsets {
                sink.put_u64_le(*offset);
            }
        }
        let n_elements = flattened.len();
        self.element
            .writer(flattened, 0)
            .serialize_data(sink, 0, n_elements)
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
    use crate::config::CodecConfig;
    use crate::registry;

    fn codec_for(spec: &str) -> Arc<dyn ColumnCodec> {
        let descr = registry::descriptor_for(spec, "arr").unwrap();
        registry::codec_for(&descr, &CodecConfig::default()).unwrap()
    }

    fn decode_rows(codec: &Arc<dyn ColumnCodec>, wire: &[u8], n_rows: usize) -> Vec<Value> {
        let mut reader = codec.reader(n_rows);
        let mut src = ByteSource::new();
        src.feed(wire);
        assert_eq!(reader.read_column(&mut src).unwrap(), DecodeProgress::Complete);
        assert_eq!(src.readable_bytes(), 0, "decoder left trailing bytes");
        (0..n_rows)
            .map(|row| reader.element(row, ValueRepr::Nullable).unwrap())
            .collect()
    }

    fn arr(items: Vec<Value>) -> Value {
        Value::Array(items)
    }

    #[test]
    fn test_one_dimensional_roundtrip() {
        let codec = codec_for("Array(UInt32)");
        let rows = vec![
            vec![arr(vec![Value::UInt32(1), Value::UInt32(2)])],
            vec![arr(vec![])],
            vec![arr(vec![Value::UInt32(3)])],
        ];
        let mut sink = BytesMut::new();
        codec.writer(rows.clone(), 0).serialize(&mut sink, 0, 3).unwrap();
        // 3 offsets (2, 2, 3) then 3 values.
        assert_eq!(sink.len(), 3 * 8 + 3 * 4);

        let decoded = decode_rows(&codec, &sink, 3);
        assert_eq!(decoded[0], rows[0][0]);
        assert_eq!(decoded[1], rows[1][0]);
        assert_eq!(decoded[2], rows[2][0]);
    }

    #[test]
    fn test_two_dimensional_reslice_shapes() {
        let codec = codec_for("Array(Array(UInt8))");
        // [[1,2],[3]] and [[4],[5,6]]
        let row0 = arr(vec![
            arr(vec![Value::UInt8(1), Value::UInt8(2)]),
            arr(vec![Value::UInt8(3)]),
        ]);
        let row1 = arr(vec![
            arr(vec![Value::UInt8(4)]),
            arr(vec![Value::UInt8(5), Value::UInt8(6)]),
        ]);
        let rows = vec![vec![row0.clone()], vec![row1.clone()]];
        let mut sink = BytesMut::new();
        codec.writer(rows, 0).serialize(&mut sink, 0, 2).unwrap();
        // Dim 0 offsets: 2, 4. Dim 1 offsets: 2, 3, 4, 6. Then 6 bytes.
        assert_eq!(sink.len(), 2 * 8 + 4 * 8 + 6);

        let decoded = decode_rows(&codec, &sink, 2);
        assert_eq!(decoded[0], row0);
        assert_eq!(decoded[1], row1);
    }

    #[test]
    fn test_decoded_rows_do_not_alias() {
        let codec = codec_for("Array(UInt8)");
        let rows = vec![
            vec![arr(vec![Value::UInt8(9)])],
            vec![arr(vec![Value::UInt8(9)])],
        ];
        let mut sink = BytesMut::new();
        codec.writer(rows, 0).serialize(&mut sink, 0, 2).unwrap();

        let mut reader = codec.reader(2);
        let mut src = ByteSource::new();
        src.feed(&sink);
        reader.read_column(&mut src).unwrap();
        let mut first = reader.element(0, ValueRepr::Native).unwrap();
        if let Value::Array(items) = &mut first {
            items.push(Value::UInt8(42));
        }
        // The second row is unaffected by mutating the first extraction.
        assert_eq!(
            reader.element(1, ValueRepr::Native).unwrap(),
            arr(vec![Value::UInt8(9)])
        );
    }

    #[test]
    fn test_nullable_elements() {
        let codec = codec_for("Array(Nullable(UInt16))");
        let rows = vec![vec![arr(vec![Value::UInt16(7), Value::Null, Value::UInt16(8)])]];
        let mut sink = BytesMut::new();
        codec.writer(rows, 0).serialize(&mut sink, 0, 1).unwrap();
        // 1 offset + 3 null flags + 3 values.
        assert_eq!(sink.len(), 8 + 3 + 6);

        let decoded = decode_rows(&codec, &sink, 1);
        assert_eq!(
            decoded[0],
            arr(vec![Value::UInt16(7), Value::Null, Value::UInt16(8)])
        );
    }

    #[test]
    fn test_oversized_nested_count_fails_fast() {
        let codec = codec_for("Array(UInt8)");
        let mut reader = codec.reader(1);
        let mut src = ByteSource::new();
        src.feed(&(u32::MAX as u64 + 10).to_le_bytes());
        let err = reader.read_column(&mut src).unwrap_err();
        assert!(err.to_string().contains("too big"));
    }

    #[test]
    fn test_zero_row_batch_consumes_nothing() {
        let codec = codec_for("Array(UInt32)");
        let mut reader = codec.reader(0);
        let mut src = ByteSource::new();
        src.feed(&[0xAB; 16]); // bytes belonging to whatever comes next
        assert_eq!(reader.read_column(&mut src).unwrap(), DecodeProgress::Complete);
        assert_eq!(src.readable_bytes(), 16);
    }
}
