//! The abstract column codec protocol: the [`ColumnCodec`] factory trait, the
//! resumable [`ColumnReader`] state machine, and the single-pass
//! [`ColumnWriter`].
//!
//! The reader is the hard part of this crate. A column decode may be invoked
//! many times against a buffer that does not yet hold a complete column, so
//! every phase is gated on "enough bytes available, else report
//! [`DecodeProgress::NeedMoreData`] and touch nothing". Phase results are
//! monotonic: once the prefix, the null bitmap, or the items buffer has been
//! read it is never re-read, which makes repeated calls idempotent.

use bitvec::vec::BitVec;
use bytes::{BufMut, BytesMut};

use crate::error::CodecError;
use crate::types::ColumnDescriptor;
use crate::value::{Value, ValueRepr};
use crate::wire::ByteSource;

pub mod array;
pub mod date;
pub mod decimal;
pub mod enums;
pub mod fixed;
pub mod interval;
pub mod ip;
pub mod low_cardinality;
pub mod numeric;
pub mod string;
pub mod uuid;


/// One logical row handed to a writer: one `Value` per column.
pub type Row = Vec<Value>;

/// Outcome of driving a reader against the currently buffered bytes.
///
/// `NeedMoreData` is not an error: nothing was lost, and the caller is
/// expected to feed more bytes and re-invoke the same call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeProgress {
    Complete,
    NeedMoreData,
}

//==================================================================================
// I. Codec factory
//==================================================================================

/// Factory for one column type: produces readers and writers and supplies the
/// type's null representative and empty-array singleton. Compound types
/// (array-of-X, low-cardinality-of-X) wrap another codec rather than
/// duplicating scalar logic.
pub trait ColumnCodec: Send + Sync {
    fn descriptor(&self) -> &ColumnDescriptor;

    /// A fresh reader sized to `n_rows` logical rows.
    fn reader(&self, n_rows: usize) -> Box<dyn ColumnReader>;

    /// A writer over `rows`, extracting the value at `column_index` per row.
    fn writer(&self, rows: Vec<Row>, column_index: usize) -> Box<dyn ColumnWriter>;

    /// The value substituted for SQL NULL when the caller requests a
    /// non-nullable (native) representation.
    fn null_value(&self) -> Value;

    /// The empty-array singleton for this element type.
    fn empty_array(&self) -> Value {
        Value::Array(Vec::new())
    }
}

//==================================================================================
// II. Reader
//==================================================================================

/// Decode state shared by every reader: the fixed row count plus the
/// monotonic per-phase results.
#[derive(Debug)]
pub struct ReaderBase {
    pub(crate) descr: ColumnDescriptor,
    pub(crate) n_rows: usize,
    pub(crate) prefix_done: bool,
    /// One bit per row, `true` = NULL. Absent until read in full.
    pub(crate) nulls: Option<BitVec>,
    pub(crate) items_done: bool,
}

impl ReaderBase {
    pub(crate) fn new(descr: ColumnDescriptor, n_rows: usize) -> Self {
        ReaderBase {
            descr,
            n_rows,
            prefix_done: false,
            nulls: None,
            items_done: false,
        }
    }

    pub(crate) fn is_null(&self, row: usize) -> bool {
        self.nulls.as_ref().map(|bits| bits[row]).unwrap_or(false)
    }
}

/// Attempts to read a null bitmap of `n_rows` bytes as one atomic unit.
/// No partial bitmap is ever accepted; either all `n_rows` flag bytes are
/// available or nothing is consumed.
pub(crate) fn try_read_nulls_map(src: &mut ByteSource, n_rows: usize) -> Option<BitVec> {
    let bytes = src.try_read_bytes(n_rows)?;
    let mut bits = BitVec::with_capacity(n_rows);
    for flag in bytes.iter() {
        bits.push(*flag != 0);
    }
    Some(bits)
}

/// The resumable column decode state machine.
///
/// Implementations provide the type-specific phases; [`ColumnReader::read_column`]
/// drives them in wire order (prefix, null bitmap, items, completion hook) and
/// is the only entry point callers need.
pub trait ColumnReader {
    fn base(&self) -> &ReaderBase;
    fn base_mut(&mut self) -> &mut ReaderBase;

    /// Reads the type-specific header, returning `true` once it is complete.
    /// Most types have no prefix; the low-cardinality serialization version is
    /// the notable exception.
    fn read_prefix(&mut self, _src: &mut ByteSource) -> Result<bool, CodecError> {
        Ok(true)
    }

    /// Marks the prefix as already consumed by an enclosing reader (an array
    /// column reads its element type's prefix before the offsets tables) and
    /// hands over the consumed value, if any.
    fn mark_prefix_consumed(&mut self, _prefix: Option<u64>) -> Result<(), CodecError> {
        self.base_mut().prefix_done = true;
        Ok(())
    }

    /// Whether a per-row null bitmap precedes this column's payload on the
    /// wire. Low-cardinality columns encode nullability in key 0 instead.
    fn has_nulls_map(&self) -> bool {
        self.base().descr.is_nullable()
    }

    /// Reads the bulk payload, returning `true` once it is complete. Called
    /// repeatedly; implementations must pick up exactly where they stopped.
    fn read_items(&mut self, src: &mut ByteSource) -> Result<bool, CodecError>;

    /// Whether any required sub-state is still missing. Recursive for
    /// compound readers (arrays, low-cardinality).
    fn is_partial(&self) -> bool {
        !self.base().items_done
    }

    /// Optional post-processing once the items are fully read.
    fn post_process(&mut self) -> Result<(), CodecError> {
        Ok(())
    }

    /// The type's null representative (mirrors [`ColumnCodec::null_value`]).
    fn null_value(&self) -> Value;

    /// Type-specific element conversion; called only for non-NULL rows.
    fn element_internal(&self, row: usize, repr: ValueRepr) -> Result<Value, CodecError>;

    /// Extracts the decoded value for `row`. NULL rows yield the null
    /// representative ([`ValueRepr::Native`]) or [`Value::Null`]
    /// ([`ValueRepr::Nullable`]).
    fn element(&self, row: usize, repr: ValueRepr) -> Result<Value, CodecError> {
        if row >= self.base().n_rows {
            return Err(CodecError::InternalError(format!(
                "row {} out of range for column '{}' with {} rows",
                row,
                self.base().descr.name(),
                self.base().n_rows
            )));
        }
        if self.base().is_null(row) {
            return Ok(match repr {
                ValueRepr::Native => self.null_value(),
                ValueRepr::Nullable => Value::Null,
            });
        }
        self.element_internal(row, repr)
    }

    /// Advances the decode as far as the buffered bytes allow. Safe to call
    /// any number of times; returns `Complete` once (and forever after) the
    /// whole column has been decoded.
    fn read_column(&mut self, src: &mut ByteSource) -> Result<DecodeProgress, CodecError> {
        if !self.base().prefix_done {
            if !self.read_prefix(src)? {
                return Ok(DecodeProgress::NeedMoreData);
            }
            self.base_mut().prefix_done = true;
        }
        if self.has_nulls_map() && self.base().nulls.is_none() {
            let n_rows = self.base().n_rows;
            match try_read_nulls_map(src, n_rows) {
                Some(bits) => self.base_mut().nulls = Some(bits),
                None => return Ok(DecodeProgress::NeedMoreData),
            }
        }
        if self.is_partial() {
            if !self.read_items(src)? {
                return Ok(DecodeProgress::NeedMoreData);
            }
            self.base_mut().items_done = true;
            self.post_process()?;
        }
        Ok(DecodeProgress::Complete)
    }
}

//==================================================================================
// III. Writer
//==================================================================================

/// Encode state shared by every writer: the row data, the column index within
/// each row, and the descriptor. Immutable; one serialization pass consumes a
/// row range.
pub struct WriterCore {
    pub(crate) descr: ColumnDescriptor,
    pub(crate) rows: Vec<Row>,
    pub(crate) column_index: usize,
}

impl WriterCore {
    pub(crate) fn new(descr: ColumnDescriptor, rows: Vec<Row>, column_index: usize) -> Self {
        WriterCore {
            descr,
            rows,
            column_index,
        }
    }

    pub(crate) fn value_at(&self, row: usize) -> Result<&Value, CodecError> {
        self.rows
            .get(row)
            .and_then(|r| r.get(self.column_index))
            .ok_or_else(|| {
                CodecError::InternalError(format!(
                    "no value at row {} column index {} for column '{}'",
                    row,
                    self.column_index,
                    self.descr.name()
                ))
            })
    }

    /// Wraps a type-conversion failure with the offending column and row.
    pub(crate) fn illegal_value(&self, row: usize, reason: String) -> CodecError {
        CodecError::IllegalValue {
            column: self.descr.name().to_string(),
            row,
            reason,
        }
    }
}

/// The single-pass column encoder. Unlike the reader there is nothing
/// resumable here: all rows are available up front.
pub trait ColumnWriter {
    fn core(&self) -> &WriterCore;

    /// Writes the type-specific header. Most types have none.
    fn serialize_prefix(&self, _sink: &mut BytesMut, _from: usize, _to: usize) -> Result<(), CodecError> {
        Ok(())
    }

    /// Writes one flag byte per row (non-zero = NULL) for nullable columns.
    fn serialize_nulls_map(&self, sink: &mut BytesMut, from: usize, to: usize) -> Result<(), CodecError> {
        if !self.core().descr.is_nullable() {
            return Ok(());
        }
        for row in from..to {
            let flag = self.core().value_at(row)?.is_null();
            sink.put_u8(flag as u8);
        }
        Ok(())
    }

    /// Writes the row payload. The default walks the range delegating to
    /// [`ColumnWriter::serialize_element`] / [`ColumnWriter::serialize_null`];
    /// compound writers (arrays, low-cardinality) replace it wholesale.
    fn serialize_payload(&self, sink: &mut BytesMut, from: usize, to: usize) -> Result<(), CodecError> {
        for row in from..to {
            let val = self.core().value_at(row)?;
            if val.is_null() {
                if !self.core().descr.is_nullable() {
                    return Err(CodecError::IllegalNull {
                        column: self.core().descr.name().to_string(),
                        row,
                    });
                }
                self.serialize_null(sink)?;
            } else {
                self.serialize_element(sink, val, row)?;
            }
        }
        Ok(())
    }

    /// Encodes one non-NULL value.
    fn serialize_element(&self, sink: &mut BytesMut, val: &Value, row: usize) -> Result<(), CodecError>;

    /// Encodes the payload placeholder occupying a NULL row's slot.
    fn serialize_null(&self, sink: &mut BytesMut) -> Result<(), CodecError>;

    /// Null bitmap plus payload, without the prefix. This is the entry point
    /// compound writers use for their sub-columns.
    fn serialize_data(&self, sink: &mut BytesMut, from: usize, to: usize) -> Result<(), CodecError> {
        self.serialize_nulls_map(sink, from, to)?;
        self.serialize_payload(sink, from, to)
    }

    /// Serializes rows `[from, to)` of this column in wire order:
    /// prefix, null bitmap (if nullable), payload.
    fn serialize(&self, sink: &mut BytesMut, from: usize, to: usize) -> Result<(), CodecError> {
        self.serialize_prefix(sink, from, to)?;
        self.serialize_data(sink, from, to)
    }
}
