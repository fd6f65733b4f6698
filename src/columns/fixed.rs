//! Generic reader/writer/codec trio for every fixed-width column type.
//!
//! The per-type differences — width, byte layout, conversion to and from
//! [`Value`] — are captured by the small [`FixedSpec`] trait; one generic
//! implementation then provides the resumable items phase (the whole
//! `width * n_rows` payload is taken as one atomic unit) and the write path.
//! Integer specs override the bulk decode with a `bytemuck` cast; everything
//! else uses the per-element default.

use bytes::BytesMut;

use crate::columns::{
    ColumnCodec, ColumnReader, ColumnWriter, ReaderBase, Row, WriterCore,
};
use crate::error::CodecError;
use crate::types::ColumnDescriptor;
use crate::value::{Value, ValueRepr};
use crate::wire::ByteSource;

/// Behavior of one fixed-width wire type.
///
/// `decode_elem` is handed exactly [`FixedSpec::WIDTH`] little-endian bytes.
/// `from_value` reports failures as a bare reason string; the writer wraps it
/// with the offending column and row.
pub(crate) trait FixedSpec: Clone + Send + Sync + 'static {
    type Elem: Copy + Send + Sync;

    const WIDTH: usize;

    fn decode_elem(&self, chunk: &[u8]) -> Self::Elem;

    /// Decodes the whole payload in one pass. Specs with `bytemuck`-castable
    /// elements override this; the default walks the exact-width chunks.
    fn decode_items(&self, payload: &[u8], n_rows: usize) -> Vec<Self::Elem> {
        let mut items = Vec::with_capacity(n_rows);
        for chunk in payload.chunks_exact(Self::WIDTH) {
            items.push(self.decode_elem(chunk));
        }
        items
    }

    fn encode_elem(&self, elem: Self::Elem, sink: &mut BytesMut);

    fn to_value(&self, elem: Self::Elem) -> Result<Value, CodecError>;

    fn from_value(&self, val: &Value) -> Result<Self::Elem, String>;

    fn null_elem(&self) -> Self::Elem;

    /// The null representative. Defaults to the converted null element; the
    /// enum spec overrides it because key 0 need not be a declared entry.
    fn null_value(&self) -> Value {
        self.to_value(self.null_elem())
            .unwrap_or(Value::Null)
    }
}

/// Copies an exact-width chunk into a fixed array for `from_le_bytes`-style
/// constructors. Callers guarantee the width via `chunks_exact`.
pub(crate) fn le_array<const N: usize>(chunk: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(chunk);
    out
}

//==================================================================================
// I. Reader
//==================================================================================

pub(crate) struct FixedReader<S: FixedSpec> {
    base: ReaderBase,
    spec: S,
    items: Vec<S::Elem>,
}

impl<S: FixedSpec> ColumnReader for FixedReader<S> {
    fn base(&self) -> &ReaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ReaderBase {
        &mut self.base
    }

    fn read_items(&mut self, src: &mut ByteSource) -> Result<bool, CodecError> {
        let total = S::WIDTH * self.base.n_rows;
        let payload = match src.try_read_bytes(total) {
            Some(bytes) => bytes,
            None => return Ok(false),
        };
        self.items = self.spec.decode_items(&payload, self.base.n_rows);
        Ok(true)
    }

    fn null_value(&self) -> Value {
        self.spec.null_value()
    }

    fn element_internal(&self, row: usize, _repr: ValueRepr) -> Result<Value, CodecError> {
        self.spec.to_value(self.items[row])
    }
}

//==================================================================================
// II. Writer
//==================================================================================

pub(crate) struct FixedWriter<S: FixedSpec> {
    core: WriterCore,
    spec: S,
}

impl<S: FixedSpec> ColumnWriter for FixedWriter<S> {
    fn core(&self) -> &WriterCore {
        &self.core
    }

    fn serialize_element(&self, sink: &mut BytesMut, val: &Value, row: usize) -> Result<(), CodecError> {
        let elem = self
            .spec
            .from_value(val)
            .map_err(|reason| self.core.illegal_value(row, reason))?;
        self.spec.encode_elem(elem, sink);
        Ok(())
    }

    fn serialize_null(&self, sink: &mut BytesMut) -> Result<(), CodecError> {
        self.spec.encode_elem(self.spec.null_elem(), sink);
        Ok(())
    }
}

//==================================================================================
// III. Codec
//==================================================================================

pub(crate) struct FixedCodec<S: FixedSpec> {
    descr: ColumnDescriptor,
    spec: S,
}

impl<S: FixedSpec> FixedCodec<S> {
    pub(crate) fn new(descr: ColumnDescriptor, spec: S) -> Self {
        FixedCodec { descr, spec }
    }
}

impl<S: FixedSpec> ColumnCodec for FixedCodec<S> {
    fn descriptor(&self) -> &ColumnDescriptor {
        &self.descr
    }

    fn reader(&self, n_rows: usize) -> Box<dyn ColumnReader> {
        Box::new(FixedReader {
            base: ReaderBase::new(self.descr.clone(), n_rows),
            spec: self.spec.clone(),
            items: Vec::new(),
        })
    }

    fn writer(&self, rows: Vec<Row>, column_index: usize) -> Box<dyn ColumnWriter> {
        Box::new(FixedWriter {
            core: WriterCore::new(self.descr.clone(), rows, column_index),
            spec: self.spec.clone(),
        })
    }

    fn null_value(&self) -> Value {
        self.spec.null_value()
    }
}
