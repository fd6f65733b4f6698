//! The accumulating byte buffer every resumable reader decodes from.
//!
//! Network chunks arrive in arbitrary sizes; the connection's read loop feeds
//! them in here and re-drives the current column reader after every arrival.
//! Readers must check [`ByteSource::readable_bytes`] before consuming anything
//! multi-byte: once a byte is taken it is gone, and the monotonicity of the
//! decode state machine depends on never needing it back.

use bytes::{Buf, Bytes, BytesMut};

/// A growing buffer of undecoded wire bytes, consumed front to back.
#[derive(Debug, Default)]
pub struct ByteSource {
    buf: BytesMut,
}

impl ByteSource {
    pub fn new() -> Self {
        ByteSource {
            buf: BytesMut::new(),
        }
    }

    /// Appends a freshly arrived network chunk.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Number of bytes available but not yet consumed.
    pub fn readable_bytes(&self) -> usize {
        self.buf.len()
    }

    // All single-shot accessors below assume the caller has already checked
    // `readable_bytes()`; they panic on underflow exactly like `bytes::Buf`.

    pub fn read_u8(&mut self) -> u8 {
        self.buf.get_u8()
    }

    pub fn read_u16_le(&mut self) -> u16 {
        self.buf.get_u16_le()
    }

    pub fn read_u32_le(&mut self) -> u32 {
        self.buf.get_u32_le()
    }

    pub fn read_u64_le(&mut self) -> u64 {
        self.buf.get_u64_le()
    }

    pub fn read_u128_le(&mut self) -> u128 {
        self.buf.get_u128_le()
    }

    pub fn read_i8(&mut self) -> i8 {
        self.buf.get_i8()
    }

    pub fn read_i16_le(&mut self) -> i16 {
        self.buf.get_i16_le()
    }

    pub fn read_i32_le(&mut self) -> i32 {
        self.buf.get_i32_le()
    }

    pub fn read_i64_le(&mut self) -> i64 {
        self.buf.get_i64_le()
    }

    pub fn read_f32_le(&mut self) -> f32 {
        self.buf.get_f32_le()
    }

    pub fn read_f64_le(&mut self) -> f64 {
        self.buf.get_f64_le()
    }

    /// Detaches exactly `n` bytes. The caller must have checked availability.
    pub fn read_bytes(&mut self, n: usize) -> Bytes {
        self.buf.split_to(n).freeze()
    }

    /// Atomically takes `n` bytes if they are all available, `None` otherwise.
    /// This is the primitive behind every "whole sub-state or nothing" read.
    pub fn try_read_bytes(&mut self, n: usize) -> Option<Bytes> {
        if self.buf.len() < n {
            return None;
        }
        Some(self.buf.split_to(n).freeze())
    }

    /// Peeks at the next unconsumed byte without taking it.
    pub fn peek_u8(&self) -> Option<u8> {
        self.buf.first().copied()
    }

    /// The unconsumed bytes, for scans that must not commit to consuming
    /// anything (the varint reader decides on completeness first).
    pub(crate) fn unread(&self) -> &[u8] {
        &self.buf
    }

    /// Discards `n` bytes after a scan over [`ByteSource::unread`].
    pub(crate) fn skip(&mut self, n: usize) {
        self.buf.advance(n);
    }
}
