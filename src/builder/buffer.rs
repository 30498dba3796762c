use std::ops::{Deref, DerefMut};

use crate::varint;

const MIN_GROWTH: usize = 32;
const MAX_GROWTH: usize = 1024 * 1024;

/// Growable byte buffer backing a [`Builder`](super::Builder).
///
/// Written bytes can be patched in place through `DerefMut`, which is how compound headers get
/// filled in once their contents are known.
#[derive(Clone, Debug, Default)]
pub(crate) struct BuilderBuffer {
    buf: Vec<u8>,
}

impl BuilderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `n` more bytes fit without another allocation.
    ///
    /// When the buffer has to grow, it is given a quarter of the new length as headroom, but
    /// never less than 32 bytes or more than 1 MiB.
    pub fn reserve_space(&mut self, n: usize) {
        let needed = self.buf.len() + n;
        if needed <= self.buf.capacity() {
            return;
        }
        let headroom = (needed / 4).clamp(MIN_GROWTH, MAX_GROWTH);
        self.buf.reserve_exact(needed + headroom - self.buf.len());
    }

    pub fn write_byte(&mut self, v: u8) {
        self.reserve_space(1);
        self.buf.push(v);
    }

    /// Append `count` copies of `v`.
    pub fn write_bytes(&mut self, v: u8, count: usize) {
        self.reserve_space(count);
        self.buf.resize(self.buf.len() + count, v);
    }

    pub fn write(&mut self, v: &[u8]) {
        self.reserve_space(v.len());
        self.buf.extend_from_slice(v);
    }

    /// Append a LEB128 number stored back to front.
    pub fn write_varint_reversed(&mut self, v: u64) {
        self.reserve_space(varint::encoded_len(v));
        varint::write_reversed(&mut self.buf, v);
    }

    /// Append `n` zero bytes and return them for filling in.
    pub fn grow(&mut self, n: usize) -> &mut [u8] {
        let start = self.buf.len();
        self.write_bytes(0, n);
        &mut self.buf[start..]
    }

    /// Drop the last `n` bytes.
    pub fn shrink(&mut self, n: usize) {
        let len = self.buf.len().saturating_sub(n);
        self.buf.truncate(len);
    }

    pub fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

impl Deref for BuilderBuffer {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for BuilderBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}
