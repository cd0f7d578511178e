use crate::err::{DeserializationError, DeserializationResult};
use crate::utils::bytes;

/// A lightweight cursor over an immutable byte slice.
///
/// This is the slice/offset equivalent of `Cursor<&[u8]>`, used by the context and payload
/// decoders where the record is already in memory. `base` is the absolute position of
/// `buf[0]` within the log, so every error reports a position a reader can seek to.
///
/// All integer reads are little-endian and advance the cursor on success.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    base: u64,
}

impl<'a> ByteCursor<'a> {
    #[inline]
    pub(crate) fn with_pos(buf: &'a [u8], pos: usize, base: u64) -> DeserializationResult<Self> {
        // Allow pos == len (EOF), reject pos > len.
        let _ = bytes::slice_r(buf, base, pos, 0, "cursor.position")?;
        Ok(Self { buf, pos, base })
    }

    #[inline]
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    /// Absolute offset of the cursor within the log.
    #[inline]
    pub(crate) fn position(&self) -> u64 {
        self.base + self.pos as u64
    }

    #[inline]
    pub(crate) fn take_bytes(
        &mut self,
        len: usize,
        what: &'static str,
    ) -> DeserializationResult<&'a [u8]> {
        let out = bytes::slice_r(self.buf, self.base, self.pos, len, what)?;
        self.pos += len;
        Ok(out)
    }

    #[inline]
    pub(crate) fn array<const N: usize>(
        &mut self,
        what: &'static str,
    ) -> DeserializationResult<[u8; N]> {
        let v = bytes::read_array_r::<N>(self.buf, self.base, self.pos, what)?;
        self.pos += N;
        Ok(v)
    }

    #[inline]
    pub(crate) fn u16_named(&mut self, what: &'static str) -> DeserializationResult<u16> {
        let v = bytes::read_u16_le(self.buf, self.pos).ok_or_else(|| self.truncated(what, 2))?;
        self.pos += 2;
        Ok(v)
    }

    #[inline]
    pub(crate) fn i16_named(&mut self, what: &'static str) -> DeserializationResult<i16> {
        Ok(self.u16_named(what)? as i16)
    }

    #[inline]
    pub(crate) fn u32_named(&mut self, what: &'static str) -> DeserializationResult<u32> {
        let v = bytes::read_u32_le(self.buf, self.pos).ok_or_else(|| self.truncated(what, 4))?;
        self.pos += 4;
        Ok(v)
    }

    #[inline]
    pub(crate) fn i32_named(&mut self, what: &'static str) -> DeserializationResult<i32> {
        Ok(self.u32_named(what)? as i32)
    }

    #[inline]
    pub(crate) fn u64_named(&mut self, what: &'static str) -> DeserializationResult<u64> {
        let v = bytes::read_u64_le(self.buf, self.pos).ok_or_else(|| self.truncated(what, 8))?;
        self.pos += 8;
        Ok(v)
    }

    #[inline]
    pub(crate) fn i64_named(&mut self, what: &'static str) -> DeserializationResult<i64> {
        Ok(self.u64_named(what)? as i64)
    }

    /// Four big-endian `u32` words (network address layout).
    pub(crate) fn u32_words_be(&mut self, what: &'static str) -> DeserializationResult<[u32; 4]> {
        let v =
            bytes::read_u32_words_be(self.buf, self.pos).ok_or_else(|| self.truncated(what, 16))?;
        self.pos += 16;
        Ok(v)
    }

    /// A `u32` length prefix followed by that many bytes of UTF-8.
    pub(crate) fn len_prefixed_utf8_string(
        &mut self,
        what: &'static str,
    ) -> DeserializationResult<&'a str> {
        let len = self.u32_named(what)? as usize;
        let start = self.position();
        let raw = self.take_bytes(len, what)?;
        std::str::from_utf8(raw).map_err(|source| DeserializationError::Encoding {
            source,
            offset: start + source.valid_up_to() as u64,
        })
    }

    #[inline]
    fn truncated(&self, what: &'static str, need: usize) -> DeserializationError {
        bytes::truncated(what, self.base, self.pos, need, self.buf.len())
    }
}
