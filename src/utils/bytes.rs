//! Byte-slice utilities for bounds-oriented parsing.
//!
//! Two layers, mirroring how the decoders use them:
//! - **Option layer** (`read_*`): helpers returning `Option<T>`, for callers that map failures
//!   to their own error (the record scanner reports framing-specific errors).
//! - **Result layer** (`*_r`): wrappers mapping `None` to `DeserializationError::Truncated`.
//!
//! Offsets are `usize` and relative to the slice passed in. Errors report `base + offset`, where
//! `base` is the absolute position of the slice within the log.
//!
//! All integers in the log are little-endian, except the network address words in the
//! event context, which are big-endian.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::err::DeserializationError;

/// Read `N` raw bytes at `offset`.
///
/// Returns `None` if the range is out of bounds.
pub(crate) fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    let bytes: [u8; N] = buf.get(offset..end)?.try_into().ok()?;
    Some(bytes)
}

/// Read a `u16` (little-endian) at `offset`.
pub(crate) fn read_u16_le(buf: &[u8], offset: usize) -> Option<u16> {
    Some(LittleEndian::read_u16(&read_array::<2>(buf, offset)?))
}

/// Read a `u32` (little-endian) at `offset`.
pub(crate) fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    Some(LittleEndian::read_u32(&read_array::<4>(buf, offset)?))
}

/// Read a `u64` (little-endian) at `offset`.
pub(crate) fn read_u64_le(buf: &[u8], offset: usize) -> Option<u64> {
    Some(LittleEndian::read_u64(&read_array::<8>(buf, offset)?))
}

/// Read four consecutive big-endian `u32` words at `offset`.
pub(crate) fn read_u32_words_be(buf: &[u8], offset: usize) -> Option<[u32; 4]> {
    let bytes = read_array::<16>(buf, offset)?;
    let mut words = [0_u32; 4];
    BigEndian::read_u32_into(&bytes, &mut words);
    Some(words)
}

#[inline]
pub(crate) fn truncated(
    what: &'static str,
    base: u64,
    offset: usize,
    need: usize,
    len: usize,
) -> DeserializationError {
    DeserializationError::Truncated {
        what,
        offset: base + offset as u64,
        need,
        have: len.saturating_sub(offset),
    }
}

pub(crate) fn slice_r<'a>(
    buf: &'a [u8],
    base: u64,
    offset: usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8], DeserializationError> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| truncated(what, base, offset, len, buf.len()))?;
    buf.get(offset..end)
        .ok_or_else(|| truncated(what, base, offset, len, buf.len()))
}

/// Read `N` raw bytes at `offset`, or return `DeserializationError::Truncated`.
pub(crate) fn read_array_r<const N: usize>(
    buf: &[u8],
    base: u64,
    offset: usize,
    what: &'static str,
) -> Result<[u8; N], DeserializationError> {
    read_array::<N>(buf, offset).ok_or_else(|| truncated(what, base, offset, N, buf.len()))
}
