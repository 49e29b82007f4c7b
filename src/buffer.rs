/* Copyright 2013 Google Inc. All Rights Reserved.

   Distributed under MIT license.
   See file LICENSE for detail or copy at https://opensource.org/licenses/MIT
*/

use font_types::Tag;

use crate::error::{ConvertError, bail_if};

// -----------------------------------------------------------------------------
// Reader
//
// Sequential big-endian reads over a borrowed byte slice. Every operation checks
// that the cursor stays within [0, len] and reports `OutOfBounds` otherwise, in
// which case the cursor is left where it was.
// -----------------------------------------------------------------------------
pub struct Reader<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl bytes::Buf for Reader<'_> {
    fn remaining(&self) -> usize {
        self.buffer.len() - self.offset
    }

    fn chunk(&self) -> &[u8] {
        self.remaining_as_slice()
    }

    fn advance(&mut self, cnt: usize) {
        if self.skip(cnt).is_err() {
            panic!("Tried to advance past the end of the buffer");
        }
    }
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Reader<'a> {
        Reader {
            buffer: data,
            offset: 0,
        }
    }

    fn out_of_bounds(&self, requested: usize) -> ConvertError {
        ConvertError::OutOfBounds {
            requested,
            available: self.buffer.len() - self.offset,
        }
    }

    #[inline(always)]
    fn read_n_bytes<const N: usize>(&mut self) -> Result<[u8; N], ConvertError> {
        let Some(bytes) = self
            .buffer
            .get(self.offset..)
            .and_then(|rest| rest.first_chunk::<N>())
        else {
            return Err(self.out_of_bounds(N));
        };
        self.offset += N;
        Ok(*bytes)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8, ConvertError> {
        Ok(self.read_n_bytes::<1>()?[0])
    }

    #[inline]
    pub fn read_i8(&mut self) -> Result<i8, ConvertError> {
        Ok(i8::from_be_bytes(self.read_n_bytes()?))
    }

    #[inline]
    pub fn read_u16(&mut self) -> Result<u16, ConvertError> {
        Ok(u16::from_be_bytes(self.read_n_bytes()?))
    }

    #[inline]
    pub fn read_i16(&mut self) -> Result<i16, ConvertError> {
        Ok(i16::from_be_bytes(self.read_n_bytes()?))
    }

    #[inline]
    pub fn read_u32(&mut self) -> Result<u32, ConvertError> {
        Ok(u32::from_be_bytes(self.read_n_bytes()?))
    }

    #[inline]
    pub fn read_i32(&mut self) -> Result<i32, ConvertError> {
        Ok(i32::from_be_bytes(self.read_n_bytes()?))
    }

    #[inline]
    pub fn read_tag(&mut self) -> Result<Tag, ConvertError> {
        Ok(Tag::from_be_bytes(self.read_n_bytes()?))
    }

    /// Borrow `length` bytes starting at the absolute `offset`. The cursor does not move.
    pub fn slice_at(&self, offset: usize, length: usize) -> Result<&'a [u8], ConvertError> {
        let end = offset.checked_add(length);
        match end {
            Some(end) if end <= self.buffer.len() => Ok(&self.buffer[offset..end]),
            _ => Err(ConvertError::OutOfBounds {
                requested: offset.saturating_add(length),
                available: self.buffer.len(),
            }),
        }
    }

    pub fn seek(&mut self, position: usize) -> Result<(), ConvertError> {
        bail_if!(
            position > self.buffer.len(),
            ConvertError::OutOfBounds {
                requested: position,
                available: self.buffer.len(),
            }
        );
        self.offset = position;
        Ok(())
    }

    pub fn skip(&mut self, n_bytes: usize) -> Result<(), ConvertError> {
        bail_if!(n_bytes > self.buffer.len() - self.offset, self.out_of_bounds(n_bytes));
        self.offset += n_bytes;
        Ok(())
    }

    pub fn remaining_as_slice(&self) -> &'a [u8] {
        &self.buffer[self.offset..]
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self) -> usize {
        self.offset
    }
}

const DEFAULT_INITIAL_CAPACITY: usize = 128 * 1024;

// -----------------------------------------------------------------------------
// Writer
//
// Big-endian writer over an owned buffer that doubles in size as needed. The
// cursor may be moved back with `seek` to patch fields written earlier; the
// result is everything up to the furthest byte ever written.
// -----------------------------------------------------------------------------
pub struct Writer {
    buffer: Vec<u8>,
    position: usize,
    length: usize,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Writer {
            buffer: vec![0; capacity.max(1)],
            position: 0,
            length: 0,
        }
    }

    fn expand_if_needed(&mut self, adding: usize) {
        let needed = self.position + adding;
        if needed <= self.buffer.len() {
            return;
        }
        let mut new_len = self.buffer.len();
        while new_len < needed {
            new_len *= 2;
        }
        self.buffer.resize(new_len, 0);
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.expand_if_needed(data.len());
        self.buffer[self.position..self.position + data.len()].copy_from_slice(data);
        self.position += data.len();
        self.length = self.length.max(self.position);
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    #[inline]
    pub fn write_i8(&mut self, value: i8) {
        self.write_bytes(&value.to_be_bytes());
    }

    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_be_bytes());
    }

    #[inline]
    pub fn write_i16(&mut self, value: i16) {
        self.write_bytes(&value.to_be_bytes());
    }

    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_be_bytes());
    }

    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.write_bytes(&value.to_be_bytes());
    }

    #[inline]
    pub fn write_tag(&mut self, tag: Tag) {
        self.write_bytes(&tag.to_be_bytes());
    }

    /// Write `length` zero bytes.
    pub fn pad(&mut self, length: usize) {
        self.expand_if_needed(length);
        self.buffer[self.position..self.position + length].fill(0);
        self.position += length;
        self.length = self.length.max(self.position);
    }

    /// Zero pad up to the next multiple of 4.
    pub fn pad_to_4(&mut self) {
        self.pad(crate::Round4!(self.position) - self.position);
    }

    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.length]
    }

    pub fn into_inner(mut self) -> Vec<u8> {
        self.buffer.truncate(self.length);
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_big_endian() {
        let data = [0x01, 0xff, 0xfe, 0x12, 0x34, 0x56, 0x78, 0x80, 0x00, 0x00, 0x00];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_i8().unwrap(), -1);
        assert_eq!(reader.read_i16().unwrap(), -494); // 0xfe12
        assert_eq!(reader.read_u32().unwrap(), 0x3456_7880);
        assert_eq!(reader.position(), 8);
        reader.seek(7).unwrap();
        assert_eq!(reader.read_i32().unwrap(), i32::MIN);
        assert_eq!(reader.position(), data.len());
    }

    #[test]
    fn read_past_end_fails_without_moving() {
        let mut reader = Reader::new(&[0, 1, 2]);
        reader.skip(2).unwrap();
        assert_eq!(
            reader.read_u16(),
            Err(ConvertError::OutOfBounds {
                requested: 2,
                available: 1
            })
        );
        assert_eq!(reader.position(), 2);
        assert_eq!(reader.read_u8().unwrap(), 2);
        assert!(reader.read_u8().is_err());
    }

    #[test]
    fn seek_and_skip_are_bounded() {
        let mut reader = Reader::new(&[0; 8]);
        reader.seek(8).unwrap();
        assert!(reader.seek(9).is_err());
        assert_eq!(reader.position(), 8);
        reader.seek(4).unwrap();
        assert!(reader.skip(5).is_err());
        reader.skip(4).unwrap();
        assert_eq!(reader.position(), 8);
    }

    #[test]
    fn slice_at_is_absolute() {
        let data = [1, 2, 3, 4, 5, 6];
        let mut reader = Reader::new(&data);
        reader.skip(5).unwrap();
        assert_eq!(reader.slice_at(1, 3).unwrap(), &[2, 3, 4]);
        assert_eq!(reader.slice_at(6, 0).unwrap(), &[] as &[u8]);
        assert!(reader.slice_at(4, 3).is_err());
        assert!(reader.slice_at(usize::MAX, 2).is_err());
        assert_eq!(reader.position(), 5);
    }

    #[test]
    fn writer_grows_geometrically() {
        let mut writer = Writer::with_capacity(2);
        writer.write_u32(0xdead_beef);
        writer.write_i16(-2);
        writer.write_u8(7);
        writer.write_i8(-1);
        writer.write_i32(-1);
        writer.write_u16(0x0102);
        assert_eq!(writer.len(), 14);
        assert_eq!(
            writer.into_inner(),
            vec![0xde, 0xad, 0xbe, 0xef, 0xff, 0xfe, 7, 0xff, 0xff, 0xff, 0xff, 0xff, 1, 2]
        );
    }

    #[test]
    fn seek_back_patches_without_shrinking() {
        let mut writer = Writer::new();
        writer.write_u32(0);
        writer.write_bytes(b"abcd");
        writer.seek(0);
        writer.write_u16(0xffff);
        assert_eq!(writer.position(), 2);
        assert_eq!(writer.len(), 8);
        assert_eq!(writer.as_slice(), &[0xff, 0xff, 0, 0, b'a', b'b', b'c', b'd']);
    }

    #[test]
    fn seek_forward_leaves_zeroed_gap() {
        let mut writer = Writer::with_capacity(1);
        writer.seek(5);
        writer.write_u8(9);
        writer.pad(1);
        writer.pad_to_4();
        assert_eq!(writer.into_inner(), vec![0, 0, 0, 0, 0, 9, 0, 0]);
    }
}
