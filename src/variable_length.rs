/* Copyright 2015 Google Inc. All Rights Reserved.

   Distributed under MIT license.
   See file LICENSE for detail or copy at https://opensource.org/licenses/MIT
*/

//! Helper functions for woff2 variable length types: 255UInt16 and UIntBase128

use arrayvec::ArrayVec;
use bytes::Buf;

use crate::error::{ConvertError, bail_if};

const WORD_CODE: u8 = 253;
const ONE_MORE_BYTE_CODE_2: u8 = 254;
const ONE_MORE_BYTE_CODE_1: u8 = 255;
const LOWEST_U_CODE: u16 = 253;

pub(crate) trait BufVariableExt: Buf {
    /// Read a 255UInt16
    ///
    /// Based on section 6.1.1 of MicroType Express draft spec
    fn try_get_variable_255_u16(&mut self) -> Result<u16, ConvertError> {
        let code = self.try_get_u8()?;
        Ok(match code {
            WORD_CODE => self.try_get_u16()?,
            ONE_MORE_BYTE_CODE_1 => self.try_get_u8()? as u16 + LOWEST_U_CODE,
            ONE_MORE_BYTE_CODE_2 => self.try_get_u8()? as u16 + LOWEST_U_CODE * 2,
            _ => code as u16,
        })
    }

    /// Read a UIntBase128
    ///
    /// <https://www.w3.org/TR/WOFF2/#DataTypes>
    fn try_get_base128_u32(&mut self) -> Result<u32, ConvertError> {
        let mut result: u32 = 0;
        for i in 0..5 {
            let code = self.try_get_u8()?;
            // Leading zeros are invalid.
            bail_if!(
                i == 0 && code == 0x80,
                ConvertError::Malformed("UIntBase128 has leading zeros")
            );
            // If any of the top seven bits are set then we're about to overflow.
            bail_if!(
                result & 0xfe000000 != 0,
                ConvertError::Malformed("UIntBase128 overflows 32 bits")
            );
            result = (result << 7) | ((code & 0x7f) as u32);
            if code & 0x80 == 0 {
                return Ok(result);
            }
        }
        // Make sure not to exceed the size bound
        Err(ConvertError::Malformed("UIntBase128 is longer than 5 bytes"))
    }

    /// Copy the next `n_bytes` into `dst`
    fn try_read_bytes_into(
        &mut self,
        n_bytes: usize,
        dst: &mut Vec<u8>,
    ) -> Result<(), ConvertError> {
        bail_if!(
            self.remaining() < n_bytes,
            ConvertError::OutOfBounds {
                requested: n_bytes,
                available: self.remaining(),
            }
        );
        dst.reserve(n_bytes);
        let mut left = n_bytes;
        while left > 0 {
            let chunk = self.chunk();
            let len = chunk.len().min(left);
            dst.extend_from_slice(&chunk[..len]);
            self.advance(len);
            left -= len;
        }
        Ok(())
    }

    /// Skip `n_bytes`, failing instead of panicking when there are not enough
    fn try_skip(&mut self, n_bytes: usize) -> Result<(), ConvertError> {
        bail_if!(
            self.remaining() < n_bytes,
            ConvertError::OutOfBounds {
                requested: n_bytes,
                available: self.remaining(),
            }
        );
        self.advance(n_bytes);
        Ok(())
    }
}

impl<T: Buf + ?Sized> BufVariableExt for T {}

fn base128_size(mut n: u32) -> usize {
    let mut size: usize = 1;
    while n >= 128 {
        n >>= 7;
        size += 1;
    }
    size
}

/// Encode a UIntBase128 using the minimum number of bytes
pub(crate) fn write_base128(value: u32) -> ArrayVec<u8, 5> {
    let size = base128_size(value);
    let mut packed: ArrayVec<u8, 5> = ArrayVec::new();
    for i in 0..size {
        let mut b: u8 = ((value >> (7 * (size - i - 1))) & 0x7f) as u8;
        if i < size - 1 {
            b |= 0x80;
        }
        packed.push(b);
    }
    packed
}
