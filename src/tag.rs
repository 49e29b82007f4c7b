//! Conversions between table tags, their string form and their integer form, plus the
//! table checksum shared by every container format.

use font_types::Tag;

use crate::error::{ConvertError, bail_if};

/// Pack a 4 character string into a [`Tag`].
///
/// Only the low byte of each character is kept, so `"cmap"` and any string of four
/// characters whose low bytes spell `cmap` produce the same tag.
pub fn string_to_tag(s: &str) -> Result<Tag, ConvertError> {
    bail_if!(s.chars().count() != 4, ConvertError::InvalidTag(s.to_string()));
    let mut bytes = [0u8; 4];
    for (byte, c) in bytes.iter_mut().zip(s.chars()) {
        *byte = (c as u32 & 0xff) as u8;
    }
    Ok(Tag::from_be_bytes(bytes))
}

/// Unpack a [`Tag`] into a 4 character string.
///
/// Every byte maps to the character with the same code point, so this never fails even
/// for tags that are not printable.
pub fn tag_to_string(tag: Tag) -> String {
    tag.to_be_bytes().iter().map(|&b| char::from(b)).collect()
}

#[inline]
pub fn tag_to_u32(tag: Tag) -> u32 {
    u32::from_be_bytes(tag.to_be_bytes())
}

#[inline]
pub fn tag_from_u32(value: u32) -> Tag {
    Tag::from_u32(value)
}

/// Compute the OpenType checksum of a table: the wrapping sum of its big-endian `u32`
/// words.
///
/// A trailing partial word is treated as if it were padded to 4 bytes with zeroes.
///
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/otff#calculating-checksums>
pub fn calculate_table_checksum(data: &[u8]) -> u32 {
    let mut checksum: u32 = 0;
    let mut iter = data.chunks_exact(4);
    for chunk in &mut iter {
        checksum = checksum.wrapping_add(u32::from_be_bytes([
            chunk[0], chunk[1], chunk[2], chunk[3],
        ]));
    }

    let remainder = iter.remainder();
    let last = match *remainder {
        [a, b, c] => u32::from_be_bytes([a, b, c, 0]),
        [a, b] => u32::from_be_bytes([a, b, 0, 0]),
        [a] => u32::from_be_bytes([a, 0, 0, 0]),
        _ => 0,
    };

    checksum.wrapping_add(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_round_trip() {
        let tag = string_to_tag("head").unwrap();
        assert_eq!(tag, Tag::new(b"head"));
        assert_eq!(tag_to_u32(tag), 0x68656164);
        assert_eq!(tag_to_string(tag), "head");
        assert_eq!(tag_to_string(tag_from_u32(0x4f54544f)), "OTTO");
    }

    #[test]
    fn wrong_length_is_rejected() {
        for s in ["", "abc", "abcde", "OS/22"] {
            assert_eq!(
                string_to_tag(s),
                Err(ConvertError::InvalidTag(s.to_string())),
                "{s:?}"
            );
        }
    }

    #[test]
    fn only_low_byte_of_each_char_is_kept() {
        // 'Ā' is U+0100, whose low byte is 0x00
        let tag = string_to_tag("Āxyz").unwrap();
        assert_eq!(tag.to_be_bytes(), [0x00, b'x', b'y', b'z']);
    }

    #[test]
    fn non_printable_tags_still_convert() {
        let s = tag_to_string(tag_from_u32(0x0001_0000));
        assert_eq!(s.chars().count(), 4);
        assert_eq!(string_to_tag(&s).unwrap(), tag_from_u32(0x0001_0000));
    }

    #[test]
    fn checksum_of_aligned_data() {
        let data = [0, 0, 0, 1, 0, 0, 0, 2, 0xff, 0xff, 0xff, 0xff];
        // 1 + 2 + 0xffffffff wraps around to 2
        assert_eq!(calculate_table_checksum(&data), 2);
        assert_eq!(calculate_table_checksum(&[]), 0);
    }

    #[test]
    fn checksum_pads_trailing_bytes_on_the_low_side() {
        assert_eq!(calculate_table_checksum(&[0x12]), 0x1200_0000);
        assert_eq!(calculate_table_checksum(&[0x12, 0x34]), 0x1234_0000);
        assert_eq!(calculate_table_checksum(&[0x12, 0x34, 0x56]), 0x1234_5600);
        assert_eq!(
            calculate_table_checksum(&[0, 0, 0, 1, 0x12, 0x34, 0x56]),
            0x1234_5601
        );
    }

    #[test]
    fn checksum_ignores_zero_padding() {
        let data = [1, 2, 3, 4, 5];
        let padded = [1, 2, 3, 4, 5, 0, 0, 0];
        assert_eq!(
            calculate_table_checksum(&data),
            calculate_table_checksum(&padded)
        );
    }
}
