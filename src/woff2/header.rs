//! WOFF2 file header and table directory
//!
//! <https://www.w3.org/TR/WOFF2/#woff20Header>

use font_types::Tag;

use crate::{
    buffer::{Reader, Writer},
    error::{ConvertError, bail_if},
    format::{WOFF2_SIGNATURE, is_sfnt_version},
    parse::Parse,
    table_tags::{GLYF, HMTX, KNOWN_TABLE_TAGS, LOCA, known_tag_index},
    variable_length::{BufVariableExt as _, write_base128},
};

pub const WOFF2_HEADER_SIZE: usize = 48;

/// `ttcf`, the flavor of a font collection
pub(crate) const TTC_FLAVOR: u32 = 0x74746366;

/// Low 6 bits of the flags byte that mean "an explicit tag follows"
const CUSTOM_TAG_INDEX: u8 = 0x3f;
const TRANSFORM_VERSION_SHIFT: u8 = 6;
/// Transform version meaning "stored as is" for `glyf` and `loca`
const GLYF_NULL_TRANSFORM: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Woff2Header {
    pub signature: u32,
    pub flavor: u32,
    pub length: u32,
    pub num_tables: u16,
    pub total_sfnt_size: u32,
    pub total_compressed_size: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub meta_offset: u32,
    pub meta_length: u32,
    pub meta_orig_length: u32,
    pub priv_offset: u32,
    pub priv_length: u32,
}

impl Woff2Header {
    pub fn write(&self, out: &mut Writer) {
        out.write_u32(self.signature);
        out.write_u32(self.flavor);
        out.write_u32(self.length);
        out.write_u16(self.num_tables);
        out.write_u16(0); // reserved
        out.write_u32(self.total_sfnt_size);
        out.write_u32(self.total_compressed_size);
        out.write_u16(self.major_version);
        out.write_u16(self.minor_version);
        out.write_u32(self.meta_offset);
        out.write_u32(self.meta_length);
        out.write_u32(self.meta_orig_length);
        out.write_u32(self.priv_offset);
        out.write_u32(self.priv_length);
    }

    /// Check the header against the size of the file it was read from
    pub fn validate(&self, file_len: usize) -> Result<(), ConvertError> {
        bail_if!(
            self.signature != WOFF2_SIGNATURE,
            ConvertError::InvalidSignature(self.signature)
        );
        bail_if!(
            self.flavor == TTC_FLAVOR,
            ConvertError::UnsupportedFormat("WOFF2 font collection".to_string())
        );
        bail_if!(
            !is_sfnt_version(self.flavor),
            ConvertError::UnknownFlavor(self.flavor)
        );
        bail_if!(
            self.length as usize != file_len,
            ConvertError::LengthMismatch {
                declared: self.length,
                actual: file_len,
            }
        );
        bail_if!(
            self.num_tables == 0,
            ConvertError::Malformed("WOFF2 file has no tables")
        );
        for (offset, length) in [
            (self.meta_offset, self.meta_length),
            (self.priv_offset, self.priv_length),
        ] {
            if offset == 0 {
                continue;
            }
            bail_if!(
                offset as u64 + length as u64 > file_len as u64,
                ConvertError::Malformed("metadata or private block extends past the file")
            );
        }
        Ok(())
    }
}

impl Parse for Woff2Header {
    const SIZE: usize = WOFF2_HEADER_SIZE;

    fn parse(input: &mut Reader<'_>) -> Result<Self, ConvertError> {
        let signature = input.read_u32()?;
        let flavor = input.read_u32()?;
        let length = input.read_u32()?;
        let num_tables = input.read_u16()?;
        let _reserved = input.read_u16()?;
        Ok(Woff2Header {
            signature,
            flavor,
            length,
            num_tables,
            total_sfnt_size: input.read_u32()?,
            total_compressed_size: input.read_u32()?,
            major_version: input.read_u16()?,
            minor_version: input.read_u16()?,
            meta_offset: input.read_u32()?,
            meta_length: input.read_u32()?,
            meta_orig_length: input.read_u32()?,
            priv_offset: input.read_u32()?,
            priv_length: input.read_u32()?,
        })
    }
}

/// One entry of the WOFF2 table directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Woff2TableEntry {
    pub tag: Tag,
    pub transform_version: u8,
    pub orig_length: u32,
    /// Only present for transformed tables
    pub transform_length: Option<u32>,
}

impl Woff2TableEntry {
    /// An entry for a table stored without any transform
    pub fn null_transform(tag: Tag, orig_length: u32) -> Self {
        let transform_version = if tag == GLYF || tag == LOCA {
            GLYF_NULL_TRANSFORM
        } else {
            0
        };
        Woff2TableEntry {
            tag,
            transform_version,
            orig_length,
            transform_length: None,
        }
    }

    /// `glyf` and `loca` use version 0 for their transform and 3 for none; every other
    /// table is the other way round.
    pub fn is_transformed(&self) -> bool {
        if self.tag == GLYF || self.tag == LOCA {
            self.transform_version != GLYF_NULL_TRANSFORM
        } else {
            self.transform_version != 0
        }
    }

    /// Number of bytes this table occupies in the decompressed stream
    pub fn stored_length(&self) -> u32 {
        self.transform_length.unwrap_or(self.orig_length)
    }

    pub fn write(&self, out: &mut Writer) {
        let transform_bits = self.transform_version << TRANSFORM_VERSION_SHIFT;
        match known_tag_index(self.tag) {
            Some(index) => out.write_u8(index | transform_bits),
            None => {
                out.write_u8(CUSTOM_TAG_INDEX | transform_bits);
                out.write_tag(self.tag);
            }
        }
        out.write_bytes(&write_base128(self.orig_length));
        if let Some(transform_length) = self.transform_length {
            out.write_bytes(&write_base128(transform_length));
        }
    }

    /// Encoded size of the entry
    pub fn size(&self) -> usize {
        let tag_size = match known_tag_index(self.tag) {
            Some(_) => 0,
            None => 4,
        };
        1 + tag_size
            + write_base128(self.orig_length).len()
            + self.transform_length.map_or(0, |len| write_base128(len).len())
    }

    /// Parse an entry. Not a [`Parse`] impl since entries are variable length.
    pub fn parse(input: &mut Reader<'_>) -> Result<Self, ConvertError> {
        let flags = input.read_u8()?;
        let index = flags & CUSTOM_TAG_INDEX;
        let tag = match index {
            CUSTOM_TAG_INDEX => input.read_tag()?,
            _ => KNOWN_TABLE_TAGS[index as usize],
        };
        let transform_version = flags >> TRANSFORM_VERSION_SHIFT;
        let orig_length = input.try_get_base128_u32()?;

        let mut entry = Woff2TableEntry {
            tag,
            transform_version,
            orig_length,
            transform_length: None,
        };
        if entry.is_transformed() {
            let known_transform = if tag == GLYF || tag == LOCA {
                transform_version == 0
            } else {
                tag == HMTX && transform_version == 1
            };
            bail_if!(
                !known_transform,
                ConvertError::Malformed("unknown table transform")
            );
            let transform_length = input.try_get_base128_u32()?;
            bail_if!(
                tag == LOCA && transform_length != 0,
                ConvertError::Malformed("transformed loca must have a transformLength of 0")
            );
            entry.transform_length = Some(transform_length);
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::format::SFNT_VERSION_V1;

    fn header(length: u32) -> Woff2Header {
        Woff2Header {
            signature: WOFF2_SIGNATURE,
            flavor: SFNT_VERSION_V1,
            length,
            num_tables: 1,
            total_sfnt_size: 100,
            total_compressed_size: 20,
            major_version: 0,
            minor_version: 0,
            meta_offset: 0,
            meta_length: 0,
            meta_orig_length: 0,
            priv_offset: 0,
            priv_length: 0,
        }
    }

    #[test]
    fn header_layout() {
        let mut out = Writer::new();
        header(80).write(&mut out);
        let bytes = out.into_inner();
        assert_eq!(bytes.len(), WOFF2_HEADER_SIZE);
        assert_eq!(&bytes[..4], b"wOF2");
        assert_eq!(Woff2Header::parse(&mut Reader::new(&bytes)).unwrap(), header(80));
    }

    #[test]
    fn header_validation() {
        header(80).validate(80).unwrap();
        assert_eq!(
            header(80).validate(84),
            Err(ConvertError::LengthMismatch {
                declared: 80,
                actual: 84
            })
        );

        let mut bad = header(80);
        bad.signature = 0x774f4646;
        assert_eq!(bad.validate(80), Err(ConvertError::InvalidSignature(0x774f4646)));

        let mut collection = header(80);
        collection.flavor = TTC_FLAVOR;
        assert!(matches!(
            collection.validate(80),
            Err(ConvertError::UnsupportedFormat(_))
        ));

        let mut empty = header(80);
        empty.num_tables = 0;
        assert!(empty.validate(80).is_err());

        let mut metadata = header(80);
        metadata.meta_offset = 76;
        metadata.meta_length = 8;
        assert!(metadata.validate(80).is_err());
        metadata.meta_length = 4;
        metadata.validate(80).unwrap();
    }

    #[test]
    fn known_and_custom_tags() {
        let mut out = Writer::new();
        Woff2TableEntry::null_transform(Tag::new(b"cmap"), 300).write(&mut out);
        Woff2TableEntry::null_transform(Tag::new(b"zzzz"), 5).write(&mut out);
        Woff2TableEntry::null_transform(GLYF, 0).write(&mut out);
        let bytes = out.into_inner();
        assert_eq!(
            bytes,
            [0x00, 0x82, 0x2c, 0x3f, b'z', b'z', b'z', b'z', 0x05, 0xca, 0x00]
        );

        let mut reader = Reader::new(&bytes);
        let cmap = Woff2TableEntry::parse(&mut reader).unwrap();
        assert_eq!(cmap, Woff2TableEntry::null_transform(Tag::new(b"cmap"), 300));
        assert_eq!(cmap.size(), 3);
        let custom = Woff2TableEntry::parse(&mut reader).unwrap();
        assert_eq!(custom.tag, Tag::new(b"zzzz"));
        assert_eq!(custom.size(), 6);
        let glyf = Woff2TableEntry::parse(&mut reader).unwrap();
        assert!(!glyf.is_transformed());
        assert!(reader.remaining_as_slice().is_empty());
    }

    #[test]
    fn transformed_entries() {
        // transformed glyf: version 0, origLength 1000, transformLength 400
        let bytes = [0x0a, 0x87, 0x68, 0x83, 0x10];
        let glyf = Woff2TableEntry::parse(&mut Reader::new(&bytes)).unwrap();
        assert!(glyf.is_transformed());
        assert_eq!(glyf.transform_length, Some(400));
        assert_eq!(glyf.stored_length(), 400);

        // transformed loca must declare a zero transformLength
        let loca = [0x0b, 0x10, 0x01];
        assert!(Woff2TableEntry::parse(&mut Reader::new(&loca)).is_err());

        // only hmtx knows transform version 1
        let hmtx = [0x43, 0x10, 0x08];
        assert_eq!(
            Woff2TableEntry::parse(&mut Reader::new(&hmtx)).unwrap().stored_length(),
            8
        );
        let cmap = [0x40, 0x10, 0x08];
        assert!(Woff2TableEntry::parse(&mut Reader::new(&cmap)).is_err());
    }
}
