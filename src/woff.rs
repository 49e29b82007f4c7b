//! Reading and writing WOFF 1.0 containers
//!
//! <https://www.w3.org/TR/WOFF/>

use std::{
    error::Error,
    io::{Read as _, Write as _},
};

use bytes::Bytes;
use flate2::{Compression, read::ZlibDecoder, write::ZlibEncoder};
use font_types::Tag;

use crate::{
    Round4,
    buffer::{Reader, Writer},
    error::{ConvertError, bail_if},
    format::{WOFF_SIGNATURE, is_sfnt_version},
    otf::{check_sfnt_limits, sfnt_size, verify_checksum},
    parse::Parse,
    sfnt::Sfnt,
};

pub const WOFF_HEADER_SIZE: usize = 44;
pub const WOFF_TABLE_ENTRY_SIZE: usize = 20;

/// Upper bound on the up-front allocation for an inflated table
const MAX_INITIAL_CAPACITY: usize = 1 << 20;

/// The fixed size header at the start of a WOFF file.
///
/// The version, metadata and private data fields are not interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WoffHeader {
    pub signature: u32,
    pub flavor: u32,
    pub length: u32,
    pub num_tables: u16,
    pub total_sfnt_size: u32,
}

impl WoffHeader {
    pub fn write(&self, out: &mut Writer) {
        out.write_u32(self.signature);
        out.write_u32(self.flavor);
        out.write_u32(self.length);
        out.write_u16(self.num_tables);
        out.write_u16(0); // reserved
        out.write_u32(self.total_sfnt_size);
        out.write_u16(0); // majorVersion
        out.write_u16(0); // minorVersion
        out.write_u32(0); // metaOffset
        out.write_u32(0); // metaLength
        out.write_u32(0); // metaOrigLength
        out.write_u32(0); // privOffset
        out.write_u32(0); // privLength
    }
}

impl Parse for WoffHeader {
    const SIZE: usize = WOFF_HEADER_SIZE;

    /// Parse and validate the header against the buffer `input` reads from
    fn parse(input: &mut Reader<'_>) -> Result<Self, ConvertError> {
        let signature = input.read_u32()?;
        bail_if!(signature != WOFF_SIGNATURE, ConvertError::InvalidSignature(signature));
        let flavor = input.read_u32()?;
        bail_if!(!is_sfnt_version(flavor), ConvertError::UnknownFlavor(flavor));
        let length = input.read_u32()?;
        bail_if!(
            length as usize != input.len(),
            ConvertError::LengthMismatch {
                declared: length,
                actual: input.len(),
            }
        );
        let num_tables = input.read_u16()?;
        input.skip(2)?; // reserved
        let total_sfnt_size = input.read_u32()?;
        input.skip(24)?; // version, metadata and private data fields

        Ok(WoffHeader {
            signature,
            flavor,
            length,
            num_tables,
            total_sfnt_size,
        })
    }
}

/// One entry of the WOFF table directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WoffTableEntry {
    pub tag: Tag,
    pub offset: u32,
    pub comp_length: u32,
    pub orig_length: u32,
    pub orig_checksum: u32,
}

impl WoffTableEntry {
    /// Tables whose compressed and original lengths agree are stored uncompressed
    pub fn is_compressed(&self) -> bool {
        self.comp_length != self.orig_length
    }

    pub fn write(&self, out: &mut Writer) {
        out.write_tag(self.tag);
        out.write_u32(self.offset);
        out.write_u32(self.comp_length);
        out.write_u32(self.orig_length);
        out.write_u32(self.orig_checksum);
    }
}

impl Parse for WoffTableEntry {
    const SIZE: usize = WOFF_TABLE_ENTRY_SIZE;

    fn parse(input: &mut Reader<'_>) -> Result<Self, ConvertError> {
        Ok(WoffTableEntry {
            tag: input.read_tag()?,
            offset: input.read_u32()?,
            comp_length: input.read_u32()?,
            orig_length: input.read_u32()?,
            orig_checksum: input.read_u32()?,
        })
    }
}

fn decompress_z(compressed_data: &[u8], size_hint: usize) -> Result<Vec<u8>, Box<dyn Error>> {
    // Read one byte past `size_hint` so that data inflating to more than that shows up
    // as a size mismatch rather than being silently cut off.
    let mut output: Vec<u8> = Vec::with_capacity(size_hint.min(MAX_INITIAL_CAPACITY));
    ZlibDecoder::new(compressed_data)
        .take((size_hint as u64).saturating_add(1))
        .read_to_end(&mut output)?;
    Ok(output)
}

fn compress_z(data: &[u8], level: Compression) -> Result<Vec<u8>, ConvertError> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), level);
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| ConvertError::Codec(e.to_string()))
}

/// Decode a WOFF file into the font model using the built-in zlib decompressor
pub fn read_woff(data: &[u8]) -> Result<Sfnt, ConvertError> {
    read_woff_with_custom_z(data, &mut decompress_z)
}

#[allow(clippy::type_complexity)]
/// Decode a WOFF file into the font model using a custom zlib decompressor passed as a
/// closure. The closure receives the compressed bytes and the expected output size.
pub fn read_woff_with_custom_z(
    data: &[u8],
    decompress_z: &mut dyn FnMut(&[u8], usize) -> Result<Vec<u8>, Box<dyn Error>>,
) -> Result<Sfnt, ConvertError> {
    let mut reader = Reader::new(data);
    let header = WoffHeader::parse(&mut reader)?;
    let entries = (0..header.num_tables)
        .map(|_| WoffTableEntry::parse(&mut reader))
        .collect::<Result<Vec<_>, _>>()?;

    let mut sfnt = Sfnt::new(header.flavor);
    for entry in entries {
        let stored = reader.slice_at(entry.offset as usize, entry.comp_length as usize)?;
        let table_data = if entry.is_compressed() {
            let expected = entry.orig_length as usize;
            let decompressed = decompress_z(stored, expected)
                .map_err(|e| ConvertError::Codec(format!("table '{}': {e}", entry.tag)))?;
            bail_if!(
                decompressed.len() != expected,
                ConvertError::DecompressionSizeMismatch {
                    tag: Some(entry.tag),
                    expected,
                    actual: decompressed.len(),
                }
            );
            Bytes::from(decompressed)
        } else {
            Bytes::copy_from_slice(stored)
        };

        verify_checksum(entry.tag, &table_data, entry.orig_checksum)?;
        log::trace!(
            "read table '{}' ({} -> {} bytes)",
            entry.tag,
            entry.comp_length,
            entry.orig_length
        );
        sfnt.add_table(entry.tag, table_data, entry.orig_checksum);
    }

    Ok(sfnt)
}

/// A table as it will be laid out in the WOFF file
struct PlannedTable<'a> {
    entry: WoffTableEntry,
    stored: StoredData<'a>,
}

enum StoredData<'a> {
    Raw(&'a [u8]),
    Compressed(Vec<u8>),
}

impl StoredData<'_> {
    fn as_slice(&self) -> &[u8] {
        match self {
            StoredData::Raw(data) => data,
            StoredData::Compressed(data) => data,
        }
    }
}

/// Decide how each table is stored and where it goes. Every table is compressed on its
/// own and the compressed form is kept only when it is strictly smaller.
fn plan_tables(
    sfnt: &Sfnt,
    level: Compression,
) -> Result<(Vec<PlannedTable<'_>>, usize), ConvertError> {
    let mut offset = WOFF_HEADER_SIZE + WOFF_TABLE_ENTRY_SIZE * sfnt.num_tables();
    let mut planned = Vec::with_capacity(sfnt.num_tables());

    for (&tag, table) in sfnt.tables() {
        let compressed = compress_z(table.data(), level)?;
        let stored = if compressed.len() < table.len() {
            StoredData::Compressed(compressed)
        } else {
            StoredData::Raw(table.data())
        };
        log::debug!(
            "table '{tag}': {} -> {} bytes{}",
            table.len(),
            stored.as_slice().len(),
            if matches!(stored, StoredData::Raw(_)) { " (stored)" } else { "" }
        );

        let entry = WoffTableEntry {
            tag,
            offset: offset as u32,
            comp_length: stored.as_slice().len() as u32,
            orig_length: table.len() as u32,
            orig_checksum: table.checksum(),
        };
        offset = Round4!(offset + stored.as_slice().len());
        planned.push(PlannedTable { entry, stored });
    }

    Ok((planned, offset))
}

/// Encode the font model as a WOFF file, compressing tables with zlib at `level` (0-9)
pub fn build_woff(sfnt: &Sfnt, level: u32) -> Result<Vec<u8>, ConvertError> {
    check_sfnt_limits(sfnt)?;
    let (planned, total_length) = plan_tables(sfnt, Compression::new(level.min(9)))?;
    bail_if!(
        total_length > u32::MAX as usize,
        ConvertError::Malformed("WOFF data exceeds 4 GiB")
    );
    let table_start = WOFF_HEADER_SIZE + WOFF_TABLE_ENTRY_SIZE * planned.len();
    let mut out = Writer::with_capacity(total_length);

    // Table data first, at the position the plan gave it...
    out.seek(table_start);
    for table in &planned {
        debug_assert_eq!(out.position(), table.entry.offset as usize);
        out.write_bytes(table.stored.as_slice());
        out.pad_to_4();
    }

    // ...then the header and directory, now that the totals are known.
    out.seek(0);
    WoffHeader {
        signature: WOFF_SIGNATURE,
        flavor: sfnt.version(),
        length: total_length as u32,
        num_tables: planned.len() as u16,
        total_sfnt_size: sfnt_size(sfnt) as u32,
    }
    .write(&mut out);
    for table in &planned {
        table.entry.write(&mut out);
    }
    debug_assert_eq!(out.len(), total_length);

    Ok(out.into_inner())
}
