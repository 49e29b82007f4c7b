//! Reading and writing raw OpenType/TrueType (sfnt) containers
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/otff#organization-of-an-opentype-font>

use bytes::Bytes;
use font_types::Tag;

use crate::{
    buffer::{Reader, Writer},
    error::{ConvertError, bail_if},
    parse::Parse,
    sfnt::Sfnt,
    table_tags::HEAD,
    tag::calculate_table_checksum,
};

pub const SFNT_HEADER_SIZE: usize = 12;
pub const SFNT_TABLE_RECORD_SIZE: usize = 16;

/// Magic number the whole-font checksum is subtracted from to get `checkSumAdjustment`
const CHECKSUM_ADJUSTMENT_MAGIC: u32 = 0xB1B0AFBA;
const CHECKSUM_ADJUSTMENT_OFFSET: usize = 8;

/// The table directory header at the start of every sfnt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetTable {
    pub sfnt_version: u32,
    pub num_tables: u16,
    pub search_range: u16,
    pub entry_selector: u16,
    pub range_shift: u16,
}

impl OffsetTable {
    /// Build a header for `num_tables` tables, deriving the binary search parameters
    pub fn new(sfnt_version: u32, num_tables: u16) -> Self {
        let mut max_pow2: u16 = 0;
        while 1u32 << (max_pow2 + 1) <= (num_tables as u32) {
            max_pow2 += 1;
        }
        let search_range: u16 = (1u16 << max_pow2) << 4;
        let range_shift = ((num_tables as u32) << 4).saturating_sub(search_range as u32) as u16;

        OffsetTable {
            sfnt_version,
            num_tables,
            search_range,
            entry_selector: max_pow2,
            range_shift,
        }
    }

    pub fn write(&self, out: &mut Writer) {
        out.write_u32(self.sfnt_version);
        out.write_u16(self.num_tables);
        out.write_u16(self.search_range);
        out.write_u16(self.entry_selector);
        out.write_u16(self.range_shift);
    }
}

impl Parse for OffsetTable {
    const SIZE: usize = SFNT_HEADER_SIZE;

    fn parse(input: &mut Reader<'_>) -> Result<Self, ConvertError> {
        Ok(OffsetTable {
            sfnt_version: input.read_u32()?,
            num_tables: input.read_u16()?,
            search_range: input.read_u16()?,
            entry_selector: input.read_u16()?,
            range_shift: input.read_u16()?,
        })
    }
}

/// One entry of the sfnt table directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRecord {
    pub tag: Tag,
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

impl TableRecord {
    pub fn write(&self, out: &mut Writer) {
        out.write_tag(self.tag);
        out.write_u32(self.checksum);
        out.write_u32(self.offset);
        out.write_u32(self.length);
    }
}

impl Parse for TableRecord {
    const SIZE: usize = SFNT_TABLE_RECORD_SIZE;

    fn parse(input: &mut Reader<'_>) -> Result<Self, ConvertError> {
        Ok(TableRecord {
            tag: input.read_tag()?,
            checksum: input.read_u32()?,
            offset: input.read_u32()?,
            length: input.read_u32()?,
        })
    }
}

/// Check a table's payload against the checksum stored for it.
///
/// `head` is exempt: it embeds `checkSumAdjustment`, which is computed after the table
/// checksum and so invalidates it.
pub(crate) fn verify_checksum(tag: Tag, data: &[u8], stored: u32) -> Result<(), ConvertError> {
    if tag == HEAD {
        return Ok(());
    }
    let computed = calculate_table_checksum(data);
    bail_if!(
        computed != stored,
        ConvertError::ChecksumMismatch {
            tag,
            computed,
            stored
        }
    );
    Ok(())
}

fn read_table_records(
    reader: &mut Reader<'_>,
) -> Result<(OffsetTable, Vec<TableRecord>), ConvertError> {
    let header = OffsetTable::parse(reader)?;
    let records = (0..header.num_tables)
        .map(|_| TableRecord::parse(reader))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((header, records))
}

/// Decode a raw sfnt into the font model, verifying table alignment and checksums
pub fn read_otf(data: &[u8]) -> Result<Sfnt, ConvertError> {
    let mut reader = Reader::new(data);
    let (header, records) = read_table_records(&mut reader)?;

    let mut sfnt = Sfnt::new(header.sfnt_version);
    for record in records {
        bail_if!(
            record.offset % 4 != 0,
            ConvertError::MisalignedTable {
                tag: record.tag,
                offset: record.offset,
            }
        );
        let table_data = reader.slice_at(record.offset as usize, record.length as usize)?;
        verify_checksum(record.tag, table_data, record.checksum)?;
        log::trace!(
            "read table '{}' ({} bytes at offset {})",
            record.tag,
            record.length,
            record.offset
        );
        sfnt.add_table(record.tag, Bytes::copy_from_slice(table_data), record.checksum);
    }

    Ok(sfnt)
}

/// Size of a raw sfnt holding `sfnt`'s tables
pub fn sfnt_size(sfnt: &Sfnt) -> usize {
    SFNT_HEADER_SIZE
        + SFNT_TABLE_RECORD_SIZE * sfnt.num_tables()
        + sfnt.tables().map(|(_, table)| table.padded_len()).sum::<usize>()
}

/// Fail unless the table count fits a `u16` and every offset fits a `u32`
pub(crate) fn check_sfnt_limits(sfnt: &Sfnt) -> Result<(), ConvertError> {
    bail_if!(
        sfnt.num_tables() > u16::MAX as usize,
        ConvertError::Malformed("more than 65535 tables")
    );
    bail_if!(
        sfnt_size(sfnt) > u32::MAX as usize,
        ConvertError::Malformed("font data exceeds 4 GiB")
    );
    Ok(())
}

/// Encode the font model as a raw sfnt, tables in ascending tag order
pub fn build_otf(sfnt: &Sfnt) -> Result<Vec<u8>, ConvertError> {
    check_sfnt_limits(sfnt)?;
    let num_tables = sfnt.num_tables();
    let mut out = Writer::with_capacity(sfnt_size(sfnt));

    OffsetTable::new(sfnt.version(), num_tables as u16).write(&mut out);

    let mut table_offset = SFNT_HEADER_SIZE + SFNT_TABLE_RECORD_SIZE * num_tables;
    for (&tag, table) in sfnt.tables() {
        TableRecord {
            tag,
            checksum: table.checksum(),
            offset: table_offset as u32,
            length: table.len() as u32,
        }
        .write(&mut out);
        table_offset += table.padded_len();
    }

    for (_, table) in sfnt.tables() {
        out.write_bytes(table.data());
        out.pad(table.padded_len() - table.len());
    }

    Ok(out.into_inner())
}

/// Recompute the `head` table's `checkSumAdjustment` for a complete raw sfnt.
///
/// The field is zeroed, the whole font summed, and the result subtracted from
/// `0xB1B0AFBA`. Fonts without a `head` table are left untouched.
///
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/otff#calculating-checksums>
pub fn update_checksum_adjustment(font: &mut [u8]) -> Result<(), ConvertError> {
    let mut reader = Reader::new(font);
    let (_, records) = read_table_records(&mut reader)?;
    let Some(head) = records.iter().find(|record| record.tag == HEAD) else {
        return Ok(());
    };
    bail_if!(
        (head.length as usize) < CHECKSUM_ADJUSTMENT_OFFSET + 4,
        ConvertError::Malformed("head table is too short")
    );
    let field_start = head.offset as usize + CHECKSUM_ADJUSTMENT_OFFSET;
    reader.slice_at(field_start, 4)?;

    font[field_start..field_start + 4].fill(0);
    let adjustment = CHECKSUM_ADJUSTMENT_MAGIC.wrapping_sub(calculate_table_checksum(font));
    font[field_start..field_start + 4].copy_from_slice(&adjustment.to_be_bytes());
    Ok(())
}
