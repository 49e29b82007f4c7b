use std::{error::Error, io::Read as _};

use brotli_decompressor::Decompressor;
use bytes::Buf as _;
use font_types::Tag;

use crate::{
    Round4,
    buffer::Reader,
    error::{ConvertError, bail, bail_if, bail_with_msg_if},
    otf::{build_otf, update_checksum_adjustment},
    parse::Parse,
    sfnt::Sfnt,
    table_tags::{GLYF, HEAD, HHEA, HMTX, LOCA},
    tag::calculate_table_checksum,
};

use super::{
    glyf_decoder::{GlyfAndLocaData, transform_glyf_table},
    header::{Woff2Header, Woff2TableEntry},
    hmtx_decoder::{decode_hmtx_table, generate_hmtx_table},
};

// Over 14k test fonts the max compression ratio seen to date was ~20.
// >100 suggests you wrote a bad uncompressed size.
const MAX_PLAUSIBLE_COMPRESSION_RATIO: f64 = 100.0;

/// Offset of `numberOfHMetrics` in `hhea`
const NUM_HMETRICS_OFFSET: usize = 34;

/// Upper bound on the up-front allocation for decompressed data. Anything larger grows
/// as the decoder actually produces output.
const MAX_INITIAL_CAPACITY: usize = 1 << 20;

/// Inflate a brotli stream, stopping one byte past `size_hint` so an oversized stream
/// shows up as a size mismatch.
pub(crate) fn decompress_brotli(
    compressed_data: &[u8],
    size_hint: usize,
) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut output: Vec<u8> = Vec::with_capacity(size_hint.min(MAX_INITIAL_CAPACITY));
    let limit = (size_hint as u64).saturating_add(1);
    Decompressor::new(compressed_data, 4096)
        .take(limit)
        .read_to_end(&mut output)?;
    Ok(output)
}

/// Decode a WOFF2 file into a raw sfnt
pub fn decompress_woff2(raw_woff_data: &[u8]) -> Result<Vec<u8>, ConvertError> {
    decompress_woff2_with_brotli(raw_woff_data, &mut decompress_brotli)
}

/// Decode a WOFF2 file into a raw sfnt using the supplied brotli decoder. The decoder
/// is passed the compressed stream and the expected decompressed size.
#[allow(clippy::type_complexity)]
pub fn decompress_woff2_with_brotli(
    raw_woff_data: &[u8],
    decompress_brotli: &mut dyn FnMut(&[u8], usize) -> Result<Vec<u8>, Box<dyn Error>>,
) -> Result<Vec<u8>, ConvertError> {
    let mut input = Reader::new(raw_woff_data);

    let header = Woff2Header::parse(&mut input)?;
    header.validate(raw_woff_data.len())?;

    let entries = (0..header.num_tables)
        .map(|_| Woff2TableEntry::parse(&mut input))
        .collect::<Result<Vec<_>, _>>()?;

    let compressed_offset = input.position();
    let compressed_data = input.slice_at(compressed_offset, header.total_compressed_size as usize)?;
    if header.meta_offset == 0 && header.priv_offset == 0 {
        bail_if!(
            Round4!(compressed_offset + compressed_data.len()) != Round4!(raw_woff_data.len()),
            ConvertError::Malformed("unexpected data after the compressed stream")
        );
    }

    let mut expected_size: usize = 0;
    for entry in &entries {
        expected_size = expected_size
            .checked_add(entry.stored_length() as usize)
            .ok_or(ConvertError::Malformed("table lengths overflow"))?;
    }

    // Both the declared font size and the table stream have to be plausible
    for uncompressed_size in [header.total_sfnt_size as usize, expected_size] {
        let compression_ratio = uncompressed_size as f64 / raw_woff_data.len() as f64;
        bail_with_msg_if!(
            compression_ratio > MAX_PLAUSIBLE_COMPRESSION_RATIO,
            ConvertError::Malformed("implausible compression ratio"),
            "Implausible compression ratio {:.1}",
            compression_ratio
        );
    }

    let decompressed_data = decompress_brotli(compressed_data, expected_size)
        .map_err(|err| ConvertError::Codec(err.to_string()))?;
    bail_if!(
        decompressed_data.len() != expected_size,
        ConvertError::DecompressionSizeMismatch {
            tag: None,
            expected: expected_size,
            actual: decompressed_data.len(),
        }
    );

    let sfnt = reconstruct_font(header.flavor, &entries, &decompressed_data)?;
    log::debug!(
        "decoded WOFF2 with {} tables ({} bytes of table data)",
        sfnt.num_tables(),
        expected_size
    );

    let mut out = build_otf(&sfnt)?;
    update_checksum_adjustment(&mut out)?;
    Ok(out)
}

/// Rebuild every table from the decompressed stream
fn reconstruct_font(
    flavor: u32,
    entries: &[Woff2TableEntry],
    data: &[u8],
) -> Result<Sfnt, ConvertError> {
    // Tables are stored back to back in directory order
    let mut tables: Vec<(&Woff2TableEntry, &[u8])> = Vec::with_capacity(entries.len());
    let mut rest = data;
    for entry in entries {
        let (table_data, tail) = rest.split_at(entry.stored_length() as usize);
        tables.push((entry, table_data));
        rest = tail;
    }
    let find = |tag: Tag| tables.iter().find(|(entry, _)| entry.tag == tag).copied();

    // 'glyf' without 'loca' doesn't make sense
    let glyf = find(GLYF);
    let loca = find(LOCA);
    match (glyf, loca) {
        (Some((glyf, _)), Some((loca, _))) => {
            bail_if!(
                glyf.is_transformed() != loca.is_transformed(),
                ConvertError::Malformed("cannot transform just one of glyf and loca")
            );
        }
        (Some(_), None) | (None, Some(_)) => {
            bail!(ConvertError::Malformed("font has only one of glyf and loca"))
        }
        (None, None) => {}
    }

    // Decoded up front since hmtx reconstruction depends on it
    let glyf_and_loca = match (glyf, loca) {
        (Some((glyf_entry, glyf_data)), Some((loca_entry, _))) if glyf_entry.is_transformed() => {
            let decoded = transform_glyf_table(glyf_data)?;
            check_loca_length(&decoded, loca_entry)?;
            Some(decoded)
        }
        _ => None,
    };

    let mut sfnt = Sfnt::new(flavor);
    for &(entry, table_data) in &tables {
        let tag = entry.tag;
        if !entry.is_transformed() {
            if tag == HEAD {
                bail_if!(
                    table_data.len() < 12,
                    ConvertError::Malformed("head table is too short")
                );
                // checkSumAdjustment is recomputed once the font is assembled
                let mut head = table_data.to_vec();
                head[8..12].fill(0);
                let checksum = calculate_table_checksum(&head);
                sfnt.add_table(tag, head, checksum);
            } else {
                sfnt.add_table(tag, table_data.to_vec(), calculate_table_checksum(table_data));
            }
        } else if tag == GLYF || tag == LOCA {
            let Some(decoded) = &glyf_and_loca else {
                bail!(ConvertError::Malformed("transformed glyf and loca are inconsistent"))
            };
            let table = if tag == GLYF {
                &decoded.glyf_table
            } else {
                &decoded.loca_table
            };
            sfnt.add_table(tag, table.clone(), calculate_table_checksum(table));
        } else if tag == HMTX {
            let Some(decoded) = &glyf_and_loca else {
                bail!(ConvertError::Malformed("transformed hmtx requires transformed glyf"))
            };
            let Some((_, hhea)) = find(HHEA) else {
                bail!(ConvertError::Malformed("transformed hmtx requires hhea"))
            };
            let num_hmetrics = read_num_hmetrics(hhea)?;
            let mut input = table_data;
            let hmtx_data = decode_hmtx_table(
                &mut input,
                decoded.num_glyphs,
                num_hmetrics,
                &decoded.x_mins,
            )?;
            let hmtx = generate_hmtx_table(&hmtx_data);
            let checksum = calculate_table_checksum(&hmtx);
            sfnt.add_table(tag, hmtx, checksum);
        } else {
            bail!(ConvertError::Malformed("unknown table transform"))
        }
        log::trace!(
            "reconstructed table '{}' (transform version {})",
            tag,
            entry.transform_version
        );
    }

    Ok(sfnt)
}

/// <https://www.w3.org/TR/WOFF2/#conform-mustRejectLoca>
fn check_loca_length(
    decoded: &GlyfAndLocaData,
    loca_entry: &Woff2TableEntry,
) -> Result<(), ConvertError> {
    let offset_size: u32 = if decoded.index_format != 0 { 4 } else { 2 };
    let expected = offset_size * (decoded.num_glyphs as u32 + 1);
    bail_with_msg_if!(
        loca_entry.orig_length != expected || decoded.loca_table.len() != expected as usize,
        ConvertError::Malformed("loca length does not match the glyph count"),
        "loca declares {} bytes, expected {}",
        loca_entry.orig_length,
        expected
    );
    Ok(())
}

// Get numberOfHMetrics, https://www.microsoft.com/typography/otspec/hhea.htm
fn read_num_hmetrics(hhea_data: &[u8]) -> Result<u16, ConvertError> {
    let mut input = hhea_data.get(NUM_HMETRICS_OFFSET..).unwrap_or_default();
    Ok(input.try_get_u16()?)
}
