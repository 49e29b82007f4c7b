use std::error::Error;

use brotli::enc::{BrotliCompress, BrotliEncoderParams};

use crate::{
    Round4,
    buffer::{Reader, Writer},
    error::{ConvertError, bail_if},
    format::{WOFF2_SIGNATURE, is_sfnt_version},
    otf::{read_otf, sfnt_size},
    sfnt::{Sfnt, Table},
    table_tags::{GLYF, LOCA},
};

use super::header::{TTC_FLAVOR, WOFF2_HEADER_SIZE, Woff2Header, Woff2TableEntry};

pub(crate) fn compress_brotli(
    data: &[u8],
    quality: u32,
    window: u32,
) -> Result<Vec<u8>, Box<dyn Error>> {
    let params = BrotliEncoderParams {
        quality: quality as i32,
        lgwin: window as i32,
        size_hint: data.len(),
        ..Default::default()
    };
    let mut output: Vec<u8> = Vec::with_capacity(data.len() / 2);
    let mut input = data;
    BrotliCompress(&mut input, &mut output, &params)?;
    Ok(output)
}

/// Tables in the order they are stored: ascending tag order except that `loca`
/// immediately follows `glyf`
fn storage_order(sfnt: &Sfnt) -> Vec<(font_types::Tag, &Table)> {
    let mut order = Vec::with_capacity(sfnt.num_tables());
    for (&tag, table) in sfnt.tables() {
        if tag == LOCA {
            continue;
        }
        order.push((tag, table));
        if tag == GLYF {
            if let Some(loca) = sfnt.table(LOCA) {
                order.push((LOCA, loca));
            }
        }
    }
    order
}

/// Encode a raw sfnt as WOFF2 using the supplied brotli encoder. Every table is
/// stored with the null transform.
#[allow(clippy::type_complexity)]
pub fn compress_woff2_with_brotli(
    sfnt_data: &[u8],
    compress_brotli: &mut dyn FnMut(&[u8]) -> Result<Vec<u8>, Box<dyn Error>>,
) -> Result<Vec<u8>, ConvertError> {
    let version = Reader::new(sfnt_data).read_u32()?;
    bail_if!(
        version == TTC_FLAVOR,
        ConvertError::UnsupportedFormat("font collection".to_string())
    );
    bail_if!(!is_sfnt_version(version), ConvertError::UnknownFlavor(version));

    let sfnt = read_otf(sfnt_data)?;
    bail_if!(
        sfnt.table(GLYF).is_some() != sfnt.table(LOCA).is_some(),
        ConvertError::Malformed("font has only one of glyf and loca")
    );
    bail_if!(
        sfnt.num_tables() == 0,
        ConvertError::Malformed("font has no tables")
    );

    let tables = storage_order(&sfnt);
    let entries: Vec<Woff2TableEntry> = tables
        .iter()
        .map(|(tag, table)| Woff2TableEntry::null_transform(*tag, table.len() as u32))
        .collect();

    let mut stream: Vec<u8> = Vec::with_capacity(tables.iter().map(|(_, table)| table.len()).sum());
    for (_, table) in &tables {
        stream.extend_from_slice(table.data());
    }
    let compressed = compress_brotli(&stream).map_err(|err| ConvertError::Codec(err.to_string()))?;

    let directory_size: usize = entries.iter().map(Woff2TableEntry::size).sum();
    let total_length = Round4!(WOFF2_HEADER_SIZE + directory_size + compressed.len());

    let mut out = Writer::with_capacity(total_length);
    Woff2Header {
        signature: WOFF2_SIGNATURE,
        flavor: sfnt.version(),
        length: total_length as u32,
        num_tables: entries.len() as u16,
        total_sfnt_size: sfnt_size(&sfnt) as u32,
        total_compressed_size: compressed.len() as u32,
        major_version: 0,
        minor_version: 0,
        meta_offset: 0,
        meta_length: 0,
        meta_orig_length: 0,
        priv_offset: 0,
        priv_length: 0,
    }
    .write(&mut out);
    for entry in &entries {
        entry.write(&mut out);
    }
    out.write_bytes(&compressed);
    out.pad_to_4();
    debug_assert_eq!(out.len(), total_length);

    log::debug!(
        "encoded {} tables as WOFF2: {} bytes of table data compressed to {}",
        entries.len(),
        stream.len(),
        compressed.len()
    );

    Ok(out.into_inner())
}
