mod common;

use common::{HEAD, eleven_table_font, eleven_table_sfnt, random_bytes, table_records};
use font_types::Tag;
use fontcast::{
    ConvertError, ConvertOptions, Converter, FnWoff2Codec, FontFormat, Sfnt, build_otf,
    build_woff, detect_format, filename_suffix,
    buffer::Reader,
    parse::Parse,
    read_otf, read_woff,
    tag::calculate_table_checksum,
    woff::{WoffHeader, WoffTableEntry},
};
use pretty_assertions::assert_eq;

/// A converter whose WOFF2 side is never reached
fn woff_only() -> Converter<impl fontcast::Woff2Codec> {
    Converter::new(FnWoff2Codec::new(
        |_: &[u8]| Err(ConvertError::Codec("no WOFF2 encoder".to_string())),
        |_: &[u8]| Err(ConvertError::Codec("no WOFF2 decoder".to_string())),
    ))
}

fn woff_entries(woff: &[u8]) -> Vec<WoffTableEntry> {
    let mut reader = Reader::new(woff);
    let header = WoffHeader::parse(&mut reader).unwrap();
    (0..header.num_tables)
        .map(|_| WoffTableEntry::parse(&mut reader).unwrap())
        .collect()
}

#[test]
fn raw_font_round_trips_through_the_model() {
    let font = eleven_table_font();
    let sfnt = read_otf(&font).unwrap();
    assert_eq!(sfnt.num_tables(), 11);
    assert_eq!(build_otf(&sfnt).unwrap(), font);
}

#[test]
fn woff_round_trip_keeps_the_table_directory() {
    let converter = woff_only();
    let font = eleven_table_font();
    let woff = converter.to_woff(&font).unwrap();
    assert_eq!(detect_format(&woff), FontFormat::Woff);
    assert_eq!(filename_suffix(&woff), Some("woff"));

    let back = converter.to_otf(&woff).unwrap();
    let summary = |font: &[u8]| {
        table_records(font)
            .into_iter()
            .map(|record| (record.tag, record.checksum, record.length))
            .collect::<Vec<_>>()
    };
    assert_eq!(summary(&back), summary(&font));
    assert_eq!(back, font);
}

#[test]
fn equivalent_models_from_every_container() {
    let font = eleven_table_font();
    let woff = build_woff(&read_otf(&font).unwrap(), 9).unwrap();
    let from_otf = read_otf(&font).unwrap();
    let from_woff = read_woff(&woff).unwrap();
    assert_eq!(from_otf.num_tables(), from_woff.num_tables());
    assert_eq!(from_otf.tags().collect::<Vec<_>>(), from_woff.tags().collect::<Vec<_>>());
    assert_eq!(from_otf, from_woff);
}

#[test]
fn corrupt_tables_fail_their_checksum() {
    let font = eleven_table_font();
    for record in table_records(&font) {
        let mut corrupt = font.clone();
        corrupt[record.offset as usize] ^= 0xff;
        let result = read_otf(&corrupt);
        if record.tag == HEAD {
            assert!(result.is_ok());
        } else {
            assert!(
                matches!(
                    result,
                    Err(ConvertError::ChecksumMismatch { tag, .. }) if tag == record.tag
                ),
                "{} was accepted",
                record.tag
            );
        }
    }
}

#[test]
fn corrupt_woff_tables_fail_their_checksum() {
    // level 0 never wins against the raw table, so every payload is stored as is
    let woff = build_woff(&read_otf(&eleven_table_font()).unwrap(), 0).unwrap();
    for entry in woff_entries(&woff) {
        assert!(!entry.is_compressed());
        let mut corrupt = woff.clone();
        corrupt[entry.offset as usize] ^= 0xff;
        let result = read_woff(&corrupt);
        if entry.tag == HEAD {
            assert!(result.is_ok());
        } else {
            assert!(matches!(
                result,
                Err(ConvertError::ChecksumMismatch { tag, .. }) if tag == entry.tag
            ));
        }
    }
}

#[test]
fn misaligned_tables_are_rejected() {
    let font = eleven_table_font();
    for (i, record) in table_records(&font).into_iter().enumerate() {
        let field = 12 + 16 * i + 8;
        let mut shifted = font.clone();
        shifted[field..field + 4].copy_from_slice(&(record.offset + 1).to_be_bytes());
        assert_eq!(
            read_otf(&shifted),
            Err(ConvertError::MisalignedTable {
                tag: record.tag,
                offset: record.offset + 1,
            })
        );
    }
}

#[test]
fn woff_header_is_validated() {
    let font = eleven_table_font();
    assert_eq!(read_woff(&font), Err(ConvertError::InvalidSignature(0x00010000)));

    let woff = build_woff(&read_otf(&font).unwrap(), 6).unwrap();
    let mut padded = woff.clone();
    padded.extend_from_slice(&[0; 4]);
    assert_eq!(
        read_woff(&padded),
        Err(ConvertError::LengthMismatch {
            declared: woff.len() as u32,
            actual: woff.len() + 4,
        })
    );

    let mut flavored = woff.clone();
    flavored[4..8].copy_from_slice(b"abcd");
    assert_eq!(read_woff(&flavored), Err(ConvertError::UnknownFlavor(0x61626364)));
}

#[test]
fn format_detection() {
    let cases: [(&[u8], FontFormat); 9] = [
        (b"\x00\x01\x00\x00rest", FontFormat::Sfnt),
        (b"OTTO", FontFormat::Sfnt),
        (b"true", FontFormat::Sfnt),
        (b"typ1", FontFormat::Sfnt),
        (b"wOFF", FontFormat::Woff),
        (b"wOF2", FontFormat::Woff2),
        (b"ttcf", FontFormat::Unsupported),
        (b"wOF", FontFormat::Unsupported),
        (b"", FontFormat::Unsupported),
    ];
    for (data, expected) in cases {
        assert_eq!(detect_format(data), expected, "{data:?}");
    }
    assert_eq!(filename_suffix(b"OTTO"), Some("otf"));
    assert_eq!(filename_suffix(b"true"), Some("ttf"));
    assert_eq!(filename_suffix(b"ttcf"), None);
}

#[test]
fn incompressible_tables_are_stored() {
    let noise = random_bytes(2048, 7);
    let text = b"abcdefgh".repeat(256);
    let mut sfnt = Sfnt::new(0x4f54544f);
    sfnt.add_table(Tag::new(b"zzzz"), noise.clone(), calculate_table_checksum(&noise));
    sfnt.add_table(Tag::new(b"name"), text.clone(), calculate_table_checksum(&text));

    let woff = build_woff(&sfnt, 9).unwrap();
    let entries = woff_entries(&woff);
    let name = entries.iter().find(|e| e.tag == Tag::new(b"name")).unwrap();
    let zzzz = entries.iter().find(|e| e.tag == Tag::new(b"zzzz")).unwrap();
    assert!(name.comp_length < name.orig_length);
    assert_eq!(zzzz.comp_length, zzzz.orig_length);
    assert_eq!(&woff[zzzz.offset as usize..][..noise.len()], noise.as_slice());
    assert_eq!(read_woff(&woff).unwrap(), sfnt);
}

#[test]
fn zlib_level_changes_the_output() {
    let font = eleven_table_font();
    let stored = Converter::with_options(
        woff_only().codec(),
        ConvertOptions::new().with_zlib_level(0),
    )
    .to_woff(&font)
    .unwrap();
    let best = woff_only().to_woff(&font).unwrap();
    assert!(best.len() < stored.len());
    assert_eq!(read_woff(&best).unwrap(), read_woff(&stored).unwrap());
}

#[test]
fn failing_codec_yields_none() {
    let converter = woff_only();
    let font = eleven_table_font();
    assert_eq!(converter.to_woff2(&font), None);
    assert_eq!(converter.to_otf(b"wOF2 and then some"), None);
    assert_eq!(
        converter.try_to_woff2(&font),
        Err(ConvertError::Codec("no WOFF2 encoder".to_string()))
    );
}

#[test]
fn unsupported_input_yields_none() {
    let converter = woff_only();
    let mut collection = b"ttcf".to_vec();
    collection.extend_from_slice(&eleven_table_font());
    let inputs: [&[u8]; 3] = [&collection, b"", b"GIF89a"];
    for data in inputs {
        assert_eq!(converter.to_otf(data), None);
        assert_eq!(converter.to_woff(data), None);
        assert_eq!(converter.to_woff2(data), None);
    }
}

#[test]
fn broken_woff_yields_none() {
    let converter = woff_only();
    let mut woff = converter.to_woff(&eleven_table_font()).unwrap();
    woff.truncate(woff.len() - 8);
    assert_eq!(converter.to_otf(&woff), None);
    assert!(matches!(
        converter.try_to_otf(&woff),
        Err(ConvertError::LengthMismatch { .. })
    ));
}

#[test]
fn woff_table_past_the_end_yields_none() {
    let converter = woff_only();
    let mut woff = converter.to_woff(&eleven_table_font()).unwrap();
    let last_entry = 44 + 20 * 10;
    let end = woff.len() as u32;
    woff[last_entry + 4..last_entry + 8].copy_from_slice(&end.to_be_bytes());
    assert!(matches!(read_woff(&woff), Err(ConvertError::OutOfBounds { .. })));
    assert!(matches!(converter.try_to_otf(&woff), Err(ConvertError::OutOfBounds { .. })));
    assert_eq!(converter.to_otf(&woff), None);
}

#[cfg(feature = "woff2")]
mod woff2 {
    use super::*;
    use pretty_assertions::assert_eq;
    use fontcast::{
        BrotliWoff2, Woff2Codec,
        woff2::{WOFF2_HEADER_SIZE, Woff2Header},
    };

    #[test]
    fn otf_round_trip_is_exact() {
        let converter = Converter::with_brotli();
        let font = eleven_table_font();
        let woff2 = converter.to_woff2(&font).unwrap();
        assert_eq!(detect_format(&woff2), FontFormat::Woff2);
        assert_eq!(woff2.len() % 4, 0);
        assert!(woff2.len() < font.len());
        assert_eq!(converter.to_otf(&woff2).unwrap(), font);
    }

    #[test]
    fn header_describes_the_font() {
        let font = eleven_table_font();
        let woff2 = BrotliWoff2::default().compress(&font).unwrap();
        let header = Woff2Header::parse(&mut Reader::new(&woff2)).unwrap();
        assert_eq!(header.flavor, 0x00010000);
        assert_eq!(header.num_tables, 11);
        assert_eq!(header.length as usize, woff2.len());
        assert_eq!(header.total_sfnt_size as usize, font.len());
        assert!(woff2.len() > WOFF2_HEADER_SIZE);
    }

    #[test]
    fn woff_round_trips_through_woff2() {
        let converter = Converter::with_brotli();
        let woff = converter.to_woff(&eleven_table_font()).unwrap();
        let woff2 = converter.to_woff2(&woff).unwrap();
        assert_eq!(converter.to_woff(&woff2).unwrap(), woff);
        let otf = converter.to_otf(&woff2).unwrap();
        assert_eq!(read_woff(&woff).unwrap(), read_otf(&otf).unwrap());
    }

    #[test]
    fn quality_does_not_change_the_decoded_font() {
        let font = eleven_table_font();
        for quality in [0, 5, 11] {
            let codec = BrotliWoff2::new(quality, 16);
            let woff2 = codec.compress(&font).unwrap();
            assert_eq!(codec.uncompress(&woff2).unwrap(), font);
        }
    }

    #[test]
    fn truncated_woff2_is_rejected() {
        let converter = Converter::with_brotli();
        let mut woff2 = converter.to_woff2(&eleven_table_font()).unwrap();
        let declared = woff2.len() as u32;
        woff2.truncate(woff2.len() - 4);
        assert_eq!(converter.to_otf(&woff2), None);
        assert_eq!(
            converter.try_to_otf(&woff2),
            Err(ConvertError::LengthMismatch {
                declared,
                actual: woff2.len(),
            })
        );
    }

    #[test]
    fn every_table_survives_woff2() {
        let converter = Converter::with_brotli();
        let sfnt = eleven_table_sfnt();
        let woff2 = converter.to_woff2(&build_otf(&sfnt).unwrap()).unwrap();
        let otf = converter.to_otf(&woff2).unwrap();
        let decoded = read_otf(&otf).unwrap();
        for (tag, table) in sfnt.tables() {
            if *tag == HEAD {
                continue;
            }
            assert_eq!(decoded.table(*tag), Some(table), "{tag}");
        }
    }
}
