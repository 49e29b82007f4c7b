//! Fonts shared by the integration tests

#![allow(dead_code)]

use font_types::Tag;
use fontcast::{
    Sfnt,
    buffer::Reader,
    otf::{OffsetTable, TableRecord, build_otf, update_checksum_adjustment},
    parse::Parse,
    tag::calculate_table_checksum,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

pub const HEAD: Tag = Tag::new(b"head");

/// `len` bytes of noise that zlib cannot shrink
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill(&mut data[..]);
    data
}

fn head_table() -> Vec<u8> {
    let mut head = vec![0u8; 54];
    head[0..4].copy_from_slice(&0x00010000u32.to_be_bytes()); // version
    head[4..8].copy_from_slice(&0x00020000u32.to_be_bytes()); // fontRevision
    head[12..16].copy_from_slice(&0x5F0F3CF5u32.to_be_bytes()); // magicNumber
    head[18..20].copy_from_slice(&1000u16.to_be_bytes()); // unitsPerEm
    head
}

fn hhea_table(num_hmetrics: u16) -> Vec<u8> {
    let mut hhea = vec![0u8; 36];
    hhea[0..4].copy_from_slice(&0x00010000u32.to_be_bytes());
    hhea[4..6].copy_from_slice(&800i16.to_be_bytes()); // ascender
    hhea[6..8].copy_from_slice(&(-200i16).to_be_bytes()); // descender
    hhea[34..36].copy_from_slice(&num_hmetrics.to_be_bytes());
    hhea
}

/// Text that compresses well but not absurdly well
fn prose(seed: usize, len: usize) -> Vec<u8> {
    const WORDS: [&str; 8] = [
        "glyph ", "outline ", "kerning ", "hinting ", "cmap ", "advance ", "ligature ", "serif ",
    ];
    let mut out = Vec::with_capacity(len);
    let mut i = seed;
    while out.len() < len {
        out.extend_from_slice(WORDS[i % WORDS.len()].as_bytes());
        i = i * 7 + 3;
    }
    out.truncate(len);
    out
}

/// A TrueType flavored font with eleven tables, including a random one
pub fn eleven_table_sfnt() -> Sfnt {
    let tables: [(&[u8; 4], Vec<u8>); 11] = [
        (b"OS/2", prose(1, 96)),
        (b"cmap", prose(2, 262)),
        (b"glyf", prose(3, 611)),
        (b"head", head_table()),
        (b"hhea", hhea_table(4)),
        (b"hmtx", prose(4, 24)),
        (b"loca", prose(5, 10)),
        (b"maxp", vec![0, 1, 0, 0, 0, 4]),
        (b"name", prose(6, 333)),
        (b"post", [0u8, 3, 0, 0].into_iter().chain([0; 28]).collect()),
        (b"zRnd", random_bytes(157, 11)),
    ];

    let mut sfnt = Sfnt::new(0x00010000);
    for (tag, data) in tables {
        // head's checksum is taken with checkSumAdjustment zeroed
        let checksum = calculate_table_checksum(&data);
        sfnt.add_table(Tag::new(tag), data, checksum);
    }
    sfnt
}

/// [`eleven_table_sfnt`] as a raw font with a correct `checkSumAdjustment`
pub fn eleven_table_font() -> Vec<u8> {
    let mut font = build_otf(&eleven_table_sfnt()).unwrap();
    update_checksum_adjustment(&mut font).unwrap();
    font
}

/// The table directory of a raw font
pub fn table_records(font: &[u8]) -> Vec<TableRecord> {
    let mut reader = Reader::new(font);
    let header = OffsetTable::parse(&mut reader).unwrap();
    (0..header.num_tables)
        .map(|_| TableRecord::parse(&mut reader).unwrap())
        .collect()
}
