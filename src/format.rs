//! Container format detection from a font's first four bytes

use std::{fmt, str::FromStr};

use crate::error::ConvertError;

pub const SFNT_VERSION_OTTO: u32 = 0x4f54544f; // "OTTO"
pub const SFNT_VERSION_TRUE: u32 = 0x74727565; // "true"
pub const SFNT_VERSION_TYP1: u32 = 0x74797031; // "typ1"
pub const SFNT_VERSION_V1: u32 = 0x00010000;

pub const WOFF_SIGNATURE: u32 = 0x774f4646; // "wOFF"
pub const WOFF2_SIGNATURE: u32 = 0x774f4632; // "wOF2"

/// The container formats this crate can read and write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFormat {
    /// A raw OpenType or TrueType font
    Sfnt,
    Woff,
    Woff2,
    Unsupported,
}

impl FontFormat {
    /// The file extension conventionally used for this format.
    ///
    /// Raw fonts may be either `otf` or `ttf`; see [`filename_suffix`] to tell them
    /// apart from actual font data.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            FontFormat::Sfnt => Some("otf"),
            FontFormat::Woff => Some("woff"),
            FontFormat::Woff2 => Some("woff2"),
            FontFormat::Unsupported => None,
        }
    }
}

impl fmt::Display for FontFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FontFormat::Sfnt => "otf",
            FontFormat::Woff => "woff",
            FontFormat::Woff2 => "woff2",
            FontFormat::Unsupported => "unsupported",
        })
    }
}

impl FromStr for FontFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "otf" | "ttf" | "sfnt" => Ok(FontFormat::Sfnt),
            "woff" => Ok(FontFormat::Woff),
            "woff2" => Ok(FontFormat::Woff2),
            _ => Err(ConvertError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Whether `version` is one of the sfnt versions a raw font may start with
pub fn is_sfnt_version(version: u32) -> bool {
    matches!(
        version,
        SFNT_VERSION_OTTO | SFNT_VERSION_TRUE | SFNT_VERSION_TYP1 | SFNT_VERSION_V1
    )
}

fn read_version(data: &[u8]) -> Option<u32> {
    data.first_chunk::<4>().map(|bytes| u32::from_be_bytes(*bytes))
}

/// Classify `data` by its leading signature. Never fails: anything unrecognised,
/// including buffers shorter than 4 bytes, is [`FontFormat::Unsupported`].
pub fn detect_format(data: &[u8]) -> FontFormat {
    match read_version(data) {
        Some(version) if is_sfnt_version(version) => FontFormat::Sfnt,
        Some(WOFF_SIGNATURE) => FontFormat::Woff,
        Some(WOFF2_SIGNATURE) => FontFormat::Woff2,
        _ => FontFormat::Unsupported,
    }
}

/// The file extension `data` should be saved with: `otf` for CFF flavored fonts,
/// `ttf` for TrueType flavored ones, `woff` or `woff2`.
pub fn filename_suffix(data: &[u8]) -> Option<&'static str> {
    match read_version(data)? {
        SFNT_VERSION_OTTO => Some("otf"),
        SFNT_VERSION_TRUE | SFNT_VERSION_TYP1 | SFNT_VERSION_V1 => Some("ttf"),
        WOFF_SIGNATURE => Some("woff"),
        WOFF2_SIGNATURE => Some("woff2"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_table() {
        assert_eq!(detect_format(&[0x4F, 0x54, 0x54, 0x4F]), FontFormat::Sfnt);
        assert_eq!(detect_format(&[0x00, 0x01, 0x00, 0x00]), FontFormat::Sfnt);
        assert_eq!(detect_format(b"true"), FontFormat::Sfnt);
        assert_eq!(detect_format(b"typ1"), FontFormat::Sfnt);
        assert_eq!(detect_format(&[0x77, 0x4F, 0x46, 0x46]), FontFormat::Woff);
        assert_eq!(detect_format(&[0x77, 0x4F, 0x46, 0x32]), FontFormat::Woff2);
        assert_eq!(detect_format(&[]), FontFormat::Unsupported);
        assert_eq!(detect_format(b"wOF"), FontFormat::Unsupported);
        assert_eq!(detect_format(b"ttcf"), FontFormat::Unsupported);
        assert_eq!(detect_format(b"\x00\x02\x00\x00"), FontFormat::Unsupported);
    }

    #[test]
    fn only_first_four_bytes_matter() {
        assert_eq!(detect_format(b"wOFFgarbage"), FontFormat::Woff);
        assert_eq!(detect_format(b"xwOFF"), FontFormat::Unsupported);
    }

    #[test]
    fn suffixes() {
        assert_eq!(filename_suffix(b"OTTO\0\0"), Some("otf"));
        assert_eq!(filename_suffix(&[0, 1, 0, 0]), Some("ttf"));
        assert_eq!(filename_suffix(b"true"), Some("ttf"));
        assert_eq!(filename_suffix(b"typ1"), Some("ttf"));
        assert_eq!(filename_suffix(b"wOFF"), Some("woff"));
        assert_eq!(filename_suffix(b"wOF2"), Some("woff2"));
        assert_eq!(filename_suffix(b"abcd"), None);
        assert_eq!(filename_suffix(b""), None);
    }

    #[test]
    fn parse_format_names() {
        assert_eq!("ttf".parse::<FontFormat>().unwrap(), FontFormat::Sfnt);
        assert_eq!("OTF".parse::<FontFormat>().unwrap(), FontFormat::Sfnt);
        assert_eq!("woff".parse::<FontFormat>().unwrap(), FontFormat::Woff);
        assert_eq!("woff2".parse::<FontFormat>().unwrap(), FontFormat::Woff2);
        assert!("eot".parse::<FontFormat>().is_err());
        assert_eq!(FontFormat::Woff2.to_string(), "woff2");
    }
}
