//! Conversion between raw sfnt, WOFF and WOFF2

use crate::{
    error::ConvertError,
    format::{FontFormat, detect_format},
    otf::{build_otf, read_otf},
    sfnt::Sfnt,
    woff::{build_woff, read_woff},
    woff2::Woff2Codec,
};

#[cfg(feature = "woff2")]
use crate::woff2::BrotliWoff2;

pub const DEFAULT_ZLIB_LEVEL: u32 = 6;

/// Settings that affect the output of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    zlib_level: u32,
}

impl ConvertOptions {
    pub fn new() -> Self {
        ConvertOptions {
            zlib_level: DEFAULT_ZLIB_LEVEL,
        }
    }

    /// zlib compression level for WOFF tables, clamped to 0..=9
    pub fn with_zlib_level(mut self, level: u32) -> Self {
        self.zlib_level = level.min(9);
        self
    }

    pub fn zlib_level(&self) -> u32 {
        self.zlib_level
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a raw sfnt or WOFF file into the font model. WOFF2 needs a codec, see
/// [`Converter`].
pub fn read_as_sfnt(data: &[u8]) -> Result<Sfnt, ConvertError> {
    match detect_format(data) {
        FontFormat::Sfnt => read_otf(data),
        FontFormat::Woff => read_woff(data),
        format => Err(ConvertError::UnsupportedFormat(format!(
            "cannot read {format} input as sfnt"
        ))),
    }
}

/// Converts fonts between container formats.
///
/// Input is identified by its signature, so the same methods accept raw, WOFF and
/// WOFF2 data. Converting a font to the format it is already in returns a copy of the
/// input without looking at it any further.
#[derive(Debug, Clone, Default)]
pub struct Converter<C> {
    codec: C,
    options: ConvertOptions,
}

#[cfg(feature = "woff2")]
impl Converter<BrotliWoff2> {
    /// A converter using the built-in WOFF2 codec with default settings
    pub fn with_brotli() -> Self {
        Converter::new(BrotliWoff2::default())
    }
}

impl<C: Woff2Codec> Converter<C> {
    pub fn new(codec: C) -> Self {
        Converter {
            codec,
            options: ConvertOptions::default(),
        }
    }

    pub fn with_options(codec: C, options: ConvertOptions) -> Self {
        Converter { codec, options }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Convert to a raw sfnt, or `None` if the input is unsupported or broken
    pub fn to_otf(&self, data: &[u8]) -> Option<Vec<u8>> {
        self.convert(data, FontFormat::Sfnt)
    }

    /// Convert to WOFF, or `None` if the input is unsupported or broken
    pub fn to_woff(&self, data: &[u8]) -> Option<Vec<u8>> {
        self.convert(data, FontFormat::Woff)
    }

    /// Convert to WOFF2, or `None` if the input is unsupported or broken
    pub fn to_woff2(&self, data: &[u8]) -> Option<Vec<u8>> {
        self.convert(data, FontFormat::Woff2)
    }

    pub fn try_to_otf(&self, data: &[u8]) -> Result<Vec<u8>, ConvertError> {
        self.try_convert(data, FontFormat::Sfnt)
    }

    pub fn try_to_woff(&self, data: &[u8]) -> Result<Vec<u8>, ConvertError> {
        self.try_convert(data, FontFormat::Woff)
    }

    pub fn try_to_woff2(&self, data: &[u8]) -> Result<Vec<u8>, ConvertError> {
        self.try_convert(data, FontFormat::Woff2)
    }

    /// Like [`Converter::try_convert`] but logs the error and returns `None` on failure
    pub fn convert(&self, data: &[u8], target: FontFormat) -> Option<Vec<u8>> {
        match self.try_convert(data, target) {
            Ok(output) => Some(output),
            Err(err) => {
                log::warn!("conversion to {target} failed: {err}");
                None
            }
        }
    }

    /// Convert `data` to `target`
    pub fn try_convert(&self, data: &[u8], target: FontFormat) -> Result<Vec<u8>, ConvertError> {
        let source = detect_format(data);
        if source == FontFormat::Unsupported {
            return Err(ConvertError::UnsupportedFormat(
                "input is not a font this crate recognises".to_string(),
            ));
        }
        if source == target {
            log::debug!("input is already {target}");
            return Ok(data.to_vec());
        }
        log::debug!("converting {source} to {target}");

        let level = self.options.zlib_level;
        match (source, target) {
            (FontFormat::Sfnt, FontFormat::Woff) => build_woff(&read_otf(data)?, level),
            (FontFormat::Sfnt, FontFormat::Woff2) => self.codec.compress(data),
            (FontFormat::Woff, FontFormat::Sfnt) => build_otf(&read_woff(data)?),
            (FontFormat::Woff, FontFormat::Woff2) => {
                self.codec.compress(&build_otf(&read_woff(data)?)?)
            }
            (FontFormat::Woff2, FontFormat::Sfnt) => self.codec.uncompress(data),
            (FontFormat::Woff2, FontFormat::Woff) => {
                let sfnt = read_otf(&self.codec.uncompress(data)?)?;
                build_woff(&sfnt, level)
            }
            (_, target) => Err(ConvertError::UnsupportedFormat(format!(
                "cannot convert {source} to {target}"
            ))),
        }
    }
}
