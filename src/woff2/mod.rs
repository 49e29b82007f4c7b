//! WOFF2 support
//!
//! Converting to and from WOFF2 goes through a [`Woff2Codec`]: an object that turns a
//! raw sfnt into a WOFF2 file and back. [`BrotliWoff2`] is the built-in implementation;
//! [`FnWoff2Codec`] adapts a pair of closures so that any other encoder can be used.

use crate::error::ConvertError;

#[cfg(feature = "woff2")]
mod decode;
#[cfg(feature = "woff2")]
mod encode;
#[cfg(feature = "woff2")]
mod glyf_decoder;
#[cfg(feature = "woff2")]
mod header;
#[cfg(feature = "woff2")]
mod hmtx_decoder;

#[cfg(feature = "woff2")]
pub use decode::{decompress_woff2, decompress_woff2_with_brotli};
#[cfg(feature = "woff2")]
pub use encode::compress_woff2_with_brotli;
#[cfg(feature = "woff2")]
pub use header::{WOFF2_HEADER_SIZE, Woff2Header, Woff2TableEntry};

/// Converts between raw sfnt data and WOFF2.
///
/// Both methods take the input by reference, leave it untouched, and return a freshly
/// allocated buffer.
pub trait Woff2Codec {
    /// Encode a raw sfnt as WOFF2
    fn compress(&self, sfnt: &[u8]) -> Result<Vec<u8>, ConvertError>;
    /// Decode a WOFF2 file into a raw sfnt
    fn uncompress(&self, woff2: &[u8]) -> Result<Vec<u8>, ConvertError>;
}

impl<T: Woff2Codec + ?Sized> Woff2Codec for &T {
    fn compress(&self, sfnt: &[u8]) -> Result<Vec<u8>, ConvertError> {
        (**self).compress(sfnt)
    }

    fn uncompress(&self, woff2: &[u8]) -> Result<Vec<u8>, ConvertError> {
        (**self).uncompress(woff2)
    }
}

impl<T: Woff2Codec + ?Sized> Woff2Codec for Box<T> {
    fn compress(&self, sfnt: &[u8]) -> Result<Vec<u8>, ConvertError> {
        (**self).compress(sfnt)
    }

    fn uncompress(&self, woff2: &[u8]) -> Result<Vec<u8>, ConvertError> {
        (**self).uncompress(woff2)
    }
}

/// A [`Woff2Codec`] built from two closures
///
/// ```
/// use fontcast::{ConvertError, woff2::{FnWoff2Codec, Woff2Codec}};
///
/// let codec = FnWoff2Codec::new(
///     |_sfnt: &[u8]| Err(ConvertError::Codec("no encoder".into())),
///     |_woff2: &[u8]| Err(ConvertError::Codec("no decoder".into())),
/// );
/// assert!(codec.compress(b"OTTO").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct FnWoff2Codec<C, U> {
    compress: C,
    uncompress: U,
}

impl<C, U> FnWoff2Codec<C, U>
where
    C: Fn(&[u8]) -> Result<Vec<u8>, ConvertError>,
    U: Fn(&[u8]) -> Result<Vec<u8>, ConvertError>,
{
    pub fn new(compress: C, uncompress: U) -> Self {
        FnWoff2Codec {
            compress,
            uncompress,
        }
    }
}

impl<C, U> Woff2Codec for FnWoff2Codec<C, U>
where
    C: Fn(&[u8]) -> Result<Vec<u8>, ConvertError>,
    U: Fn(&[u8]) -> Result<Vec<u8>, ConvertError>,
{
    fn compress(&self, sfnt: &[u8]) -> Result<Vec<u8>, ConvertError> {
        (self.compress)(sfnt)
    }

    fn uncompress(&self, woff2: &[u8]) -> Result<Vec<u8>, ConvertError> {
        (self.uncompress)(woff2)
    }
}

pub const DEFAULT_BROTLI_QUALITY: u32 = 11;
pub const DEFAULT_BROTLI_WINDOW: u32 = 22;

/// The built-in WOFF2 codec, backed by the `brotli` and `brotli-decompressor` crates.
///
/// Encoding stores every table with the null transform. Decoding supports the
/// transformed `glyf`, `loca` and `hmtx` tables produced by other encoders.
#[cfg(feature = "woff2")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrotliWoff2 {
    quality: u32,
    window: u32,
}

#[cfg(feature = "woff2")]
impl BrotliWoff2 {
    /// `quality` is clamped to 0..=11 and `window` (log2 of the window size) to 10..=24
    pub fn new(quality: u32, window: u32) -> Self {
        BrotliWoff2 {
            quality: quality.min(11),
            window: window.clamp(10, 24),
        }
    }

    pub fn quality(&self) -> u32 {
        self.quality
    }

    pub fn window(&self) -> u32 {
        self.window
    }
}

#[cfg(feature = "woff2")]
impl Default for BrotliWoff2 {
    fn default() -> Self {
        BrotliWoff2::new(DEFAULT_BROTLI_QUALITY, DEFAULT_BROTLI_WINDOW)
    }
}

#[cfg(feature = "woff2")]
impl Woff2Codec for BrotliWoff2 {
    fn compress(&self, sfnt: &[u8]) -> Result<Vec<u8>, ConvertError> {
        let (quality, window) = (self.quality, self.window);
        compress_woff2_with_brotli(sfnt, &mut |data| encode::compress_brotli(data, quality, window))
    }

    fn uncompress(&self, woff2: &[u8]) -> Result<Vec<u8>, ConvertError> {
        decompress_woff2(woff2)
    }
}
