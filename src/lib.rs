//! Pure Rust conversion between font container formats: raw OpenType/TrueType
//! (sfnt), WOFF and WOFF2.
//!
//! ```no_run
//! use fontcast::{Converter, FontFormat, detect_format};
//!
//! let data = std::fs::read("font.woff2").unwrap();
//! assert_eq!(detect_format(&data), FontFormat::Woff2);
//!
//! let converter = Converter::with_brotli();
//! let otf = converter.to_otf(&data).expect("conversion failed");
//! let woff = converter.to_woff(&otf).expect("conversion failed");
//! # let _ = woff;
//! ```

pub mod buffer;
pub mod convert;
pub mod error;
pub mod format;
pub mod otf;
pub mod parse;
pub mod sfnt;
pub mod table_tags;
pub mod tag;
#[cfg(feature = "woff2")]
mod variable_length;
pub mod woff;
pub mod woff2;

pub use convert::{ConvertOptions, Converter, read_as_sfnt};
pub use error::ConvertError;
pub use format::{FontFormat, detect_format, filename_suffix};
pub use otf::{build_otf, read_otf};
pub use sfnt::{Sfnt, Table};
pub use woff::{build_woff, read_woff};
pub use woff2::{FnWoff2Codec, Woff2Codec};

#[cfg(feature = "woff2")]
pub use woff2::BrotliWoff2;

// Round a value up to the nearest multiple of 4. Don't round the value in the
// case that rounding up overflows.
//
// Implemented as a macro to make it generic over the type without horrible type bounds
macro_rules! Round4 {
    ($value:expr) => {
        match $value.checked_add(3) {
            Some(value_plus_3) => value_plus_3 & !3,
            None => $value,
        }
    };
}
pub(crate) use Round4;
