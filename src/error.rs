use font_types::Tag;

/// Everything that can go wrong while reading or writing a font container
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("invalid tag {0:?}: tags must be exactly 4 characters")]
    InvalidTag(String),
    #[error("out of bounds: needed {requested} bytes but only {available} are available")]
    OutOfBounds { requested: usize, available: usize },
    #[error("table '{tag}' at offset {offset} is not four-byte aligned")]
    MisalignedTable { tag: Tag, offset: u32 },
    #[error("checksum mismatch in table '{tag}': computed {computed:#010x}, stored {stored:#010x}")]
    ChecksumMismatch { tag: Tag, computed: u32, stored: u32 },
    #[error("invalid signature {0:#010x}")]
    InvalidSignature(u32),
    #[error("unknown sfnt flavor {0:#010x}")]
    UnknownFlavor(u32),
    #[error("header declares a length of {declared} bytes but the buffer is {actual} bytes")]
    LengthMismatch { declared: u32, actual: usize },
    #[error("decompressed {} to {actual} bytes, expected {expected}", table_name(.tag))]
    DecompressionSizeMismatch {
        tag: Option<Tag>,
        expected: usize,
        actual: usize,
    },
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("malformed font data: {0}")]
    Malformed(&'static str),
    #[error("codec failure: {0}")]
    Codec(String),
}

fn table_name(tag: &Option<Tag>) -> String {
    match tag {
        Some(tag) => format!("table '{tag}'"),
        None => "font data".to_string(),
    }
}

impl From<bytes::TryGetError> for ConvertError {
    fn from(value: bytes::TryGetError) -> Self {
        Self::OutOfBounds {
            requested: value.requested,
            available: value.available,
        }
    }
}

pub(crate) fn usize_will_overflow(a: usize, b: usize) -> bool {
    a.checked_add(b).is_none()
}

pub(crate) fn u32_will_overflow(a: u32, b: u32) -> bool {
    a.checked_add(b).is_none()
}

macro_rules! bail {
    ($err: expr) => {
        return Err($err)
    };
}
pub(crate) use bail;

macro_rules! bail_if {
    ($cond: expr, $err: expr) => {
        if $cond {
            return Err($err);
        }
    };
}
pub(crate) use bail_if;

/// Like `bail_if!` but also logs a formatted message at debug level.
macro_rules! bail_with_msg_if {
    ($cond: expr, $err: expr, $($msg:tt)*) => {
        if $cond {
            log::debug!($($msg)*);
            return Err($err);
        }
    };
}
pub(crate) use bail_with_msg_if;
