use crate::{buffer::Reader, error::ConvertError};

/// A fixed layout record that can be read from the current position of a [`Reader`]
pub trait Parse: Sized {
    /// Size of the record in bytes
    const SIZE: usize;

    fn parse(input: &mut Reader<'_>) -> Result<Self, ConvertError>;
}
