//! Bounds-checked field access
//!
//! Every read from and write into a frame goes through [`read_field`] or
//! [`write_field`]. An access that falls outside the frame means the layout
//! itself is broken, so it is reported as a [`DecodeError`] (or encode error)
//! instead of being treated as stream noise.

use core::fmt;

/// A named region of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    Header,
    Length,
    Command,
    Data,
    Tail,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Header => "header",
            Field::Length => "length",
            Field::Command => "command",
            Field::Data => "data",
            Field::Tail => "tail",
        };
        f.write_str(name)
    }
}

/// Position and width of a fixed field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FieldSpan {
    /// Offset from the start of the frame
    pub offset: usize,
    /// Width in bytes
    pub size: usize,
}

impl FieldSpan {
    /// One past the last byte of the field
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    /// Whether two spans share at least one byte
    pub fn overlaps(&self, other: &FieldSpan) -> bool {
        self.size > 0 && other.size > 0 && self.offset < other.end() && other.offset < self.end()
    }
}

/// Configuration fault raised while decoding
///
/// Never produced by stream contents alone: a correctly-sized frame was
/// present, but the layout asked for bytes outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// A field lies (partly) outside the frame it belongs to
    FieldOutOfRange {
        field: Field,
        offset: usize,
        size: usize,
        frame_len: usize,
    },
    /// A field is wider than the packet can hold
    Capacity(Field),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::FieldOutOfRange {
                field,
                offset,
                size,
                frame_len,
            } => write!(
                f,
                "{field} field at offset {offset} (size {size}) lies outside a {frame_len}-byte frame"
            ),
            DecodeError::Capacity(field) => write!(f, "{field} field exceeds packet capacity"),
        }
    }
}

/// Read `size` bytes at `offset` from `frame`
pub fn read_field(frame: &[u8], field: Field, offset: usize, size: usize) -> Result<&[u8], DecodeError> {
    offset
        .checked_add(size)
        .and_then(|end| frame.get(offset..end))
        .ok_or(DecodeError::FieldOutOfRange {
            field,
            offset,
            size,
            frame_len: frame.len(),
        })
}

/// Copy `bytes` into `frame` at `offset`
///
/// Returns the offending field when the write would leave the frame.
pub fn write_field(frame: &mut [u8], field: Field, offset: usize, bytes: &[u8]) -> Result<(), Field> {
    let end = offset.checked_add(bytes.len()).ok_or(field)?;
    let slot = frame.get_mut(offset..end).ok_or(field)?;
    slot.copy_from_slice(bytes);
    Ok(())
}

/// Interpret up to four bytes as an unsigned little-endian integer
pub fn le_value(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .enumerate()
        .fold(0u32, |acc, (i, &b)| acc | (u32::from(b) << (8 * i)))
}

/// Encode `value` as `size` little-endian bytes (`size <= 4`)
pub fn le_bytes(value: u32, size: usize) -> heapless::Vec<u8, 4> {
    value.to_le_bytes().iter().take(size).copied().collect()
}

/// Index of the first occurrence of `needle` in `haystack`
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}
