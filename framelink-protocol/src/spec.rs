//! Frame layout description
//!
//! A [`FrameLayout`] is the plain configuration value (it is what a config
//! file deserializes into). [`FrameSpec::new`] validates it once; after that
//! a `FrameSpec` is immutable and every decode and encode runs against it.

use core::fmt;

use heapless::Vec;

use crate::field::{Field, FieldSpan};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum header or tail length in bytes
pub const MAX_DELIMITER_LEN: usize = 8;

/// Maximum command field width in bytes
pub const MAX_COMMAND_LEN: usize = 8;

/// Maximum data segment size in bytes
pub const MAX_DATA_SIZE: usize = 250;

/// Maximum length field width (u32 little-endian)
pub const MAX_LENGTH_FIELD: usize = 4;

/// Maximum offset of any field from the start of the frame
pub const MAX_FIELD_OFFSET: usize = 64;

/// Largest frame any valid layout can describe
pub const MAX_FRAME_SIZE: usize = MAX_FIELD_OFFSET + MAX_DATA_SIZE + MAX_DELIMITER_LEN;

/// Largest declared length accepted by default
pub const DEFAULT_MAX_DECLARED_LENGTH: u32 = 100;

/// Wire layout configuration
///
/// The default is the GYJ-0122 layout: header `0x3C`, a sequence byte at
/// offset 1, a one-byte command at offset 2, four data bytes at offset 3 and
/// a `0x3E` tail. There is no length field.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FrameLayout {
    /// Literal bytes every frame starts with
    pub header: Vec<u8, MAX_DELIMITER_LEN>,
    /// Literal bytes every frame ends with (empty: no tail delimiter)
    pub tail: Vec<u8, MAX_DELIMITER_LEN>,
    /// Offset of the little-endian length field
    pub length_offset: usize,
    /// Width of the length field (0: no length field)
    pub length_size: usize,
    /// Offset of the command field
    pub command_offset: usize,
    /// Width of the command field
    pub command_size: usize,
    /// Offset of the data segment
    pub data_offset: usize,
    /// Data segment size when there is no length field
    pub data_size: usize,
    /// Largest length field value accepted as a real frame
    pub max_declared_length: u32,
}

impl Default for FrameLayout {
    fn default() -> Self {
        let mut header = Vec::new();
        let _ = header.push(0x3C);
        let mut tail = Vec::new();
        let _ = tail.push(0x3E);
        Self {
            header,
            tail,
            length_offset: 0,
            length_size: 0,
            command_offset: 2,
            command_size: 1,
            data_offset: 3,
            data_size: 4,
            max_declared_length: DEFAULT_MAX_DECLARED_LENGTH,
        }
    }
}

/// Layout validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpecError {
    /// Header and tail are identical, so a tail could be read as a header
    AmbiguousDelimiters,
    /// Length field wider than four bytes
    LengthFieldTooWide(usize),
    /// Command field empty or wider than [`MAX_COMMAND_LEN`]
    InvalidCommandSize(usize),
    /// Data size above [`MAX_DATA_SIZE`]
    DataTooLarge(usize),
    /// Declared length bound above [`MAX_DATA_SIZE`]
    DeclaredLengthTooLarge(u32),
    /// Field starts inside the header
    FieldOverlapsHeader(Field),
    /// Field starts beyond [`MAX_FIELD_OFFSET`]
    OffsetTooLarge(Field),
    /// Two fields share bytes
    FieldsOverlap(Field, Field),
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecError::AmbiguousDelimiters => f.write_str("header and tail are identical"),
            SpecError::LengthFieldTooWide(size) => {
                write!(f, "length field of {size} bytes exceeds {MAX_LENGTH_FIELD}")
            }
            SpecError::InvalidCommandSize(size) => {
                write!(f, "command size {size} not in 1..={MAX_COMMAND_LEN}")
            }
            SpecError::DataTooLarge(size) => {
                write!(f, "data size {size} exceeds {MAX_DATA_SIZE}")
            }
            SpecError::DeclaredLengthTooLarge(len) => {
                write!(f, "max declared length {len} exceeds {MAX_DATA_SIZE}")
            }
            SpecError::FieldOverlapsHeader(field) => write!(f, "{field} field overlaps the header"),
            SpecError::OffsetTooLarge(field) => {
                write!(f, "{field} field offset exceeds {MAX_FIELD_OFFSET}")
            }
            SpecError::FieldsOverlap(a, b) => write!(f, "{a} and {b} fields overlap"),
        }
    }
}

/// Validated, immutable frame layout
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameSpec {
    layout: FrameLayout,
}

impl FrameSpec {
    /// Validate a layout
    ///
    /// Catches every fault that does not depend on stream contents. A field
    /// placed after a variable-length data segment can only be checked once
    /// the length is known, so the decoder reports that one.
    pub fn new(layout: FrameLayout) -> Result<Self, SpecError> {
        if !layout.header.is_empty() && layout.header == layout.tail {
            return Err(SpecError::AmbiguousDelimiters);
        }
        if layout.length_size > MAX_LENGTH_FIELD {
            return Err(SpecError::LengthFieldTooWide(layout.length_size));
        }
        if layout.command_size == 0 || layout.command_size > MAX_COMMAND_LEN {
            return Err(SpecError::InvalidCommandSize(layout.command_size));
        }
        if layout.data_size > MAX_DATA_SIZE {
            return Err(SpecError::DataTooLarge(layout.data_size));
        }
        if layout.max_declared_length as usize > MAX_DATA_SIZE {
            return Err(SpecError::DeclaredLengthTooLarge(layout.max_declared_length));
        }

        let spec = Self { layout };
        let header_len = spec.layout.header.len();
        let mut fields: Vec<(Field, FieldSpan), 3> = Vec::new();
        if let Some(span) = spec.length_field() {
            let _ = fields.push((Field::Length, span));
        }
        let _ = fields.push((Field::Command, spec.command_field()));
        let _ = fields.push((
            Field::Data,
            FieldSpan {
                offset: spec.layout.data_offset,
                size: spec.max_data_size(),
            },
        ));

        for (field, span) in &fields {
            if span.offset < header_len {
                return Err(SpecError::FieldOverlapsHeader(*field));
            }
            if span.offset > MAX_FIELD_OFFSET {
                return Err(SpecError::OffsetTooLarge(*field));
            }
        }
        for (i, (a, span_a)) in fields.iter().enumerate() {
            for (b, span_b) in fields.iter().skip(i + 1) {
                if span_a.overlaps(span_b) {
                    return Err(SpecError::FieldsOverlap(*a, *b));
                }
            }
        }

        Ok(spec)
    }

    /// The layout this spec was built from
    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn header(&self) -> &[u8] {
        &self.layout.header
    }

    pub fn tail(&self) -> &[u8] {
        &self.layout.tail
    }

    /// Length field position, if the layout has one
    pub fn length_field(&self) -> Option<FieldSpan> {
        (self.layout.length_size > 0).then_some(FieldSpan {
            offset: self.layout.length_offset,
            size: self.layout.length_size,
        })
    }

    pub fn command_field(&self) -> FieldSpan {
        FieldSpan {
            offset: self.layout.command_offset,
            size: self.layout.command_size,
        }
    }

    pub fn data_offset(&self) -> usize {
        self.layout.data_offset
    }

    /// Fixed data size, used when there is no length field
    pub fn data_size(&self) -> usize {
        self.layout.data_size
    }

    pub fn max_declared_length(&self) -> u32 {
        self.layout.max_declared_length
    }

    /// Largest data segment a frame can carry under this layout
    pub fn max_data_size(&self) -> usize {
        if self.length_field().is_some() {
            self.layout.max_declared_length as usize
        } else {
            self.layout.data_size
        }
    }

    /// Shortest buffer worth handing to the decoder
    pub fn minimum_frame_length(&self) -> usize {
        self.layout.header.len()
            + self.layout.length_size
            + self.layout.command_size
            + self.layout.tail.len()
    }

    /// Total frame length for a data segment of `data_len` bytes
    pub fn frame_length(&self, data_len: usize) -> usize {
        self.layout.data_offset + data_len + self.layout.tail.len()
    }

    /// Largest frame this layout can describe
    pub fn max_frame_length(&self) -> usize {
        let mut longest = self.frame_length(self.max_data_size());
        longest = longest.max(self.minimum_frame_length());
        longest = longest.max(self.command_field().end());
        if let Some(span) = self.length_field() {
            longest = longest.max(span.end());
        }
        longest
    }
}
