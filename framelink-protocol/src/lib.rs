//! Serial Link Frame Protocol
//!
//! This crate decodes a byte stream from a half-duplex serial link into
//! discrete packets. The wire layout is not fixed: a [`FrameSpec`] describes
//! where the delimiters and fields sit, and the decoder works against any
//! valid layout.
//!
//! # Frame Layout
//!
//! The layout used by GYJ-0122 call units, as an example:
//! ```text
//! ┌────────┬──────┬─────────┬─────────────┬──────┐
//! │ HEADER │ SEQ  │ COMMAND │ DATA        │ TAIL │
//! │ 0x3C   │ 1B   │ 1B      │ 4B          │ 0x3E │
//! └────────┴──────┴─────────┴─────────────┴──────┘
//! ```
//!
//! A layout may also carry a little-endian length field, in which case the
//! data segment is variable-sized and bounded by
//! [`FrameLayout::max_declared_length`].
//!
//! # Resynchronization
//!
//! [`FrameSpec::try_extract`] never skips ahead on its own. It reports
//! [`Outcome::Invalid`] when the leading byte cannot start a frame and the
//! caller drops exactly that byte before trying again, so alignment is
//! regained one byte at a time after noise or a partial frame.

#![no_std]
#![deny(unsafe_code)]

pub mod decoder;
pub mod encoder;
pub mod field;
pub mod packet;
pub mod sequence;
pub mod spec;

pub use decoder::{Decoded, Misalignment, Outcome, TailAnchor};
pub use encoder::EncodeError;
pub use field::{DecodeError, Field, FieldSpan};
pub use packet::{Packet, PacketError};
pub use sequence::{SequenceCounter, SequenceError};
pub use spec::{
    FrameLayout, FrameSpec, SpecError, DEFAULT_MAX_DECLARED_LENGTH, MAX_COMMAND_LEN,
    MAX_DATA_SIZE, MAX_DELIMITER_LEN, MAX_FIELD_OFFSET, MAX_FRAME_SIZE, MAX_LENGTH_FIELD,
};
