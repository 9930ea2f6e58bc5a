//! Frame encoding
//!
//! Two shapes are produced:
//! - [`FrameSpec::encode`] lays a [`Packet`] out exactly as the layout
//!   describes it, so the decoder gets the same packet back.
//! - [`FrameSpec::encode_envelope`] builds the short outgoing frames a host
//!   sends: header, sequence number, command, data, tail.

use core::fmt;

use heapless::Vec;

use crate::field::{find, le_bytes, write_field, Field};
use crate::packet::Packet;
use crate::spec::{FrameSpec, MAX_FRAME_SIZE};

/// Errors that can occur while encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// Output buffer too small for the frame
    BufferTooSmall,
    /// Packet header or tail differs from the layout's delimiters
    DelimiterMismatch(Field),
    /// Command width differs from the layout
    CommandSize { expected: usize, actual: usize },
    /// Data size differs from the layout's fixed size
    DataSize { expected: usize, actual: usize },
    /// Length value missing, unexpected, or not equal to the data size
    LengthMismatch,
    /// Data longer than the layout's declared length bound
    DeclaredLengthTooLarge(u32),
    /// A field would be written outside the frame
    FieldOutsideFrame(Field),
    /// Tail pattern occurs in the frame body; the frame would decode short
    TailInBody,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::BufferTooSmall => f.write_str("output buffer too small"),
            EncodeError::DelimiterMismatch(field) => {
                write!(f, "packet {field} does not match the layout")
            }
            EncodeError::CommandSize { expected, actual } => {
                write!(f, "command is {actual} bytes, layout expects {expected}")
            }
            EncodeError::DataSize { expected, actual } => {
                write!(f, "data is {actual} bytes, layout expects {expected}")
            }
            EncodeError::LengthMismatch => f.write_str("length field does not match the data"),
            EncodeError::DeclaredLengthTooLarge(len) => {
                write!(f, "data length {len} exceeds the declared length bound")
            }
            EncodeError::FieldOutsideFrame(field) => write!(f, "{field} field lies outside the frame"),
            EncodeError::TailInBody => f.write_str("tail pattern occurs inside the frame body"),
        }
    }
}

impl From<Field> for EncodeError {
    fn from(field: Field) -> Self {
        EncodeError::FieldOutsideFrame(field)
    }
}

impl FrameSpec {
    /// Encode `packet` into `buffer` using this layout
    ///
    /// Bytes not covered by any field are zero. Returns the number of bytes
    /// written.
    pub fn encode(&self, packet: &Packet, buffer: &mut [u8]) -> Result<usize, EncodeError> {
        if packet.header.as_slice() != self.header() {
            return Err(EncodeError::DelimiterMismatch(Field::Header));
        }
        if packet.tail.as_slice() != self.tail() {
            return Err(EncodeError::DelimiterMismatch(Field::Tail));
        }
        let command_span = self.command_field();
        if packet.command.len() != command_span.size {
            return Err(EncodeError::CommandSize {
                expected: command_span.size,
                actual: packet.command.len(),
            });
        }

        let data_len = packet.data.len();
        match (self.length_field(), packet.length) {
            (Some(_), Some(length)) => {
                if length as usize != data_len {
                    return Err(EncodeError::LengthMismatch);
                }
                if length > self.max_declared_length() {
                    return Err(EncodeError::DeclaredLengthTooLarge(length));
                }
            }
            (None, None) => {
                if data_len != self.data_size() {
                    return Err(EncodeError::DataSize {
                        expected: self.data_size(),
                        actual: data_len,
                    });
                }
            }
            _ => return Err(EncodeError::LengthMismatch),
        }

        let frame_length = self.frame_length(data_len);
        let frame = buffer
            .get_mut(..frame_length)
            .ok_or(EncodeError::BufferTooSmall)?;
        frame.fill(0);

        write_field(frame, Field::Header, 0, self.header())?;
        if let (Some(span), Some(length)) = (self.length_field(), packet.length) {
            write_field(frame, Field::Length, span.offset, &le_bytes(length, span.size))?;
        }
        write_field(frame, Field::Command, command_span.offset, &packet.command)?;
        write_field(frame, Field::Data, self.data_offset(), &packet.data)?;

        let tail = self.tail();
        if !tail.is_empty() {
            let tail_at = self.data_offset() + data_len;
            write_field(frame, Field::Tail, tail_at, tail)?;
            let search_from = self.header().len();
            if find(&frame[search_from..], tail).map(|i| i + search_from) != Some(tail_at) {
                return Err(EncodeError::TailInBody);
            }
        }

        Ok(frame_length)
    }

    /// Encode `packet` into a heapless Vec
    pub fn encode_to_vec(&self, packet: &Packet) -> Result<Vec<u8, MAX_FRAME_SIZE>, EncodeError> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = self.encode(packet, &mut buffer)?;
        Vec::from_slice(&buffer[..len]).map_err(|_| EncodeError::BufferTooSmall)
    }

    /// Encode an outgoing frame: header, sequence, command, data, tail
    ///
    /// Returns the number of bytes written.
    pub fn encode_envelope(
        &self,
        sequence: u8,
        command: &[u8],
        data: &[u8],
        buffer: &mut [u8],
    ) -> Result<usize, EncodeError> {
        let header = self.header();
        let tail = self.tail();
        let frame_len = header.len() + 1 + command.len() + data.len() + tail.len();
        let frame = buffer
            .get_mut(..frame_len)
            .ok_or(EncodeError::BufferTooSmall)?;

        let mut at = 0;
        for (field, bytes) in [
            (Field::Header, header),
            (Field::Command, &[sequence][..]),
            (Field::Command, command),
            (Field::Data, data),
            (Field::Tail, tail),
        ] {
            write_field(frame, field, at, bytes)?;
            at += bytes.len();
        }

        Ok(frame_len)
    }

    /// Encode an outgoing frame into a heapless Vec
    pub fn envelope_to_vec(
        &self,
        sequence: u8,
        command: &[u8],
        data: &[u8],
    ) -> Result<Vec<u8, MAX_FRAME_SIZE>, EncodeError> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = self.encode_envelope(sequence, command, data, &mut buffer)?;
        Vec::from_slice(&buffer[..len]).map_err(|_| EncodeError::BufferTooSmall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{Outcome, TailAnchor};
    use crate::spec::FrameLayout;

    fn spec() -> FrameSpec {
        FrameSpec::new(FrameLayout::default()).unwrap()
    }

    #[test]
    fn test_encode_fixed_layout() {
        let packet = Packet::from_parts(&[0x3C], None, &[0x07], &[1, 2, 3, 4], &[0x3E]).unwrap();
        let mut buffer = [0xFFu8; 16];
        let len = spec().encode(&packet, &mut buffer).unwrap();

        assert_eq!(len, 8);
        // Sequence slot at offset 1 is not a packet field and is zero-filled
        assert_eq!(&buffer[..len], &[0x3C, 0x00, 0x07, 1, 2, 3, 4, 0x3E]);
    }

    #[test]
    fn test_encode_then_decode() {
        let spec = spec();
        let packet = Packet::from_parts(&[0x3C], None, &[0x30], &[0, 1, 0, 1], &[0x3E]).unwrap();
        let encoded = spec.encode_to_vec(&packet).unwrap();

        match spec.try_extract(&encoded) {
            Ok(Outcome::Complete(decoded)) => {
                assert_eq!(decoded.packet, packet);
                assert_eq!(decoded.consumed, encoded.len());
                assert_eq!(decoded.anchor, TailAnchor::Aligned);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_encode_with_length_field() {
        let spec = FrameSpec::new(FrameLayout {
            length_offset: 1,
            length_size: 2,
            command_offset: 3,
            data_offset: 4,
            data_size: 0,
            max_declared_length: 8,
            ..FrameLayout::default()
        })
        .unwrap();
        let packet = Packet::from_parts(&[0x3C], Some(3), &[0x07], &[9, 8, 7], &[0x3E]).unwrap();
        let encoded = spec.encode_to_vec(&packet).unwrap();

        assert_eq!(encoded.as_slice(), &[0x3C, 0x03, 0x00, 0x07, 9, 8, 7, 0x3E]);
    }

    #[test]
    fn test_encode_rejects_mismatched_packets() {
        let spec = spec();
        let mut buffer = [0u8; 16];

        let short_data = Packet::from_parts(&[0x3C], None, &[0x07], &[1, 2], &[0x3E]).unwrap();
        assert_eq!(
            spec.encode(&short_data, &mut buffer),
            Err(EncodeError::DataSize { expected: 4, actual: 2 })
        );

        let with_length = Packet::from_parts(&[0x3C], Some(4), &[0x07], &[1, 2, 3, 4], &[0x3E]).unwrap();
        assert_eq!(spec.encode(&with_length, &mut buffer), Err(EncodeError::LengthMismatch));

        let wrong_header = Packet::from_parts(&[0x3D], None, &[0x07], &[1, 2, 3, 4], &[0x3E]).unwrap();
        assert_eq!(
            spec.encode(&wrong_header, &mut buffer),
            Err(EncodeError::DelimiterMismatch(Field::Header))
        );

        let wide_command = Packet::from_parts(&[0x3C], None, &[0x07, 0x08], &[1, 2, 3, 4], &[0x3E]).unwrap();
        assert_eq!(
            spec.encode(&wide_command, &mut buffer),
            Err(EncodeError::CommandSize { expected: 1, actual: 2 })
        );
    }

    #[test]
    fn test_encode_rejects_tail_in_body() {
        let packet = Packet::from_parts(&[0x3C], None, &[0x07], &[1, 0x3E, 3, 4], &[0x3E]).unwrap();
        let mut buffer = [0u8; 16];
        assert_eq!(spec().encode(&packet, &mut buffer), Err(EncodeError::TailInBody));
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let packet = Packet::from_parts(&[0x3C], None, &[0x07], &[1, 2, 3, 4], &[0x3E]).unwrap();
        let mut buffer = [0u8; 7];
        assert_eq!(spec().encode(&packet, &mut buffer), Err(EncodeError::BufferTooSmall));
    }

    #[test]
    fn test_envelope() {
        let frame = spec().envelope_to_vec(0x30, &[0x31], &[0x01]).unwrap();
        assert_eq!(frame.as_slice(), &[0x3C, 0x30, 0x31, 0x01, 0x3E]);

        let mut small = [0u8; 4];
        assert_eq!(
            spec().encode_envelope(0x30, &[0x31], &[0x01], &mut small),
            Err(EncodeError::BufferTooSmall)
        );
    }
}
