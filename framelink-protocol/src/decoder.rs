//! Frame extraction
//!
//! [`FrameSpec::try_extract`] looks at the front of a receive buffer and
//! decides one of three things: a frame is there, more bytes are needed, or
//! the first byte cannot start a frame. It never mutates the buffer; the
//! caller acts on the outcome.

use crate::field::{find, le_value, read_field, DecodeError, Field};
use crate::packet::Packet;
use crate::spec::FrameSpec;

/// Why the leading byte cannot start a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Misalignment {
    /// Buffer does not start with the header
    Header,
    /// Length field above the configured bound
    DeclaredLength(u32),
    /// Bytes after the data segment are not the tail
    Tail,
}

/// Where the tail that ended a frame was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TailAnchor {
    /// Tail found right after the data segment
    Aligned,
    /// Tail pattern also occurs inside the frame body
    ///
    /// The frame still decodes from its declared layout, but only the bytes
    /// up to that first occurrence are consumed. The rest of the frame stays
    /// in the buffer and is resynchronized over like any other noise.
    Early {
        /// Length of the frame as laid out
        frame_length: usize,
    },
    /// Layout has no tail; the frame ends at its arithmetic length
    Unterminated,
}

/// A successfully extracted frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Decoded {
    /// Decoded fields
    pub packet: Packet,
    /// Bytes to drop from the front of the buffer
    pub consumed: usize,
    /// How the end of the frame was determined
    pub anchor: TailAnchor,
}

/// Result of one extraction attempt
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Not enough bytes yet; drop nothing
    Incomplete,
    /// Leading byte cannot start a frame; drop exactly one byte
    Invalid(Misalignment),
    /// Frame found; drop `consumed` bytes
    Complete(Decoded),
}

impl FrameSpec {
    /// Try to extract one frame from the front of `buffer`
    ///
    /// `Err` is reserved for layout faults. Noise, truncation and corruption
    /// always come back as [`Outcome::Incomplete`] or [`Outcome::Invalid`].
    pub fn try_extract(&self, buffer: &[u8]) -> Result<Outcome, DecodeError> {
        if buffer.len() < self.minimum_frame_length() {
            return Ok(Outcome::Incomplete);
        }

        let header = read_field(buffer, Field::Header, 0, self.header().len())?;
        if header != self.header() {
            return Ok(Outcome::Invalid(Misalignment::Header));
        }

        // The bound is checked before anything past the length field is
        // looked at, so garbage lengths never turn into slice sizes.
        let declared = match self.length_field() {
            Some(span) => {
                if buffer.len() < span.end() {
                    return Ok(Outcome::Incomplete);
                }
                let value = le_value(read_field(buffer, Field::Length, span.offset, span.size)?);
                if value > self.max_declared_length() {
                    return Ok(Outcome::Invalid(Misalignment::DeclaredLength(value)));
                }
                Some(value)
            }
            None => None,
        };

        let data_len = declared.map_or(self.data_size(), |value| value as usize);
        let frame_length = self.frame_length(data_len);
        if buffer.len() < frame_length {
            return Ok(Outcome::Incomplete);
        }
        let frame = &buffer[..frame_length];

        if let Some(span) = self.length_field() {
            // The length field must lie inside the frame it describes
            read_field(frame, Field::Length, span.offset, span.size)?;
        }
        let command_span = self.command_field();
        let command = read_field(frame, Field::Command, command_span.offset, command_span.size)?;
        let data = read_field(frame, Field::Data, self.data_offset(), data_len)?;

        let tail = self.tail();
        let data_end = self.data_offset() + data_len;
        let found_tail = read_field(frame, Field::Tail, data_end, tail.len())?;
        let (consumed, anchor) = if tail.is_empty() {
            (frame_length, TailAnchor::Unterminated)
        } else {
            if found_tail != tail {
                return Ok(Outcome::Invalid(Misalignment::Tail));
            }
            let search_from = self.header().len();
            let located = find(&frame[search_from..], tail).map_or(data_end, |i| i + search_from);
            let end = located + tail.len();
            if end < frame_length {
                (end, TailAnchor::Early { frame_length })
            } else {
                (end, TailAnchor::Aligned)
            }
        };

        let packet = Packet::from_parts(header, declared, command, data, found_tail)
            .map_err(|e| DecodeError::Capacity(e.0))?;

        Ok(Outcome::Complete(Decoded {
            packet,
            consumed,
            anchor,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::FrameLayout;
    use heapless::Vec;

    fn spec() -> FrameSpec {
        FrameSpec::new(FrameLayout::default()).unwrap()
    }

    fn length_spec() -> FrameSpec {
        // 0xAA 0x55 | len | cmd | data… | 0x0D
        FrameSpec::new(FrameLayout {
            header: Vec::from_slice(&[0xAA, 0x55]).unwrap(),
            tail: Vec::from_slice(&[0x0D]).unwrap(),
            length_offset: 2,
            length_size: 1,
            command_offset: 3,
            command_size: 1,
            data_offset: 4,
            data_size: 0,
            max_declared_length: 16,
        })
        .unwrap()
    }

    fn complete(outcome: Outcome) -> Decoded {
        match outcome {
            Outcome::Complete(decoded) => decoded,
            other => panic!("expected a complete frame, got {:?}", other),
        }
    }

    #[test]
    fn test_complete_frame() {
        let input = [0x3C, 0x30, 0x07, 0x00, 0x00, 0x00, 0x00, 0x3E];
        let decoded = complete(spec().try_extract(&input).unwrap());

        assert_eq!(decoded.consumed, 8);
        assert_eq!(decoded.anchor, TailAnchor::Aligned);
        assert_eq!(decoded.packet.header.as_slice(), &[0x3C]);
        assert_eq!(decoded.packet.length, None);
        assert_eq!(decoded.packet.command.as_slice(), &[0x07]);
        assert_eq!(decoded.packet.data.as_slice(), &[0, 0, 0, 0]);
        assert_eq!(decoded.packet.tail.as_slice(), &[0x3E]);
    }

    #[test]
    fn test_leading_noise_is_invalid() {
        let input = [0xFF, 0x3C, 0x30, 0x07, 0x00, 0x00, 0x00, 0x00, 0x3E];
        let spec = spec();

        assert_eq!(
            spec.try_extract(&input),
            Ok(Outcome::Invalid(Misalignment::Header))
        );
        let decoded = complete(spec.try_extract(&input[1..]).unwrap());
        assert_eq!(decoded.consumed, 8);
        assert_eq!(decoded.packet.command.as_slice(), &[0x07]);
    }

    #[test]
    fn test_truncated_frame_is_incomplete() {
        let input = [0x3C, 0x30, 0x07, 0x00, 0x00];
        assert_eq!(spec().try_extract(&input), Ok(Outcome::Incomplete));
    }

    #[test]
    fn test_short_buffer_is_incomplete_even_with_noise() {
        // Below the minimum length nothing is judged, not even the header
        assert_eq!(spec().try_extract(&[0xFF, 0xFF]), Ok(Outcome::Incomplete));
        assert_eq!(spec().try_extract(&[]), Ok(Outcome::Incomplete));
    }

    #[test]
    fn test_tail_mismatch_is_invalid() {
        let input = [0x3C, 0x30, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00, 0x3E];
        assert_eq!(
            spec().try_extract(&input),
            Ok(Outcome::Invalid(Misalignment::Tail))
        );
    }

    #[test]
    fn test_missing_tail_stops_waiting_at_frame_length() {
        // No tail byte anywhere: the laid-out length decides, not a search
        let input = [0x3C, 0x30, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(spec().try_extract(&input[..7]), Ok(Outcome::Incomplete));
        assert_eq!(
            spec().try_extract(&input),
            Ok(Outcome::Invalid(Misalignment::Tail))
        );
    }

    #[test]
    fn test_early_tail_consumes_to_first_occurrence() {
        // Data contains the tail byte; the frame decodes in full but only the
        // bytes up to the first 0x3E are consumed.
        let input = [0x3C, 0x30, 0x07, 0x01, 0x3E, 0x02, 0x03, 0x3E];
        let decoded = complete(spec().try_extract(&input).unwrap());

        assert_eq!(decoded.packet.data.as_slice(), &[0x01, 0x3E, 0x02, 0x03]);
        assert_eq!(decoded.consumed, 5);
        assert_eq!(decoded.anchor, TailAnchor::Early { frame_length: 8 });
    }

    #[test]
    fn test_early_tail_waits_for_full_frame() {
        let input = [0x3C, 0x30, 0x07, 0x01, 0x3E, 0x02];
        assert_eq!(spec().try_extract(&input), Ok(Outcome::Incomplete));
    }

    #[test]
    fn test_trailing_bytes_are_left_alone() {
        let input = [0x3C, 0x30, 0x07, 0x00, 0x00, 0x00, 0x00, 0x3E, 0x3C, 0x31];
        let decoded = complete(spec().try_extract(&input).unwrap());
        assert_eq!(decoded.consumed, 8);
    }

    #[test]
    fn test_length_field_frame() {
        let input = [0xAA, 0x55, 0x03, 0x42, 0x01, 0x02, 0x03, 0x0D];
        let decoded = complete(length_spec().try_extract(&input).unwrap());

        assert_eq!(decoded.packet.length, Some(3));
        assert_eq!(decoded.packet.command.as_slice(), &[0x42]);
        assert_eq!(decoded.packet.data.as_slice(), &[0x01, 0x02, 0x03]);
        assert_eq!(decoded.consumed, 8);
    }

    #[test]
    fn test_length_field_waits_for_declared_size() {
        let input = [0xAA, 0x55, 0x03, 0x42, 0x01, 0x0D];
        assert_eq!(length_spec().try_extract(&input), Ok(Outcome::Incomplete));
    }

    #[test]
    fn test_declared_length_above_bound_is_invalid() {
        // Nothing after the length field matters
        let input = [0xAA, 0x55, 0x11, 0x42, 0x00];
        assert_eq!(
            length_spec().try_extract(&input),
            Ok(Outcome::Invalid(Misalignment::DeclaredLength(0x11)))
        );
    }

    #[test]
    fn test_zero_length_frame() {
        let input = [0xAA, 0x55, 0x00, 0x42, 0x0D];
        let decoded = complete(length_spec().try_extract(&input).unwrap());
        assert!(decoded.packet.data.is_empty());
        assert_eq!(decoded.consumed, 5);
    }

    #[test]
    fn test_unterminated_layout_uses_arithmetic_end() {
        let spec = FrameSpec::new(FrameLayout {
            tail: Vec::new(),
            ..FrameLayout::default()
        })
        .unwrap();
        let input = [0x3C, 0x30, 0x07, 0x01, 0x02, 0x03, 0x04, 0x3C];
        let decoded = complete(spec.try_extract(&input).unwrap());

        assert_eq!(decoded.consumed, 7);
        assert_eq!(decoded.anchor, TailAnchor::Unterminated);
        assert!(decoded.packet.tail.is_empty());
    }

    #[test]
    fn test_field_past_frame_is_configuration_fault() {
        // Command sits after the data segment and the tail
        let spec = FrameSpec::new(FrameLayout {
            command_offset: 10,
            ..FrameLayout::default()
        })
        .unwrap();
        let input = [0x3C, 0x30, 0x00, 0x00, 0x00, 0x00, 0x00, 0x3E, 0x00, 0x00, 0x07, 0x00];

        assert_eq!(
            spec.try_extract(&input),
            Err(DecodeError::FieldOutOfRange {
                field: Field::Command,
                offset: 10,
                size: 1,
                frame_len: 8,
            })
        );
    }

    #[test]
    fn test_incomplete_is_idempotent() {
        let spec = spec();
        let input = [0x3C, 0x30, 0x07];
        let before = input;
        for _ in 0..3 {
            assert_eq!(spec.try_extract(&input), Ok(Outcome::Incomplete));
        }
        assert_eq!(input, before);
    }
}
