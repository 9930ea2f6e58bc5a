//! Configuration type definitions
//!
//! Every section has a default matching the GYJ-0122 call unit setup, so a
//! configuration only needs to name what differs.

use framelink_hal::SerialConfig;
use framelink_protocol::{FrameLayout, FrameSpec, SequenceCounter, SequenceError, SpecError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default bytes requested per transport read
pub const DEFAULT_READ_CHUNK: usize = 1024;

/// Default send attempts for a request
pub const DEFAULT_REQUEST_ATTEMPTS: u8 = 3;

/// Range of sequence numbers stamped on outgoing frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SequenceRange {
    /// First value (inclusive)
    pub start: u8,
    /// Last value (inclusive)
    pub end: u8,
}

impl Default for SequenceRange {
    fn default() -> Self {
        Self {
            start: b'0',
            end: b'9',
        }
    }
}

impl SequenceRange {
    pub fn counter(&self) -> Result<SequenceCounter, SequenceError> {
        SequenceCounter::new(self.start, self.end)
    }
}

/// Link driver tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LinkSettings {
    /// Bytes requested per transport read
    pub read_chunk: usize,
    /// Send attempts before a request gives up
    pub request_attempts: u8,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            read_chunk: DEFAULT_READ_CHUNK,
            request_attempts: DEFAULT_REQUEST_ATTEMPTS,
        }
    }
}

/// Complete link configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LinkConfig {
    /// Serial port settings
    pub serial: SerialConfig,
    /// Wire layout
    pub frame: FrameLayout,
    /// Outgoing sequence numbers
    pub sequence: SequenceRange,
    /// Driver tuning
    pub link: LinkSettings,
}

impl LinkConfig {
    /// Validate the frame section
    pub fn frame_spec(&self) -> Result<FrameSpec, SpecError> {
        FrameSpec::new(self.frame.clone())
    }

    /// Validate the sequence section
    pub fn sequence_counter(&self) -> Result<SequenceCounter, SequenceError> {
        self.sequence.counter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framelink_hal::{DataBits, Parity, StopBits};

    #[test]
    fn test_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.serial.path.as_str(), "/dev/ttyUSB0");
        assert_eq!(config.serial.baudrate, 9600);
        assert_eq!(config.serial.data_bits, DataBits::Eight);
        assert_eq!(config.serial.parity, Parity::None);
        assert_eq!(config.serial.stop_bits, StopBits::One);
        assert_eq!(config.serial.minimum_read_size, 4);
        assert_eq!(config.serial.timeout_ms, 300);
        assert_eq!(config.link.read_chunk, 1024);
        assert_eq!(config.link.request_attempts, 3);

        let spec = config.frame_spec().unwrap();
        assert_eq!(spec.header(), &[0x3C]);
        assert_eq!(spec.tail(), &[0x3E]);

        let mut counter = config.sequence_counter().unwrap();
        assert_eq!(counter.next(), b'0');
    }

    #[test]
    fn test_invalid_sections() {
        let mut config = LinkConfig::default();
        config.sequence = SequenceRange {
            start: 0x40,
            end: 0x30,
        };
        assert!(config.sequence_counter().is_err());

        config.frame.tail = config.frame.header.clone();
        assert_eq!(config.frame_spec(), Err(SpecError::AmbiguousDelimiters));
    }
}
