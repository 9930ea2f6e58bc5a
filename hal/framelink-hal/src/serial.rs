//! Serial communication abstractions
//!
//! Provides the blocking transport traits the link driver reads from and
//! writes to. Implementations own the port configuration; the traits only
//! move bytes.

use core::fmt;

use heapless::String;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum length of a device path
pub const MAX_PATH_LEN: usize = 64;

/// Serial transmitter
pub trait SerialTx {
    /// Error type for transmit operations
    type Error;

    /// Write data to the port
    ///
    /// Best-effort: returns the number of bytes accepted, which may be less
    /// than `data.len()`.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Write all of `data`, retrying short writes
    ///
    /// A write that accepts zero bytes ends the attempt early; the returned
    /// count is what actually went out.
    fn write_all(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        let mut sent = 0;
        while sent < data.len() {
            let n = self.write(&data[sent..])?;
            if n == 0 {
                break;
            }
            sent += n;
        }
        Ok(sent)
    }

    /// Flush any buffered data
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Serial receiver
pub trait SerialRx {
    /// Error type for receive operations
    type Error;

    /// Read data from the port
    ///
    /// Blocks until at least one byte is available or the port's read
    /// timeout expires. `Ok(0)` means the timeout expired with nothing to
    /// read; it is not an error.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Combined serial interface
///
/// For half-duplex links where one peripheral both sends and receives.
pub trait Serial: SerialTx + SerialRx {}

// Blanket implementation
impl<T: SerialTx + SerialRx> Serial for T {}

/// Serial port configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SerialConfig {
    /// Device path (e.g. `/dev/ttyUSB0`)
    pub path: String<MAX_PATH_LEN>,
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
    /// Minimum number of bytes a read waits for when `timeout_ms` is zero
    pub minimum_read_size: u8,
    /// Read timeout in milliseconds; zero blocks until `minimum_read_size`
    /// bytes arrived
    pub timeout_ms: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        let mut path = String::new();
        // Fits: the literal is shorter than MAX_PATH_LEN
        let _ = path.push_str("/dev/ttyUSB0");
        Self {
            path,
            baudrate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            minimum_read_size: 4,
            timeout_ms: 300,
        }
    }
}

/// A numeric port setting outside the supported set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidSetting(pub u8);

impl fmt::Display for InvalidSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported serial setting: {}", self.0)
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = InvalidSetting;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(InvalidSetting(other)),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub enum StopBits {
    One,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = InvalidSetting;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(InvalidSetting(other)),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_call_unit() {
        let config = SerialConfig::default();
        assert_eq!(config.path.as_str(), "/dev/ttyUSB0");
        assert_eq!(config.baudrate, 9600);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.minimum_read_size, 4);
        assert_eq!(config.timeout_ms, 300);
    }

    #[test]
    fn test_numeric_settings() {
        assert_eq!(DataBits::try_from(7), Ok(DataBits::Seven));
        assert_eq!(DataBits::try_from(9), Err(InvalidSetting(9)));
        assert_eq!(StopBits::try_from(2), Ok(StopBits::Two));
        assert_eq!(StopBits::try_from(0), Err(InvalidSetting(0)));
        assert_eq!(u8::from(DataBits::Eight), 8);
    }
}
