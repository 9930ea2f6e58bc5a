//! Decoded packet
//!
//! A packet is a snapshot of the fields of one frame. It owns its bytes, so
//! it outlives the receive buffer and can be handed to another task as-is.

use core::fmt;

use heapless::Vec;

use crate::field::Field;
use crate::spec::{MAX_COMMAND_LEN, MAX_DATA_SIZE, MAX_DELIMITER_LEN};

/// A field did not fit the packet's fixed capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PacketError(pub Field);

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} field exceeds packet capacity", self.0)
    }
}

/// One decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet {
    /// Header bytes as received
    pub header: Vec<u8, MAX_DELIMITER_LEN>,
    /// Value of the length field, when the layout has one
    pub length: Option<u32>,
    /// Command identifier bytes
    pub command: Vec<u8, MAX_COMMAND_LEN>,
    /// Data segment
    pub data: Vec<u8, MAX_DATA_SIZE>,
    /// Tail bytes as received (empty when the layout has no tail)
    pub tail: Vec<u8, MAX_DELIMITER_LEN>,
}

impl Packet {
    /// Build a packet from borrowed field slices
    pub fn from_parts(
        header: &[u8],
        length: Option<u32>,
        command: &[u8],
        data: &[u8],
        tail: &[u8],
    ) -> Result<Self, PacketError> {
        Ok(Self {
            header: Vec::from_slice(header).map_err(|_| PacketError(Field::Header))?,
            length,
            command: Vec::from_slice(command).map_err(|_| PacketError(Field::Command))?,
            data: Vec::from_slice(data).map_err(|_| PacketError(Field::Data))?,
            tail: Vec::from_slice(tail).map_err(|_| PacketError(Field::Tail))?,
        })
    }

    /// First command byte
    ///
    /// Most layouts use a single-byte command; this is the value to match on.
    pub fn command_byte(&self) -> Option<u8> {
        self.command.first().copied()
    }
}
