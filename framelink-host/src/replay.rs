//! Offline decoding of captured streams

use std::fmt::Write as _;

use framelink_core::{FeedReport, StreamBuffer, StreamError};
use framelink_protocol::{DecodeError, Decoded, FrameSpec, Packet};
use thiserror::Error;
use tracing::{debug, trace};

use crate::RX_BUFFER_SIZE;

/// Hex capture parsing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HexError {
    #[error("invalid hex byte {token:?} at position {index}")]
    InvalidByte { index: usize, token: String },
}

/// Capture decoding errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error("{0}")]
    Buffer(StreamError),
    #[error("{0}")]
    Decode(DecodeError),
}

impl From<StreamError> for ReplayError {
    fn from(e: StreamError) -> Self {
        ReplayError::Buffer(e)
    }
}

impl From<DecodeError> for ReplayError {
    fn from(e: DecodeError) -> Self {
        ReplayError::Decode(e)
    }
}

/// Parse whitespace- or comma-separated hex bytes, with optional `0x`
pub fn parse_hex(text: &str) -> Result<Vec<u8>, HexError> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .enumerate()
        .map(|(index, token)| {
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            let invalid = || HexError::InvalidByte {
                index,
                token: token.to_string(),
            };
            // from_str_radix would also take a leading sign
            if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            u8::from_str_radix(digits, 16).map_err(|_| invalid())
        })
        .collect()
}

/// Everything decoded from one capture
#[derive(Debug, Clone)]
pub struct Replay {
    pub frames: Vec<Decoded>,
    pub report: FeedReport,
    /// Trailing bytes that never completed a frame
    pub leftover: Vec<u8>,
}

/// Run a capture through a receive buffer
pub fn replay(spec: &FrameSpec, bytes: &[u8]) -> Result<Replay, ReplayError> {
    let mut stream = StreamBuffer::<RX_BUFFER_SIZE>::new(spec.clone())?;
    let mut frames = Vec::new();

    let report = stream.feed(bytes, |decoded| {
        trace!(consumed = decoded.consumed, anchor = ?decoded.anchor, "frame");
        frames.push(decoded);
    })?;
    debug!(
        frames = report.packets,
        discarded = report.discarded,
        leftover = stream.len(),
        "capture replayed"
    );

    Ok(Replay {
        frames,
        report,
        leftover: stream.as_bytes().to_vec(),
    })
}

/// Render bytes as space-separated hex
pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02X}");
    }
    out
}

/// One-line description of a packet
pub fn describe(packet: &Packet) -> String {
    let mut line = format!("command [{}] data [{}]", hex(&packet.command), hex(&packet.data));
    if let Some(length) = packet.length {
        let _ = write!(line, " length {length}");
    }
    line
}
