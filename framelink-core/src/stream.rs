//! Receive buffer and extraction loop
//!
//! The buffer only ever grows at the back (new transport bytes) and shrinks
//! at the front (consumed frames and discarded noise). Every append is
//! followed by extraction until the decoder asks for more bytes, so frames
//! that arrive back to back in one read are all handed over in that round.

use core::fmt;

use heapless::Vec;

use framelink_protocol::{DecodeError, Decoded, FrameSpec, Outcome, TailAnchor};

/// Receive buffer errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamError {
    /// Buffer cannot hold the largest frame the layout describes
    CapacityTooSmall { capacity: usize, required: usize },
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::CapacityTooSmall { capacity, required } => write!(
                f,
                "receive buffer of {capacity} bytes cannot hold a {required}-byte frame"
            ),
        }
    }
}

/// What happened during one feed or extraction round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FeedReport {
    /// Bytes appended to the buffer
    pub appended: usize,
    /// Frames extracted and handed over
    pub packets: usize,
    /// Bytes dropped one at a time to regain alignment
    pub discarded: usize,
    /// Frames that ended on an early tail occurrence
    pub early_tails: usize,
}

impl FeedReport {
    /// Fold another report into this one
    pub fn merge(&mut self, other: &FeedReport) {
        self.appended += other.appended;
        self.packets += other.packets;
        self.discarded += other.discarded;
        self.early_tails += other.early_tails;
    }
}

/// Accumulating receive buffer bound to one frame layout
#[derive(Debug, Clone)]
pub struct StreamBuffer<const N: usize> {
    spec: FrameSpec,
    bytes: Vec<u8, N>,
}

impl<const N: usize> StreamBuffer<N> {
    /// Create an empty buffer for `spec`
    ///
    /// `N` must be at least the layout's largest frame, otherwise a frame
    /// could never be completed and the buffer would stall.
    pub fn new(spec: FrameSpec) -> Result<Self, StreamError> {
        let required = spec.max_frame_length();
        if N < required {
            return Err(StreamError::CapacityTooSmall {
                capacity: N,
                required,
            });
        }
        Ok(Self {
            spec,
            bytes: Vec::new(),
        })
    }

    pub fn spec(&self) -> &FrameSpec {
        &self.spec
    }

    /// Unprocessed bytes, oldest first
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Append as much of `chunk` as fits; returns the number of bytes taken
    pub fn push(&mut self, chunk: &[u8]) -> usize {
        let take = chunk.len().min(N - self.bytes.len());
        // Cannot fail: `take` is bounded by the free space
        let _ = self.bytes.extend_from_slice(&chunk[..take]);
        take
    }

    /// Drop `count` bytes from the front
    fn consume(&mut self, count: usize) {
        let count = count.min(self.bytes.len());
        let remaining = self.bytes.len() - count;
        self.bytes.copy_within(count.., 0);
        self.bytes.truncate(remaining);
    }

    /// Extract the next frame from the buffered bytes
    ///
    /// Drops leading bytes one at a time while they cannot start a frame.
    /// Returns `Ok(None)` once the decoder needs more input; nothing is
    /// dropped in that case.
    pub fn next_packet(&mut self, report: &mut FeedReport) -> Result<Option<Decoded>, DecodeError> {
        while !self.bytes.is_empty() {
            match self.spec.try_extract(&self.bytes)? {
                Outcome::Incomplete => return Ok(None),
                Outcome::Invalid(_) => {
                    self.consume(1);
                    report.discarded += 1;
                }
                Outcome::Complete(decoded) => {
                    self.consume(decoded.consumed);
                    report.packets += 1;
                    if matches!(decoded.anchor, TailAnchor::Early { .. }) {
                        report.early_tails += 1;
                    }
                    return Ok(Some(decoded));
                }
            }
        }
        Ok(None)
    }

    /// Append `chunk` and hand every complete frame to `on_packet`
    ///
    /// Chunks larger than the free space are taken in pieces, extracting in
    /// between. A configuration fault stops the round immediately and is
    /// returned; the offending bytes stay buffered.
    pub fn feed<F>(&mut self, chunk: &[u8], mut on_packet: F) -> Result<FeedReport, DecodeError>
    where
        F: FnMut(Decoded),
    {
        let mut report = FeedReport::default();
        let mut rest = chunk;
        loop {
            let taken = self.push(rest);
            report.appended += taken;
            rest = &rest[taken..];

            while let Some(decoded) = self.next_packet(&mut report)? {
                on_packet(decoded);
            }

            // An incomplete frame is always shorter than the capacity, so
            // extraction leaves room for at least one more byte.
            if rest.is_empty() {
                return Ok(report);
            }
        }
    }
}
