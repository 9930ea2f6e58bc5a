//! Packet dispatch and reply queueing
//!
//! A [`Dispatcher`] sees every decoded packet in arrival order. Replies are
//! not written from inside the handler; they are enveloped, tagged with the
//! next sequence number and queued in an [`Outbox`] that the link flushes
//! once the current read has been fully processed.
//!
//! ```text
//! read ──► StreamBuffer ──► Dispatcher ──► Replies ──► Outbox ──► write
//! ```

mod table;

pub use table::{CommandTable, Handler, TableError};

use core::fmt;

use heapless::{Deque, Vec};

use framelink_protocol::{EncodeError, FrameSpec, Packet, SequenceCounter, MAX_FRAME_SIZE};

/// Replies that can be queued between two flushes
pub const MAX_PENDING_REPLIES: usize = 4;

/// One encoded outgoing frame
pub type Frame = Vec<u8, MAX_FRAME_SIZE>;

/// Errors raised while queueing a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReplyError {
    /// Reply could not be laid out as a frame
    Encode(EncodeError),
    /// Outbox already holds [`MAX_PENDING_REPLIES`] frames
    OutboxFull,
    /// Raw frame longer than [`MAX_FRAME_SIZE`]
    TooLarge,
}

impl fmt::Display for ReplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyError::Encode(e) => write!(f, "cannot encode reply: {e}"),
            ReplyError::OutboxFull => f.write_str("reply outbox is full"),
            ReplyError::TooLarge => f.write_str("reply frame too large"),
        }
    }
}

impl From<EncodeError> for ReplyError {
    fn from(e: EncodeError) -> Self {
        ReplyError::Encode(e)
    }
}

/// Fixed-capacity queue of frames waiting to be written
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    frames: Deque<Frame, MAX_PENDING_REPLIES>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame behind the ones already waiting
    pub fn push(&mut self, frame: Frame) -> Result<(), ReplyError> {
        self.frames
            .push_back(frame)
            .map_err(|_| ReplyError::OutboxFull)
    }

    /// Take the oldest waiting frame
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.frames.is_full()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Reply channel handed to a dispatcher for one packet
pub struct Replies<'a> {
    spec: &'a FrameSpec,
    sequence: &'a mut SequenceCounter,
    outbox: &'a mut Outbox,
}

impl<'a> Replies<'a> {
    pub fn new(
        spec: &'a FrameSpec,
        sequence: &'a mut SequenceCounter,
        outbox: &'a mut Outbox,
    ) -> Self {
        Self {
            spec,
            sequence,
            outbox,
        }
    }

    /// Layout replies are enveloped with
    pub fn spec(&self) -> &FrameSpec {
        self.spec
    }

    /// Queue `header ‖ sequence ‖ command ‖ data ‖ tail`
    ///
    /// Returns the sequence number used. A full outbox is reported before a
    /// number is taken, so rejected replies leave no gap in the sequence.
    pub fn send(&mut self, command: &[u8], data: &[u8]) -> Result<u8, ReplyError> {
        if self.outbox.is_full() {
            return Err(ReplyError::OutboxFull);
        }
        let sequence = self.sequence.peek();
        let frame = self.spec.envelope_to_vec(sequence, command, data)?;
        self.sequence.next();
        self.outbox.push(frame)?;
        Ok(sequence)
    }

    /// Queue pre-encoded bytes as they are
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<(), ReplyError> {
        let frame = Vec::from_slice(bytes).map_err(|_| ReplyError::TooLarge)?;
        self.outbox.push(frame)
    }

    /// Frames queued and not yet written
    pub fn pending(&self) -> usize {
        self.outbox.len()
    }
}

/// Consumer of decoded packets
///
/// Called once per packet, in arrival order. Errors abort the current poll
/// after the replies queued so far have been written.
pub trait Dispatcher {
    fn dispatch(&mut self, packet: &Packet, replies: &mut Replies<'_>) -> Result<(), ReplyError>;
}

impl<F> Dispatcher for F
where
    F: FnMut(&Packet, &mut Replies<'_>) -> Result<(), ReplyError>,
{
    fn dispatch(&mut self, packet: &Packet, replies: &mut Replies<'_>) -> Result<(), ReplyError> {
        self(packet, replies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framelink_protocol::FrameLayout;

    fn spec() -> FrameSpec {
        FrameSpec::new(FrameLayout::default()).unwrap()
    }

    #[test]
    fn test_send_envelopes_with_sequence() {
        let spec = spec();
        let mut sequence = SequenceCounter::default();
        let mut outbox = Outbox::new();
        let mut replies = Replies::new(&spec, &mut sequence, &mut outbox);

        assert_eq!(replies.send(&[0x31], &[0x00]), Ok(b'0'));
        assert_eq!(replies.send(&[0x31], &[0x01]), Ok(b'1'));
        assert_eq!(replies.pending(), 2);

        assert_eq!(outbox.pop().unwrap().as_slice(), &[0x3C, b'0', 0x31, 0x00, 0x3E]);
        assert_eq!(outbox.pop().unwrap().as_slice(), &[0x3C, b'1', 0x31, 0x01, 0x3E]);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_full_outbox_keeps_sequence() {
        let spec = spec();
        let mut sequence = SequenceCounter::default();
        let mut outbox = Outbox::new();
        let mut replies = Replies::new(&spec, &mut sequence, &mut outbox);

        for _ in 0..MAX_PENDING_REPLIES {
            replies.send(&[0x31], &[]).unwrap();
        }
        assert_eq!(replies.send(&[0x31], &[]), Err(ReplyError::OutboxFull));
        assert_eq!(replies.send_raw(&[0x00]), Err(ReplyError::OutboxFull));
        assert_eq!(sequence.peek(), b'4');
    }

    #[test]
    fn test_send_raw() {
        let spec = spec();
        let mut sequence = SequenceCounter::default();
        let mut outbox = Outbox::new();
        let mut replies = Replies::new(&spec, &mut sequence, &mut outbox);

        replies.send_raw(&[0xDE, 0xAD]).unwrap();
        assert_eq!(
            replies.send_raw(&[0u8; MAX_FRAME_SIZE + 1]),
            Err(ReplyError::TooLarge)
        );
        assert_eq!(sequence.peek(), b'0');
        assert_eq!(outbox.pop().unwrap().as_slice(), &[0xDE, 0xAD]);
    }

    #[test]
    fn test_closure_dispatcher() {
        let spec = spec();
        let mut sequence = SequenceCounter::default();
        let mut outbox = Outbox::new();
        let packet = Packet::from_parts(&[0x3C], None, &[0x07], &[0; 4], &[0x3E]).unwrap();

        let mut seen = 0;
        let mut dispatcher = |packet: &Packet, replies: &mut Replies<'_>| {
            seen += 1;
            replies.send(&packet.command, &[]).map(|_| ())
        };
        let mut replies = Replies::new(&spec, &mut sequence, &mut outbox);
        dispatcher.dispatch(&packet, &mut replies).unwrap();
        drop(dispatcher);

        assert_eq!(seen, 1);
        assert_eq!(outbox.len(), 1);
    }
}
