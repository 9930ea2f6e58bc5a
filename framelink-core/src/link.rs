//! Link driver
//!
//! Owns a port and everything needed to serve it: the receive buffer, the
//! dispatcher, the outgoing sequence counter and the reply outbox.
//!
//! ```text
//!            ┌──────────── poll() ────────────┐
//! port.read ─┤ StreamBuffer ─► Dispatcher     │
//!            │                    │           │
//!            │                 Outbox ────────┼─► port.write
//!            └────────────────────────────────┘
//! ```
//!
//! Transport errors are returned unchanged; retrying is up to the caller.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use framelink_hal::{SerialRx, SerialTx};
use framelink_protocol::{DecodeError, FrameSpec, Packet, SequenceCounter};

use crate::config::LinkSettings;
use crate::dispatch::{Dispatcher, Outbox, Replies, ReplyError};
use crate::stats::LinkStats;
use crate::stream::{FeedReport, StreamBuffer, StreamError};

/// Largest single transport read
pub const MAX_READ_CHUNK: usize = 1024;

/// Reads a request waits through after each send
///
/// An empty read ends the wait early. Bytes that keep arriving without
/// forming a frame use the budget up and trigger the next send.
pub const REQUEST_READS: usize = 4;

/// Cancellation signal, checked between reads
pub trait Cancel {
    fn is_cancelled(&self) -> bool;
}

impl Cancel for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl<T: Cancel + ?Sized> Cancel for &T {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

/// Never cancels
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl Cancel for Never {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Link driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError<E> {
    /// Port read, write or flush failed
    Transport(E),
    /// Frame layout fault hit while decoding
    Decode(DecodeError),
    /// A request got no frame back
    NoResponse { attempts: u8 },
    /// Dispatcher or request could not queue a frame
    Reply(ReplyError),
}

impl<E: fmt::Display> fmt::Display for LinkError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Transport(e) => write!(f, "transport error: {e}"),
            LinkError::Decode(e) => write!(f, "decode error: {e}"),
            LinkError::NoResponse { attempts } => {
                write!(f, "no response after {attempts} attempts")
            }
            LinkError::Reply(e) => write!(f, "reply error: {e}"),
        }
    }
}

impl<E> From<DecodeError> for LinkError<E> {
    fn from(e: DecodeError) -> Self {
        LinkError::Decode(e)
    }
}

impl<E> From<ReplyError> for LinkError<E> {
    fn from(e: ReplyError) -> Self {
        LinkError::Reply(e)
    }
}

/// Result of one [`Link::poll`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollReport {
    /// Bytes returned by the transport read
    pub read: usize,
    /// Buffer activity for those bytes
    pub feed: FeedReport,
    /// Reply frames written
    pub replies_sent: usize,
    /// Bytes left in the receive buffer afterwards
    pub buffered: usize,
}

type PortError<P> = <P as SerialRx>::Error;

/// Read/dispatch/reply driver for one port
pub struct Link<P, D, const N: usize> {
    port: P,
    stream: StreamBuffer<N>,
    reply_spec: FrameSpec,
    dispatcher: D,
    sequence: SequenceCounter,
    outbox: Outbox,
    stats: LinkStats,
    read_chunk: usize,
}

impl<P, D, const N: usize> Link<P, D, N>
where
    P: SerialRx + SerialTx<Error = PortError<P>>,
    D: Dispatcher,
{
    /// Create a driver; fails if `N` cannot hold the largest frame of `spec`
    pub fn new(
        port: P,
        spec: FrameSpec,
        dispatcher: D,
        sequence: SequenceCounter,
        settings: &LinkSettings,
    ) -> Result<Self, StreamError> {
        let reply_spec = spec.clone();
        Ok(Self {
            port,
            stream: StreamBuffer::new(spec)?,
            reply_spec,
            dispatcher,
            sequence,
            outbox: Outbox::new(),
            stats: LinkStats::default(),
            read_chunk: settings.read_chunk.clamp(1, MAX_READ_CHUNK),
        })
    }

    /// One read, then dispatch of every complete frame with its replies
    ///
    /// A read that times out is a normal empty poll. Every frame in the read
    /// is dispatched even when an earlier one failed; the first failure is
    /// returned afterwards.
    pub fn poll(&mut self) -> Result<PollReport, LinkError<PortError<P>>> {
        let mut chunk = [0u8; MAX_READ_CHUNK];
        let read = self
            .port
            .read(&mut chunk[..self.read_chunk])
            .map_err(LinkError::Transport)?;

        let mut report = PollReport {
            read,
            ..PollReport::default()
        };
        if read > 0 {
            let (feed, replies_sent) = self.ingest(&chunk[..read], None)?;
            report.feed = feed;
            report.replies_sent = replies_sent;
        }
        report.buffered = self.stream.len();
        Ok(report)
    }

    /// Poll until `cancel` fires
    ///
    /// `on_poll` sees every report. Returns on the first error.
    pub fn run<C, F>(&mut self, cancel: &C, mut on_poll: F) -> Result<(), LinkError<PortError<P>>>
    where
        C: Cancel + ?Sized,
        F: FnMut(&PollReport, &LinkStats),
    {
        while !cancel.is_cancelled() {
            let report = self.poll()?;
            on_poll(&report, &self.stats);
        }
        Ok(())
    }

    /// Send one frame and wait for the first frame back
    ///
    /// The frame is re-sent, with a fresh sequence number, when a read comes
    /// back empty or [`REQUEST_READS`] reads brought no frame, up to
    /// `attempts` sends. The first decoded frame is returned; any others
    /// decoded from the same read are dispatched.
    pub fn request(
        &mut self,
        command: &[u8],
        data: &[u8],
        attempts: u8,
    ) -> Result<Packet, LinkError<PortError<P>>> {
        let attempts = attempts.max(1);
        let mut chunk = [0u8; MAX_READ_CHUNK];

        for _ in 0..attempts {
            let sequence = self.sequence.peek();
            let frame = self
                .reply_spec
                .envelope_to_vec(sequence, command, data)
                .map_err(ReplyError::from)?;
            self.sequence.next();
            self.port.write_all(&frame).map_err(LinkError::Transport)?;
            self.port.flush().map_err(LinkError::Transport)?;
            self.stats.record_request();

            for _ in 0..REQUEST_READS {
                let read = self
                    .port
                    .read(&mut chunk[..self.read_chunk])
                    .map_err(LinkError::Transport)?;
                if read == 0 {
                    break;
                }
                let mut response = None;
                self.ingest(&chunk[..read], Some(&mut response))?;
                if let Some(packet) = response {
                    return Ok(packet);
                }
            }
        }

        Err(LinkError::NoResponse { attempts })
    }

    /// Feed `bytes`, handing each frame to `claim` if it is still empty and
    /// to the dispatcher otherwise
    ///
    /// Each frame's replies are written before the next frame is looked at,
    /// so the outbox only has to hold one dispatch worth. A dispatcher or
    /// write failure does not stop later frames from being dispatched; once
    /// a write failed, further replies are dropped unwritten. A transport
    /// failure is reported ahead of a dispatcher failure. Returns the feed
    /// report and the number of replies written.
    fn ingest(
        &mut self,
        bytes: &[u8],
        mut claim: Option<&mut Option<Packet>>,
    ) -> Result<(FeedReport, usize), LinkError<PortError<P>>> {
        let mut feed = FeedReport::default();
        let mut replies_sent = 0;
        let mut transport_error = None;
        let mut reply_error = None;
        let mut rest = bytes;

        let extracted = loop {
            let taken = self.stream.push(rest);
            feed.appended += taken;
            rest = &rest[taken..];

            let drained = loop {
                let decoded = match self.stream.next_packet(&mut feed) {
                    Ok(Some(decoded)) => decoded,
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                };
                if let Some(slot) = claim.as_mut() {
                    if slot.is_none() {
                        **slot = Some(decoded.packet);
                        continue;
                    }
                }

                let mut replies =
                    Replies::new(&self.reply_spec, &mut self.sequence, &mut self.outbox);
                if let Err(e) = self.dispatcher.dispatch(&decoded.packet, &mut replies) {
                    reply_error.get_or_insert(e);
                }
                if transport_error.is_some() {
                    self.outbox.clear();
                    continue;
                }
                match self.flush_outbox() {
                    Ok(sent) => replies_sent += sent,
                    Err(e) => {
                        self.outbox.clear();
                        transport_error = Some(e);
                    }
                }
            };

            // Extraction always leaves room for more bytes unless it failed
            if drained.is_err() || rest.is_empty() {
                break drained;
            }
        };

        self.stats.record_feed(&feed);
        extracted?;
        if let Some(e) = transport_error {
            return Err(e);
        }
        match reply_error {
            Some(e) => Err(LinkError::Reply(e)),
            None => Ok((feed, replies_sent)),
        }
    }

    /// Write every queued frame, oldest first
    fn flush_outbox(&mut self) -> Result<usize, LinkError<PortError<P>>> {
        let mut sent = 0;
        while let Some(frame) = self.outbox.pop() {
            self.port.write_all(&frame).map_err(LinkError::Transport)?;
            self.stats.record_reply();
            sent += 1;
        }
        if sent > 0 {
            self.port.flush().map_err(LinkError::Transport)?;
        }
        Ok(sent)
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Count a transport failure the caller recovered from
    pub fn record_transport_error(&mut self) {
        self.stats.record_transport_error();
    }

    /// Bytes received but not yet part of a complete frame
    pub fn pending_bytes(&self) -> &[u8] {
        self.stream.as_bytes()
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    /// Release the port and dispatcher
    pub fn into_parts(self) -> (P, D) {
        (self.port, self.dispatcher)
    }
}
