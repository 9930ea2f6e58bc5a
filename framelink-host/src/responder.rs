//! GYJ-0122 call unit responder
//!
//! Units send a help signal (`0x30`) when a call button is pressed; the host
//! acknowledges with `0x31` and a flag byte. The flag is `0x00` when either
//! of the first two data bytes is zero, `0x01` otherwise.

use framelink_core::{CommandTable, Dispatcher, Replies, ReplyError, TableError};
use framelink_protocol::Packet;
use tracing::{debug, info, warn};

/// Help signal sent by a unit
pub const HELP_SIGNAL: u8 = 0x30;

/// Acknowledgement command, sent and received
pub const ACKNOWLEDGE: u8 = 0x31;

/// Commands the responder has seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub help_signals: u64,
    pub acknowledgements: u64,
    pub unknown: u64,
}

/// Dispatch table for GYJ-0122 units
pub type Responder = CommandTable<Tally, 4>;

/// Build the GYJ-0122 dispatch table
pub fn command_table() -> Result<Responder, TableError> {
    let mut table = Responder::new(Tally::default()).with_fallback(on_unknown);
    table.register(&[HELP_SIGNAL], on_help_signal)?;
    table.register(&[ACKNOWLEDGE], on_acknowledge)?;
    Ok(table)
}

/// Flag byte acknowledging a help signal with `data`
pub fn help_flag(data: &[u8]) -> u8 {
    match data {
        [0, ..] | [_, 0, ..] => 0x00,
        _ => 0x01,
    }
}

fn on_help_signal(
    tally: &mut Tally,
    packet: &Packet,
    replies: &mut Replies<'_>,
) -> Result<(), ReplyError> {
    tally.help_signals += 1;
    info!(data = ?packet.data.as_slice(), "received help signal");

    let flag = help_flag(&packet.data);
    let sequence = replies.send(&[ACKNOWLEDGE], &[flag])?;
    debug!(sequence, flag, "queued acknowledgement");
    Ok(())
}

fn on_acknowledge(tally: &mut Tally, _: &Packet, _: &mut Replies<'_>) -> Result<(), ReplyError> {
    tally.acknowledgements += 1;
    info!("received acknowledgement");
    Ok(())
}

fn on_unknown(tally: &mut Tally, packet: &Packet, _: &mut Replies<'_>) -> Result<(), ReplyError> {
    tally.unknown += 1;
    warn!(command = ?packet.command.as_slice(), "unknown command");
    Ok(())
}

/// Dispatcher wrapper that logs every packet before handing it on
#[derive(Debug)]
pub struct Traced<D> {
    inner: D,
}

impl<D> Traced<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: Dispatcher> Dispatcher for Traced<D> {
    fn dispatch(&mut self, packet: &Packet, replies: &mut Replies<'_>) -> Result<(), ReplyError> {
        debug!(
            command = ?packet.command.as_slice(),
            length = ?packet.length,
            data = ?packet.data.as_slice(),
            "decoded packet"
        );
        self.inner.dispatch(packet, replies)
    }
}
