//! Lookup-table dispatch keyed by command bytes

use core::fmt;

use heapless::Vec;

use framelink_protocol::{Packet, MAX_COMMAND_LEN};

use super::{Dispatcher, Replies, ReplyError};

/// Command handler
///
/// Handlers share the table's state `S`.
pub type Handler<S> = fn(&mut S, &Packet, &mut Replies<'_>) -> Result<(), ReplyError>;

/// Errors registering a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TableError {
    /// A handler is already registered for this command
    Duplicate,
    /// Table has no free slot
    Full,
    /// Command longer than [`MAX_COMMAND_LEN`]
    CommandTooLong,
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::Duplicate => f.write_str("command already registered"),
            TableError::Full => f.write_str("command table is full"),
            TableError::CommandTooLong => f.write_str("command too long"),
        }
    }
}

struct Entry<S> {
    command: Vec<u8, MAX_COMMAND_LEN>,
    handler: Handler<S>,
}

/// Dispatcher that routes packets to handlers by exact command match
///
/// Packets with no registered command go to the fallback, or are dropped
/// when there is none.
pub struct CommandTable<S, const N: usize> {
    state: S,
    entries: Vec<Entry<S>, N>,
    fallback: Option<Handler<S>>,
}

impl<S, const N: usize> CommandTable<S, N> {
    pub fn new(state: S) -> Self {
        Self {
            state,
            entries: Vec::new(),
            fallback: None,
        }
    }

    /// Register `handler` for `command`
    pub fn register(&mut self, command: &[u8], handler: Handler<S>) -> Result<(), TableError> {
        let command = Vec::from_slice(command).map_err(|_| TableError::CommandTooLong)?;
        if self.entries.iter().any(|entry| entry.command == command) {
            return Err(TableError::Duplicate);
        }
        self.entries
            .push(Entry { command, handler })
            .map_err(|_| TableError::Full)
    }

    /// Builder form of [`CommandTable::set_fallback`]
    pub fn with_fallback(mut self, handler: Handler<S>) -> Self {
        self.fallback = Some(handler);
        self
    }

    /// Handler for commands with no entry
    pub fn set_fallback(&mut self, handler: Handler<S>) {
        self.fallback = Some(handler);
    }

    /// Handler that a packet with `command` would reach
    pub fn lookup(&self, command: &[u8]) -> Option<Handler<S>> {
        self.entries
            .iter()
            .find(|entry| entry.command.as_slice() == command)
            .map(|entry| entry.handler)
            .or(self.fallback)
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn into_state(self) -> S {
        self.state
    }

    /// Number of registered commands, not counting the fallback
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S, const N: usize> Dispatcher for CommandTable<S, N> {
    fn dispatch(&mut self, packet: &Packet, replies: &mut Replies<'_>) -> Result<(), ReplyError> {
        match self.lookup(&packet.command) {
            Some(handler) => handler(&mut self.state, packet, replies),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Outbox;
    use framelink_protocol::{FrameLayout, FrameSpec, SequenceCounter};

    #[derive(Default)]
    struct Seen {
        help: u32,
        unknown: u32,
    }

    fn help(state: &mut Seen, _: &Packet, replies: &mut Replies<'_>) -> Result<(), ReplyError> {
        state.help += 1;
        replies.send(&[0x31], &[0x00]).map(|_| ())
    }

    fn unknown(state: &mut Seen, _: &Packet, _: &mut Replies<'_>) -> Result<(), ReplyError> {
        state.unknown += 1;
        Ok(())
    }

    fn packet(command: u8) -> Packet {
        Packet::from_parts(&[0x3C], None, &[command], &[0; 4], &[0x3E]).unwrap()
    }

    fn run(table: &mut CommandTable<Seen, 4>, command: u8) -> usize {
        let spec = FrameSpec::new(FrameLayout::default()).unwrap();
        let mut sequence = SequenceCounter::default();
        let mut outbox = Outbox::new();
        let mut replies = Replies::new(&spec, &mut sequence, &mut outbox);
        table.dispatch(&packet(command), &mut replies).unwrap();
        outbox.len()
    }

    #[test]
    fn test_routes_by_command() {
        let mut table = CommandTable::<Seen, 4>::new(Seen::default());
        table.register(&[0x30], help).unwrap();

        assert_eq!(run(&mut table, 0x30), 1);
        assert_eq!(run(&mut table, 0x42), 0);
        assert_eq!(table.state().help, 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_fallback_catches_unknown() {
        let mut table = CommandTable::<Seen, 4>::new(Seen::default()).with_fallback(unknown);
        table.register(&[0x30], help).unwrap();

        run(&mut table, 0x42);
        run(&mut table, 0x43);
        let seen = table.into_state();
        assert_eq!(seen.unknown, 2);
        assert_eq!(seen.help, 0);
    }

    #[test]
    fn test_register_errors() {
        let mut table = CommandTable::<Seen, 2>::new(Seen::default());
        table.register(&[0x30], help).unwrap();
        assert_eq!(table.register(&[0x30], unknown), Err(TableError::Duplicate));
        assert_eq!(
            table.register(&[0; MAX_COMMAND_LEN + 1], help),
            Err(TableError::CommandTooLong)
        );
        table.register(&[0x31], help).unwrap();
        assert_eq!(table.register(&[0x32], help), Err(TableError::Full));
    }

    #[test]
    fn test_multi_byte_commands_match_exactly() {
        let mut table = CommandTable::<Seen, 4>::new(Seen::default());
        table.register(&[0x30, 0x01], help).unwrap();
        assert!(table.lookup(&[0x30, 0x01]).is_some());
        assert!(table.lookup(&[0x30]).is_none());
    }
}
