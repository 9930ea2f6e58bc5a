//! Board-agnostic link logic
//!
//! This crate contains everything between the transport and the
//! application that does not depend on a specific port implementation:
//!
//! - [`stream::StreamBuffer`]: receive buffer and the extract/resync loop
//! - [`dispatch`]: dispatcher trait, command lookup table, reply outbox
//! - [`link::Link`]: read/dispatch/reply driver with cancellation
//! - [`stats::LinkStats`]: running counters for a link
//! - [`config`]: link configuration types

#![no_std]
#![deny(unsafe_code)]

pub mod config;
pub mod dispatch;
pub mod link;
pub mod stats;
pub mod stream;

pub use config::{LinkConfig, LinkSettings, SequenceRange};
pub use dispatch::{
    CommandTable, Dispatcher, Frame, Handler, Outbox, Replies, ReplyError, TableError,
    MAX_PENDING_REPLIES,
};
pub use link::{Cancel, Link, LinkError, Never, PollReport, MAX_READ_CHUNK, REQUEST_READS};
pub use stats::LinkStats;
pub use stream::{FeedReport, StreamBuffer, StreamError};
