//! framelink host application
//!
//! Serves a framelink serial link from a character device:
//! - [`config`]: TOML configuration loading and validation
//! - [`port`]: `std::io` adapter for the transport traits
//! - [`responder`]: GYJ-0122 call unit command handlers
//! - [`listen`]: serving loop with deadline and transport retry
//! - [`replay`]: offline decoding of captured byte streams

pub mod config;
pub mod listen;
pub mod port;
pub mod replay;
pub mod responder;

/// Receive buffer capacity used by the host
///
/// Large enough for the biggest frame any valid layout can describe.
pub const RX_BUFFER_SIZE: usize = 1024;
