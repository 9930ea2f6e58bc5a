//! framelink Hardware Abstraction Layer
//!
//! This crate defines the transport traits the stream decoder is driven
//! through. A board support crate implements them over a UART peripheral,
//! the host crate implements them over a character device.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (framelink-host, etc.)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  framelink-core (Link, StreamBuffer)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  framelink-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`serial::SerialRx`], [`serial::SerialTx`] - Serial communication
//!
//! With the `std` feature, [`fake::ScriptedPort`] provides a scripted
//! in-memory port for tests.

#![no_std]
#![deny(unsafe_code)]

#[cfg(feature = "std")]
extern crate std;

#[cfg(feature = "std")]
pub mod fake;
pub mod serial;

// Re-export key traits at crate root for convenience
pub use serial::{DataBits, Parity, SerialConfig, SerialRx, SerialTx, StopBits};
