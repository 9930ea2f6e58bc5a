//! Configuration types
//!
//! Board-agnostic link configuration. The host deserializes it from TOML;
//! an embedded build can construct it directly or use the defaults.

pub mod types;

pub use types::*;
