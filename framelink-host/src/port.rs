//! `std::io` transport adapter
//!
//! Wraps any `Read + Write` value as a framelink port. On a host the inner
//! value is the device node opened as a file; the tty line settings are
//! applied with `stty`, which [`stty_args`] renders from a [`SerialConfig`].

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::process::Command;

use framelink_hal::{Parity, SerialConfig, SerialRx, SerialTx, StopBits};
use tracing::{debug, info};

/// Serial port over a `std::io` stream
#[derive(Debug)]
pub struct StdPort<P> {
    inner: P,
}

impl<P> StdPort<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &P {
        &self.inner
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl StdPort<File> {
    /// Open the device node named by `config` for reading and writing
    pub fn open(config: &SerialConfig) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(config.path.as_str())?;
        info!(path = config.path.as_str(), "serial port opened");
        Ok(Self::new(file))
    }
}

impl<P: Read> SerialRx for StdPort<P> {
    type Error = io::Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.inner.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if is_timeout(&e) => Ok(0),
            Err(e) => Err(e),
        }
    }
}

impl<P: Write> SerialTx for StdPort<P> {
    type Error = io::Error;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        match self.inner.write(data) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.inner.flush()
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

/// `stty` arguments putting the device into raw mode with `config`'s line
/// settings
///
/// With a timeout configured the tty runs with `min 0`, so a read returns
/// whatever arrived within `timeout_ms` (rounded up to tenths of a second,
/// capped at 25.5 s) and an idle line gives an empty read. A `timeout_ms`
/// of zero blocks each read until `minimum_read_size` bytes are in.
pub fn stty_args(config: &SerialConfig) -> Vec<String> {
    let mut args = vec![
        "-F".to_string(),
        config.path.as_str().to_string(),
        config.baudrate.to_string(),
        "raw".to_string(),
        "-echo".to_string(),
        format!("cs{}", u8::from(config.data_bits)),
    ];
    args.extend(
        match config.parity {
            Parity::None => ["-parenb", "-parodd"],
            Parity::Even => ["parenb", "-parodd"],
            Parity::Odd => ["parenb", "parodd"],
        }
        .map(String::from),
    );
    args.push(match config.stop_bits {
        StopBits::One => "-cstopb".to_string(),
        StopBits::Two => "cstopb".to_string(),
    });

    // VTIME only starts after the first byte unless VMIN is zero
    let (min, time) = match config.timeout_ms {
        0 => (config.minimum_read_size, 0),
        ms => (0, ms.div_ceil(100).min(255)),
    };
    args.extend([
        "min".to_string(),
        min.to_string(),
        "time".to_string(),
        time.to_string(),
    ]);
    args
}

/// Run `stty` to apply `config`'s line settings to its device
pub fn apply_line_settings(config: &SerialConfig) -> io::Result<()> {
    let args = stty_args(config);
    debug!(?args, "applying line settings");
    let status = Command::new("stty").args(&args).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("stty exited with {status}")))
    }
}
