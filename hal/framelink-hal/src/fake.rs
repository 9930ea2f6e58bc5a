//! Scripted in-memory serial port
//!
//! Replays a fixed sequence of read results and records every write, so
//! link and dispatcher behaviour can be tested without a device.

use std::collections::VecDeque;
use std::vec::Vec;

use crate::serial::{SerialRx, SerialTx};

/// Error produced by a scripted read or write failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptedError;

/// One scripted read result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedRead {
    /// Bytes delivered by the next read (split across reads if the caller's
    /// buffer is smaller)
    Bytes(Vec<u8>),
    /// The read timed out with nothing received
    Timeout,
    /// The read failed
    Fail,
}

/// Serial port that replays a script of reads and captures writes
#[derive(Debug, Default)]
pub struct ScriptedPort {
    script: VecDeque<ScriptedRead>,
    writes: Vec<Vec<u8>>,
    fail_writes: bool,
}

impl ScriptedPort {
    /// Create a port that replays `script`, then times out forever
    pub fn new(script: Vec<ScriptedRead>) -> Self {
        Self {
            script: script.into(),
            writes: Vec::new(),
            fail_writes: false,
        }
    }

    /// Create a port whose reads deliver each chunk in turn
    pub fn with_chunks(chunks: &[&[u8]]) -> Self {
        Self::new(
            chunks
                .iter()
                .map(|chunk| ScriptedRead::Bytes(chunk.to_vec()))
                .collect(),
        )
    }

    /// Queue another read result
    pub fn push(&mut self, read: ScriptedRead) {
        self.script.push_back(read);
    }

    /// Make every following write fail
    pub fn fail_writes(&mut self) {
        self.fail_writes = true;
    }

    /// Frames written so far, one entry per write call
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Number of scripted reads not yet consumed
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl SerialRx for ScriptedPort {
    type Error = ScriptedError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.script.pop_front() {
            Some(ScriptedRead::Bytes(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    let rest = bytes.split_off(n);
                    self.script.push_front(ScriptedRead::Bytes(rest));
                }
                Ok(n)
            }
            Some(ScriptedRead::Timeout) | None => Ok(0),
            Some(ScriptedRead::Fail) => Err(ScriptedError),
        }
    }
}

impl SerialTx for ScriptedPort {
    type Error = ScriptedError;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        if self.fail_writes {
            return Err(ScriptedError);
        }
        self.writes.push(data.to_vec());
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
