//! Outgoing frame sequence numbers

use core::fmt;

/// Sequence range errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequenceError {
    /// `start` is greater than `end`
    EmptyRange { start: u8, end: u8 },
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceError::EmptyRange { start, end } => {
                write!(f, "sequence start {start:#04x} is after end {end:#04x}")
            }
        }
    }
}

/// Cyclic one-byte counter tagging outgoing frames
///
/// Counts `start..=end` and wraps back to `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SequenceCounter {
    current: u8,
    start: u8,
    end: u8,
}

impl Default for SequenceCounter {
    /// ASCII digits `'0'..='9'`, as used by GYJ-0122 units
    fn default() -> Self {
        Self {
            current: b'0',
            start: b'0',
            end: b'9',
        }
    }
}

impl SequenceCounter {
    /// Create a counter over `start..=end`, beginning at `start`
    pub fn new(start: u8, end: u8) -> Result<Self, SequenceError> {
        if start > end {
            return Err(SequenceError::EmptyRange { start, end });
        }
        Ok(Self {
            current: start,
            start,
            end,
        })
    }

    /// Return the current value and advance
    pub fn next(&mut self) -> u8 {
        let value = self.current;
        // Compare before incrementing so an end of 0xFF cannot overflow
        self.current = if value >= self.end {
            self.start
        } else {
            value + 1
        };
        value
    }

    /// Value the next call to [`SequenceCounter::next`] returns
    pub fn peek(&self) -> u8 {
        self.current
    }

    /// Restart from the beginning of the range
    pub fn reset(&mut self) {
        self.current = self.start;
    }
}
