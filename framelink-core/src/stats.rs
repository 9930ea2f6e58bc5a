//! Link statistics

use crate::stream::FeedReport;

/// Running counters for one link
///
/// Counters saturate instead of wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    /// Bytes read from the transport
    pub bytes_received: u32,
    /// Frames decoded
    pub packets: u32,
    /// Bytes dropped while resynchronizing
    pub discarded: u32,
    /// Frames that ended on an early tail occurrence
    pub early_tails: u32,
    /// Reply frames written
    pub replies_sent: u32,
    /// Request frames written by [`crate::Link::request`]
    pub requests_sent: u32,
    /// Transport failures seen by the caller
    pub transport_errors: u32,
}

fn bump(counter: &mut u32, by: usize) {
    let by = u32::try_from(by).unwrap_or(u32::MAX);
    *counter = counter.saturating_add(by);
}

impl LinkStats {
    /// Fold one feed round into the counters
    pub fn record_feed(&mut self, report: &FeedReport) {
        bump(&mut self.bytes_received, report.appended);
        bump(&mut self.packets, report.packets);
        bump(&mut self.discarded, report.discarded);
        bump(&mut self.early_tails, report.early_tails);
    }

    pub fn record_reply(&mut self) {
        bump(&mut self.replies_sent, 1);
    }

    pub fn record_request(&mut self) {
        bump(&mut self.requests_sent, 1);
    }

    /// Count a transport failure
    ///
    /// The link itself propagates transport errors; a caller that retries
    /// records them here.
    pub fn record_transport_error(&mut self) {
        bump(&mut self.transport_errors, 1);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
