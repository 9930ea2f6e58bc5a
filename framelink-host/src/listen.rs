//! Serving loop
//!
//! Drives a [`Link`] until a deadline passes. The link itself stops on the
//! first error; this loop decides which errors are worth carrying on from.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use framelink_core::{Cancel, Dispatcher, Link, LinkError, LinkStats, PollReport};
use framelink_hal::{SerialRx, SerialTx};
use tracing::{debug, trace, warn};

/// Pause before reading again after a transport error
pub const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Cancels once a point in time has passed
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// Never cancels
    pub fn never() -> Self {
        Self(None)
    }

    pub fn after(duration: Duration) -> Self {
        Self(Some(Instant::now() + duration))
    }

    /// `after(secs)` when given, otherwise [`Deadline::never`]
    pub fn from_secs(secs: Option<u64>) -> Self {
        secs.map_or(Self::never(), |secs| Self::after(Duration::from_secs(secs)))
    }
}

impl Cancel for Deadline {
    fn is_cancelled(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }
}

/// Serve `link` until `cancel` fires
///
/// Transport errors are counted, logged and retried after `retry_delay`.
/// Reply errors drop the reply and serving goes on. Decode faults mean the
/// layout is wrong and end the loop.
pub fn serve<P, D, C, const N: usize>(
    link: &mut Link<P, D, N>,
    cancel: &C,
    retry_delay: Duration,
) -> Result<LinkStats, LinkError<<P as SerialRx>::Error>>
where
    P: SerialRx + SerialTx<Error = <P as SerialRx>::Error>,
    <P as SerialRx>::Error: fmt::Debug,
    D: Dispatcher,
    C: Cancel + ?Sized,
{
    loop {
        match link.run(cancel, log_poll) {
            Ok(()) => return Ok(*link.stats()),
            Err(LinkError::Transport(e)) => {
                link.record_transport_error();
                warn!(
                    error = ?e,
                    errors = link.stats().transport_errors,
                    "transport error, retrying"
                );
                thread::sleep(retry_delay);
            }
            Err(LinkError::Reply(e)) => {
                warn!(error = %e, "reply dropped");
            }
            Err(e) => return Err(e),
        }
    }
}

fn log_poll(report: &PollReport, stats: &LinkStats) {
    if report.read == 0 {
        return;
    }
    trace!(bytes = report.read, buffered = report.buffered, "received");
    if report.feed.discarded > 0 {
        debug!(
            discarded = report.feed.discarded,
            total = stats.discarded,
            "resynchronized"
        );
    }
    if report.feed.early_tails > 0 {
        debug!(count = report.feed.early_tails, "frame ended on an early tail");
    }
    if report.replies_sent > 0 {
        debug!(count = report.replies_sent, "replies sent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use framelink_core::LinkSettings;
    use framelink_hal::fake::{ScriptedPort, ScriptedRead};
    use framelink_protocol::{FrameLayout, FrameSpec, SequenceCounter};

    use crate::responder::{command_table, Responder};

    const HELP: [u8; 8] = [0x3C, 0x30, 0x30, 0x00, 0x00, 0x00, 0x00, 0x3E];

    /// Cancels after a fixed number of checks
    struct Checks(Cell<u32>);

    impl Cancel for Checks {
        fn is_cancelled(&self) -> bool {
            let left = self.0.get();
            self.0.set(left.saturating_sub(1));
            left == 0
        }
    }

    fn gyj_link(script: Vec<ScriptedRead>) -> Link<ScriptedPort, Responder, 64> {
        Link::new(
            ScriptedPort::new(script),
            FrameSpec::new(FrameLayout::default()).unwrap(),
            command_table().unwrap(),
            SequenceCounter::default(),
            &LinkSettings::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_deadline() {
        assert!(!Deadline::never().is_cancelled());
        assert!(!Deadline::from_secs(Some(3600)).is_cancelled());
        assert!(Deadline::after(Duration::ZERO).is_cancelled());
    }

    #[test]
    fn test_transport_errors_are_retried() {
        let mut link = gyj_link(vec![
            ScriptedRead::Fail,
            ScriptedRead::Bytes(HELP.to_vec()),
            ScriptedRead::Fail,
            ScriptedRead::Bytes(HELP.to_vec()),
        ]);

        let stats = serve(&mut link, &Checks(Cell::new(6)), Duration::ZERO).unwrap();
        assert_eq!(stats.transport_errors, 2);
        assert_eq!(stats.packets, 2);
        assert_eq!(stats.replies_sent, 2);
        assert_eq!(link.dispatcher().state().help_signals, 2);
    }

    #[test]
    fn test_decode_faults_end_serving() {
        let spec = FrameSpec::new(FrameLayout {
            command_offset: 10,
            ..FrameLayout::default()
        })
        .unwrap();
        let mut input = HELP.to_vec();
        input.extend_from_slice(&[0; 4]);
        let mut link: Link<_, _, 64> = Link::new(
            ScriptedPort::new(vec![ScriptedRead::Bytes(input)]),
            spec,
            command_table().unwrap(),
            SequenceCounter::default(),
            &LinkSettings::default(),
        )
        .unwrap();

        let result = serve(&mut link, &Checks(Cell::new(10)), Duration::ZERO);
        assert!(matches!(result, Err(LinkError::Decode(_))));
    }
}
