//! The receive buffer must not care how the transport splits the stream

use framelink_core::{FeedReport, StreamBuffer};
use framelink_protocol::{FrameLayout, FrameSpec, Packet};
use proptest::prelude::*;

fn spec() -> FrameSpec {
    FrameSpec::new(FrameLayout::default()).unwrap()
}

/// Run `stream` through a fresh buffer, cut at `cuts`
fn decode(stream: &[u8], cuts: &[usize]) -> (Vec<Packet>, FeedReport, Vec<u8>) {
    let mut buffer = StreamBuffer::<32>::new(spec()).unwrap();
    let mut packets = Vec::new();
    let mut total = FeedReport::default();

    let mut start = 0;
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (stream.len() + 1)).collect();
    points.push(stream.len());
    points.sort_unstable();
    for end in points {
        let report = buffer
            .feed(&stream[start..end], |decoded| packets.push(decoded.packet))
            .unwrap();
        total.merge(&report);
        start = end;
    }
    (packets, total, buffer.as_bytes().to_vec())
}

/// Well-formed frame whose body never contains the tail byte
fn frame() -> impl Strategy<Value = Vec<u8>> {
    (0u8..0x3E, 0u8..0x3E, proptest::collection::vec(0u8..0x3E, 4)).prop_map(
        |(sequence, command, data)| {
            let mut frame = vec![0x3C, sequence, command];
            frame.extend_from_slice(&data);
            frame.push(0x3E);
            frame
        },
    )
}

fn noisy_stream() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(
        prop_oneof![
            3 => frame(),
            1 => proptest::collection::vec(any::<u8>(), 1..6),
        ],
        0..12,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn chunking_does_not_change_results(
        stream in noisy_stream(),
        cuts in proptest::collection::vec(any::<usize>(), 0..10),
    ) {
        let (whole_packets, whole, whole_rest) = decode(&stream, &[]);
        let (split_packets, split, split_rest) = decode(&stream, &cuts);

        prop_assert_eq!(whole_packets, split_packets);
        prop_assert_eq!(whole.packets, split.packets);
        prop_assert_eq!(whole.discarded, split.discarded);
        prop_assert_eq!(whole_rest, split_rest);
        prop_assert_eq!(split.appended, stream.len());
    }

    #[test]
    fn every_byte_is_accounted_for(stream in noisy_stream()) {
        let mut buffer = StreamBuffer::<32>::new(spec()).unwrap();
        let mut consumed = 0;
        let report = buffer.feed(&stream, |decoded| consumed += decoded.consumed).unwrap();

        prop_assert_eq!(consumed + report.discarded + buffer.len(), stream.len());
    }

    #[test]
    fn clean_frames_all_decode(frames in proptest::collection::vec(frame(), 1..8)) {
        let stream = frames.concat();
        let (packets, report, rest) = decode(&stream, &[]);

        prop_assert_eq!(packets.len(), frames.len());
        prop_assert_eq!(report.discarded, 0);
        prop_assert!(rest.is_empty());
    }
}
