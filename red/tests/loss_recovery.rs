//! Redundancy under packet loss.
//!
//! Sends a stream through a seeded lossy link and checks that every lost
//! frame whose successor arrives can be rebuilt from that successor's
//! redundant block.

mod support;

use bytes::Bytes;
use rtp_red::{RedEncoder, RedundancyConfig, SinkEvent};
use rtp_red_common::RtpPacket;
use std::collections::BTreeMap;
use support::{parse_red, LossyLink};

const MEDIA_PT: u8 = 111;
const RED_PT: u8 = 63;
const SAMPLES_PER_FRAME: u32 = 960;

fn payload_for(seq: u16) -> Bytes {
    // Varying lengths so block boundaries matter
    Bytes::from(vec![seq as u8; 20 + (seq as usize % 13)])
}

/// Encodes `count` frames and returns what reached the far end.
fn run(distance: u32, count: u16, loss_rate: f64, seed: u64) -> (Vec<RtpPacket>, LossyLink) {
    // ---
    let config = RedundancyConfig::new(RED_PT, distance, true).expect("valid config");
    let mut encoder = RedEncoder::new(config);
    let mut link = LossyLink::new(loss_rate, seed);
    let mut delivered = Vec::new();

    for seq in 0..count {
        let frame = RtpPacket::new(
            MEDIA_PT,
            seq,
            seq as u32 * SAMPLES_PER_FRAME,
            0xCAFE,
            payload_for(seq),
        );

        let mut out: Vec<SinkEvent> = Vec::new();
        encoder.push_frame(frame, &mut out);
        for event in out {
            if let SinkEvent::Packet(packet) = event {
                if let Some(packet) = link.transmit(packet) {
                    delivered.push(packet);
                }
            }
        }
    }

    (delivered, link)
}

/// Rebuilds payloads by timestamp from primary and redundant blocks.
fn reconstruct(delivered: &[RtpPacket]) -> BTreeMap<u32, Bytes> {
    // ---
    let mut recovered = BTreeMap::new();
    for packet in delivered {
        assert_eq!(packet.payload_type, RED_PT);
        for block in parse_red(&packet.payload) {
            let ts = packet.timestamp - block.timestamp_offset.unwrap_or(0);
            recovered.entry(ts).or_insert(block.data);
        }
    }
    recovered
}

#[test]
fn test_distance_one_recovers_isolated_losses() {
    // ---
    let count = 300;
    let (delivered, link) = run(1, count, 0.2, 42);
    assert!(link.packets_lost > 0, "seed should produce some loss");

    let received: Vec<u16> = delivered.iter().map(|p| p.sequence).collect();
    let recovered = reconstruct(&delivered);

    for seq in 0..count {
        let ts = seq as u32 * SAMPLES_PER_FRAME;
        let next_arrived = received.contains(&(seq + 1));
        if received.contains(&seq) || next_arrived {
            assert_eq!(recovered.get(&ts), Some(&payload_for(seq)), "seq {seq}");
        }
    }
    assert!(recovered.len() > delivered.len());
}

#[test]
fn test_distance_two_recovers_from_two_later() {
    // ---
    let count = 200;
    let (delivered, _link) = run(2, count, 0.3, 7);
    let received: Vec<u16> = delivered.iter().map(|p| p.sequence).collect();
    let recovered = reconstruct(&delivered);

    // seq 0 is carried by seq 1 during warm-up, later frames by seq + 2
    for seq in 1..count - 2 {
        if received.contains(&(seq + 2)) {
            let ts = seq as u32 * SAMPLES_PER_FRAME;
            assert_eq!(recovered.get(&ts), Some(&payload_for(seq)), "seq {seq}");
        }
    }
}

#[test]
fn test_lossless_link_delivers_everything() {
    // ---
    let (delivered, link) = run(1, 50, 0.0, 1);

    assert_eq!(link.packets_lost, 0);
    assert_eq!(delivered.len(), 50);
    assert_eq!(reconstruct(&delivered).len(), 50);
}
