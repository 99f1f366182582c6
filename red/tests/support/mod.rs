//! Shared helpers for RED integration tests.
//!
//! `parse_red` splits a RED payload back into its blocks so tests can check
//! the wire layout; `LossyLink` drops packets at a seeded, reproducible rate.

#![allow(dead_code)]

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rtp_red_common::RtpPacket;

/// One block recovered from a RED payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBlock {
    pub payload_type: u8,
    /// `None` for the primary block
    pub timestamp_offset: Option<u32>,
    pub data: Bytes,
}

/// Splits a RED payload into its blocks, redundant ones first.
pub fn parse_red(payload: &[u8]) -> Vec<ParsedBlock> {
    // ---
    let mut headers = Vec::new();
    let mut pos = 0;
    loop {
        let first = payload[pos];
        if first & 0x80 == 0 {
            headers.push((first & 0x7F, None, None));
            pos += 1;
            break;
        }
        let packed = u32::from_be_bytes([0, payload[pos + 1], payload[pos + 2], payload[pos + 3]]);
        headers.push((first & 0x7F, Some(packed >> 10), Some((packed & 0x3FF) as usize)));
        pos += 4;
    }

    let mut blocks = Vec::new();
    for (payload_type, timestamp_offset, length) in headers {
        let end = length.map_or(payload.len(), |len| pos + len);
        blocks.push(ParsedBlock {
            payload_type,
            timestamp_offset,
            data: Bytes::copy_from_slice(&payload[pos..end]),
        });
        pos = end;
    }
    blocks
}

/// Drops packets with a fixed probability, deterministically per seed.
pub struct LossyLink {
    // ---
    rng: StdRng,
    loss_rate: f64,
    pub packets_sent: u64,
    pub packets_lost: u64,
}

impl LossyLink {
    // ---
    pub fn new(loss_rate: f64, seed: u64) -> Self {
        // ---
        Self {
            rng: StdRng::seed_from_u64(seed),
            loss_rate,
            packets_sent: 0,
            packets_lost: 0,
        }
    }

    /// Returns the packet if it survives the link.
    pub fn transmit(&mut self, packet: RtpPacket) -> Option<RtpPacket> {
        // ---
        self.packets_sent += 1;
        if self.rng.gen::<f64>() < self.loss_rate {
            self.packets_lost += 1;
            return None;
        }
        Some(packet)
    }
}
