//! Seed material for oracle index assignment and request routing.
//!
//! The substrate's block timestamp/nonce is abstracted behind [`NonceSource`],
//! and the whole seed computation behind [`SeedSource`], so tests can inject
//! fixed seeds and assert exact index assignments.

use sha2::{Digest, Sha256};

use crate::types::{Account, FlightKey};

/// Supplies monotonically available nonce material from the substrate.
pub trait NonceSource: Send + Sync {
    /// Next nonce.
    fn nonce(&mut self) -> u64;
}

/// Uses the wall clock in milliseconds, standing in for a block timestamp.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClockNonce;

impl NonceSource for ClockNonce {
    fn nonce(&mut self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Counts up from a starting value.
#[derive(Debug, Clone, Copy)]
pub struct SequenceNonce {
    next: u64,
}

impl SequenceNonce {
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }
}

impl NonceSource for SequenceNonce {
    fn nonce(&mut self) -> u64 {
        let nonce = self.next;
        self.next = self.next.wrapping_add(1);
        nonce
    }
}

/// Produces the 32-byte seed an oracle's indexes are drawn from.
pub trait SeedSource: Send + Sync {
    /// Seed for `caller` at the registry's current rotating counter.
    fn seed(&mut self, caller: &Account, counter: u64) -> [u8; 32];
}

impl<F> SeedSource for F
where
    F: FnMut(&Account, u64) -> [u8; 32] + Send + Sync,
{
    fn seed(&mut self, caller: &Account, counter: u64) -> [u8; 32] {
        self(caller, counter)
    }
}

/// Default seed: `sha256(caller, nonce, counter)`.
pub struct SubstrateSeed<N: NonceSource> {
    nonces: N,
}

impl<N: NonceSource> SubstrateSeed<N> {
    pub fn new(nonces: N) -> Self {
        Self { nonces }
    }
}

impl Default for SubstrateSeed<ClockNonce> {
    fn default() -> Self {
        Self::new(ClockNonce)
    }
}

impl<N: NonceSource> SeedSource for SubstrateSeed<N> {
    fn seed(&mut self, caller: &Account, counter: u64) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(caller.as_bytes());
        hasher.update(self.nonces.nonce().to_be_bytes());
        hasher.update(counter.to_be_bytes());
        hasher.finalize().into()
    }
}

/// Draw `count` distinct indexes in `[0, space)` from `seed`.
///
/// Each byte yields `byte % space`; repeats are skipped and the seed is
/// re-hashed once its bytes run out.
pub fn draw_indexes(seed: [u8; 32], space: u16, count: usize) -> Vec<u8> {
    debug_assert!(space > 0 && space <= 256 && count <= space as usize);
    let mut indexes = Vec::with_capacity(count);
    let mut block = seed;
    while indexes.len() < count {
        for byte in block {
            let index = (byte as u16 % space) as u8;
            if !indexes.contains(&index) {
                indexes.push(index);
                if indexes.len() == count {
                    break;
                }
            }
        }
        block = Sha256::digest(block).into();
    }
    indexes
}

/// Routing index of a status request, a pure function of the flight key.
pub fn routing_index(key: &FlightKey, space: u16) -> u8 {
    let mut hasher = Sha256::new();
    hasher.update(key.airline.as_bytes());
    hasher.update([0u8]);
    hasher.update(key.flight.as_bytes());
    hasher.update([0u8]);
    hasher.update(key.timestamp.to_be_bytes());
    let digest = hasher.finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) % space as u64) as u8
}
