//! Deterministic random number generation for wave composition.
//!
//! RULE: Nothing in the session core may call any platform RNG.
//! Every stream is derived from (map seed, wave index, stream slot), so
//! a restored session regenerates exactly the queue it would have built.

use crate::types::WaveIndex;
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for one wave and one purpose.
pub struct WaveRng {
    pub stream: RngStream,
    inner: Pcg64Mcg,
}

impl WaveRng {
    pub fn new(map_seed: u64, wave: WaveIndex, stream: RngStream) -> Self {
        let derived_seed = map_seed
            ^ u64::from(wave).wrapping_mul(0x9e37_79b9_7f4a_7c15)
            ^ (stream as u64).wrapping_mul(0xc2b2_ae3d_27d4_eb4f);
        Self {
            stream,
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Pick an index from `weights` proportionally. Returns None when
    /// every weight is zero.
    pub fn weighted_index(&mut self, weights: &[u32]) -> Option<usize> {
        let total: u64 = weights.iter().map(|w| u64::from(*w)).sum();
        if total == 0 {
            return None;
        }
        let mut roll = self.next_u64_below(total);
        for (i, w) in weights.iter().enumerate() {
            let w = u64::from(*w);
            if roll < w {
                return Some(i);
            }
            roll -= w;
        }
        None
    }
}

/// Stable stream slots.
/// NEVER reorder or remove entries — only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum RngStream {
    Composition = 0,
}
