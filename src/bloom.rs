//! Space-efficient probabilistic set membership over opaque byte keys.
//!
//! Parameterised at construction from a target capacity and false-positive
//! rate via the standard optimal-bit-count / optimal-hash-count formulas, and
//! indexed with Kirsch-Mitzenmacher double hashing so a single 128-bit hash
//! produces all `K` indices per key.

use crate::constants::BLOOM_SEED;
use crate::error::{ Result, RingFenceError };
use crate::hash;

/// A fixed-capacity Bloom filter over `&[u8]` keys.
pub struct BloomFilter {
    num_bits: usize,
    num_hashes: usize,
    seed: u32,
    bits: Vec<u8>,
}

impl BloomFilter {
    /// Size the filter for `n` expected insertions at false-positive rate `p`.
    ///
    /// `M = ceil(-n * ln(p) / (ln 2)^2 / 8) * 8`, `K = ceil(ln(2) * M / n)`.
    ///
    /// Fails if `n == 0` or `p` is not in `(0, 1)`.
    pub fn new(n: usize, p: f64) -> Result<Self> {
        if n == 0 {
            return Err(RingFenceError::bloom_params("capacity n must be non-zero"));
        }
        if !(p > 0.0 && p < 1.0) {
            return Err(RingFenceError::bloom_params(format!("false-positive rate must be in (0, 1), got {p}")));
        }

        let ln2 = std::f64::consts::LN_2;
        let raw_bits = -(n as f64) * p.ln() / (ln2 * ln2);
        let num_bits = (((raw_bits / 8.0).ceil() as usize) * 8).max(8);
        let num_hashes = ((ln2 * (num_bits as f64)) / (n as f64)).ceil().max(1.0) as usize;

        Ok(Self {
            num_bits,
            num_hashes,
            seed: BLOOM_SEED,
            bits: vec![0u8; num_bits / 8],
        })
    }

    /// Total bits in the underlying bit array (`M`).
    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Hash functions per key (`K`).
    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    /// `K` bucket indices for `key`, derived from one 128-bit hash via
    /// `(h0 + i * h1) mod M`. Built fresh on every call (never a shared
    /// scratch field), so [`BloomFilter::member`] is safe to call
    /// concurrently from multiple readers.
    fn indices(&self, key: &[u8]) -> Vec<usize> {
        let (h0, h1) = hash::hash128(key, self.seed);
        let m = self.num_bits as u64;

        (0..self.num_hashes)
            .map(|i| (h0.wrapping_add((i as u64).wrapping_mul(h1)) % m) as usize)
            .collect()
    }

    /// Record `key` as a member.
    pub fn insert(&mut self, key: &[u8]) {
        for idx in self.indices(key) {
            self.set_bit(idx);
        }
    }

    /// True iff `key` may have been inserted (never a false negative, may be
    /// a false positive within the configured rate).
    pub fn member(&self, key: &[u8]) -> bool {
        self.indices(key).into_iter().all(|idx| self.get_bit(idx))
    }

    /// Zero the bit array. Parameters (`M`, `K`, seed) are unaffected.
    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|b| {
            *b = 0;
        });
    }

    /// Population count of set bits (Brian Kernighan's algorithm).
    pub fn count(&self) -> usize {
        let mut count = 0;
        for &byte in self.bits.iter() {
            let mut b = byte;
            while b != 0 {
                b &= b - 1;
                count += 1;
            }
        }
        count
    }

    fn set_bit(&mut self, n: usize) {
        self.bits[n / 8] |= 1 << (n % 8);
    }

    fn get_bit(&self, n: usize) -> bool {
        (self.bits[n / 8] & (1 << (n % 8))) != 0
    }
}
