//! Tuning constants used by the ring/fence/task coordination engine.

/// Default ring buffer size (must be a power of two).
pub const DEFAULT_RING_SIZE: usize = 1024;

/// Default number of spin iterations before a waiting loop falls back to sleeping.
pub const DEFAULT_SPIN_RETRIES: u32 = 32;

/// Default sleep duration (milliseconds) once `DEFAULT_SPIN_RETRIES` is exhausted.
pub const DEFAULT_SLEEP_MS: u64 = 25;

/// Default number of slots a task processes between cooperative cancellation checkpoints.
pub const DEFAULT_CANCEL_EVERY: usize = 256;

/// Fallback L1 cache line size used when the platform probe is unavailable.
pub const FALLBACK_CACHE_LINE_SIZE: usize = 64;

/// Fixed 32-bit seed for the Bloom filter's double-hashing scheme: `(e *
/// 10^9) as u32`, matching the source this crate's Bloom filter is grounded
/// on. Spelled out as a literal since `as`-casting a `const fn` float product
/// is not guaranteed across toolchains.
pub const BLOOM_SEED: u32 = 2_718_281_828;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ring_size_is_power_of_two() {
        assert!(DEFAULT_RING_SIZE.is_power_of_two());
    }

    #[test]
    fn bloom_seed_matches_e_times_1e9() {
        assert_eq!(BLOOM_SEED, 2_718_281_828);
    }
}
