//! Metrics for the ring/fence/task coordination engine.
//!
//! Lightweight counters for observability, relaxed ordering throughout since
//! these are monitoring aids, not part of the claim/publish happens-before chain.

use std::sync::atomic::{ AtomicU64, Ordering };

/// Per-pipeline metrics counters.
pub struct Metrics {
    pub slots_claimed: AtomicU64,
    pub slots_published: AtomicU64,
    pub backoff_spins: AtomicU64,
    pub backoff_sleeps: AtomicU64,
    pub cancellations: AtomicU64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            slots_claimed: AtomicU64::new(0),
            slots_published: AtomicU64::new(0),
            backoff_spins: AtomicU64::new(0),
            backoff_sleeps: AtomicU64::new(0),
            cancellations: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_claim(&self) {
        self.slots_claimed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_publish(&self) {
        self.slots_published.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_spin(&self) {
        self.backoff_spins.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sleep(&self) {
        self.backoff_sleeps.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cancellation(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            slots_claimed: self.slots_claimed.load(Ordering::Relaxed),
            slots_published: self.slots_published.load(Ordering::Relaxed),
            backoff_spins: self.backoff_spins.load(Ordering::Relaxed),
            backoff_sleeps: self.backoff_sleeps.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.slots_claimed.store(0, Ordering::Relaxed);
        self.slots_published.store(0, Ordering::Relaxed);
        self.backoff_spins.store(0, Ordering::Relaxed);
        self.backoff_sleeps.store(0, Ordering::Relaxed);
        self.cancellations.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub slots_claimed: u64,
    pub slots_published: u64,
    pub backoff_spins: u64,
    pub backoff_sleeps: u64,
    pub cancellations: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "claimed={} published={} spins={} sleeps={} cancellations={}",
            self.slots_claimed,
            self.slots_published,
            self.backoff_spins,
            self.backoff_sleeps,
            self.cancellations
        )
    }
}
