//! The claim/publish protocol.
//!
//! A `Fence` is the boundary between one pipeline stage and the next. It owns
//! the stage's claim counter and a read-only view of every worker's published
//! sequence at this stage, and is the only place in the crate where claim
//! safety is decided.

use std::sync::atomic::{ AtomicBool, AtomicU64, Ordering };
use std::sync::{ Arc, Weak };
use std::time::Duration;

use parking_lot::RwLock;

use crate::constants::{ DEFAULT_SLEEP_MS, DEFAULT_SPIN_RETRIES };
use crate::error::Result;
use crate::insights;
use crate::metrics::Metrics;
use crate::platform;
use crate::ring::{ Ring, Sequence, SEQ_MAX };

/// Which side of a stage boundary a fence guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceKind {
    Producer,
    Consumer,
}

impl FenceKind {
    fn as_str(self) -> &'static str {
        match self {
            FenceKind::Producer => "producer",
            FenceKind::Consumer => "consumer",
        }
    }
}

/// `AtomicU64` isolated on its own cache line so that one fence's claim
/// counter cannot false-share with a neighbour's.
#[repr(align(64))]
struct PaddedAtomicU64 {
    value: AtomicU64,
}

impl PaddedAtomicU64 {
    fn new(initial: u64) -> Self {
        Self { value: AtomicU64::new(initial) }
    }
}

/// Coordination point between one pipeline stage and the next.
///
/// Holds the stage's `next_claim` counter and the published cursors of every
/// worker bound to it. Fences form a directed cycle (wired by [`crate::pipeline::Pipeline`]);
/// `next_fence` is a non-owning [`Weak`] reference, valid for the engine's
/// lifetime because the owning pipeline keeps a strong reference to every fence.
pub struct Fence {
    kind: FenceKind,
    next_claim: PaddedAtomicU64,
    published_seqs: RwLock<Vec<Arc<AtomicU64>>>,
    next_fence: RwLock<Weak<Fence>>,
    spin_retries: u32,
    sleep_ms: u64,
    wired: AtomicBool,
    _pad: [u8; 128],
}

impl Fence {
    /// Construct a fence of the given kind with the given back-off tuning.
    ///
    /// Fails if the platform's L1 cache line size cannot be probed, or if
    /// `Fence` itself is too small to occupy a full cache line (should not
    /// happen with the padding above, but is asserted rather than assumed).
    pub fn new(kind: FenceKind, spin_retries: Option<u32>, sleep_ms: Option<u64>) -> Result<Arc<Self>> {
        let fence = Arc::new(Self {
            kind,
            next_claim: PaddedAtomicU64::new(0),
            published_seqs: RwLock::new(Vec::new()),
            next_fence: RwLock::new(Weak::new()),
            spin_retries: spin_retries.unwrap_or(DEFAULT_SPIN_RETRIES),
            sleep_ms: sleep_ms.unwrap_or(DEFAULT_SLEEP_MS),
            wired: AtomicBool::new(false),
            _pad: [0; 128],
        });

        platform::check_cache_isolation("Fence", std::mem::size_of::<Fence>())?;

        Ok(fence)
    }

    pub fn kind(&self) -> FenceKind {
        self.kind
    }

    /// Wire this fence's downstream neighbour. Must be called before any task
    /// bound to this fence starts.
    pub fn set_next_fence(&self, next: &Arc<Fence>) {
        *self.next_fence.write() = Arc::downgrade(next);
        self.wired.store(true, Ordering::Release);
    }

    /// Register a worker's published-sequence cursor with this fence.
    pub fn add_task(&self, current_seq: Arc<AtomicU64>) {
        self.published_seqs.write().push(current_seq);
    }

    fn next_fence(&self) -> Arc<Fence> {
        self.next_fence
            .read()
            .upgrade()
            .expect("fence used before pipeline wiring completed")
    }

    /// The minimum published sequence across every worker bound to this
    /// fence, or `SEQ_MAX` if none of them has claimed a slot yet.
    pub fn min_pub(&self) -> Sequence {
        let seqs = self.published_seqs.read();
        let mut min = SEQ_MAX;
        let mut any_claimed = false;

        for seq in seqs.iter() {
            let v = seq.load(Ordering::Acquire);
            if v != SEQ_MAX {
                any_claimed = true;
                if v < min {
                    min = v;
                }
            }
        }

        if any_claimed { min } else { SEQ_MAX }
    }

    fn check_consistency(&self) {
        debug_assert!(self.wired.load(Ordering::Acquire), "fence has no downstream fence wired");
        if self.kind == FenceKind::Producer {
            debug_assert_eq!(
                self.next_fence().kind(),
                FenceKind::Consumer,
                "a producer fence's downstream must be a consumer fence"
            );
        }

        let next = self.next_claim.value.load(Ordering::Acquire);
        debug_assert!(
            self.published_seqs
                .read()
                .iter()
                .all(|seq| {
                    let v = seq.load(Ordering::Acquire);
                    v == SEQ_MAX || v <= next
                }),
            "a worker's published sequence has run ahead of this fence's own claim counter"
        );
    }

    /// Reserve the next sequence for this stage and return the ring cell it
    /// addresses, or `None` if the task was cancelled while it had not yet
    /// claimed a slot (a cooperative, claim-free cancellation point).
    pub fn acquire_slot<'a, Slot>(
        &self,
        ring: &'a Ring<Slot>,
        current_seq: &AtomicU64,
        cancel_flag: &AtomicBool,
        metrics: &Metrics
    ) -> Result<Option<&'a mut Slot>> {
        self.check_consistency();
        let downstream = self.next_fence();

        loop {
            let next = self.next_claim.value.load(Ordering::Acquire);
            let mut pauses = 0u32;

            loop {
                let min_pub = downstream.min_pub();
                let safe = match self.kind {
                    // No downstream worker has claimed anything yet: nothing
                    // to collide with, regardless of how `next`'s index
                    // compares to the bit pattern of the SEQ_MAX sentinel.
                    FenceKind::Producer => min_pub == SEQ_MAX || ring.index(next) != ring.index(min_pub),
                    FenceKind::Consumer => min_pub != SEQ_MAX && min_pub >= next,
                };
                if safe {
                    break;
                }

                current_seq.store(next, Ordering::Release);

                if self.back_off(&mut pauses, metrics) && cancel_flag.load(Ordering::Relaxed) {
                    // No claim held yet: safe to abandon this claim attempt.
                    return Ok(None);
                }
            }

            match self.next_claim.value.compare_exchange(next, next + 1, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => {
                    current_seq.store(next, Ordering::Release);
                    metrics.record_claim();
                    insights::record_claim(self.kind.as_str(), next);
                    self.check_consistency();
                    return Ok(Some(unsafe { ring.at_mut(next) }));
                }
                Err(_) => continue,
            }
        }
    }

    /// Publish that `current_seq` is complete, making it visible as part of
    /// this fence's `min_pub` to the upstream fence. Never aborts on
    /// cancellation: a task must not exit while holding an unpublished claim.
    pub fn release_slot<Slot>(&self, ring: &Ring<Slot>, current_seq: &AtomicU64, metrics: &Metrics) -> Result<()> {
        self.check_consistency();
        let downstream = self.next_fence();
        let seq = current_seq.load(Ordering::Relaxed);
        let mut pauses = 0u32;

        loop {
            let min_pub = downstream.min_pub();
            if min_pub == SEQ_MAX || ring.index(seq + 1) != ring.index(min_pub) {
                break;
            }
            self.back_off(&mut pauses, metrics);
        }

        current_seq.store(seq, Ordering::Release);
        metrics.record_publish();
        insights::record_publish(self.kind.as_str(), seq);
        self.check_consistency();

        Ok(())
    }

    /// Two-level back-off: spin for `spin_retries` iterations, then sleep
    /// `sleep_ms` milliseconds per iteration. Returns `true` once the sleep
    /// tier has been entered, so callers can treat it as a cancellation
    /// checkpoint.
    fn back_off(&self, pauses: &mut u32, metrics: &Metrics) -> bool {
        if *pauses < self.spin_retries {
            std::hint::spin_loop();
            metrics.record_spin();
            *pauses += 1;
            false
        } else {
            let _ = platform::sleep(Duration::from_millis(self.sleep_ms));
            metrics.record_sleep();
            insights::record_backoff_escalation(self.kind.as_str(), self.sleep_ms);
            *pauses += 1;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_consumer_wiring_round_trips() {
        let producer = Fence::new(FenceKind::Producer, None, None).unwrap();
        let consumer = Fence::new(FenceKind::Consumer, None, None).unwrap();

        producer.set_next_fence(&consumer);
        consumer.set_next_fence(&producer);

        assert_eq!(producer.kind(), FenceKind::Producer);
        assert_eq!(consumer.kind(), FenceKind::Consumer);
    }

    #[test]
    fn min_pub_is_seq_max_with_no_tasks() {
        let fence = Fence::new(FenceKind::Consumer, None, None).unwrap();
        assert_eq!(fence.min_pub(), SEQ_MAX);
    }

    #[test]
    fn min_pub_ignores_idle_tasks_but_not_active_ones() {
        let fence = Fence::new(FenceKind::Consumer, None, None).unwrap();
        let idle = Arc::new(AtomicU64::new(SEQ_MAX));
        let active_a = Arc::new(AtomicU64::new(7));
        let active_b = Arc::new(AtomicU64::new(3));

        fence.add_task(Arc::clone(&idle));
        fence.add_task(Arc::clone(&active_a));
        fence.add_task(Arc::clone(&active_b));

        assert_eq!(fence.min_pub(), 3);
    }

    #[test]
    fn acquire_does_not_stall_when_next_index_aliases_seq_max_and_no_consumer_has_claimed() {
        // N = 8: index(SEQ_MAX) == 7. Claim sequences up to 7 with no
        // downstream worker ever registered; none should block, since an
        // unclaimed downstream means nothing is being read yet.
        let ring: Ring<u64> = Ring::new(8).unwrap();
        let producer = Fence::new(FenceKind::Producer, Some(1), Some(1)).unwrap();
        let consumer = Fence::new(FenceKind::Consumer, Some(1), Some(1)).unwrap();
        producer.set_next_fence(&consumer);
        consumer.set_next_fence(&producer);

        let current_seq = AtomicU64::new(SEQ_MAX);
        let cancel_flag = AtomicBool::new(false);
        let metrics = Metrics::new();

        for expected in 0u64..8 {
            let slot = producer
                .acquire_slot(&ring, &current_seq, &cancel_flag, &metrics)
                .unwrap()
                .expect("no cancellation requested");
            *slot = expected;
            producer.release_slot(&ring, &current_seq, &metrics).unwrap();
        }
    }

    #[test]
    fn fence_meets_cache_line_isolation() {
        let required = platform::cache_line_size().unwrap();
        assert!(std::mem::size_of::<Fence>() >= required);
    }
}
