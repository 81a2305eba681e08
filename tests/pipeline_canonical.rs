//! Integration tests for the canonical pipeline scenario from the design
//! notes: one producer, two parallel consumers sharing a fence, and one
//! final consumer closing the cycle back to the producer.
//!
//! Mirrors the 3-fence/N=8 scenario: the producer writes `seq * 4`, the two
//! middle consumers each write `base + {1, 2}`, and the final consumer
//! asserts the remainder is one of those and writes `base + 3`. On the next
//! lap around the ring the producer should observe its own slot ending in 3.

use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::Arc;
use std::time::Duration;

use ringfence::Pipeline;

const RING_SIZE: usize = 8;

#[test]
fn canonical_three_fence_pipeline_respects_ordering_invariants() {
    let builder = Pipeline::<u64>::builder(RING_SIZE).unwrap();
    let (builder, producer) = builder.producer_fence(Some(4), Some(1)).unwrap();
    let (builder, middle) = builder.consumer_fence(Some(4), Some(1)).unwrap();
    let (builder, last) = builder.consumer_fence(Some(4), Some(1)).unwrap();
    let mut pipeline = builder.build().unwrap();

    let produced = Arc::new(AtomicUsize::new(0));
    let middle_processed = Arc::new(AtomicUsize::new(0));
    let finalized = Arc::new(AtomicUsize::new(0));

    {
        let produced = Arc::clone(&produced);
        let mut seen_nonzero = false;
        pipeline
            .spawn_task(
                producer,
                move |slot: &mut u64| {
                    if *slot != 0 {
                        seen_nonzero = true;
                    }
                    if seen_nonzero {
                        assert_eq!(*slot % 4, 3, "producer re-observed a slot not ending in 3: {slot}");
                    } else {
                        assert_eq!(*slot, 0, "producer's first pass should see default-initialised slots");
                    }

                    let seq = produced.fetch_add(1, Ordering::Relaxed) as u64;
                    *slot = seq * 4;
                    Ok(())
                },
                Some(8)
            )
            .unwrap();
    }

    for tag in [1u64, 2u64] {
        let middle_processed = Arc::clone(&middle_processed);
        pipeline
            .spawn_task(
                middle,
                move |slot: &mut u64| {
                    assert_eq!(*slot % 4, 0, "middle consumer read a slot not freshly published by the producer: {slot}");
                    *slot += tag;
                    middle_processed.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                },
                Some(8)
            )
            .unwrap();
    }

    {
        let finalized = Arc::clone(&finalized);
        pipeline
            .spawn_task(
                last,
                move |slot: &mut u64| {
                    let remainder = *slot % 4;
                    assert!(
                        remainder == 1 || remainder == 2,
                        "final consumer read a slot not written by either middle consumer: {slot}"
                    );
                    *slot = *slot - remainder + 3;
                    finalized.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                },
                Some(8)
            )
            .unwrap();
    }

    std::thread::sleep(Duration::from_millis(300));
    pipeline.shutdown().expect("no stage should panic or deadlock");

    // Several laps around an 8-slot ring should have completed in 300ms.
    assert!(produced.load(Ordering::Relaxed) > RING_SIZE * 3);
    assert!(finalized.load(Ordering::Relaxed) > 0);
    // Every sequence seen by the middle stage is seen by exactly one of its
    // two workers; together they must not outrun the producer.
    assert!(middle_processed.load(Ordering::Relaxed) <= produced.load(Ordering::Relaxed));
    assert!(finalized.load(Ordering::Relaxed) <= middle_processed.load(Ordering::Relaxed));
}

#[test]
fn shutdown_joins_all_threads_within_a_bounded_time() {
    let builder = Pipeline::<u64>::builder(8).unwrap();
    let (builder, producer) = builder.producer_fence(Some(2), Some(1)).unwrap();
    let (builder, consumer) = builder.consumer_fence(Some(2), Some(1)).unwrap();
    let mut pipeline = builder.build().unwrap();

    pipeline
        .spawn_task(
            producer,
            |slot: &mut u64| {
                *slot += 1;
                Ok(())
            },
            Some(1)
        )
        .unwrap();
    pipeline.spawn_task(consumer, |_slot: &mut u64| Ok(()), Some(1)).unwrap();

    std::thread::sleep(Duration::from_millis(20));

    let start = std::time::Instant::now();
    pipeline.shutdown().unwrap();
    assert!(start.elapsed() < Duration::from_secs(5), "shutdown should join promptly");
}

#[test]
fn single_producer_single_consumer_preserves_values() {
    let builder = Pipeline::<u64>::builder(16).unwrap();
    let (builder, producer) = builder.producer_fence(Some(8), Some(1)).unwrap();
    let (builder, consumer) = builder.consumer_fence(Some(8), Some(1)).unwrap();
    let mut pipeline = builder.build().unwrap();

    let mismatches = Arc::new(AtomicUsize::new(0));

    {
        let mut seq = 0u64;
        pipeline
            .spawn_task(
                producer,
                move |slot: &mut u64| {
                    *slot = seq;
                    seq += 1;
                    Ok(())
                },
                Some(16)
            )
            .unwrap();
    }
    {
        let mismatches = Arc::clone(&mismatches);
        let mut expected = 0u64;
        pipeline
            .spawn_task(
                consumer,
                move |slot: &mut u64| {
                    if *slot != expected {
                        mismatches.fetch_add(1, Ordering::Relaxed);
                    }
                    expected += 1;
                    Ok(())
                },
                Some(16)
            )
            .unwrap();
    }

    std::thread::sleep(Duration::from_millis(200));
    pipeline.shutdown().unwrap();

    assert_eq!(mismatches.load(Ordering::Relaxed), 0, "consumer must see every producer sequence in order");
}
