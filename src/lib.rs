//! `ringfence` - a lock-free pipelined ring-buffer coordination engine.
//!
//! Implements the claim/publish protocol at the heart of the LMAX Disruptor
//! pattern: a fixed set of worker threads, organised into a pipeline of
//! producer and consumer stages, pass records through a pre-allocated
//! circular array without locks, dynamic allocation, or inter-thread
//! copying.
//!
//! ```no_run
//! use ringfence::Pipeline;
//!
//! # fn main() -> ringfence::Result<()> {
//! let builder = Pipeline::<u64>::builder(8)?;
//! let (builder, producer) = builder.producer_fence(None, None)?;
//! let (builder, consumer) = builder.consumer_fence(None, None)?;
//! let mut pipeline = builder.build()?;
//!
//! pipeline.spawn_task(producer, |slot: &mut u64| { *slot += 1; Ok(()) }, None)?;
//! pipeline.spawn_task(consumer, |_slot: &mut u64| Ok(()), None)?;
//!
//! std::thread::sleep(std::time::Duration::from_millis(10));
//! pipeline.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! A second, independent component, [`bloom::BloomFilter`], provides a
//! space-efficient approximate-membership set used by higher layers built on
//! top of this engine.
//!
//! ```toml
//! ringfence = { version = "0.1", features = ["tracing"] }
//! ```
//! Enable the `tracing` feature for claim/publish/back-off/cancellation spans.

pub mod bloom;
pub mod constants;
pub mod error;
pub mod fence;
pub mod hash;
pub mod insights;
pub mod metrics;
pub mod pipeline;
pub mod platform;
pub mod ring;
pub mod task;

pub use bloom::BloomFilter;
pub use error::{ Result, RingFenceError };
pub use fence::{ Fence, FenceKind };
pub use metrics::{ Metrics, MetricsSnapshot };
pub use pipeline::{ FenceHandle, Pipeline, PipelineBuilder, TaskId };
pub use ring::{ Ring, Sequence, SEQ_MAX };
pub use task::{ SlotProcessor, Task, TaskState };
