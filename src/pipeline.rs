//! Pipeline wiring: the directed cycle of fences and the tasks bound to them.

use std::sync::Arc;

use crate::error::{ Result, RingFenceError };
use crate::fence::{ Fence, FenceKind };
use crate::metrics::{ Metrics, MetricsSnapshot };
use crate::ring::Ring;
use crate::task::{ SlotProcessor, Task };

/// Opaque handle to a fence returned during pipeline construction, used to
/// attach tasks to a particular stage with [`Pipeline::spawn_task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenceHandle(usize);

/// Opaque handle to a spawned task, returned by [`Pipeline::spawn_task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskId(usize);

/// Builds a [`Pipeline`]: a producer fence, followed by one or more consumer
/// fences, wired into a cycle on [`PipelineBuilder::build`].
pub struct PipelineBuilder<Slot> {
    ring: Arc<Ring<Slot>>,
    fences: Vec<Arc<Fence>>,
    metrics: Arc<Metrics>,
}

impl<Slot: Default> PipelineBuilder<Slot> {
    fn new(ring_size: usize) -> Result<Self> {
        Ok(Self {
            ring: Arc::new(Ring::new(ring_size)?),
            fences: Vec::new(),
            metrics: Arc::new(Metrics::new()),
        })
    }
}

impl<Slot> PipelineBuilder<Slot> {
    /// Add the single producer fence. Must be called exactly once, before any
    /// consumer fence.
    pub fn producer_fence(mut self, spin_retries: Option<u32>, sleep_ms: Option<u64>) -> Result<(Self, FenceHandle)> {
        if !self.fences.is_empty() {
            return Err(RingFenceError::not_wired("producer_fence must be called before any consumer_fence"));
        }

        let fence = Fence::new(FenceKind::Producer, spin_retries, sleep_ms)?;
        self.fences.push(fence);
        Ok((self, FenceHandle(0)))
    }

    /// Append a consumer fence. May be called more than once to form a chain;
    /// each call appends the next consumer stage downstream-ward of the last.
    pub fn consumer_fence(mut self, spin_retries: Option<u32>, sleep_ms: Option<u64>) -> Result<(Self, FenceHandle)> {
        if self.fences.is_empty() {
            return Err(RingFenceError::not_wired("producer_fence must be called before consumer_fence"));
        }

        let fence = Fence::new(FenceKind::Consumer, spin_retries, sleep_ms)?;
        let handle = FenceHandle(self.fences.len());
        self.fences.push(fence);
        Ok((self, handle))
    }

    /// Close the cycle: `consumer_i -> consumer_{i-1} -> ... -> consumer_1 ->
    /// producer -> consumer_k`, so the producer's downstream is the last
    /// consumer's cursor. This is what prevents the producer from lapping a
    /// slot still held by the final stage.
    pub fn build(self) -> Result<Pipeline<Slot>> {
        let n = self.fences.len();
        if n < 2 {
            return Err(
                RingFenceError::not_wired("pipeline needs a producer fence and at least one consumer fence")
            );
        }

        for i in 2..n {
            self.fences[i].set_next_fence(&self.fences[i - 1]);
        }
        self.fences[1].set_next_fence(&self.fences[0]);
        self.fences[0].set_next_fence(&self.fences[n - 1]);

        Ok(Pipeline {
            ring: self.ring,
            fences: self.fences,
            tasks: Vec::new(),
            metrics: self.metrics,
        })
    }
}

/// A fully-wired cycle of fences plus the tasks bound to them.
///
/// Holds no state of its own beyond the wiring: the ring and fence arena are
/// shared with every task via `Arc`, and `Pipeline` guarantees every task is
/// stopped and joined before it is dropped.
pub struct Pipeline<Slot> {
    ring: Arc<Ring<Slot>>,
    fences: Vec<Arc<Fence>>,
    tasks: Vec<Task<Slot>>,
    metrics: Arc<Metrics>,
}

impl<Slot: Default> Pipeline<Slot> {
    /// Start building a pipeline over a ring of `ring_size` slots (must be a
    /// non-zero power of two).
    pub fn builder(ring_size: usize) -> Result<PipelineBuilder<Slot>> {
        PipelineBuilder::new(ring_size)
    }
}

impl<Slot: Send + 'static> Pipeline<Slot> {
    /// Attach and start a worker at the given fence, running `processor` for
    /// every slot it claims.
    pub fn spawn_task<P>(&mut self, fence: FenceHandle, processor: P, cancel_every: Option<usize>) -> Result<TaskId>
        where P: SlotProcessor<Slot> + 'static
    {
        let fence_arc = self.fences
            .get(fence.0)
            .cloned()
            .ok_or_else(|| RingFenceError::not_wired("unknown fence handle"))?;

        let mut task = Task::new(fence_arc, cancel_every)?;
        task.start(Arc::clone(&self.ring), Arc::clone(&self.metrics), processor)?;
        self.tasks.push(task);

        Ok(TaskId(self.tasks.len() - 1))
    }

    /// Number of fences wired into this pipeline.
    pub fn fence_count(&self) -> usize {
        self.fences.len()
    }

    /// Number of tasks currently spawned.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Stop and join a single task by id, without tearing down the rest of
    /// the pipeline.
    pub fn stop_task(&mut self, task: TaskId) -> Result<()> {
        self.tasks
            .get_mut(task.0)
            .ok_or_else(|| RingFenceError::not_wired("unknown task id"))?
            .stop()
    }

    /// Stop every task, in registration order, joining each thread. Returns
    /// the first error encountered, if any, after attempting to stop all of
    /// them.
    pub fn shutdown(mut self) -> Result<()> {
        let mut first_err = None;

        for task in self.tasks.iter_mut() {
            if let Err(err) = task.stop() {
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
