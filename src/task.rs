//! Worker threads bound to a single fence.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{ AtomicBool, AtomicU64, AtomicU8, Ordering };
use std::sync::Arc;
use std::thread::{ self, JoinHandle };

use crate::constants::DEFAULT_CANCEL_EVERY;
use crate::error::{ Result, RingFenceError };
use crate::fence::Fence;
use crate::insights;
use crate::metrics::Metrics;
use crate::platform;
use crate::ring::{ Ring, SEQ_MAX };

/// User-supplied per-slot work, run once per claimed sequence.
///
/// Blanket-implemented for any `FnMut(&mut Slot) -> Result<()> + Send`, so
/// closures are the common case; implement the trait directly for stateful
/// processors that need a `new`/configuration step.
pub trait SlotProcessor<Slot>: Send {
    fn process_slot(&mut self, slot: &mut Slot) -> Result<()>;
}

impl<Slot, F> SlotProcessor<Slot> for F where F: FnMut(&mut Slot) -> Result<()> + Send {
    fn process_slot(&mut self, slot: &mut Slot) -> Result<()> {
        self(slot)
    }
}

/// Per-task state, tracked in the worker loop and exposed to other threads
/// (e.g. a driver polling for liveness) via [`Task::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Claiming,
    Owned,
    Publishing,
    Cancelled,
}

impl TaskState {
    fn as_u8(self) -> u8 {
        match self {
            TaskState::Idle => 0,
            TaskState::Claiming => 1,
            TaskState::Owned => 2,
            TaskState::Publishing => 3,
            TaskState::Cancelled => 4,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => TaskState::Idle,
            1 => TaskState::Claiming,
            2 => TaskState::Owned,
            3 => TaskState::Publishing,
            4 => TaskState::Cancelled,
            _ => unreachable!("invalid TaskState encoding: {v}"),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Idle => "idle",
            TaskState::Claiming => "claiming",
            TaskState::Owned => "owned",
            TaskState::Publishing => "publishing",
            TaskState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Isolates a task's published sequence and cancellation flag from
/// neighbouring tasks' cache lines, mirroring [`crate::fence::Fence`]'s padding.
#[repr(align(64))]
struct Padding(#[allow(dead_code)] [u8; 64]);

/// A worker thread bound to one [`Fence`], running a user-supplied
/// [`SlotProcessor`] until cancelled.
pub struct Task<Slot> {
    current_seq: Arc<AtomicU64>,
    cancel_flag: Arc<AtomicBool>,
    cancel_every: usize,
    fence: Arc<Fence>,
    thread: Option<JoinHandle<Result<()>>>,
    state: Arc<AtomicU8>,
    _pad: Padding,
    _marker: PhantomData<Slot>,
}

impl<Slot: Send + 'static> Task<Slot> {
    /// Construct a task bound to `fence`, registering its published-sequence
    /// cursor immediately so the fence can track liveness before the task
    /// starts running.
    pub fn new(fence: Arc<Fence>, cancel_every: Option<usize>) -> Result<Self> {
        platform::check_cache_isolation("Task", std::mem::size_of::<Task<Slot>>())?;

        let current_seq = Arc::new(AtomicU64::new(SEQ_MAX));
        fence.add_task(Arc::clone(&current_seq));

        Ok(Self {
            current_seq,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            cancel_every: cancel_every.unwrap_or(DEFAULT_CANCEL_EVERY),
            fence,
            thread: None,
            state: Arc::new(AtomicU8::new(TaskState::Idle.as_u8())),
            _pad: Padding([0; 64]),
            _marker: PhantomData,
        })
    }

    /// The sequence this task is presently working on, or `SEQ_MAX` if idle.
    pub fn current_seq(&self) -> u64 {
        self.current_seq.load(Ordering::Acquire)
    }

    /// This task's position in the `Idle -> Claiming -> Owned -> Publishing
    /// -> Idle` cycle (or `Cancelled`), as last observed by the worker loop.
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Spawn the worker thread. `ring` and `metrics` are shared with every
    /// other task in the pipeline; `processor` is owned exclusively by this
    /// task's thread for its lifetime.
    pub fn start<P>(&mut self, ring: Arc<Ring<Slot>>, metrics: Arc<Metrics>, mut processor: P) -> Result<()>
        where Slot: Send + 'static, P: SlotProcessor<Slot> + 'static
    {
        let fence = Arc::clone(&self.fence);
        let current_seq = Arc::clone(&self.current_seq);
        let cancel_flag = Arc::clone(&self.cancel_flag);
        let state = Arc::clone(&self.state);
        let cancel_every = self.cancel_every.max(1);

        let handle = thread::Builder
            ::new()
            .name("ringfence-task".to_string())
            .spawn(move || -> Result<()> {
                let mut since_checkpoint = 0usize;
                let set_state = |s: TaskState| state.store(s.as_u8(), Ordering::Release);

                loop {
                    set_state(TaskState::Claiming);
                    let slot = match fence.acquire_slot(&ring, &current_seq, &cancel_flag, &metrics)? {
                        Some(slot) => slot,
                        None => {
                            set_state(TaskState::Cancelled);
                            insights::record_cancellation(current_seq.load(Ordering::Relaxed));
                            metrics.record_cancellation();
                            return Ok(());
                        }
                    };

                    set_state(TaskState::Owned);
                    processor.process_slot(slot).map_err(|err| {
                        RingFenceError::slot_processing(err.to_string())
                    })?;

                    set_state(TaskState::Publishing);
                    fence.release_slot(&ring, &current_seq, &metrics)?;
                    set_state(TaskState::Idle);

                    since_checkpoint += 1;
                    if since_checkpoint >= cancel_every {
                        since_checkpoint = 0;
                        if cancel_flag.load(Ordering::Relaxed) {
                            set_state(TaskState::Cancelled);
                            insights::record_cancellation(current_seq.load(Ordering::Relaxed));
                            metrics.record_cancellation();
                            return Ok(());
                        }
                    }
                }
            })
            .map_err(RingFenceError::ThreadSpawn)?;

        self.thread = Some(handle);
        Ok(())
    }

    /// Request cancellation and join the worker thread. The task finishes its
    /// current slot (if any) and exits at its next checkpoint; this never
    /// leaves a claimed-but-unpublished slot behind.
    pub fn stop(&mut self) -> Result<()> {
        self.cancel_flag.store(true, Ordering::Relaxed);

        match self.thread.take() {
            Some(handle) =>
                match handle.join() {
                    Ok(result) => result,
                    Err(_) => Err(RingFenceError::slot_processing("worker thread panicked")),
                }
            None => Ok(()),
        }
    }
}

impl<Slot> Drop for Task<Slot> {
    fn drop(&mut self) {
        if let Some(handle) = self.thread.take() {
            self.cancel_flag.store(true, Ordering::Relaxed);
            let _ = handle.join();
        }
    }
}
