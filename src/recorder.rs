//! Trace recorder: the hot-path coordinator.
//!
//! Ties the sampler, frame/stack interners, host runtime and sharded map
//! together behind the allocation/free entry points the hook adapter
//! calls. Grounded on the overall shape of the teacher's
//! `MemoryTracker` (a single struct the global allocator forwards into)
//! but restructured around an explicit five-step `alloc` sequence
//! and reentrancy/blackout-window guards.

use crate::error::{HeapsnapError, Result};
use crate::frame::{Frame, FrameInterner};
use crate::host::{HostRuntime, NullHostRuntime};
use crate::sampler;
use crate::shard::{ShardedTraceMap, Trace};
use crate::stack::StackInterner;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;

thread_local! {
    /// Reentrancy guard: set while this thread is inside the recorder's
    /// own bookkeeping, so allocations made by frame capture or interning
    /// are not themselves recorded.
    static IN_RECORDER: Cell<bool> = const { Cell::new(false) };
}

fn enter_recorder() -> bool {
    IN_RECORDER.with(|flag| {
        if flag.get() {
            false
        } else {
            flag.set(true);
            true
        }
    })
}

fn leave_recorder() {
    IN_RECORDER.with(|flag| flag.set(false));
}

/// The hot-path coordinator. One instance backs the whole process; see
/// `lib.rs` for the global singleton.
pub struct Recorder {
    enabled: AtomicBool,
    sample_rate: AtomicU64,
    max_frames: AtomicUsize,
    frames: FrameInterner,
    stacks: StackInterner,
    map: ShardedTraceMap,
    host: RwLock<Box<dyn HostRuntime>>,
}

/// Default `sample_rate` when none is supplied to `start`/`bootstrap`,
/// matching the original's 1 MiB-ish default sampling period scaled down
/// to a value convenient for tests; callers should treat this as
/// implementation-defined, not part of the public contract.
pub const DEFAULT_SAMPLE_RATE: u64 = 1 << 20;

/// Default `max_frames` when `start` is called with `1` explicitly is
/// `1`; this constant is only the ceiling `start` enforces.
pub const MAX_SUPPORTED_FRAMES: usize = 1024;

impl Recorder {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            sample_rate: AtomicU64::new(DEFAULT_SAMPLE_RATE),
            max_frames: AtomicUsize::new(1),
            frames: FrameInterner::new(),
            stacks: StackInterner::new(),
            map: ShardedTraceMap::new(),
            host: RwLock::new(Box::new(NullHostRuntime)),
        }
    }

    /// Replace the host-runtime frame-chain reader. Intended to be
    /// called once at startup by the embedder, before `start()`.
    pub fn set_host_runtime(&self, host: Box<dyn HostRuntime>) {
        *self.host.write().unwrap() = host;
    }

    pub fn start(&self, max_frames: usize, sample_rate: u64) -> Result<()> {
        if max_frames < 1 || max_frames > MAX_SUPPORTED_FRAMES {
            return Err(HeapsnapError::Configuration(format!(
                "max_frames must be between 1 and {MAX_SUPPORTED_FRAMES}, got {max_frames}"
            )));
        }
        self.max_frames.store(max_frames, Ordering::Relaxed);
        self.sample_rate.store(sample_rate, Ordering::Relaxed);
        self.enabled.store(true, Ordering::SeqCst);
        tracing::info!(max_frames, sample_rate, "heapsnap tracing started");
        Ok(())
    }

    /// Disable tracing, unregister conceptually (the hook adapter owns
    /// the actual allocator-table swap), and zero counters. Interners
    /// are left intact so outstanding snapshots remain valid.
    pub fn stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.map.zero_counters();
        tracing::info!("heapsnap tracing stopped");
    }

    pub fn is_tracing(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn clear_traces(&self) {
        self.map.clear();
        sampler::reset_current_thread();
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames.load(Ordering::Relaxed)
    }

    pub fn sample_rate(&self) -> u64 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    pub fn get_traced_memory(&self) -> (u64, u64) {
        (
            self.map.currently_traced_bytes(),
            self.map.peak_traced_bytes(),
        )
    }

    pub fn get_tracemalloc_memory(&self) -> usize {
        self.map.memory_cost() + self.frames.memory_cost() + self.stacks.memory_cost()
    }

    /// Called by the hook adapter when the host allocates `size` bytes
    /// at `addr`: checks tracing is enabled, consults the sampler,
    /// captures and interns a call stack, then inserts into the map.
    pub fn on_alloc(&self, addr: usize, size: u64) {
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }
        if !sampler::should_sample(size as usize, self.sample_rate.load(Ordering::Relaxed)) {
            return;
        }
        if !enter_recorder() {
            return;
        }
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.record_sample(addr, size);
        }));
        leave_recorder();
        if result.is_err() {
            tracing::warn!("heapsnap: dropped a sample after an internal panic");
        }
    }

    fn record_sample(&self, addr: usize, size: u64) {
        let max_frames = self.max_frames.load(Ordering::Relaxed);
        let host = self.host.read().unwrap();
        let raw_frames = host.capture_frames(max_frames);
        drop(host);

        let handles: Vec<_> = if raw_frames.is_empty() {
            vec![self.frames.intern_frame(Frame::unknown())]
        } else {
            raw_frames
                .into_iter()
                .take(max_frames)
                .map(|f| self.frames.intern_frame(f))
                .collect()
        };
        let (_, stack) = self.stacks.intern(&handles);
        self.map.insert(addr, Trace { size, stack });
    }

    /// Called by the hook adapter when the host frees `addr`.
    pub fn on_free(&self, addr: usize) {
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }
        self.map.remove(addr);
    }

    /// Called by the hook adapter when the host reallocates `old` to a
    /// new address `new` of `size` bytes. Modelled as `free` then
    /// `alloc`; a concurrent snapshot reader can briefly observe neither
    /// the old nor the new trace, which is accepted rather than
    /// strengthened with an in-place update.
    pub fn on_realloc(&self, old: usize, new: usize, size: u64) {
        self.on_free(old);
        self.on_alloc(new, size);
    }

    /// Look up the interned stack recorded for a still-live address.
    pub fn get_object_traceback(&self, addr: usize) -> Option<crate::stack::Stack> {
        self.map.peek(addr).map(|trace| trace.stack)
    }

    /// Raw `(size, leaf-first frame tuples)` dump, the stable wire
    /// format `Snapshot` is built from.
    pub fn raw_traces(&self) -> Vec<(u64, Vec<(String, String, i32, i32)>)> {
        self.map
            .snapshot()
            .into_iter()
            .map(|(size, stack)| {
                let tuples = stack
                    .iter()
                    .map(|handle| {
                        let frame = self.frames.resolve(*handle);
                        (
                            frame.name.to_string(),
                            frame.filename.to_string(),
                            frame.firstlineno,
                            frame.lineno,
                        )
                    })
                    .collect();
                (size, tuples)
            })
            .collect()
    }

    pub fn take_snapshot(&self) -> Result<crate::snapshot::Snapshot> {
        if !self.is_tracing() {
            return Err(HeapsnapError::NotTracing);
        }
        let traces = self
            .map
            .snapshot()
            .into_iter()
            .map(|(size, stack)| {
                let frames: Vec<Frame> = stack.iter().map(|h| self.frames.resolve(*h)).collect();
                crate::snapshot::Trace {
                    size,
                    stack: frames.into(),
                }
            })
            .collect();
        Ok(crate::snapshot::Snapshot::new(
            traces,
            self.max_frames(),
            self.sample_rate(),
        ))
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}
