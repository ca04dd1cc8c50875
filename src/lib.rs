//! `heapsnap`: a low-overhead sampling heap profiler core for a managed
//! runtime.
//!
//! Observes live heap allocations, attaches a call stack to each sampled
//! allocation, and lets callers take snapshots that can be filtered,
//! grouped, diffed, and formatted. See [`Snapshot`] for the analytics
//! surface and [`start`]/[`stop`] for the tracing lifecycle.
//!
//! The crate does not assume any particular managed runtime: plug your
//! own [`host::HostRuntime`] in via [`set_host_runtime`] before calling
//! [`start`] so sampled allocations get real call stacks instead of the
//! `<unknown>` sentinel.

pub mod env;
pub mod error;
pub mod format;
pub mod frame;
pub mod hooks;
pub mod host;
pub mod linecache;
pub mod recorder;
pub mod sampler;
pub mod shard;
pub mod snapshot;
pub mod stack;

pub use error::{HeapsnapError, Result};
pub use frame::Frame;
pub use host::HostRuntime;
pub use linecache::LineCache;
pub use recorder::Recorder;
pub use snapshot::{Filter, Snapshot, Statistic, StatisticDiff};

use std::sync::OnceLock;

static RECORDER: OnceLock<Recorder> = OnceLock::new();

/// The process-wide recorder singleton backing the free functions below,
/// matching the teacher's `get_global_tracker()` pattern
/// (`src/lib.rs::get_global_tracker`).
pub fn global_recorder() -> &'static Recorder {
    RECORDER.get_or_init(Recorder::new)
}

/// Install the process `#[global_allocator]`. Gated behind the
/// `tracking-allocator` feature (default-on) so a host that wants to
/// install its own allocator, or embed `heapsnap` without owning the
/// global allocator slot, can opt out, matching the teacher's
/// `#[cfg(feature = "tracking-allocator")]` gate in its own `lib.rs`.
#[cfg(feature = "tracking-allocator")]
#[global_allocator]
static GLOBAL: hooks::TrackingAllocator =
    hooks::TrackingAllocator::new(hooks::SystemHostAllocator, global_recorder);

/// Install a convenience `tracing_subscriber` so `tracing::info!`/`warn!`
/// calls made by `start`/`stop`/`env::bootstrap` reach stderr. Entirely
/// optional: the crate never force-installs a subscriber on its own,
/// mirroring the teacher's `lib.rs::init()`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// Enable tracing with the given `max_frames` and `sample_rate` on the
/// global recorder.
pub fn start(max_frames: usize, sample_rate: u64) -> Result<()> {
    global_recorder().start(max_frames, sample_rate)
}

/// Disable tracing on the global recorder.
pub fn stop() {
    global_recorder().stop()
}

pub fn is_tracing() -> bool {
    global_recorder().is_tracing()
}

pub fn clear_traces() {
    global_recorder().clear_traces()
}

pub fn get_traceback_limit() -> usize {
    global_recorder().max_frames()
}

pub fn get_sample_rate() -> u64 {
    global_recorder().sample_rate()
}

pub fn get_object_traceback(addr: usize) -> Option<stack::Stack> {
    global_recorder().get_object_traceback(addr)
}

pub fn get_traced_memory() -> (u64, u64) {
    global_recorder().get_traced_memory()
}

pub fn get_tracemalloc_memory() -> usize {
    global_recorder().get_tracemalloc_memory()
}

pub fn take_snapshot() -> Result<Snapshot> {
    global_recorder().take_snapshot()
}

/// Replace the global recorder's host-runtime frame-chain reader. Call
/// this once at startup, before `start()`.
pub fn set_host_runtime(host: Box<dyn HostRuntime>) {
    global_recorder().set_host_runtime(host);
}
