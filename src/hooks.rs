//! Allocator-hook adapter.
//!
//! Models the host's three allocator domains as a capability-set
//! trait `{alloc, realloc, free}`, installed either through a
//! registration API or by patching the dispatch table in place while
//! preserving the old table to forward-chain. Rust's equivalent of a
//! registration API is `#[global_allocator]`: the attribute *is* the
//! registration, resolved at compile time rather than a runtime call, so
//! there is no dispatch-table patching to perform — but the
//! save-and-forward-chain shape is still exactly what
//! [`TrackingAllocator`] does, grounded on the teacher's pass-through
//! `allocator::TrackingAllocator` (`src/allocator.rs`, forwards every
//! call to `System`) generalised with the save/forward idiom from
//! `platform::allocator::PlatformAllocator`.

use crate::recorder::Recorder;
use std::alloc::{GlobalAlloc, Layout, System};
use thiserror::Error;

/// Errors the hook adapter can report while installing itself. Kept
/// distinct from [`crate::error::HeapsnapError`] since hook installation
/// is a host-runtime-level concern the embedder may want to match on
/// specifically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HookError {
    #[error("allocator hooks are already installed")]
    AlreadyInstalled,
    #[error("the host runtime does not expose a supported allocator-hook registration API")]
    Unsupported,
}

/// The host's three allocator domains, modelled as a capability set: the
/// "previous" allocator the hook adapter forward-chains to after
/// recording each operation.
///
/// # Safety
/// Implementors must uphold the same contract as [`GlobalAlloc`]: `ptr`
/// must come from a prior `alloc`/`realloc` call with a matching
/// `layout`, and the methods must not unwind.
pub unsafe trait HostAllocator: Send + Sync {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8;
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout);
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8;
}

/// Forwards to Rust's own `System` allocator, matching the teacher's
/// `allocator::TrackingAllocator`, which does nothing but forward to
/// `System` (see `src/allocator.rs`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHostAllocator;

unsafe impl HostAllocator for SystemHostAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        unsafe { System.realloc(ptr, layout, new_size) }
    }
}

/// A `#[global_allocator]`-installable wrapper that forward-chains every
/// operation to `A` and notifies a [`Recorder`] on the way, calling its
/// `on_alloc`/`on_free`/`on_realloc` entry points.
///
/// `recorder` is a function pointer rather than `&'static Recorder`:
/// `static GLOBAL: TrackingAllocator = ...` must be constructible in a
/// `const` initializer, and the recorder singleton (which owns a
/// `HashMap`-backed interner) cannot itself be built at const time. The
/// indirection costs one extra call on the hot path, the same price the
/// teacher's own lazily-initialized `get_global_tracker()` pays.
pub struct TrackingAllocator<A: HostAllocator = SystemHostAllocator> {
    inner: A,
    recorder: fn() -> &'static Recorder,
}

impl<A: HostAllocator> TrackingAllocator<A> {
    pub const fn new(inner: A, recorder: fn() -> &'static Recorder) -> Self {
        Self { inner, recorder }
    }
}

unsafe impl<A: HostAllocator> GlobalAlloc for TrackingAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { self.inner.alloc(layout) };
        if !ptr.is_null() {
            (self.recorder)().on_alloc(ptr as usize, layout.size() as u64);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        (self.recorder)().on_free(ptr as usize);
        unsafe { self.inner.dealloc(ptr, layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { self.inner.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            (self.recorder)().on_realloc(ptr as usize, new_ptr as usize, new_size as u64);
        }
        new_ptr
    }
}
