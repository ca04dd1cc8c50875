//! Frame values and the frame interner.
//!
//! Grounded on the teacher's `stack_trace::capture::StackFrame`, but
//! simplified to four fields and made immutable and
//! deduplicating. `name`/`filename` are `Arc<str>` so cloning a resolved
//! [`Frame`] out of the interner is cheap, the way the teacher's
//! `MemScopeError` uses `Arc<str>` to avoid repeated string clones on
//! hot paths (`core::error::MemScopeError`).

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// The filename used for a capture that produced no frames at all.
pub const UNKNOWN_FILENAME: &str = "<unknown>";

/// A single call-stack frame: function name, file, the function's
/// definition line, and the line currently executing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    pub name: Arc<str>,
    pub filename: Arc<str>,
    pub firstlineno: i32,
    pub lineno: i32,
}

impl Frame {
    pub fn new(
        name: impl Into<Arc<str>>,
        filename: impl Into<Arc<str>>,
        firstlineno: i32,
        lineno: i32,
    ) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            firstlineno,
            lineno,
        }
    }

    /// The sentinel frame used when a capture produced no real frames.
    pub fn unknown() -> Self {
        Self::new("", UNKNOWN_FILENAME, 0, 0)
    }

    pub fn is_unknown(&self) -> bool {
        self.filename.as_ref() == UNKNOWN_FILENAME && self.lineno == 0
    }
}

/// Dense, stable handle into a [`FrameInterner`]. Two frames with equal
/// fields always resolve to the same handle for the lifetime of the
/// interner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(u32);

/// Deduplicating store for [`Frame`] values.
///
/// Insertion is serialised by a single `RwLock`-guarded table; since a
/// frame only has to be interned once per unique call site, lock
/// contention here is far lower than on the sharded trace map.
pub struct FrameInterner {
    inner: RwLock<Inner>,
}

struct Inner {
    frames: Vec<Frame>,
    index: HashMap<Frame, FrameHandle>,
}

impl FrameInterner {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                frames: Vec::new(),
                index: HashMap::new(),
            }),
        }
    }

    /// Intern a frame, returning its stable handle. Idempotent: equal
    /// inputs always produce the same handle.
    pub fn intern(
        &self,
        name: impl Into<Arc<str>>,
        filename: impl Into<Arc<str>>,
        firstlineno: i32,
        lineno: i32,
    ) -> FrameHandle {
        let frame = Frame::new(name, filename, firstlineno, lineno);
        self.intern_frame(frame)
    }

    pub fn intern_frame(&self, frame: Frame) -> FrameHandle {
        {
            let guard = self.inner.read();
            if let Some(handle) = guard.index.get(&frame) {
                return *handle;
            }
        }
        let mut guard = self.inner.write();
        // Re-check: another writer may have interned it while we waited.
        if let Some(handle) = guard.index.get(&frame) {
            return *handle;
        }
        let handle = FrameHandle(guard.frames.len() as u32);
        guard.frames.push(frame.clone());
        guard.index.insert(frame, handle);
        handle
    }

    /// Resolve a handle back to its [`Frame`] value.
    pub fn resolve(&self, handle: FrameHandle) -> Frame {
        self.inner.read().frames[handle.0 as usize].clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate bytes held by interned frame data, for
    /// `get_tracemalloc_memory`.
    pub fn memory_cost(&self) -> usize {
        let guard = self.inner.read();
        guard
            .frames
            .iter()
            .map(|f| f.name.len() + f.filename.len() + std::mem::size_of::<Frame>())
            .sum::<usize>()
            + guard.index.len() * std::mem::size_of::<(Frame, FrameHandle)>()
    }

    pub fn clear(&self) {
        let mut guard = self.inner.write();
        guard.frames.clear();
        guard.index.clear();
    }
}

impl Default for FrameInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_inputs_yield_equal_handles() {
        let interner = FrameInterner::new();
        let a = interner.intern("f", "a.py", 1, 2);
        let b = interner.intern("f", "a.py", 1, 2);
        assert_eq!(a, b);
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn distinct_inputs_yield_distinct_handles() {
        let interner = FrameInterner::new();
        let a = interner.intern("f", "a.py", 1, 2);
        let b = interner.intern("f", "a.py", 1, 3);
        assert_ne!(a, b);
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn resolve_round_trips() {
        let interner = FrameInterner::new();
        let handle = interner.intern("f", "a.py", 1, 2);
        let frame = interner.resolve(handle);
        assert_eq!(frame.name.as_ref(), "f");
        assert_eq!(frame.filename.as_ref(), "a.py");
        assert_eq!(frame.lineno, 2);
    }

    #[test]
    fn unknown_sentinel_detection() {
        assert!(Frame::unknown().is_unknown());
        assert!(!Frame::new("f", "a.py", 1, 2).is_unknown());
    }

    #[test]
    fn concurrent_interning_is_consistent() {
        use std::sync::Arc as StdArc;
        use std::thread;
        let interner = StdArc::new(FrameInterner::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let interner = StdArc::clone(&interner);
                thread::spawn(move || interner.intern("f", "a.py", 1, 2))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(interner.len(), 1);
    }
}
