//! Host runtime call-stack capture.
//!
//! "A way to read the current thread's call-frame chain" is an external
//! collaborator the core only talks to through an
//! interface. `HostRuntime` is that interface; it is grounded on the
//! teacher's `stack_trace::capture::StackTraceCapture`, trimmed to the
//! one method the recorder actually calls on the hot path.
//!
//! The bundled [`NativeHostRuntime`] is a demo implementation over the
//! `backtrace` crate (feature-gated), useful for running this crate
//! against a real native stack in tests; a managed-runtime embedder is
//! expected to supply its own `HostRuntime` that reads its own frame
//! chain instead.

use crate::frame::Frame;

/// Raw frame data as the host hands it to the recorder, before
/// interning. Distinct from [`Frame`] only in spirit; kept as a type
/// alias since the fields are identical at this boundary.
pub type RawFrame = Frame;

/// A way to read the current thread's call-frame chain, supplied by the
/// embedding host runtime.
pub trait HostRuntime: Send + Sync {
    /// Capture up to `max_frames` leaf-first frames for the calling
    /// thread. An empty return means the chain could not be read at
    /// all; the recorder substitutes the sentinel unknown frame in that
    /// case.
    fn capture_frames(&self, max_frames: usize) -> Vec<RawFrame>;
}

/// A `HostRuntime` that always reports an empty chain. Used as the
/// default when no embedder-supplied runtime is configured, and in
/// tests that only care about sampling/shard behaviour.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHostRuntime;

impl HostRuntime for NullHostRuntime {
    fn capture_frames(&self, _max_frames: usize) -> Vec<RawFrame> {
        Vec::new()
    }
}

#[cfg(feature = "backtrace")]
pub use native::NativeHostRuntime;

#[cfg(feature = "backtrace")]
mod native {
    use super::*;

    /// Captures real native call stacks via the `backtrace` crate. Not
    /// what a managed runtime would use in production (it has its own
    /// frame chain to read) but useful for exercising this crate
    /// end-to-end without a real embedder.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct NativeHostRuntime;

    impl HostRuntime for NativeHostRuntime {
        fn capture_frames(&self, max_frames: usize) -> Vec<RawFrame> {
            let mut frames = Vec::with_capacity(max_frames);
            backtrace::trace(|frame| {
                if frames.len() >= max_frames {
                    return false;
                }
                let mut name = String::new();
                let mut filename = String::new();
                let mut lineno = 0i32;
                backtrace::resolve_frame(frame, |symbol| {
                    if let Some(symbol_name) = symbol.name() {
                        name = symbol_name.to_string();
                    }
                    if let Some(path) = symbol.filename() {
                        filename = path.to_string_lossy().into_owned();
                    }
                    if let Some(line) = symbol.lineno() {
                        lineno = line as i32;
                    }
                });
                if filename.is_empty() {
                    filename = crate::frame::UNKNOWN_FILENAME.to_string();
                }
                frames.push(RawFrame::new(name, filename, 0, lineno));
                true
            });
            frames
        }
    }

}
