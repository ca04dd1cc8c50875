//! Unified error type for the heapsnap core.
//!
//! Mirrors the teacher's [`TrackingError`]-style single `thiserror` enum:
//! one flat error type covering configuration, state and argument
//! mistakes, rather than a nested per-component hierarchy. Hot-path
//! failures (allocation failures inside the recorder) never reach this
//! type — they are dropped silently, not surfaced.

use thiserror::Error;

/// Errors surfaced by the public `heapsnap` API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeapsnapError {
    /// `start()` was called with an out-of-range `max_frames` or
    /// `sample_rate`, or an environment variable carried an invalid value.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// An operation that requires active tracing was attempted while
    /// tracing was stopped.
    #[error("the heapsnap module must be tracing memory allocations to take a snapshot")]
    NotTracing,

    /// A caller-supplied argument was structurally invalid (e.g. a
    /// `statistics` key that is incompatible with `cumulative=true`).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The allocator-hook adapter could not install itself via the
    /// host's registration API nor via dispatch-table patching.
    #[error("failed to install allocator hooks: {0}")]
    HookInstallFailed(String),
}

/// Result alias used throughout the public API.
pub type Result<T> = std::result::Result<T, HeapsnapError>;
