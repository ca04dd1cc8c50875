//! Line-cache collaborator interface.
//!
//! Source-line lookup is an external collaborator: the
//! core only needs an interface to ask "what's on line N of file F",
//! not an implementation. `LineCache` is that interface; the bundled
//! `FsLineCache` is a small filesystem-backed default, grounded on the
//! caching shape of the teacher's frame-resolution helpers in
//! `stack_trace/capture.rs` (`frame_cache: HashMap<usize, StackFrame>`)
//! adapted to cache file contents instead of resolved frames.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

/// Looks up a single source line for formatting purposes. Returning
/// `None` means "no source line available"; callers must treat that as
/// an expected, non-error outcome — the line is simply
/// omitted from the rendered output.
pub trait LineCache: Send + Sync {
    fn get_line(&self, filename: &str, lineno: i32) -> Option<String>;
}

/// A `LineCache` that never has a line available. Used as the default
/// when no embedder-supplied cache is configured, and in tests that
/// only care about frame/lineno formatting.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLineCache;

impl LineCache for NullLineCache {
    fn get_line(&self, _filename: &str, _lineno: i32) -> Option<String> {
        None
    }
}

/// Reads and caches whole-file contents from the local filesystem,
/// splitting into lines on first access per file.
#[derive(Default)]
pub struct FsLineCache {
    files: Mutex<HashMap<String, Arc<Vec<String>>>>,
}

impl FsLineCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lines_for(&self, filename: &str) -> Option<Arc<Vec<String>>> {
        {
            let cache = self.files.lock();
            if let Some(lines) = cache.get(filename) {
                return Some(Arc::clone(lines));
            }
        }
        let contents = fs::read_to_string(filename).ok()?;
        let lines: Arc<Vec<String>> =
            Arc::new(contents.lines().map(|l| l.to_string()).collect());
        self.files
            .lock()
            .insert(filename.to_string(), Arc::clone(&lines));
        Some(lines)
    }
}

impl LineCache for FsLineCache {
    fn get_line(&self, filename: &str, lineno: i32) -> Option<String> {
        if lineno <= 0 {
            return None;
        }
        let lines = self.lines_for(filename)?;
        lines.get((lineno - 1) as usize).cloned()
    }
}
