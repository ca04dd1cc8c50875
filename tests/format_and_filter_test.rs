//! Integration coverage for formatting and filter semantics through the
//! public API, plus a multi-threaded recorder stress test in the style
//! of the teacher's `tests/concurrency_safety_test.rs`.

use heapsnap::format::{format_statistic, format_statistic_diff, format_trace, format_traceback};
use heapsnap::frame::Frame;
use heapsnap::host::{HostRuntime, RawFrame};
use heapsnap::linecache::NullLineCache;
use heapsnap::recorder::Recorder;
use heapsnap::snapshot::{Filter, Snapshot, StatKey, Trace};
use std::sync::{Arc, Barrier};
use std::thread;

struct FixedHostRuntime(Vec<RawFrame>);

impl HostRuntime for FixedHostRuntime {
    fn capture_frames(&self, max_frames: usize) -> Vec<RawFrame> {
        self.0.iter().take(max_frames).cloned().collect()
    }
}

// A negative limit on a two-frame, leaf-first traceback keeps only the
// last frame of root-first output order.
#[test]
fn traceback_format_negative_limit_keeps_last_output_frame() {
    struct MockLineCache;
    impl heapsnap::linecache::LineCache for MockLineCache {
        fn get_line(&self, filename: &str, lineno: i32) -> Option<String> {
            Some(format!("<{filename}, {lineno}>"))
        }
    }
    let stack = vec![Frame::new("leaf", "b.py", 1, 4), Frame::new("root", "a.py", 1, 2)];
    let out = format_traceback(&stack, -1, false, &MockLineCache);
    assert_eq!(
        out,
        vec!["  File \"b.py\", line 4".to_string(), "    <b.py, 4>".to_string()]
    );
}

#[test]
fn format_trace_and_statistic_render_expected_strings() {
    let stack: Arc<[Frame]> = Arc::from(vec![Frame::new("f", "a.py", 1, 2)]);
    assert_eq!(format_trace(&stack, 1024), "a.py:2: 1024 B");

    let snap = Snapshot::new(
        vec![Trace { size: 100, stack: Arc::clone(&stack) }, Trace { size: 50, stack: Arc::clone(&stack) }],
        5,
        1,
    );
    let stats = snap.statistics(StatKey::Traceback, false).unwrap();
    assert_eq!(format_statistic(&stats[0]), "a.py:2: size=150 B, count=2, average=75.0 B");
}

#[test]
fn format_statistic_diff_shows_signed_deltas() {
    let before_stack: Arc<[Frame]> = Arc::from(vec![Frame::new("f", "a.py", 1, 2)]);
    let before = Snapshot::new(vec![Trace { size: 100, stack: Arc::clone(&before_stack) }], 5, 1);
    let after = Snapshot::new(
        vec![
            Trace { size: 100, stack: Arc::clone(&before_stack) },
            Trace { size: 50, stack: Arc::clone(&before_stack) },
        ],
        5,
        1,
    );
    let diffs = after.compare_to(&before, StatKey::Traceback, false).unwrap();
    assert_eq!(
        format_statistic_diff(&diffs[0]),
        "a.py:2: size=150 B (+50 B), count=2 (+1), average=75.0 B"
    );
}

#[test]
fn null_line_cache_omits_source_line() {
    let stack = vec![Frame::new("f", "a.py", 1, 2)];
    let out = format_traceback(&stack, 0, false, &NullLineCache);
    assert_eq!(out, vec!["  File \"a.py\", line 2".to_string()]);
}

// Filter law: an inclusive filter followed by its exclusive complement
// empties the snapshot, for a filter built with `all_frames` set too.
#[test]
fn inclusive_then_exclusive_all_frames_complement_is_empty() {
    let stack: Arc<[Frame]> = Arc::from(vec![Frame::new("leaf", "a.py", 1, 2), Frame::new("root", "b.py", 1, 9)]);
    let snap = Snapshot::new(vec![Trace { size: 10, stack }], 5, 1);
    let inclusive = snap.filter_traces(&[Filter::new(true, "b.py").with_all_frames(true)]);
    assert_eq!(inclusive.traces.len(), 1);
    let excluded = inclusive.filter_traces(&[Filter::new(false, "b.py").with_all_frames(true)]);
    assert!(excluded.traces.is_empty());
}

// Glob wildcard filtering across a mixed-filename snapshot, inclusive +
// exclusive interaction.
#[test]
fn glob_pattern_filters_by_directory_prefix() {
    let make = |name: &str| -> Trace {
        Trace {
            size: 10,
            stack: Arc::from(vec![Frame::new("f", name, 1, 1)]),
        }
    };
    let snap = Snapshot::new(
        vec![make("/app/src/a.py"), make("/app/src/b.py"), make("/lib/vendor/c.py")],
        5,
        1,
    );
    let filtered = snap.filter_traces(&[Filter::new(true, "/app/*")]);
    let names: Vec<_> = filtered.traces.iter().map(|t| t.stack[0].filename.to_string()).collect();
    assert_eq!(names, vec!["/app/src/a.py".to_string(), "/app/src/b.py".to_string()]);
}

// Stress the sharded map / interners concurrently through a local
// `Recorder` instance, mirroring the teacher's barrier-synchronised
// `test_concurrent_allocation_tracking`.
#[test]
fn concurrent_alloc_free_across_threads_stays_consistent() {
    let recorder = Arc::new(Recorder::new());
    recorder.set_host_runtime(Box::new(FixedHostRuntime(vec![RawFrame::new("f", "a.py", 1, 2)])));
    recorder.start(8, 1).unwrap();

    let thread_count = 8;
    let barrier = Arc::new(Barrier::new(thread_count));
    let handles: Vec<_> = (0..thread_count)
        .map(|t| {
            let recorder = Arc::clone(&recorder);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..200usize {
                    let addr = (t * 10_000) + i;
                    recorder.on_alloc(addr, 16);
                    if i % 3 == 0 {
                        recorder.on_free(addr);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let snapshot = recorder.take_snapshot().unwrap();
    let total_from_snapshot: u64 = snapshot.traces.iter().map(|t| t.size).sum();
    assert_eq!(total_from_snapshot, recorder.get_traced_memory().0);
    recorder.stop();
}
