//! Pure formatting functions.
//!
//! Every function here is pure aside from the explicit `LineCache`
//! argument threaded through `format_traceback`; nothing here touches
//! the recorder or its interners. Grounded on the teacher's `export`
//! module's habit of keeping rendering logic as free functions over
//! plain data rather than methods tied to tracker state.

use crate::frame::Frame;
use crate::linecache::LineCache;
use crate::snapshot::{Statistic, StatisticDiff, Traceback};

/// `"filename:lineno"`.
pub fn format_frame(frame: &Frame) -> String {
    format!("{}:{}", frame.filename, frame.lineno)
}

/// `Traceback -> "filename:lineno"` of the leaf frame.
pub fn format_traceback_leaf(stack: &[Frame]) -> String {
    format_frame(&stack[0])
}

/// `Trace -> "<leaf>: <size> B"`.
pub fn format_trace(stack: &Traceback, size: u64) -> String {
    format!("{}: {} B", format_traceback_leaf(stack), size)
}

/// `Statistic -> "<leaf>: size=<s> B, count=<c>, average=<s/c> B"`.
pub fn format_statistic(stat: &Statistic) -> String {
    format!(
        "{}: size={} B, count={}, average={:.1} B",
        format_frame(stat.leaf()),
        stat.size,
        stat.count,
        stat.average()
    )
}

fn format_signed(n: i64) -> String {
    if n >= 0 {
        format!("+{n}")
    } else {
        n.to_string()
    }
}

/// `StatisticDiff -> "<leaf>: size=<s> B (±<Δs> B), count=<c> (±<Δc>), average=<s/c> B"`.
pub fn format_statistic_diff(diff: &StatisticDiff) -> String {
    format!(
        "{}: size={} B ({} B), count={} ({}), average={:.1} B",
        format_frame(diff.leaf()),
        diff.size,
        format_signed(diff.size_diff),
        diff.count,
        format_signed(diff.count_diff),
        diff.average()
    )
}

/// `Traceback.format(limit, most_recent_first)`: a multi-line listing.
///
/// `stack` is leaf-first (index 0 = most recently entered frame); output
/// is root-first unless `most_recent_first` is set. `limit > 0` keeps
/// the first `limit` frames of the *output* order; `limit < 0` keeps the
/// last `|limit|` frames of the output order; `limit == 0` keeps all of
/// them.
pub fn format_traceback(
    stack: &[Frame],
    limit: i32,
    most_recent_first: bool,
    line_cache: &dyn LineCache,
) -> Vec<String> {
    let ordered: Vec<&Frame> = if most_recent_first {
        stack.iter().collect()
    } else {
        stack.iter().rev().collect()
    };
    let kept: Vec<&Frame> = match limit.cmp(&0) {
        std::cmp::Ordering::Equal => ordered,
        std::cmp::Ordering::Greater => ordered.into_iter().take(limit as usize).collect(),
        std::cmp::Ordering::Less => {
            let n = (-limit) as usize;
            let start = ordered.len().saturating_sub(n);
            ordered.into_iter().skip(start).collect()
        }
    };
    let mut out = Vec::with_capacity(kept.len() * 2);
    for frame in kept {
        out.push(format!("  File \"{}\", line {}", frame.filename, frame.lineno));
        if let Some(line) = line_cache.get_line(&frame.filename, frame.lineno) {
            out.push(format!("    {line}"));
        }
    }
    out
}
