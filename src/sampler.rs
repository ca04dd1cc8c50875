//! Per-thread Bernoulli-like allocation sampler.
//!
//! Each thread keeps a decrementing "bytes until next sample" counter in
//! thread-local storage, following the same `thread_local!` + `RefCell`
//! shape the teacher uses for its own per-thread hot-path state (see
//! `core::sampling_tracker::THREAD_DATA`). Unlike the teacher's frequency
//! + size-threshold heuristic, the counter here is redrawn from a
//! geometric distribution with the configured mean, so the long-run
//! expected bytes between samples is exactly `sample_rate`.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

/// Process-wide splitter used to decorrelate per-thread RNG seeds.
static SEED_SPLITTER: AtomicU64 = AtomicU64::new(0x9E3779B97F4A7C15);

fn next_seed() -> u64 {
    // A splitmix64-style step: cheap, and good enough to decorrelate
    // threads that start at nearly the same wall-clock time.
    let mixed = SEED_SPLITTER.fetch_add(0x9E3779B97F4A7C15, Ordering::Relaxed);
    let mut z = mixed.wrapping_add(thread_id_hash());
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

fn thread_id_hash() -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    thread::current().id().hash(&mut hasher);
    hasher.finish()
}

struct SamplerState {
    bytes_until_sample: i64,
    rng: SmallRng,
}

impl SamplerState {
    fn new() -> Self {
        Self {
            bytes_until_sample: 0,
            rng: SmallRng::seed_from_u64(next_seed()),
        }
    }

    /// Redraw the countdown from a geometric distribution with mean `rate`.
    fn redraw(&mut self, rate: u64) {
        let u: f64 = self.rng.random_range(f64::MIN_POSITIVE..1.0);
        let draw = (-u.ln() * rate as f64).round() as i64;
        self.bytes_until_sample = draw.max(1);
    }
}

thread_local! {
    static SAMPLER_STATE: RefCell<SamplerState> = RefCell::new(SamplerState::new());
}

/// Decide whether an allocation of `nbytes` should be sampled, given a
/// mean sampling period of `sample_rate` bytes.
///
/// `sample_rate == 0` disables sampling unconditionally (tracing off).
/// `sample_rate == 1` samples every allocation. Very large allocations
/// (at least as large as `sample_rate`) are sampled deterministically.
pub fn should_sample(nbytes: usize, sample_rate: u64) -> bool {
    if sample_rate == 0 {
        return false;
    }
    if nbytes as u64 >= sample_rate {
        return true;
    }
    SAMPLER_STATE.with(|cell| {
        let mut state = cell.borrow_mut();
        state.bytes_until_sample -= nbytes as i64;
        if state.bytes_until_sample <= 0 {
            state.redraw(sample_rate);
            true
        } else {
            false
        }
    })
}

/// Reset this thread's countdown, used by `clear_traces`/`stop` so a
/// freshly (re)started session doesn't inherit a stale countdown.
pub fn reset_current_thread() {
    SAMPLER_STATE.with(|cell| {
        *cell.borrow_mut() = SamplerState::new();
    });
}
