//! Environment-variable bootstrap.
//!
//! `MPROFILERATE`/`MPROFILEFRAMES` mirror the original's "start tracing
//! at interpreter import time" behaviour. Rust has no equivalent of a
//! module import hook, so `bootstrap()` is the explicit function a host
//! binary calls early in `main`, the way the teacher's `lib.rs::init()`
//! is an explicit call rather than an automatic one. The optional
//! `auto-init` feature additionally runs it via a `ctor`-attributed
//! constructor for hosts that want true at-load-time semantics.

use crate::error::{HeapsnapError, Result};
use crate::recorder::Recorder;
use std::env;

const MPROFILERATE: &str = "MPROFILERATE";
const MPROFILEFRAMES: &str = "MPROFILEFRAMES";

/// Read `MPROFILERATE`/`MPROFILEFRAMES` and start tracing on `recorder`
/// if `MPROFILERATE` is set to a value `>= 1`. Returns `Ok(true)` if
/// tracing was started, `Ok(false)` if the environment asked for
/// nothing, and `Err` for an invalid value in either variable.
pub fn bootstrap(recorder: &'static Recorder) -> Result<bool> {
    let rate = match env::var(MPROFILERATE) {
        Ok(raw) => Some(parse_positive(&raw, MPROFILERATE)?),
        Err(env::VarError::NotPresent) => None,
        Err(env::VarError::NotUnicode(_)) => {
            return Err(HeapsnapError::Configuration(format!(
                "{MPROFILERATE} is not valid unicode"
            )))
        }
    };
    let Some(rate) = rate else {
        return Ok(false);
    };
    if rate < 1 {
        return Ok(false);
    }

    let max_frames = match env::var(MPROFILEFRAMES) {
        Ok(raw) => parse_max_frames(&raw)?,
        Err(env::VarError::NotPresent) => 1,
        Err(env::VarError::NotUnicode(_)) => {
            return Err(HeapsnapError::Configuration(format!(
                "{MPROFILEFRAMES} is not valid unicode"
            )))
        }
    };

    recorder.start(max_frames, rate)?;
    tracing::info!(rate, max_frames, "heapsnap started from environment bootstrap");
    Ok(true)
}

/// Like [`bootstrap`], but prints a diagnostic to stderr and exits the
/// process with a non-zero status on configuration error, for hosts
/// that want that behaviour instead of handling the `Result`.
pub fn bootstrap_or_exit(recorder: &'static Recorder) {
    if let Err(err) = bootstrap(recorder) {
        eprintln!("heapsnap: {err}");
        std::process::exit(1);
    }
}

fn parse_positive(raw: &str, var_name: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|_| {
        HeapsnapError::Configuration(format!("{var_name} must be a non-negative integer, got {raw:?}"))
    })
}

fn parse_max_frames(raw: &str) -> Result<usize> {
    let value: i64 = raw.trim().parse().map_err(|_| {
        HeapsnapError::Configuration(format!(
            "{MPROFILEFRAMES} must be an integer, got {raw:?}"
        ))
    })?;
    if value <= 0 || value as usize > crate::recorder::MAX_SUPPORTED_FRAMES {
        return Err(HeapsnapError::Configuration(format!(
            "{MPROFILEFRAMES} must be between 1 and {}, got {value}",
            crate::recorder::MAX_SUPPORTED_FRAMES
        )));
    }
    Ok(value as usize)
}

#[cfg(feature = "auto-init")]
#[ctor::ctor]
fn auto_bootstrap() {
    bootstrap_or_exit(crate::global_recorder());
}
