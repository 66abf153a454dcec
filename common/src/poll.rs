//! Bounded polling for files written asynchronously by external tools.
//!
//! Some vendor tools return before their output lands on disk. Rather than
//! sleeping for a fixed delay, callers poll for the expected path and give up
//! once a deadline passes.

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, trace};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Timeout and interval for a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Maximum time to wait before giving up.
    pub timeout: Duration,
    /// Delay between checks.
    pub interval: Duration,
}

impl PollSettings {
    /// Create settings from a timeout and interval.
    #[must_use]
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// The polled path never appeared before the deadline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{path} did not appear within {}ms", waited.as_millis())]
pub struct PollTimeout {
    /// Path that was polled.
    pub path: Utf8PathBuf,
    /// How long the caller waited.
    pub waited: Duration,
}

/// Waits until `path` exists, checking every `settings.interval`.
///
/// Returns the time spent waiting. The path is always checked at least once,
/// so a zero timeout succeeds when the file is already present.
///
/// # Errors
///
/// Returns [`PollTimeout`] when the path is still missing after
/// `settings.timeout`.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use relpipe_common::{PollSettings, wait_for_path};
/// use std::time::Duration;
///
/// let settings = PollSettings::new(Duration::from_millis(20), Duration::from_millis(5));
/// let result = wait_for_path(Utf8Path::new("/definitely/not/here.jad"), settings);
/// assert!(result.is_err());
/// ```
pub fn wait_for_path(path: &Utf8Path, settings: PollSettings) -> Result<Duration, PollTimeout> {
    let started = Instant::now();
    let interval = settings.interval.max(MIN_INTERVAL);

    loop {
        let elapsed = started.elapsed();
        if path.exists() {
            debug!("{path} appeared after {}ms", elapsed.as_millis());
            return Ok(elapsed);
        }
        if elapsed >= settings.timeout {
            return Err(PollTimeout {
                path: path.to_owned(),
                waited: elapsed,
            });
        }

        let remaining = settings.timeout.saturating_sub(elapsed);
        trace!("waiting for {path} ({}ms left)", remaining.as_millis());
        thread::sleep(interval.min(remaining).max(MIN_INTERVAL));
    }
}
