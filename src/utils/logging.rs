use log::{log_enabled, Level};
use std::time::{Duration, Instant};

/// Simple scoped timer for profiling step phases.
pub struct ScopedTimer<'a> {
    label: &'a str,
    start: Instant,
    finished: bool,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(label: &'a str) -> Self {
        if log_enabled!(Level::Trace) {
            log::trace!("⏱️ start {label}");
        }
        Self {
            label,
            start: Instant::now(),
            finished: false,
        }
    }

    /// Stops the timer and returns the elapsed time.
    pub fn finish(mut self) -> Duration {
        self.finished = true;
        let elapsed = self.start.elapsed();
        Self::report(self.label, elapsed);
        elapsed
    }

    fn report(label: &str, elapsed: Duration) {
        if log_enabled!(Level::Trace) {
            log::trace!("⏱️ end {} ({} µs)", label, elapsed.as_micros());
        }
    }
}

impl<'a> Drop for ScopedTimer<'a> {
    fn drop(&mut self) {
        if !self.finished {
            Self::report(self.label, self.start.elapsed());
        }
    }
}
