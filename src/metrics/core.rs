//! Core metrics utilities
//!
//! Timing helpers shared by the phase modules.

use std::time::Instant;

/// A timing guard that records its duration when dropped
///
/// The duration is recorded to the named histogram when the guard goes out of
/// scope, so early returns through `?` are still measured.
pub struct TimingGuard {
    start: Instant,
    histogram_name: &'static str,
}

impl TimingGuard {
    pub fn new(histogram_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            histogram_name,
        }
    }

    /// Seconds elapsed since the guard was created
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Consume the guard and record the duration now
    pub fn finish(self) {}
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        ::metrics::histogram!(self.histogram_name).record(self.elapsed_secs());
    }
}

/// Convenience function to create a timing guard
///
/// ```ignore
/// let _timing = time_operation("cs_tat_duration_seconds");
/// // ... do work ...
/// ```
pub fn time_operation(histogram_name: &'static str) -> TimingGuard {
    TimingGuard::new(histogram_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_timing_guard_basic() {
        let guard = time_operation("test_metric");
        thread::sleep(Duration::from_millis(5));
        assert!(guard.elapsed_secs() > 0.0);
    }

    #[test]
    fn test_timing_guard_finish() {
        let guard = time_operation("test_metric_finish");
        guard.finish();
    }
}
