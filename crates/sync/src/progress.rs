/// Progress observer for a sync run. Fractions are non-decreasing across
/// one run, starting at or below 0.05 and ending at exactly 1.0.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, fraction: f64);
}

/// A no-op observer for callers that don't care about progress.
pub struct NullProgress;

impl ProgressObserver for NullProgress {
    fn on_progress(&self, _fraction: f64) {}
}

impl<F: Fn(f64) + Send + Sync> ProgressObserver for F {
    fn on_progress(&self, fraction: f64) {
        self(fraction)
    }
}
