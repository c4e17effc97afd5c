//! Progress reporting shared by the collector and the question processor.

/// Receives `(fraction, text)` notifications. Purely observational.
pub trait ProgressReporter: Send + Sync {
    /// `fraction` is in `0.0..=1.0`.
    fn report(&self, fraction: f64, text: &str);
}

/// Reporter that ignores everything.
pub struct NullProgress;

impl ProgressReporter for NullProgress {
    fn report(&self, _fraction: f64, _text: &str) {}
}

/// Reporter writing one log line per notification.
pub struct LogProgress {
    label: String,
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl ProgressReporter for LogProgress {
    fn report(&self, fraction: f64, text: &str) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).round();
        log::info!("[{:>3}%] {}: {}", percent, self.label, text);
    }
}

impl<F> ProgressReporter for F
where
    F: Fn(f64, &str) + Send + Sync,
{
    fn report(&self, fraction: f64, text: &str) {
        self(fraction, text)
    }
}
