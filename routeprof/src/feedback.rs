//! Progress, message and cancellation channel for long-running work.

use log::{error, info};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Receives progress and messages from a batch run, and tells it
/// when to stop.
///
/// Polled synchronously; a run checks [`Feedback::is_canceled`] only
/// between routes.
pub trait Feedback {
    fn push_info(&mut self, msg: &str);

    fn report_error(&mut self, msg: &str);

    /// Percentage complete, in `[0, 100]`.
    fn set_progress(&mut self, percent: f64);

    fn is_canceled(&self) -> bool;
}

/// Writes messages to the `log` facade.
///
/// Cancellation is requested through a shared flag, see
/// [`LogFeedback::cancel_flag`].
#[derive(Debug, Default)]
pub struct LogFeedback {
    canceled: Arc<AtomicBool>,
    progress: f64,
}

impl LogFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle which cancels the run when set to `true`.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.canceled)
    }

    /// Last reported progress.
    pub fn progress(&self) -> f64 {
        self.progress
    }
}

impl Feedback for LogFeedback {
    fn push_info(&mut self, msg: &str) {
        info!("{msg}");
    }

    fn report_error(&mut self, msg: &str) {
        error!("{msg}");
    }

    fn set_progress(&mut self, percent: f64) {
        self.progress = percent;
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::{Feedback, LogFeedback};
    use std::sync::atomic::Ordering;

    #[test]
    fn test_cancel_flag() {
        let mut feedback = LogFeedback::new();
        assert!(!feedback.is_canceled());
        feedback.set_progress(25.0);
        assert_eq!(feedback.progress(), 25.0);
        feedback.cancel_flag().store(true, Ordering::Relaxed);
        assert!(feedback.is_canceled());
    }
}
