use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error};
use routeprof::Feedback;

pub fn bar(header: String) -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_prefix(header);
    pb.set_style(
        ProgressStyle::with_template("{prefix}...\n[{wide_bar:.cyan/blue}] {pos}% {msg}")
            .expect("incorrect progress bar format string")
            .progress_chars("#>-"),
    );
    pb
}

/// Drives a progress bar from a batch run, and cancels the run after
/// `max_failures` failed routes.
pub struct ProgressFeedback {
    pb: ProgressBar,
    failures: usize,
    max_failures: Option<usize>,
}

impl ProgressFeedback {
    pub fn new(pb: ProgressBar, max_failures: Option<usize>) -> Self {
        Self {
            pb,
            failures: 0,
            max_failures,
        }
    }

    pub fn finish(&self) {
        self.pb.finish();
    }
}

impl Feedback for ProgressFeedback {
    fn push_info(&mut self, msg: &str) {
        debug!("{msg}");
        self.pb.set_message(msg.to_owned());
    }

    fn report_error(&mut self, msg: &str) {
        self.failures += 1;
        self.pb.suspend(|| error!("{msg}"));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn set_progress(&mut self, percent: f64) {
        self.pb.set_position(percent.round() as u64);
    }

    fn is_canceled(&self) -> bool {
        self.max_failures
            .map_or(false, |max| self.failures >= max)
    }
}
