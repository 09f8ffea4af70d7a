//! Progress rendering with indicatif

use std::time::Duration;

use flightdeck_devices::{ProgressReporter, RunPhase};
use indicatif::{ProgressBar, ProgressStyle};

/// Resolution of the share progress bar
const SHARE_STEPS: u64 = 1000;

/// Bar for upload progress; hidden when `visible` is false
pub fn share_progress_bar(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(SHARE_STEPS);
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg} [{bar:40.cyan/blue}] {percent:>3}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar.set_message("Uploading");
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Move `bar` to `fraction` of the way
pub fn set_fraction(bar: &ProgressBar, fraction: f64) {
    let position = (fraction.clamp(0.0, 1.0) * SHARE_STEPS as f64).round() as u64;
    bar.set_position(position);
}

/// Shows the current run phase as a spinner message
#[derive(Clone)]
pub struct SpinnerReporter {
    bar: ProgressBar,
}

impl SpinnerReporter {
    pub fn new(visible: bool) -> Self {
        if !visible {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// The underlying bar, used to pause rendering around prompts
    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressReporter for SpinnerReporter {
    fn phase(&self, phase: RunPhase) {
        match phase {
            RunPhase::Done => self.bar.finish_and_clear(),
            _ => self.bar.set_message(format!("{}...", phase.label())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_is_clamped() {
        let bar = ProgressBar::hidden();
        bar.set_length(SHARE_STEPS);
        set_fraction(&bar, 0.5);
        assert_eq!(bar.position(), 500);
        set_fraction(&bar, 2.0);
        assert_eq!(bar.position(), SHARE_STEPS);
    }

    #[test]
    fn test_done_finishes_spinner() {
        let reporter = SpinnerReporter::new(false);
        reporter.phase(RunPhase::Installing);
        reporter.phase(RunPhase::Done);
        assert!(reporter.bar().is_finished());
    }
}
