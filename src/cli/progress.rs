use std::fmt::Display;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::RunError;
use crate::plan::RunListener;
use crate::run::{RunKey, RunOutcome};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Done,
    Failed,
    Skipped,
}

impl RunStatus {
    pub fn of(outcome: &RunOutcome) -> Self {
        match outcome {
            Ok(_) => Self::Done,
            Err(failure) if matches!(failure.error, RunError::Cancelled) => Self::Skipped,
            Err(_) => Self::Failed,
        }
    }

    fn label(&self) -> impl Display {
        match self {
            Self::Done => "Done".green().bold(),
            Self::Failed => "Failed".bright_white().on_red().bold(),
            Self::Skipped => "Skipped".yellow().bold(),
        }
    }
}

/// Progress bar over the runs of a sweep.
pub struct SweepProgress {
    progress_bar: ProgressBar,
}

impl SweepProgress {
    pub fn new(num_runs: usize) -> Self {
        let progress_bar = ProgressBar::new(num_runs as u64);
        let style = ProgressStyle::with_template(&format!(
            "{{spinner:.green}} {:16} [{{pos}}/{{len}}] {{msg}}",
            "In Progress".bright_white().bold()
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style);
        progress_bar.enable_steady_tick(Duration::from_millis(200));
        Self { progress_bar }
    }

    pub fn finish(&self) {
        self.progress_bar.finish_and_clear();
    }
}

impl RunListener for SweepProgress {
    fn started(&self, key: &RunKey) {
        self.progress_bar.set_message(key.to_string());
    }

    fn finished(&self, key: &RunKey, outcome: &RunOutcome) {
        let status = RunStatus::of(outcome);
        self.progress_bar
            .println(format!("  {:16} {}", status.label(), key));
        self.progress_bar.inc(1);
    }
}
