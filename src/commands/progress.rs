//! Terminal progress display

use indicatif::{ProgressBar, ProgressStyle};
use spiboot_core::flash::Progress;
use std::time::Duration;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}";

/// Create a byte progress bar labelled with `phase`
pub fn bar(total: u64, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(BAR_TEMPLATE)
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(phase.to_string());
    pb
}

/// Create a ticking spinner showing `message`
pub fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// [`Progress`] implementation drawing one bar per phase
#[derive(Default)]
pub struct IndicatifProgress {
    current: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn start(&mut self, total: usize, phase: &str) {
        self.finish();
        self.current = Some(bar(total as u64, phase));
    }

    fn set(&self, position: usize) {
        if let Some(pb) = &self.current {
            pb.set_position(position as u64);
        }
    }

    /// Finish the bar of the current phase, if any
    pub fn finish(&mut self) {
        if let Some(pb) = self.current.take() {
            pb.finish();
        }
    }
}

impl Drop for IndicatifProgress {
    fn drop(&mut self) {
        if let Some(pb) = self.current.take() {
            pb.abandon();
        }
    }
}

impl Progress for IndicatifProgress {
    fn erasing(&mut self, total_bytes: usize) {
        self.start(total_bytes, "Erasing");
    }

    fn erase_progress(&mut self, bytes_erased: usize) {
        self.set(bytes_erased);
    }

    fn writing(&mut self, total_bytes: usize) {
        self.start(total_bytes, "Writing");
    }

    fn write_progress(&mut self, bytes_written: usize) {
        self.set(bytes_written);
    }

    fn verifying(&mut self, total_bytes: usize) {
        self.start(total_bytes, "Verifying");
    }

    fn verify_progress(&mut self, bytes_verified: usize) {
        self.set(bytes_verified);
    }
}
