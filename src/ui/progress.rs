use crate::archive::ArchiveProgress;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

pub struct ProgressManager {
    multi_progress: MultiProgress,
    enabled: bool,
}

impl ProgressManager {
    pub fn new(enabled: bool) -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            enabled,
        }
    }

    pub fn create_entry_progress(&self, total_entries: u64, message: &str) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = self.multi_progress.add(ProgressBar::new(total_entries));
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>5}/{len:5} entries {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn create_spinner(&self, message: &str) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = self.multi_progress.add(ProgressBar::new_spinner());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        pb.set_message(message.to_string());
        pb
    }

    pub fn suspend<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if self.enabled {
            self.multi_progress.suspend(f)
        } else {
            f()
        }
    }

    pub fn clear(&self) {
        if self.enabled {
            self.multi_progress.clear().ok();
        }
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new(false)
    }
}

pub fn update_entry_progress(pb: &ProgressBar, progress: &ArchiveProgress) {
    if pb.length() != Some(progress.total_entries as u64) {
        pb.set_length(progress.total_entries as u64);
    }
    pb.set_position(progress.entries_processed as u64);

    match progress.current_entry {
        Some(ref entry) => pb.set_message(entry.clone()),
        None => pb.set_message(""),
    }
}

pub fn finish_progress_with_summary(pb: &ProgressBar, message: &str, duration: Duration) {
    let final_message = format!("{} (completed in {})", message, format_duration(duration));
    pb.finish_with_message(final_message);
}

fn format_duration(duration: Duration) -> String {
    crate::ui::output::format_duration(duration)
}

/// One bar per pipeline stage: a spinner for stages without entries to
/// count, an entry bar for the archive stages.
pub struct StageProgress {
    progress_bar: ProgressBar,
    stage: String,
    start_time: Instant,
}

impl StageProgress {
    pub fn spinner(progress_manager: &ProgressManager, stage: &str) -> Self {
        Self::with_bar(progress_manager.create_spinner(stage), stage)
    }

    /// The length is filled in by the first `update_entry_progress` call.
    pub fn entries(progress_manager: &ProgressManager, stage: &str) -> Self {
        Self::with_bar(progress_manager.create_entry_progress(0, stage), stage)
    }

    fn with_bar(progress_bar: ProgressBar, stage: &str) -> Self {
        Self {
            progress_bar,
            stage: stage.to_string(),
            start_time: Instant::now(),
        }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.progress_bar
    }

    pub fn set_message(&self, message: &str) {
        self.progress_bar.set_message(message.to_string());
    }

    pub fn finish_success(&self) {
        finish_progress_with_summary(&self.progress_bar, &self.stage, self.start_time.elapsed());
    }

    pub fn abandon(&self, error: &str) {
        self.progress_bar
            .abandon_with_message(format!("{}: failed: {}", self.stage, error));
    }
}
