//! Per-file download progress bars
//!
//! One bytes-styled bar per in-flight session, stacked under a shared
//! MultiProgress. The shared progress map remains the source of truth;
//! the bars are the operator-facing sink.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

pub struct DownloadProgress {
    multi: MultiProgress,
    enabled: bool,
}

impl DownloadProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            enabled,
        }
    }

    /// Register one file's bar. Hidden bars keep the session code
    /// branch-free when progress display is off.
    pub fn add_file(&self, name: &str, size: u64) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }
        let bar = self.multi.add(ProgressBar::new(size));
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:20!} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        bar.set_message(name.to_string());
        bar
    }
}

impl Default for DownloadProgress {
    fn default() -> Self {
        Self::new(true)
    }
}
