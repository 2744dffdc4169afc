//! Progress reporting utilities using indicatif.
//!
//! The hashing phase of a snapshot build reports every file before it is
//! read. [`Progress`] turns those reports into a terminal progress bar;
//! anything else implementing [`ProgressCallback`] (a test recorder, a log
//! line per file) can be passed instead.

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress callback for the snapshot pipeline.
///
/// Implement this trait to receive progress updates while files are hashed.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase (e.g., "hashing")
    /// * `total` - Total number of items to process
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called before each item is processed.
    ///
    /// # Arguments
    ///
    /// * `current` - Current item number (1-based)
    /// * `path` - Path being processed
    fn on_progress(&self, current: usize, path: &str);

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);

    /// Called to set a label for the following phases (e.g., "source").
    fn on_message(&self, _message: &str) {}
}

/// Progress callback that only logs, one line per file at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        log::debug!("Starting {} of {} files", phase, total);
    }

    fn on_progress(&self, current: usize, path: &str) {
        log::debug!("Processing ({}): {}", current, path);
    }

    fn on_phase_end(&self, phase: &str) {
        log::debug!("Finished {}", phase);
    }
}

/// Terminal progress bar for hashing.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    label: Mutex<String>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no progress bars will be displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use updir::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            label: Mutex::new(String::new()),
            quiet,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total as u64);
        pb.set_style(Self::style());
        let label = lock(&self.label).clone();
        if label.is_empty() {
            pb.set_message(phase.to_string());
        } else {
            pb.set_message(format!("{label}: {phase}"));
        }
        *lock(&self.bar) = Some(pb);
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }

        if let Some(ref pb) = *lock(&self.bar) {
            pb.set_position(current.saturating_sub(1) as u64);
            let label = lock(&self.label);
            if label.is_empty() {
                pb.set_message(truncate_path(path, 40));
            } else {
                pb.set_message(format!("{}: {}", *label, truncate_path(path, 40)));
            }
        }
    }

    fn on_phase_end(&self, _phase: &str) {
        if self.quiet {
            return;
        }

        if let Some(pb) = lock(&self.bar).take() {
            pb.finish_and_clear();
        }
    }

    fn on_message(&self, message: &str) {
        *lock(&self.label) = message.to_string();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name.chars().skip(name_len + 3 - max_len).collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
