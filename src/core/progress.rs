//! Shared progress state for an encode job
//!
//! Workers report into a single `JobProgress`; the front end reads cloned
//! snapshots whenever it likes. Counters, job state and the status line sit
//! behind one lock. The set of successfully encoded files has its own lock.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

/// Lifecycle of a whole job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Lifecycle of a single file within a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileState {
    Pending,
    Resolving,
    Probing,
    Encoding,
    Succeeded,
    Failed,
}

impl FileState {
    fn rank(self) -> u8 {
        match self {
            FileState::Pending => 0,
            FileState::Resolving => 1,
            FileState::Probing => 2,
            FileState::Encoding => 3,
            FileState::Succeeded | FileState::Failed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FileState::Succeeded | FileState::Failed)
    }
}

/// Point-in-time copy of the aggregate progress
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub state: JobState,
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
    /// completed / total, forced to 1.0 once the job completes
    pub fraction: f64,
    pub current_file: String,
    pub status: String,
}

#[derive(Debug, Default)]
struct Counters {
    state: JobState,
    completed: usize,
    total: usize,
    failed: usize,
    fraction: f64,
    current_file: String,
    status: String,
    files: HashMap<PathBuf, FileState>,
    failures: HashMap<PathBuf, String>,
}

impl Counters {
    fn recompute_fraction(&mut self) {
        self.fraction = if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        };
    }
}

/// Aggregate progress shared by all workers of a job
#[derive(Debug, Default)]
pub struct JobProgress {
    counters: Mutex<Counters>,
    succeeded: Mutex<HashSet<PathBuf>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl JobProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run over `files`: 0 of N, every file pending
    pub fn reset(&self, files: &[PathBuf]) {
        lock(&self.succeeded).clear();

        let mut counters = lock(&self.counters);
        *counters = Counters {
            state: JobState::Running,
            total: files.len(),
            files: files
                .iter()
                .map(|f| (f.clone(), FileState::Pending))
                .collect(),
            status: format!("Starting: {} file(s)", files.len()),
            ..Counters::default()
        };
    }

    /// Move a file forward to a non-terminal state
    ///
    /// Returns false (and changes nothing) if the file is unknown or the
    /// transition would not move it forward.
    pub fn advance(&self, path: &Path, next: FileState) -> bool {
        if next.is_terminal() {
            return false;
        }
        let mut counters = lock(&self.counters);
        let Some(current) = counters.files.get_mut(path) else {
            log::warn!("Progress update for unknown file {}", path.display());
            return false;
        };
        if next.rank() <= current.rank() {
            log::warn!(
                "Rejected transition {:?} -> {:?} for {}",
                current,
                next,
                path.display()
            );
            return false;
        }
        *current = next;

        if next == FileState::Resolving {
            let name = display_name(path);
            counters.status = format!("Encoding: {}...", name);
            counters.current_file = name;
        }
        true
    }

    /// Mark a file as encoded. Returns the new completed count, or `None`
    /// if the file had already finished.
    pub fn record_success(&self, path: &Path, output: &Path) -> Option<usize> {
        let completed = self.finish_file(path, FileState::Succeeded, None, || {
            format!("✓ Completed: {}", display_name(output))
        })?;
        lock(&self.succeeded).insert(path.to_path_buf());
        Some(completed)
    }

    /// Mark a file as failed with a reason. Returns the new completed count,
    /// or `None` if the file had already finished.
    pub fn record_failure(&self, path: &Path, reason: &str) -> Option<usize> {
        self.finish_file(path, FileState::Failed, Some(reason), || {
            format!("✗ Failed: {}", display_name(path))
        })
    }

    fn finish_file(
        &self,
        path: &Path,
        terminal: FileState,
        failure: Option<&str>,
        status: impl FnOnce() -> String,
    ) -> Option<usize> {
        let mut counters = lock(&self.counters);
        let current = counters.files.get_mut(path)?;
        if current.is_terminal() {
            log::warn!("{} already finished as {:?}", path.display(), current);
            return None;
        }
        *current = terminal;

        if let Some(reason) = failure {
            counters.failed += 1;
            counters
                .failures
                .insert(path.to_path_buf(), reason.to_string());
        }
        counters.completed += 1;
        debug_assert!(counters.completed <= counters.total);
        counters.recompute_fraction();
        counters.status = status();
        Some(counters.completed)
    }

    /// Close the job. Completed jobs report full progress even with failures.
    pub fn finish(&self, cancelled: bool) {
        let mut counters = lock(&self.counters);
        if cancelled {
            counters.state = JobState::Cancelled;
            counters.status = format!(
                "Encoding cancelled ({} of {} processed)",
                counters.completed, counters.total
            );
        } else {
            counters.state = JobState::Completed;
            counters.fraction = 1.0;
            counters.status = if counters.failed == 0 {
                "Encoding completed!".to_string()
            } else {
                format!(
                    "Encoding completed! ({} of {} failed)",
                    counters.failed, counters.total
                )
            };
        }
        counters.current_file.clear();
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let counters = lock(&self.counters);
        ProgressSnapshot {
            state: counters.state,
            completed: counters.completed,
            total: counters.total,
            failed: counters.failed,
            fraction: counters.fraction,
            current_file: counters.current_file.clone(),
            status: counters.status.clone(),
        }
    }

    pub fn file_state(&self, path: &Path) -> Option<FileState> {
        lock(&self.counters).files.get(path).copied()
    }

    pub fn failure_reason(&self, path: &Path) -> Option<String> {
        lock(&self.counters).failures.get(path).cloned()
    }

    pub fn is_succeeded(&self, path: &Path) -> bool {
        lock(&self.succeeded).contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_new_progress_is_idle() {
        let progress = JobProgress::new();
        let snapshot = progress.snapshot();
        assert_eq!(snapshot.state, JobState::Idle);
        assert_eq!(snapshot.total, 0);
        assert_eq!(snapshot.fraction, 0.0);
    }

    #[test]
    fn test_reset_marks_all_pending() {
        let progress = JobProgress::new();
        let inputs = files(&["/a/1.flac", "/a/2.flac"]);
        progress.reset(&inputs);

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.state, JobState::Running);
        assert_eq!(snapshot.completed, 0);
        assert_eq!(snapshot.total, 2);
        for f in &inputs {
            assert_eq!(progress.file_state(f), Some(FileState::Pending));
        }
    }

    #[test]
    fn test_forward_transitions_only() {
        let progress = JobProgress::new();
        let path = PathBuf::from("/a/song.flac");
        progress.reset(std::slice::from_ref(&path));

        assert!(progress.advance(&path, FileState::Resolving));
        assert!(progress.advance(&path, FileState::Encoding));
        assert!(!progress.advance(&path, FileState::Probing));
        assert!(!progress.advance(&path, FileState::Encoding));
        assert!(!progress.advance(&path, FileState::Succeeded));
        assert_eq!(progress.file_state(&path), Some(FileState::Encoding));

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.current_file, "song.flac");
        assert_eq!(snapshot.status, "Encoding: song.flac...");
    }

    #[test]
    fn test_unknown_file_is_ignored() {
        let progress = JobProgress::new();
        progress.reset(&files(&["/a/1.flac"]));
        assert!(!progress.advance(Path::new("/b/other.flac"), FileState::Resolving));
        assert_eq!(
            progress.record_success(Path::new("/b/other.flac"), Path::new("/b/other.wma")),
            None
        );
        assert_eq!(progress.snapshot().completed, 0);
    }

    #[test]
    fn test_success_and_failure_counting() {
        let progress = JobProgress::new();
        let inputs = files(&["/a/1.flac", "/a/2.flac", "/a/3.flac"]);
        progress.reset(&inputs);

        assert_eq!(
            progress.record_success(&inputs[0], Path::new("/a/1.wma")),
            Some(1)
        );
        assert_eq!(progress.snapshot().status, "✓ Completed: 1.wma");

        assert_eq!(progress.record_failure(&inputs[1], "boom"), Some(2));
        let snapshot = progress.snapshot();
        assert_eq!(snapshot.status, "✗ Failed: 2.flac");
        assert_eq!(snapshot.failed, 1);
        assert!((snapshot.fraction - 2.0 / 3.0).abs() < f64::EPSILON);

        assert!(progress.is_succeeded(&inputs[0]));
        assert!(!progress.is_succeeded(&inputs[1]));
        assert_eq!(progress.failure_reason(&inputs[1]).as_deref(), Some("boom"));
    }

    #[test]
    fn test_file_finishes_only_once() {
        let progress = JobProgress::new();
        let inputs = files(&["/a/1.flac"]);
        progress.reset(&inputs);

        assert_eq!(progress.record_failure(&inputs[0], "first"), Some(1));
        assert_eq!(progress.record_success(&inputs[0], Path::new("/a/1.wma")), None);
        assert_eq!(progress.record_failure(&inputs[0], "again"), None);

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.failed, 1);
        assert!(!progress.is_succeeded(&inputs[0]));
        assert_eq!(progress.failure_reason(&inputs[0]).as_deref(), Some("first"));
    }

    #[test]
    fn test_finish_forces_full_progress_with_failures() {
        let progress = JobProgress::new();
        let inputs = files(&["/a/1.flac", "/a/2.flac"]);
        progress.reset(&inputs);
        progress.record_failure(&inputs[0], "boom");
        progress.record_success(&inputs[1], Path::new("/a/2.wma"));
        progress.finish(false);

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.state, JobState::Completed);
        assert_eq!(snapshot.fraction, 1.0);
        assert_eq!(snapshot.status, "Encoding completed! (1 of 2 failed)");
    }

    #[test]
    fn test_finish_cancelled_keeps_fraction() {
        let progress = JobProgress::new();
        let inputs = files(&["/a/1.flac", "/a/2.flac"]);
        progress.reset(&inputs);
        progress.record_success(&inputs[0], Path::new("/a/1.wma"));
        progress.finish(true);

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.state, JobState::Cancelled);
        assert_eq!(snapshot.fraction, 0.5);
        assert_eq!(progress.file_state(&inputs[1]), Some(FileState::Pending));
    }

    #[test]
    fn test_reset_clears_previous_run() {
        let progress = JobProgress::new();
        let inputs = files(&["/a/1.flac"]);
        progress.reset(&inputs);
        progress.record_success(&inputs[0], Path::new("/a/1.wma"));
        progress.finish(false);

        progress.reset(&inputs);
        let snapshot = progress.snapshot();
        assert_eq!(snapshot.completed, 0);
        assert_eq!(snapshot.fraction, 0.0);
        assert!(!progress.is_succeeded(&inputs[0]));
    }
}
