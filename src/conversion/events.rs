//! Events emitted by the job runner

use std::path::PathBuf;

use uuid::Uuid;

use crate::audio::EncodingParameters;
use crate::core::{FileState, ProgressSnapshot};

/// Published on every job and file state transition
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// Job accepted, all files pending
    JobStarted { job_id: Uuid, total: usize },
    /// A file moved to a new in-progress state
    FileStateChanged { path: PathBuf, state: FileState },
    /// Parameters were chosen for a file
    ParametersResolved {
        path: PathBuf,
        params: EncodingParameters,
    },
    /// A file reached Succeeded or Failed
    FileFinished {
        path: PathBuf,
        success: bool,
        error: Option<String>,
        /// Completed count right after this file was recorded
        completed: usize,
        progress: ProgressSnapshot,
    },
    /// Every dispatched worker has reported back
    JobCompleted { progress: ProgressSnapshot },
    /// Cancellation stopped the job early
    JobCancelled { progress: ProgressSnapshot },
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobEvent::JobCompleted { .. } | JobEvent::JobCancelled { .. }
        )
    }
}
