//! Per-job summary for display and `--report` output

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::audio::EncodingParameters;
use crate::core::{FileState, JobState};

/// Outcome of one input file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub parameters: Option<EncodingParameters>,
    pub state: FileState,
    pub error: Option<String>,
    /// Non-fatal remarks, e.g. a probe fallback
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl FileReport {
    pub fn pending(input: &Path) -> Self {
        Self {
            input: input.to_path_buf(),
            output: None,
            parameters: None,
            state: FileState::Pending,
            error: None,
            notes: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == FileState::Succeeded
    }
}

/// Outcome of a whole job
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub state: JobState,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub files: Vec<FileReport>,
}

impl JobReport {
    pub fn new(
        job_id: Uuid,
        started_at: DateTime<Utc>,
        state: JobState,
        files: Vec<FileReport>,
    ) -> Self {
        let succeeded = files.iter().filter(|f| f.succeeded()).count();
        let failed = files
            .iter()
            .filter(|f| f.state == FileState::Failed)
            .count();
        Self {
            job_id,
            started_at,
            finished_at: Utc::now(),
            state,
            total: files.len(),
            succeeded,
            failed,
            files,
        }
    }

    /// Files that were never dispatched (cancelled jobs only)
    pub fn skipped(&self) -> usize {
        self.total - self.succeeded - self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.state == JobState::Completed && self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.state == FileState::Failed)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
