//! Core application logic and state
//!
//! This module contains:
//! - Persisted user settings
//! - Input discovery (recursive folder scans)
//! - Shared job progress tracking

mod progress;
mod scanning;
mod state;

pub use progress::{FileState, JobProgress, JobState, ProgressSnapshot};
pub use scanning::collect_audio_files;
pub use state::{AppSettings, EncodingModeKind, OutputModeKind};
