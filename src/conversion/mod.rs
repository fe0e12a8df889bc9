//! Audio conversion module
//!
//! Handles transcoding audio files to WMA Lossless using ffmpeg.

mod events;
mod ffmpeg;
mod output_paths;
mod parallel;
mod report;

pub use events::JobEvent;
pub use ffmpeg::{EncodeError, ExternalEncoder, FfmpegEncoder};
pub use output_paths::OutputMode;
pub use parallel::{CancelToken, EncodeJob, EncodeJobRunner, DEFAULT_CONCURRENCY};
pub use report::JobReport;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// External binaries the encoder depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
}

impl Tool {
    pub fn binary_name(self) -> &'static str {
        match self {
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
        }
    }

    /// Environment variable that overrides the binary location
    pub fn env_var(self) -> &'static str {
        match self {
            Tool::Ffmpeg => "WMA_ENCODER_FFMPEG",
            Tool::Ffprobe => "WMA_ENCODER_FFPROBE",
        }
    }

    pub fn env_override(self) -> Option<PathBuf> {
        std::env::var_os(self.env_var())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{tool} binary not found. Expected at resources/bin/{tool} or on PATH")]
    NotFound { tool: &'static str },
    #[error("{tool} not found at {path:?}")]
    Missing { tool: &'static str, path: PathBuf },
    #[error("{tool} at {path:?} is not executable")]
    NotExecutable { tool: &'static str, path: PathBuf },
}

/// Find a tool binary
///
/// An explicit path wins. Otherwise looks at CARGO_MANIFEST_DIR/resources/bin
/// (development), the app bundle's Resources/bin, resources/bin next to the
/// executable, and finally PATH.
pub fn locate_tool(tool: Tool, explicit: Option<&Path>) -> Result<PathBuf, ToolError> {
    let name = tool.binary_name();

    if let Some(path) = explicit {
        return verify_tool(tool, path);
    }

    // Try CARGO_MANIFEST_DIR first (development mode)
    if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
        let dev_path = PathBuf::from(manifest_dir)
            .join("resources")
            .join("bin")
            .join(name);
        if dev_path.is_file() {
            log::debug!("Found {} at development path: {:?}", name, dev_path);
            return verify_tool(tool, &dev_path);
        }
    }

    // Try relative to current executable (release mode)
    if let Ok(exe_path) = std::env::current_exe()
        && let Some(exe_dir) = exe_path.parent()
    {
        // macOS app bundle: Contents/MacOS/../Resources/bin/<tool>
        let bundle_path = exe_dir.join("..").join("Resources").join("bin").join(name);
        if bundle_path.is_file() {
            log::debug!("Found {} at bundle path: {:?}", name, bundle_path);
            return verify_tool(tool, &bundle_path);
        }

        let local_path = exe_dir.join("resources").join("bin").join(name);
        if local_path.is_file() {
            log::debug!("Found {} at local path: {:?}", name, local_path);
            return verify_tool(tool, &local_path);
        }
    }

    find_on_path(tool, std::env::var_os("PATH"))
}

/// Search a PATH-style list, skipping entries that are not executable
fn find_on_path(tool: Tool, paths: Option<OsString>) -> Result<PathBuf, ToolError> {
    let name = tool.binary_name();
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    match which::which_in(name, paths, cwd) {
        Ok(path) => {
            log::debug!("Found {} on PATH: {:?}", name, path);
            Ok(path)
        }
        Err(e) => {
            log::debug!("{} not on PATH: {}", name, e);
            Err(ToolError::NotFound { tool: name })
        }
    }
}

/// Verify that a tool exists and is executable
fn verify_tool(tool: Tool, path: &Path) -> Result<PathBuf, ToolError> {
    let name = tool.binary_name();
    if !path.is_file() {
        return Err(ToolError::Missing {
            tool: name,
            path: path.to_path_buf(),
        });
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let executable = std::fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false);
        if !executable {
            return Err(ToolError::NotExecutable {
                tool: name,
                path: path.to_path_buf(),
            });
        }
    }

    Ok(path.to_path_buf())
}
