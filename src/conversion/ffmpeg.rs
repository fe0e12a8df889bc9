//! FFmpeg subprocess handling for WMA Lossless encoding

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::audio::EncodingParameters;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to launch ffmpeg at {path}: {source}")]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ffmpeg exited with {status}: {detail}")]
    Failed { status: String, detail: String },
}

impl EncodeError {
    fn from_status(status: ExitStatus, output: &[u8]) -> Self {
        let text = String::from_utf8_lossy(output);
        let detail = text
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("Unknown error")
            .to_string();
        EncodeError::Failed {
            status: status.to_string(),
            detail,
        }
    }
}

/// Something that can encode one file to WMA Lossless
#[async_trait]
pub trait ExternalEncoder: Send + Sync {
    async fn encode(
        &self,
        input_path: &Path,
        output_path: &Path,
        params: EncodingParameters,
    ) -> Result<(), EncodeError>;
}

/// Encoder backed by the ffmpeg binary
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg_path: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

/// Build ffmpeg arguments
///
/// -i <input>                 : Input file
/// -c:a wmalossless           : WMA Lossless encoder
/// -ar <hz>                   : Output sample rate
/// -bits_per_raw_sample <n>   : Output bit depth
/// -y                         : Overwrite output file without asking
pub fn build_encode_args(
    input_path: &Path,
    output_path: &Path,
    params: EncodingParameters,
) -> Vec<OsString> {
    vec![
        "-i".into(),
        input_path.as_os_str().to_os_string(),
        "-c:a".into(),
        "wmalossless".into(),
        "-ar".into(),
        params.sample_rate_hz().to_string().into(),
        "-bits_per_raw_sample".into(),
        params.bit_depth.to_string().into(),
        "-y".into(),
        output_path.as_os_str().to_os_string(),
    ]
}

#[async_trait]
impl ExternalEncoder for FfmpegEncoder {
    async fn encode(
        &self,
        input_path: &Path,
        output_path: &Path,
        params: EncodingParameters,
    ) -> Result<(), EncodeError> {
        log::debug!(
            "Converting: {} -> {} at {}",
            input_path.display(),
            output_path.display(),
            params.label()
        );

        let output = Command::new(&self.ffmpeg_path)
            .args(build_encode_args(input_path, output_path, params))
            .output()
            .await
            .map_err(|source| EncodeError::Launch {
                path: self.ffmpeg_path.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        // ffmpeg reports errors on stderr; fold stdout in so nothing is lost
        let mut combined = output.stdout;
        combined.push(b'\n');
        combined.extend_from_slice(&output.stderr);
        Err(EncodeError::from_status(output.status, &combined))
    }
}
