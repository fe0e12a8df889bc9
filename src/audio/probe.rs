//! Source property detection via ffprobe

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;

/// Bit depth reported when the probe output has none
pub const DEFAULT_BIT_DEPTH: u32 = 16;

/// Sample rate (Hz) reported when the probe output has none
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 48000;

/// Raw properties of a source file's first audio stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub bit_depth: u32,
    pub sample_rate: u32,
}

impl Default for ProbeResult {
    fn default() -> Self {
        Self {
            bit_depth: DEFAULT_BIT_DEPTH,
            sample_rate: DEFAULT_SAMPLE_RATE_HZ,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to launch ffprobe at {path}: {source}")]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Something that can report the bit depth and sample rate of an audio file
#[async_trait]
pub trait AudioProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<ProbeResult, ProbeError>;
}

/// Probe backed by the ffprobe binary
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    ffprobe_path: PathBuf,
}

impl FfprobeProbe {
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }
}

/// ffprobe arguments that print `bits_per_sample` and `sample_rate` of
/// stream a:0 as bare values, one per line
pub fn build_probe_args(input_path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-v",
        "error",
        "-select_streams",
        "a:0",
        "-show_entries",
        "stream=bits_per_sample,sample_rate",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ]
    .iter()
    .map(|arg| OsString::from(*arg))
    .collect();
    args.push(input_path.as_os_str().to_os_string());
    args
}

#[async_trait]
impl AudioProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> Result<ProbeResult, ProbeError> {
        let output = Command::new(&self.ffprobe_path)
            .args(build_probe_args(path))
            .output()
            .await
            .map_err(|source| ProbeError::Launch {
                path: self.ffprobe_path.clone(),
                source,
            })?;

        if !output.status.success() {
            log::debug!(
                "ffprobe exited with {} for {}",
                output.status,
                path.display()
            );
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push('\n');
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        let result = parse_probe_output(&combined);
        log::debug!(
            "Probed {}: {}-bit, {} Hz",
            path.display(),
            result.bit_depth,
            result.sample_rate
        );
        Ok(result)
    }
}

/// Classify the integers in ffprobe output
///
/// Values above 10,000 are sample rates, values below 1,000 are bit depths,
/// anything else is ignored. The first value of each kind wins. A bit depth
/// of 0 is what ffprobe prints for codecs without one, so it is skipped.
pub fn parse_probe_output(output: &str) -> ProbeResult {
    let mut bit_depth = None;
    let mut sample_rate = None;

    for value in output
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
    {
        if value > 10_000 {
            sample_rate.get_or_insert(value);
        } else if value < 1_000 && value > 0 {
            bit_depth.get_or_insert(value);
        }
    }

    ProbeResult {
        bit_depth: bit_depth.unwrap_or(DEFAULT_BIT_DEPTH),
        sample_rate: sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE_HZ),
    }
}
