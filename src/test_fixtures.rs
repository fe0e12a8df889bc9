//! Test fixtures for encoding tests
//!
//! Mock implementations of the encoder and probe seams, plus helpers for
//! building throwaway input trees on disk.

#![cfg(test)]

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::audio::{AudioProbe, EncodingParameters, ProbeError, ProbeResult};
use crate::conversion::{EncodeError, ExternalEncoder};

/// Create empty files at the given relative paths under `root`
pub fn create_audio_tree(root: &Path, relative_paths: &[&str]) -> Vec<PathBuf> {
    relative_paths
        .iter()
        .map(|rel| {
            let path = root.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("Failed to create fixture directory");
            }
            File::create(&path).expect("Failed to create fixture file");
            path
        })
        .collect()
}

/// A recorded encode call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEncode {
    pub input: PathBuf,
    pub output: PathBuf,
    pub params: EncodingParameters,
}

/// Encoder that never spawns a process
///
/// - Inputs registered with `failing` return a nonzero-exit error
/// - Inputs registered with `panicking` panic inside the worker
/// - Tracks how many encodes are in flight and the peak
#[derive(Debug, Default)]
pub struct MockEncoder {
    delay: Duration,
    failing: HashSet<PathBuf>,
    panicking: HashSet<PathBuf>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<RecordedEncode>>,
}

impl MockEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, input: impl Into<PathBuf>) -> Self {
        self.failing.insert(input.into());
        self
    }

    pub fn panicking(mut self, input: impl Into<PathBuf>) -> Self {
        self.panicking.insert(input.into());
        self
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<RecordedEncode> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ExternalEncoder for MockEncoder {
    async fn encode(
        &self,
        input_path: &Path,
        output_path: &Path,
        params: EncodingParameters,
    ) -> Result<(), EncodeError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.calls.lock().unwrap().push(RecordedEncode {
            input: input_path.to_path_buf(),
            output: output_path.to_path_buf(),
            params,
        });
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panicking.contains(input_path) {
            panic!("simulated encoder crash for {}", input_path.display());
        }
        if self.failing.contains(input_path) {
            return Err(EncodeError::Failed {
                status: "exit status: 1".to_string(),
                detail: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Probe with canned answers
///
/// Unknown paths report the probe defaults. `unavailable()` makes every call
/// fail as if the binary could not be launched.
#[derive(Debug, Default)]
pub struct MockProbe {
    results: HashMap<PathBuf, ProbeResult>,
    unavailable: bool,
    calls: AtomicUsize,
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn with_result(mut self, path: impl Into<PathBuf>, bit_depth: u32, sample_rate: u32) -> Self {
        self.results.insert(
            path.into(),
            ProbeResult {
                bit_depth,
                sample_rate,
            },
        );
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioProbe for MockProbe {
    async fn probe(&self, path: &Path) -> Result<ProbeResult, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(ProbeError::Launch {
                path: PathBuf::from("/missing/ffprobe"),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            });
        }
        Ok(self.results.get(path).copied().unwrap_or_default())
    }
}
