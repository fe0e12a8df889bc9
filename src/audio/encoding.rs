//! Encoding parameter selection
//!
//! WMA Lossless is only produced at a fixed set of tiers. Manual mode uses a
//! user-chosen tier for every file; auto mode probes each file and rounds its
//! properties up to the nearest tier.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Supported output bit depths
pub const SUPPORTED_BIT_DEPTHS: &[u32] = &[16, 24];

/// Supported output sample rates in kHz
pub const SUPPORTED_SAMPLE_RATES_KHZ: &[u32] = &[44, 48, 96];

/// Final bit depth and sample rate for one encode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingParameters {
    pub bit_depth: u32,
    pub sample_rate_khz: u32,
}

impl EncodingParameters {
    /// Build a manual parameter pair, rejecting unsupported tiers
    pub fn new(bit_depth: u32, sample_rate_khz: u32) -> Result<Self, ParameterError> {
        if !SUPPORTED_BIT_DEPTHS.contains(&bit_depth) {
            return Err(ParameterError::BitDepth(bit_depth));
        }
        if !SUPPORTED_SAMPLE_RATES_KHZ.contains(&sample_rate_khz) {
            return Err(ParameterError::SampleRate(sample_rate_khz));
        }
        Ok(Self {
            bit_depth,
            sample_rate_khz,
        })
    }

    /// Sample rate passed to the encoder (`-ar`)
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_khz * 1000
    }

    /// Short label, e.g. "24-bit · 96 kHz"
    pub fn label(&self) -> String {
        format!("{}-bit · {} kHz", self.bit_depth, self.sample_rate_khz)
    }
}

impl Default for EncodingParameters {
    fn default() -> Self {
        Self {
            bit_depth: 16,
            sample_rate_khz: 48,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("unsupported bit depth {0} (expected 16 or 24)")]
    BitDepth(u32),
    #[error("unsupported sample rate {0} kHz (expected 44, 48 or 96)")]
    SampleRate(u32),
}

/// How parameters are chosen for the files of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingMode {
    /// Same parameters for every file
    Manual(EncodingParameters),
    /// Probe each file and round up. `fallback` is used when the probe tool
    /// cannot be launched.
    Auto { fallback: EncodingParameters },
}

impl EncodingMode {
    pub fn is_auto(&self) -> bool {
        matches!(self, EncodingMode::Auto { .. })
    }
}

/// Round probed properties up to the nearest supported tier
///
/// Bit depths above 16 become 24. The sample rate is reduced to whole kHz
/// and snapped: below 44 -> 44, 44 through 48 -> 48, above 48 -> 96.
pub fn round_up(bit_depth: u32, sample_rate_hz: u32) -> EncodingParameters {
    let bit_depth = if bit_depth > 16 { 24 } else { 16 };

    let khz = sample_rate_hz / 1000;
    let sample_rate_khz = if khz < 44 {
        44
    } else if khz <= 48 {
        48
    } else {
        96
    };

    EncodingParameters {
        bit_depth,
        sample_rate_khz,
    }
}
