use layers::Precision;
use serde::{Deserialize, Serialize};

use crate::cache::ArtifactConfig;
use crate::device::DeviceSpec;
use crate::error::{Result, SegmentError};

pub const DEFAULT_MAX_LENGTH: usize = 512;
pub const DEFAULT_BATCH_SIZE: usize = 128;

/// Knobs accepted by [`WordSegments`](crate::WordSegments) constructors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SegmentOptions {
    /// Keep the original casing of words instead of lowercasing them.
    pub preserve_case: bool,
    pub device: DeviceSpec,
    pub truncate: bool,
    pub max_length: usize,
    pub precision: Precision,
    pub batch_size: usize,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            preserve_case: false,
            device: DeviceSpec::Auto,
            truncate: true,
            max_length: DEFAULT_MAX_LENGTH,
            precision: Precision::Float16,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl SegmentOptions {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SegmentError::InvalidOption(
                "batch_size must be greater than zero".into(),
            ));
        }
        if self.max_length == 0 {
            return Err(SegmentError::InvalidOption(
                "max_length must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// The fields that decide whether cached artifacts can be reused.
    pub fn artifact_config(&self) -> ArtifactConfig {
        ArtifactConfig {
            truncate: self.truncate,
            max_length: self.max_length,
            precision: self.precision,
            device: self.device,
        }
    }
}
