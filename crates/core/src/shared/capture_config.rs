use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::shared::constants::{DEFAULT_FRAME_RATE, ENCODER_PRESET, GOP_SIZE, INTERMEDIATE_PATH};
use crate::shared::error::CaptureError;

/// What the controller does when a single frame cannot be encoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameErrorPolicy {
    /// Drop the frame, log it, keep capturing.
    #[default]
    Continue,
    /// Close the encoder and end the session without producing output.
    StopSession,
}

/// What the remuxer does with the final file after a packet write fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuxFailurePolicy {
    /// Stop copying but still write the trailer, leaving a playable prefix.
    #[default]
    FinalizePartial,
    /// Skip the trailer and delete the partial final file.
    DiscardOutput,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub frame_rate: i32,
    pub gop_size: u32,
    pub preset: String,
    pub intermediate_path: PathBuf,
    pub frame_error_policy: FrameErrorPolicy,
    pub mux_failure_policy: MuxFailurePolicy,
    /// Log progress every N accepted frames.
    pub progress_every: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            gop_size: GOP_SIZE,
            preset: ENCODER_PRESET.to_string(),
            intermediate_path: PathBuf::from(INTERMEDIATE_PATH),
            frame_error_policy: FrameErrorPolicy::default(),
            mux_failure_policy: MuxFailurePolicy::default(),
            progress_every: DEFAULT_FRAME_RATE as usize,
        }
    }
}

impl CaptureConfig {
    /// Loads a JSON config. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, CaptureError> {
        let load_error = |source: Box<dyn std::error::Error + Send + Sync>| {
            CaptureError::ConfigLoad {
                path: path.to_path_buf(),
                source,
            }
        };
        let json = fs::read_to_string(path).map_err(|e| load_error(Box::new(e)))?;
        let config: Self = serde_json::from_str(&json).map_err(|e| load_error(Box::new(e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_intermediate_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.intermediate_path = path.into();
        self
    }

    pub fn with_frame_error_policy(mut self, policy: FrameErrorPolicy) -> Self {
        self.frame_error_policy = policy;
        self
    }

    pub fn with_mux_failure_policy(mut self, policy: MuxFailurePolicy) -> Self {
        self.mux_failure_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.frame_rate <= 0 {
            return Err(CaptureError::InvalidConfig(format!(
                "frame_rate must be positive, got {}",
                self.frame_rate
            )));
        }
        if self.gop_size == 0 {
            return Err(CaptureError::InvalidConfig(
                "gop_size must be positive".to_string(),
            ));
        }
        if self.intermediate_path.as_os_str().is_empty() {
            return Err(CaptureError::InvalidConfig(
                "intermediate_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
