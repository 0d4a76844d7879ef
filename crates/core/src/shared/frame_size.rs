use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::constants::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::shared::error::CaptureError;

/// Pixel dimensions of a capture session and of every frame fed into it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// 4:2:0 chroma subsampling halves both axes, so both must be even.
    pub fn validate_for_yuv420(self) -> Result<Self, CaptureError> {
        if self.width == 0 || self.height == 0 || self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(CaptureError::InvalidDimensions(self));
        }
        Ok(self)
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
