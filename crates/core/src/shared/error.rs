use std::path::PathBuf;

use thiserror::Error;

use crate::encoding::domain::encoder_session::EncoderState;
use crate::shared::frame_size::FrameSize;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no H.264 encoder is available in the linked FFmpeg build")]
    CodecUnavailable,
    #[error("H.264 encoder rejected the stream configuration: {0}")]
    CodecOpenFailed(#[source] ffmpeg_next::Error),
    #[error("failed to allocate output context for {path}")]
    OutputAllocFailed {
        path: PathBuf,
        #[source]
        source: Option<ffmpeg_next::Error>,
    },
    #[error("failed to open {path} for writing: {source}")]
    FileOpenFailed {
        path: PathBuf,
        #[source]
        source: BoxedError,
    },
    #[error("failed to write container header to {path}: {source}")]
    HeaderWriteFailed {
        path: PathBuf,
        #[source]
        source: ffmpeg_next::Error,
    },
    #[error("failed to allocate {what} frame buffer")]
    FrameAllocFailed { what: &'static str },
    #[error("failed to create pixel conversion context: {0}")]
    ConverterInitFailed(#[source] ffmpeg_next::Error),
    #[error("pixel conversion failed: {0}")]
    ConversionFailed(#[source] ffmpeg_next::Error),
    #[error("encoder rejected frame {pts}: {source}")]
    EncodeSubmitFailed {
        pts: i64,
        #[source]
        source: ffmpeg_next::Error,
    },
    #[error("failed to receive encoded packet: {0}")]
    EncodeReceiveFailed(#[source] ffmpeg_next::Error),
    #[error("failed to write encoded packet: {0}")]
    WriteFrameFailed(#[source] ffmpeg_next::Error),
    #[error("failed to open {path} for reading: {source}")]
    InputOpenFailed {
        path: PathBuf,
        #[source]
        source: ffmpeg_next::Error,
    },
    #[error("no usable video stream in {path}")]
    StreamProbeFailed { path: PathBuf },
    #[error("failed to mux into {path}: {source}")]
    MuxWriteFailed {
        path: PathBuf,
        #[source]
        source: ffmpeg_next::Error,
    },
    #[error("frame is {actual}, capture session expects {expected}")]
    FrameSizeMismatch {
        expected: FrameSize,
        actual: FrameSize,
    },
    #[error("frame buffer holds {actual} bytes, {expected} expected")]
    BufferSizeMismatch { expected: usize, actual: usize },
    #[error("invalid capture size {0}: width and height must be positive and even")]
    InvalidDimensions(FrameSize),
    #[error("a capture session is already active")]
    AlreadyActive,
    #[error("no capture session is active")]
    NotActive,
    #[error("encoder session cannot {operation} while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: EncoderState,
    },
    #[error("frame readback failed: {0}")]
    ReadbackFailed(#[source] BoxedError),
    #[error("failed to load capture config from {path}: {source}")]
    ConfigLoad {
        path: PathBuf,
        #[source]
        source: BoxedError,
    },
    #[error("invalid capture config: {0}")]
    InvalidConfig(String),
}

impl CaptureError {
    /// Per-frame failures: the frame is lost but the session can keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CaptureError::ConversionFailed(_)
                | CaptureError::EncodeSubmitFailed { .. }
                | CaptureError::EncodeReceiveFailed(_)
                | CaptureError::WriteFrameFailed(_)
                | CaptureError::FrameSizeMismatch { .. }
                | CaptureError::BufferSizeMismatch { .. }
                | CaptureError::ReadbackFailed(_)
        )
    }
}
