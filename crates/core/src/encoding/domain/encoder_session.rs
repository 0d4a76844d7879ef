use std::path::Path;

use crate::shared::error::CaptureError;
use crate::shared::frame_size::FrameSize;
use crate::shared::hdr_frame::HdrFrame;

/// Lifecycle of an encoder session.
///
/// `Opening` and `Closing` are only observable while `open`/`close` run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncoderState {
    Closed,
    Opening,
    Ready,
    Encoding,
    Closing,
}

/// Result of one accepted frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeedStatus {
    /// Presentation timestamp assigned to the frame, in codec ticks.
    pub pts: i64,
    /// Packets the encoder emitted (and that were written) during this call.
    /// Streaming encoders buffer, so this is often zero.
    pub packets_written: usize,
}

/// Abstracts the encode side so the capture controller does not depend on a
/// specific codec library.
pub trait EncoderSession: Send {
    /// Opens the codec and the intermediate stream at `path`. On failure no
    /// resources stay acquired and the session is back to `Closed`.
    fn open(&mut self, size: FrameSize, path: &Path) -> Result<(), CaptureError>;

    /// Converts, encodes and writes one frame. Errors for which
    /// [`CaptureError::is_recoverable`] holds leave the session usable.
    fn feed(&mut self, frame: &HdrFrame) -> Result<FeedStatus, CaptureError>;

    /// Flushes and releases everything. A no-op when already closed.
    fn close(&mut self) -> Result<(), CaptureError>;

    fn state(&self) -> EncoderState;
}
