use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;

use crate::conversion::domain::tone_map::to_rgba8;
use crate::shared::error::CaptureError;
use crate::shared::frame_size::FrameSize;
use crate::shared::hdr_frame::HdrFrame;

/// Converts captured HDR frames into YUV420P frames for the encoder.
///
/// Tone mapping to RGBA8 happens in Rust; the RGBA → YUV420P step runs
/// through a swscale context created once for the session's fixed size.
pub struct PixelConverter {
    scaler: scaling::Context,
    staging: Video,
    size: FrameSize,
}

// Safety: PixelConverter is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for PixelConverter {}

impl PixelConverter {
    pub fn new(size: FrameSize) -> Result<Self, CaptureError> {
        let scaler = scaling::Context::get(
            Pixel::RGBA,
            size.width,
            size.height,
            Pixel::YUV420P,
            size.width,
            size.height,
            scaling::Flags::BILINEAR,
        )
        .map_err(CaptureError::ConverterInitFailed)?;

        let staging = Video::new(Pixel::RGBA, size.width, size.height);
        if unsafe { staging.is_empty() } {
            return Err(CaptureError::FrameAllocFailed {
                what: "RGBA staging",
            });
        }

        Ok(Self {
            scaler,
            staging,
            size,
        })
    }

    /// Tone maps `frame` and writes the planar result into `target`, which
    /// must be a writable YUV420P frame of the converter's size.
    pub fn convert(&mut self, frame: &HdrFrame, target: &mut Video) -> Result<(), CaptureError> {
        if frame.size() != self.size {
            return Err(CaptureError::FrameSizeMismatch {
                expected: self.size,
                actual: frame.size(),
            });
        }

        let rgba = to_rgba8(frame);
        let row_bytes = self.size.width as usize * 4;
        let stride = self.staging.stride(0);
        let data = self.staging.data_mut(0);
        for (row, src) in rgba.chunks_exact(row_bytes).enumerate() {
            let dst_start = row * stride;
            data[dst_start..dst_start + row_bytes].copy_from_slice(src);
        }

        self.scaler
            .run(&self.staging, target)
            .map_err(CaptureError::ConversionFailed)
    }
}
