use std::path::{Path, PathBuf};

use ffmpeg_next::format::Pixel;
use ffmpeg_next::util::frame::video::Video;
use ffmpeg_next::{codec, Dictionary, Packet, Rational};

use super::output_format::{create_output, discard_partial};
use crate::conversion::infrastructure::pixel_converter::PixelConverter;
use crate::encoding::domain::encoder_session::{EncoderSession, EncoderState, FeedStatus};
use crate::shared::capture_config::CaptureConfig;
use crate::shared::constants::{MAX_B_FRAMES, YUV_BLACK};
use crate::shared::error::CaptureError;
use crate::shared::frame_size::FrameSize;
use crate::shared::hdr_frame::HdrFrame;

/// Encodes captured frames to a raw H.264 elementary stream via ffmpeg-next.
///
/// Everything acquired by `open` lives in one [`ActiveEncoder`]; dropping it
/// releases the codec, frames, converter and output context, so every error
/// path unwinds a partially opened session.
pub struct FfmpegEncoderSession {
    frame_rate: i32,
    gop_size: u32,
    preset: String,
    state: EncoderState,
    active: Option<ActiveEncoder>,
}

// Safety: FfmpegEncoderSession is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegEncoderSession {}

/// Fields drop in declaration order: codec and frames first, the output
/// context (and with it the file handle) last.
struct ActiveEncoder {
    encoder: codec::encoder::video::Encoder,
    converter: PixelConverter,
    scratch: Video,
    octx: ffmpeg_next::format::context::Output,
    path: PathBuf,
    stream_index: usize,
    codec_time_base: Rational,
    next_pts: i64,
    packets_written: usize,
}

impl FfmpegEncoderSession {
    pub fn new(frame_rate: i32, gop_size: u32, preset: impl Into<String>) -> Self {
        Self {
            frame_rate,
            gop_size,
            preset: preset.into(),
            state: EncoderState::Closed,
            active: None,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.frame_rate, config.gop_size, config.preset.clone())
    }

    /// Frames accepted since `open`.
    pub fn frames_encoded(&self) -> i64 {
        self.active.as_ref().map_or(0, |a| a.next_pts)
    }

    fn build(&self, size: FrameSize, path: &Path) -> Result<ActiveEncoder, CaptureError> {
        ffmpeg_next::init().map_err(CaptureError::CodecOpenFailed)?;

        let codec = ffmpeg_next::encoder::find(codec::Id::H264).ok_or(CaptureError::CodecUnavailable)?;

        let octx = create_output(path)?;
        self.configure(octx, codec, size, path).map_err(|e| {
            discard_partial(path);
            e
        })
    }

    fn configure(
        &self,
        mut octx: ffmpeg_next::format::context::Output,
        codec: ffmpeg_next::Codec,
        size: FrameSize,
        path: &Path,
    ) -> Result<ActiveEncoder, CaptureError> {
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);
        let codec_time_base = Rational(1, self.frame_rate);

        let mut encoder_ctx = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(CaptureError::CodecOpenFailed)?;
        encoder_ctx.set_width(size.width);
        encoder_ctx.set_height(size.height);
        encoder_ctx.set_format(Pixel::YUV420P);
        encoder_ctx.set_time_base(codec_time_base);
        encoder_ctx.set_frame_rate(Some(Rational(self.frame_rate, 1)));
        encoder_ctx.set_gop(self.gop_size);
        encoder_ctx.set_max_b_frames(MAX_B_FRAMES);
        if global_header {
            encoder_ctx.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let mut options = Dictionary::new();
        options.set("preset", &self.preset);
        let encoder = encoder_ctx
            .open_with(options)
            .map_err(CaptureError::CodecOpenFailed)?;

        let stream_index = {
            let mut ost = octx
                .add_stream(Some(codec))
                .map_err(|source| CaptureError::OutputAllocFailed {
                    path: path.to_path_buf(),
                    source: Some(source),
                })?;
            ost.set_parameters(&encoder);
            ost.set_time_base(codec_time_base);
            ost.index()
        };

        ffmpeg_next::format::context::output::dump(&octx, 0, path.to_str());
        octx.write_header()
            .map_err(|source| CaptureError::HeaderWriteFailed {
                path: path.to_path_buf(),
                source,
            })?;

        let scratch = Video::new(Pixel::YUV420P, size.width, size.height);
        if unsafe { scratch.is_empty() } {
            return Err(CaptureError::FrameAllocFailed {
                what: "YUV420P scratch",
            });
        }
        let converter = PixelConverter::new(size)?;

        Ok(ActiveEncoder {
            encoder,
            converter,
            scratch,
            octx,
            path: path.to_path_buf(),
            stream_index,
            codec_time_base,
            next_pts: 0,
            packets_written: 0,
        })
    }
}

impl EncoderSession for FfmpegEncoderSession {
    fn open(&mut self, size: FrameSize, path: &Path) -> Result<(), CaptureError> {
        if self.state != EncoderState::Closed {
            return Err(CaptureError::InvalidState {
                operation: "open",
                state: self.state,
            });
        }

        self.state = EncoderState::Opening;
        match self.build(size, path) {
            Ok(active) => {
                log::debug!(
                    "Encoder ready: {size} H.264 @ {} fps, gop {}, preset {}, writing {}",
                    self.frame_rate,
                    self.gop_size,
                    self.preset,
                    path.display()
                );
                self.active = Some(active);
                self.state = EncoderState::Ready;
                Ok(())
            }
            Err(e) => {
                self.state = EncoderState::Closed;
                Err(e)
            }
        }
    }

    fn feed(&mut self, frame: &HdrFrame) -> Result<FeedStatus, CaptureError> {
        let active = match (self.state, self.active.as_mut()) {
            (EncoderState::Ready | EncoderState::Encoding, Some(active)) => active,
            (state, _) => {
                return Err(CaptureError::InvalidState {
                    operation: "feed",
                    state,
                })
            }
        };
        self.state = EncoderState::Encoding;
        active.encode(frame)
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        if self.state == EncoderState::Closed {
            return Ok(());
        }

        self.state = EncoderState::Closing;
        let result = match self.active.take() {
            Some(mut active) => active.finish(),
            None => Ok(()),
        };
        self.state = EncoderState::Closed;
        result
    }

    fn state(&self) -> EncoderState {
        self.state
    }
}

impl ActiveEncoder {
    fn encode(&mut self, frame: &HdrFrame) -> Result<FeedStatus, CaptureError> {
        self.make_scratch_writable()?;
        self.converter.convert(frame, &mut self.scratch)?;
        self.submit_scratch()
    }

    /// The encoder may still reference the previous frame's buffers.
    fn make_scratch_writable(&mut self) -> Result<(), CaptureError> {
        let ret = unsafe { ffmpeg_next::ffi::av_frame_make_writable(self.scratch.as_mut_ptr()) };
        if ret < 0 {
            return Err(CaptureError::FrameAllocFailed {
                what: "YUV420P scratch",
            });
        }
        Ok(())
    }

    fn submit_scratch(&mut self) -> Result<FeedStatus, CaptureError> {
        let pts = self.next_pts;
        self.scratch.set_pts(Some(pts));
        match self.encoder.send_frame(&self.scratch) {
            Ok(()) | Err(ffmpeg_next::Error::Eof) => {}
            Err(source) => return Err(CaptureError::EncodeSubmitFailed { pts, source }),
        }
        self.next_pts += 1;

        let packets_written = self.drain_packets()?;
        Ok(FeedStatus {
            pts,
            packets_written,
        })
    }

    /// Writes every packet the encoder has ready. `EAGAIN` and end-of-stream
    /// both mean "nothing more right now".
    fn drain_packets(&mut self) -> Result<usize, CaptureError> {
        let stream_time_base = self
            .octx
            .stream(self.stream_index)
            .map_or(self.codec_time_base, |s| s.time_base());

        let mut packet = Packet::empty();
        let mut written = 0;
        loop {
            match self.encoder.receive_packet(&mut packet) {
                Ok(()) => {
                    packet.rescale_ts(self.codec_time_base, stream_time_base);
                    packet.set_stream(self.stream_index);
                    packet
                        .write_interleaved(&mut self.octx)
                        .map_err(CaptureError::WriteFrameFailed)?;
                    written += 1;
                }
                Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::ffi::EAGAIN => {
                    break
                }
                Err(ffmpeg_next::Error::Eof) => break,
                Err(e) => return Err(CaptureError::EncodeReceiveFailed(e)),
            }
        }
        self.packets_written += written;
        Ok(written)
    }

    /// A stream with no frames has no parameter sets, so nothing downstream
    /// could open it. One black frame keeps an empty capture playable.
    fn encode_blank_frame(&mut self) -> Result<(), CaptureError> {
        self.make_scratch_writable()?;
        for (plane, value) in YUV_BLACK.into_iter().enumerate() {
            self.scratch.data_mut(plane).fill(value);
        }
        self.submit_scratch().map(|_| ())
    }

    fn finish(&mut self) -> Result<(), CaptureError> {
        if self.next_pts == 0 {
            log::debug!("No frames captured, encoding one black frame");
            if let Err(e) = self.encode_blank_frame() {
                log::warn!("Could not encode placeholder frame: {e}");
            }
        }

        let flushed = self
            .encoder
            .send_eof()
            .map_err(|source| CaptureError::EncodeSubmitFailed {
                pts: self.next_pts,
                source,
            })
            .and_then(|()| self.drain_packets().map(|_| ()));
        let trailer = self
            .octx
            .write_trailer()
            .map_err(CaptureError::WriteFrameFailed);

        log::debug!(
            "Encoder closed: {} frames, {} packets in {}",
            self.next_pts,
            self.packets_written,
            self.path.display()
        );
        flushed.and(trailer)
    }
}
