use std::fs;
use std::path::Path;
use std::time::Instant;

use crate::capture::capture_logger::{CaptureLogger, NullCaptureLogger};
use crate::capture::capture_session::{CaptureSession, SessionState};
use crate::encoding::domain::encoder_session::{EncoderSession, EncoderState, FeedStatus};
use crate::encoding::domain::remuxer::{RemuxReport, Remuxer};
use crate::encoding::infrastructure::ffmpeg_encoder_session::FfmpegEncoderSession;
use crate::encoding::infrastructure::ffmpeg_remuxer::FfmpegRemuxer;
use crate::shared::capture_config::{CaptureConfig, FrameErrorPolicy};
use crate::shared::error::CaptureError;
use crate::shared::frame_size::FrameSize;
use crate::shared::hdr_frame::RenderedFrame;

/// Capture pipeline: start → add frames → stop and remux.
///
/// Frames go to an intermediate H.264 file at `config.intermediate_path`;
/// `stop_capture` remuxes it into the requested container and removes it.
pub struct CaptureController {
    encoder: Box<dyn EncoderSession>,
    remuxer: Box<dyn Remuxer>,
    logger: Box<dyn CaptureLogger>,
    config: CaptureConfig,
    session: CaptureSession,
    size: FrameSize,
}

impl CaptureController {
    pub fn new(
        encoder: Box<dyn EncoderSession>,
        remuxer: Box<dyn Remuxer>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            encoder,
            remuxer,
            logger: Box::new(NullCaptureLogger),
            config,
            session: CaptureSession::new(),
            size: FrameSize::default(),
        }
    }

    /// Controller backed by the FFmpeg encoder and remuxer.
    pub fn with_ffmpeg(config: CaptureConfig) -> Self {
        Self::new(
            Box::new(FfmpegEncoderSession::from_config(&config)),
            Box::new(FfmpegRemuxer::from_config(&config)),
            config,
        )
    }

    pub fn with_logger(mut self, logger: Box<dyn CaptureLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }

    /// Size of the last capture started, kept after it stops. Before the
    /// first start this is the default 1920x1080.
    pub fn current_size(&self) -> FrameSize {
        self.size
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    /// Opens the encoder for a fixed `size`. Every later frame must match it.
    pub fn start_capture(&mut self, size: FrameSize) -> Result<(), CaptureError> {
        if self.session.state() != SessionState::Inactive {
            return Err(CaptureError::AlreadyActive);
        }
        let size = size.validate_for_yuv420()?;

        self.size = size;
        self.session.begin(size);
        let started = Instant::now();
        if let Err(e) = self.encoder.open(size, &self.config.intermediate_path) {
            self.session.reset();
            log::error!("Capture failed to start: {e}");
            return Err(e);
        }
        self.logger
            .timing("open", started.elapsed().as_secs_f64() * 1000.0);

        self.session.activate();
        self.logger.info(&format!(
            "Capture started: {size} @ {} fps into {}",
            self.config.frame_rate,
            self.config.intermediate_path.display()
        ));
        Ok(())
    }

    /// Reads back and encodes one frame.
    ///
    /// A failed frame is counted as dropped and the error returned. Whether
    /// the session survives depends on `config.frame_error_policy`;
    /// non-recoverable errors always end it.
    pub fn add_frame(&mut self, frame: &dyn RenderedFrame) -> Result<FeedStatus, CaptureError> {
        if !self.session.is_active() {
            return Err(CaptureError::NotActive);
        }

        let started = Instant::now();
        match self.encode(frame) {
            Ok(status) => {
                self.session.record_accepted();
                self.logger
                    .timing("encode", started.elapsed().as_secs_f64() * 1000.0);
                self.logger
                    .frame(self.session.frames_accepted(), self.session.frames_dropped());
                Ok(status)
            }
            Err(e) => Err(self.handle_frame_error(e)),
        }
    }

    fn encode(&mut self, frame: &dyn RenderedFrame) -> Result<FeedStatus, CaptureError> {
        let frame = frame.readback()?;
        if let Some(expected) = self.session.size() {
            if frame.size() != expected {
                return Err(CaptureError::FrameSizeMismatch {
                    expected,
                    actual: frame.size(),
                });
            }
        }
        self.encoder.feed(&frame)
    }

    fn handle_frame_error(&mut self, error: CaptureError) -> CaptureError {
        self.session.record_dropped();
        self.logger
            .frame(self.session.frames_accepted(), self.session.frames_dropped());

        let keep_going =
            error.is_recoverable() && self.config.frame_error_policy == FrameErrorPolicy::Continue;
        if keep_going {
            log::warn!("Dropped frame {}: {error}", self.session.frames_dropped());
            return error;
        }

        log::error!("Ending capture after frame error: {error}");
        if let Err(e) = self.encoder.close() {
            log::warn!("Encoder did not close cleanly: {e}");
        }
        log::warn!(
            "Intermediate kept at {}",
            self.config.intermediate_path.display()
        );
        self.session.reset();
        error
    }

    /// Finishes the encoder and remuxes the intermediate into `output`.
    ///
    /// The intermediate is deleted only after a successful remux. The
    /// session is inactive afterwards whatever the outcome.
    pub fn stop_capture(&mut self, output: &Path) -> Result<RemuxReport, CaptureError> {
        if !self.session.is_active() {
            return Err(CaptureError::NotActive);
        }
        self.session.stopping();

        let started = Instant::now();
        if let Err(e) = self.encoder.close() {
            log::warn!("Encoder did not close cleanly, remuxing what was written: {e}");
        }
        self.logger
            .timing("close", started.elapsed().as_secs_f64() * 1000.0);

        let intermediate = self.config.intermediate_path.as_path();
        let started = Instant::now();
        let result = self.remuxer.remux(intermediate, output);
        self.logger
            .timing("remux", started.elapsed().as_secs_f64() * 1000.0);

        match &result {
            Ok(report) => {
                if let Err(e) = fs::remove_file(intermediate) {
                    log::warn!(
                        "Could not remove intermediate {}: {e}",
                        intermediate.display()
                    );
                }
                self.logger.info(&format!(
                    "Capture saved to {} ({} packets, {:.2}s)",
                    output.display(),
                    report.packets_written,
                    report.duration_secs()
                ));
            }
            Err(e) => log::error!(
                "Remux into {} failed, intermediate kept at {}: {e}",
                output.display(),
                intermediate.display()
            ),
        }

        self.session.reset();
        self.logger.summary();
        result
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        if self.encoder.state() != EncoderState::Closed {
            if let Err(e) = self.encoder.close() {
                log::warn!("Encoder did not close cleanly on drop: {e}");
            }
        }
    }
}
