use std::path::Path;

use ffmpeg_next::{codec, Dictionary, Rational, Rescale};

use super::output_format::{create_output, discard_partial};
use crate::encoding::domain::remuxer::{RemuxReport, Remuxer};
use crate::shared::capture_config::{CaptureConfig, MuxFailurePolicy};
use crate::shared::error::CaptureError;

/// Copies the video stream of a raw H.264 file into a container chosen by
/// the output extension, without re-encoding.
///
/// Raw elementary streams carry no reliable timestamps, so output
/// timestamps are rebuilt from packet durations: each packet starts where
/// the previous one ended.
pub struct FfmpegRemuxer {
    frame_rate: i32,
    failure_policy: MuxFailurePolicy,
}

impl FfmpegRemuxer {
    pub fn new(frame_rate: i32, failure_policy: MuxFailurePolicy) -> Self {
        Self {
            frame_rate,
            failure_policy,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.frame_rate, config.mux_failure_policy)
    }

    fn open_input(&self, input: &Path) -> Result<ffmpeg_next::format::context::Input, CaptureError> {
        let mut options = Dictionary::new();
        options.set("framerate", &self.frame_rate.to_string());
        ffmpeg_next::format::input_with_dictionary(&input, options).map_err(|source| {
            CaptureError::InputOpenFailed {
                path: input.to_path_buf(),
                source,
            }
        })
    }

    /// Creates `output` with one stream copying `parameters` and writes the
    /// header. Nothing is left on disk if this fails.
    fn open_output(
        &self,
        parameters: codec::Parameters,
        output: &Path,
    ) -> Result<(ffmpeg_next::format::context::Output, usize), CaptureError> {
        let frame_rate = Rational(self.frame_rate, 1);
        let mut octx = create_output(output)?;
        let ost_index = {
            let mut ost = match octx.add_stream(ffmpeg_next::encoder::find(codec::Id::None)) {
                Ok(ost) => ost,
                Err(source) => {
                    drop(octx);
                    discard_partial(output);
                    return Err(CaptureError::OutputAllocFailed {
                        path: output.to_path_buf(),
                        source: Some(source),
                    });
                }
            };
            ost.set_parameters(parameters);
            unsafe {
                (*ost.parameters().as_mut_ptr()).codec_tag = 0;
            }
            ost.set_time_base(frame_rate.invert());
            ost.set_rate(frame_rate);
            ost.set_avg_frame_rate(frame_rate);
            ost.index()
        };

        if let Err(source) = octx.write_header() {
            drop(octx);
            discard_partial(output);
            return Err(CaptureError::HeaderWriteFailed {
                path: output.to_path_buf(),
                source,
            });
        }
        Ok((octx, ost_index))
    }

    /// Applies the mux failure policy to a half-written output after a packet
    /// write failed with `source`.
    fn abandon_output(
        &self,
        mut octx: ffmpeg_next::format::context::Output,
        output: &Path,
        source: ffmpeg_next::Error,
    ) -> CaptureError {
        match self.failure_policy {
            MuxFailurePolicy::FinalizePartial => {
                if let Err(e) = octx.write_trailer() {
                    log::warn!("Could not finalize partial {}: {e}", output.display());
                }
            }
            MuxFailurePolicy::DiscardOutput => {
                drop(octx);
                discard_partial(output);
            }
        }
        CaptureError::MuxWriteFailed {
            path: output.to_path_buf(),
            source,
        }
    }
}

impl Default for FfmpegRemuxer {
    fn default() -> Self {
        Self::from_config(&CaptureConfig::default())
    }
}

impl Remuxer for FfmpegRemuxer {
    fn remux(&self, input: &Path, output: &Path) -> Result<RemuxReport, CaptureError> {
        ffmpeg_next::init().map_err(|source| CaptureError::InputOpenFailed {
            path: input.to_path_buf(),
            source,
        })?;

        let mut ictx = self.open_input(input)?;
        let (ist_index, ist_time_base, ist_parameters) = {
            let stream = ictx
                .streams()
                .best(ffmpeg_next::media::Type::Video)
                .ok_or_else(|| CaptureError::StreamProbeFailed {
                    path: input.to_path_buf(),
                })?;
            let parameters = stream.parameters();
            let (width, height) = unsafe {
                let raw = parameters.as_ptr();
                ((*raw).width, (*raw).height)
            };
            if width <= 0 || height <= 0 {
                return Err(CaptureError::StreamProbeFailed {
                    path: input.to_path_buf(),
                });
            }
            (stream.index(), stream.time_base(), parameters)
        };

        let frame_rate = Rational(self.frame_rate, 1);
        let (mut octx, ost_index) = self.open_output(ist_parameters, output)?;

        // The muxer may replace the requested time base during write_header.
        let ost_time_base = octx
            .stream(ost_index)
            .map_or(frame_rate.invert(), |s| s.time_base());
        let frame_period = 1_i64.rescale(frame_rate.invert(), ost_time_base).max(1);

        let mut report = RemuxReport {
            packets_read: 0,
            packets_written: 0,
            duration_ticks: 0,
            time_base: (ost_time_base.numerator(), ost_time_base.denominator()),
        };
        let mut failure = None;
        let mut next_ts = 0_i64;

        for (stream, mut packet) in ictx.packets() {
            if stream.index() != ist_index {
                continue;
            }
            report.packets_read += 1;

            let rescaled = packet.duration().rescale(ist_time_base, ost_time_base);
            let duration = if rescaled > 0 { rescaled } else { frame_period };

            packet.set_stream(ost_index);
            packet.set_pts(Some(next_ts));
            packet.set_dts(Some(next_ts));
            packet.set_duration(duration);
            packet.set_position(-1);

            if let Err(source) = packet.write_interleaved(&mut octx) {
                failure = Some(source);
                break;
            }
            report.packets_written += 1;
            report.duration_ticks += duration;
            next_ts += duration;
        }

        if let Some(source) = failure {
            log::error!(
                "Mux write failed after {} packets into {}: {source}",
                report.packets_written,
                output.display()
            );
            return Err(self.abandon_output(octx, output, source));
        }

        octx.write_trailer()
            .map_err(|source| CaptureError::MuxWriteFailed {
                path: output.to_path_buf(),
                source,
            })?;

        log::debug!(
            "Remuxed {} packets ({:.2}s) from {} into {}",
            report.packets_written,
            report.duration_secs(),
            input.display(),
            output.display()
        );
        Ok(report)
    }
}
