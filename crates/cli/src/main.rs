use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use framecap_core::capture::capture_controller::CaptureController;
use framecap_core::capture::capture_logger::StatsCaptureLogger;
use framecap_core::shared::capture_config::CaptureConfig;
use framecap_core::shared::constants::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use framecap_core::shared::frame_pattern::ramp_frame;
use framecap_core::shared::frame_size::FrameSize;
use framecap_core::shared::hdr_frame::HdrFrame;
use framecap_core::shared::pixel_packing::PixelPacking;

/// Record rendered HDR frames into an H.264 video file.
#[derive(Parser)]
#[command(name = "framecap")]
struct Cli {
    /// Output video file; the container follows the extension (.mp4, .mkv, ...).
    output: PathBuf,

    /// Capture width in pixels (positive, even).
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    width: u32,

    /// Capture height in pixels (positive, even).
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    height: u32,

    /// Number of synthetic frames to record when no --images are given.
    #[arg(long, default_value = "75")]
    frames: usize,

    /// Packed pixel format of the frames: r11g11b10, r9g9b9e5, rgba16f or rgba32f.
    #[arg(long, default_value = "r11g11b10")]
    packing: String,

    /// Image files to record in order instead of the synthetic ramp.
    #[arg(long, num_args = 1..)]
    images: Option<Vec<PathBuf>>,

    /// JSON capture config.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the intermediate H.264 path.
    #[arg(long)]
    intermediate: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let packing: PixelPacking = cli.packing.parse()?;
    let size = FrameSize::new(cli.width, cli.height);
    let config = load_config(&cli)?;

    let logger = StatsCaptureLogger::new(config.progress_every);
    let mut controller = CaptureController::with_ffmpeg(config).with_logger(Box::new(logger));

    controller.start_capture(size)?;
    match &cli.images {
        Some(images) => {
            let skipped = feed_images(&mut controller, images, size, packing);
            if skipped > 0 {
                log::warn!("{skipped} of {} images skipped", images.len());
            }
        }
        None => {
            for index in 0..cli.frames {
                let frame = ramp_frame(size, packing, index, cli.frames);
                if let Err(e) = controller.add_frame(&frame) {
                    log::warn!("Skipped frame {index}: {e}");
                }
            }
        }
    }

    if !controller.is_active() {
        return Err("Capture ended early, see log for the failing frame".into());
    }
    let report = controller.stop_capture(&cli.output)?;
    println!(
        "Wrote {} ({} frames, {:.2}s)",
        cli.output.display(),
        report.packets_written,
        report.duration_secs()
    );
    Ok(())
}

fn load_config(cli: &Cli) -> Result<CaptureConfig, Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => CaptureConfig::from_json_file(path)?,
        None => CaptureConfig::default(),
    };
    Ok(match &cli.intermediate {
        Some(path) => config.with_intermediate_path(path),
        None => config,
    })
}

/// Feeds `images` in order and returns how many were skipped. An image that
/// fails to load or encode is dropped without ending the capture.
fn feed_images(
    controller: &mut CaptureController,
    images: &[PathBuf],
    size: FrameSize,
    packing: PixelPacking,
) -> usize {
    let mut skipped = 0;
    for path in images {
        let result = load_image_frame(path, size, packing)
            .and_then(|frame| controller.add_frame(&frame).map_err(Into::into));
        if let Err(e) = result {
            log::warn!("Skipped {}: {e}", path.display());
            skipped += 1;
        }
    }
    skipped
}

/// Loads an image as linear float RGB and packs it into a capture frame.
fn load_image_frame(
    path: &Path,
    size: FrameSize,
    packing: PixelPacking,
) -> Result<HdrFrame, Box<dyn std::error::Error>> {
    let image = image::open(path)?.into_rgb32f();
    if image.width() != size.width || image.height() != size.height {
        return Err(format!(
            "{} is {}x{}, capture size is {size}",
            path.display(),
            image.width(),
            image.height()
        )
        .into());
    }
    Ok(HdrFrame::from_fn(size, packing, |x, y| image.get_pixel(x, y).0))
}

/// Every image must exist, be decodable and match the capture size.
fn validate_images(images: &[PathBuf], size: FrameSize) -> Result<(), Box<dyn std::error::Error>> {
    for path in images {
        if !path.exists() {
            return Err(format!("Image file not found: {}", path.display()).into());
        }
        let (width, height) = image::image_dimensions(path)
            .map_err(|e| format!("Cannot read image {}: {e}", path.display()))?;
        if (width, height) != (size.width, size.height) {
            return Err(format!(
                "{} is {width}x{height}, capture size is {size}",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    FrameSize::new(cli.width, cli.height).validate_for_yuv420()?;
    if let Err(e) = cli.packing.parse::<PixelPacking>() {
        return Err(e.into());
    }
    if let Some(images) = &cli.images {
        validate_images(images, FrameSize::new(cli.width, cli.height))?;
    } else if cli.frames == 0 {
        log::info!("Recording zero frames, output will hold a single black frame");
    }
    if let Some(config) = &cli.config {
        if !config.exists() {
            return Err(format!("Config file not found: {}", config.display()).into());
        }
    }
    if cli.output.extension().is_none() {
        return Err(format!(
            "Output needs a file extension to pick the container, got {}",
            cli.output.display()
        )
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use framecap_core::encoding::domain::encoder_session::{
        EncoderSession, EncoderState, FeedStatus,
    };
    use framecap_core::encoding::domain::remuxer::{RemuxReport, Remuxer};
    use framecap_core::shared::error::CaptureError;

    struct CountingEncoder {
        state: EncoderState,
        fed: i64,
    }

    impl EncoderSession for CountingEncoder {
        fn open(&mut self, _size: FrameSize, _path: &Path) -> Result<(), CaptureError> {
            self.state = EncoderState::Ready;
            Ok(())
        }

        fn feed(&mut self, _frame: &HdrFrame) -> Result<FeedStatus, CaptureError> {
            self.fed += 1;
            Ok(FeedStatus {
                pts: self.fed - 1,
                packets_written: 1,
            })
        }

        fn close(&mut self) -> Result<(), CaptureError> {
            self.state = EncoderState::Closed;
            Ok(())
        }

        fn state(&self) -> EncoderState {
            self.state
        }
    }

    struct NoopRemuxer;

    impl Remuxer for NoopRemuxer {
        fn remux(&self, _input: &Path, _output: &Path) -> Result<RemuxReport, CaptureError> {
            Ok(RemuxReport {
                packets_read: 0,
                packets_written: 0,
                duration_ticks: 0,
                time_base: (1, 25),
            })
        }
    }

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        image::RgbImage::from_pixel(width, height, image::Rgb([200, 100, 50]))
            .save(&path)
            .unwrap();
        path
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("framecap").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_matching_images_pass_validation() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_png(dir.path(), "a.png", 64, 32);
        let second = write_png(dir.path(), "b.png", 64, 32);

        let cli = parse(&[
            "out.mp4",
            "--width",
            "64",
            "--height",
            "32",
            "--images",
            first.to_str().unwrap(),
            second.to_str().unwrap(),
        ]);
        assert!(validate(&cli).is_ok());
    }

    #[test]
    fn test_wrong_sized_image_fails_before_capture() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_png(dir.path(), "good.png", 64, 32);
        let bad = write_png(dir.path(), "bad.png", 32, 32);

        let cli = parse(&[
            "out.mp4",
            "--width",
            "64",
            "--height",
            "32",
            "--images",
            good.to_str().unwrap(),
            bad.to_str().unwrap(),
        ]);
        let err = validate(&cli).unwrap_err();
        assert!(err.to_string().contains("32x32, capture size is 64x32"));
    }

    #[test]
    fn test_undecodable_image_fails_before_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();

        let cli = parse(&[
            "out.mp4",
            "--width",
            "64",
            "--height",
            "32",
            "--images",
            path.to_str().unwrap(),
        ]);
        let err = validate(&cli).unwrap_err();
        assert!(err.to_string().contains("Cannot read image"));
    }

    #[test]
    fn test_missing_image_fails_validation() {
        let cli = parse(&["out.mp4", "--images", "does/not/exist.png"]);
        let err = validate(&cli).unwrap_err();
        assert!(err.to_string().contains("Image file not found"));
    }

    #[test]
    fn test_load_image_frame_packs_float_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "frame.png", 4, 2);

        let frame =
            load_image_frame(&path, FrameSize::new(4, 2), PixelPacking::R32G32B32A32Float).unwrap();
        assert_eq!(frame.size(), FrameSize::new(4, 2));
        let rgb = frame.packing().unpack(&frame.data()[..16]);
        assert!((rgb[0] - 200.0 / 255.0).abs() < 1e-3);
        assert!((rgb[2] - 50.0 / 255.0).abs() < 1e-3);
    }

    #[test]
    fn test_unloadable_image_mid_capture_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let size = FrameSize::new(4, 2);
        let first = write_png(dir.path(), "first.png", 4, 2);
        let vanished = write_png(dir.path(), "vanished.png", 4, 2);
        let resized = write_png(dir.path(), "resized.png", 8, 2);
        let last = write_png(dir.path(), "last.png", 4, 2);
        std::fs::remove_file(&vanished).unwrap();

        let config = CaptureConfig::default().with_intermediate_path(dir.path().join("tmp.h264"));
        let encoder = CountingEncoder {
            state: EncoderState::Closed,
            fed: 0,
        };
        let mut controller =
            CaptureController::new(Box::new(encoder), Box::new(NoopRemuxer), config);
        controller.start_capture(size).unwrap();

        let skipped = feed_images(
            &mut controller,
            &[first, vanished, resized, last],
            size,
            PixelPacking::R11G11B10Float,
        );

        assert_eq!(skipped, 2);
        assert!(controller.is_active());
        assert_eq!(controller.session().frames_accepted(), 2);
        assert!(controller.stop_capture(&dir.path().join("out.mp4")).is_ok());
    }

    #[test]
    fn test_load_image_frame_rejects_size_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "frame.png", 4, 2);

        let result = load_image_frame(&path, FrameSize::new(4, 4), PixelPacking::R11G11B10Float);
        assert!(result.is_err());
    }
}
