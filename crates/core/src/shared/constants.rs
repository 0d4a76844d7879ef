/// Frame rate of the encoded stream and of the final container.
pub const DEFAULT_FRAME_RATE: i32 = 25;

/// Keyframe interval (~2.4 seconds at 25 fps).
pub const GOP_SIZE: u32 = 60;

/// No B-frames: encode order equals display order.
pub const MAX_B_FRAMES: usize = 0;

pub const ENCODER_PRESET: &str = "slow";

/// Raw H.264 elementary stream written while a capture is running.
pub const INTERMEDIATE_PATH: &str = "temp/tempvideo.h264";

pub const DEFAULT_WIDTH: u32 = 1920;
pub const DEFAULT_HEIGHT: u32 = 1080;

/// Texel count from which tone mapping is split across worker threads.
pub const PARALLEL_THRESHOLD: usize = 256 * 256;

/// Luma and chroma values of black in limited-range YUV.
pub const YUV_BLACK: [u8; 3] = [16, 128, 128];
