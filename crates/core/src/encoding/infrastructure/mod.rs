pub mod ffmpeg_encoder_session;
pub mod ffmpeg_remuxer;
mod output_format;
