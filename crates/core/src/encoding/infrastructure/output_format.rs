use std::ffi::CString;
use std::fs;
use std::io;
use std::path::Path;
use std::ptr;

use crate::shared::error::CaptureError;

/// Returns true if FFmpeg has a muxer registered for `path`'s extension.
pub fn muxer_exists(path: &Path) -> bool {
    let Ok(filename) = CString::new(path.to_string_lossy().as_bytes()) else {
        return false;
    };
    unsafe { !ffmpeg_next::ffi::av_guess_format(ptr::null(), filename.as_ptr(), ptr::null()).is_null() }
}

/// Allocates an output context for `path` and opens the file for writing.
///
/// The muxer is inferred from the extension. The parent directory is created
/// when missing.
pub fn create_output(path: &Path) -> Result<ffmpeg_next::format::context::Output, CaptureError> {
    if !muxer_exists(path) {
        return Err(CaptureError::OutputAllocFailed {
            path: path.to_path_buf(),
            source: None,
        });
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CaptureError::FileOpenFailed {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
    }

    ffmpeg_next::format::output(path).map_err(|e| CaptureError::FileOpenFailed {
        path: path.to_path_buf(),
        source: Box::new(e),
    })
}

/// Deletes a partially written file. Missing files are fine.
pub fn discard_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::debug!("Removed partial file {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove partial file {}: {e}", path.display()),
    }
}
