use super::AutomationSession;
use crate::error::{HarnessError, Result};
use chrono::{DateTime, Local};
use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// `dd-MM-yyyy-HH-mm-ss`
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y-%H-%M-%S";

/// `<dir>/<test_name>-<dd-MM-yyyy-HH-mm-ss>.jpeg`
pub fn screenshot_path(dir: &Path, test_name: &str, at: DateTime<Local>) -> PathBuf {
    let safe_name: String = test_name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    dir.join(format!("{}-{}.jpeg", safe_name, at.format(TIMESTAMP_FORMAT)))
}

/// Capture the device screen to `path` as JPEG.
///
/// Never overwrites: an existing file at `path` is an error and is left
/// untouched.
pub async fn capture_and_save(session: &dyn AutomationSession, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Err(HarnessError::ScreenshotExists(path.to_path_buf()));
    }

    let png = session.screenshot().await?;
    let bytes = to_jpeg(&png);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => HarnessError::ScreenshotExists(path.to_path_buf()),
            _ => HarnessError::Io(e),
        })?;
    file.write_all(&bytes)?;

    Ok(path.to_path_buf())
}

/// Re-encode a PNG screenshot as JPEG, keeping the original bytes if they
/// cannot be decoded.
fn to_jpeg(png: &[u8]) -> Vec<u8> {
    let decoded = match image::load_from_memory(png) {
        Ok(img) => img,
        Err(e) => {
            log::warn!("Screenshot is not a decodable image ({}); saving raw bytes", e);
            return png.to_vec();
        }
    };

    let mut out = Cursor::new(Vec::new());
    match decoded
        .to_rgb8()
        .write_to(&mut out, image::ImageOutputFormat::Jpeg(85))
    {
        Ok(()) => out.into_inner(),
        Err(e) => {
            log::warn!("JPEG encoding failed ({}); saving raw bytes", e);
            png.to_vec()
        }
    }
}
