//! Screenshot encoder: rectangular screen grab to in-memory JPEG.
//!
//! Pixels never touch disk; the grab, the crop, and the encode all happen in
//! RAM and the bytes travel in-band with the event record. Capture failures
//! are ordinary errors and cost the tick its screenshot, nothing more.

use anyhow::{bail, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};
use xcap::Monitor;

use crate::probe::WindowRect;

/// JPEG quality used for all captures.
const JPEG_QUALITY: u8 = 75;

/// Captures the given virtual-screen rectangle from the monitor under its
/// center point and returns JPEG bytes.
pub fn capture_region(rect: &WindowRect) -> Result<Vec<u8>> {
    if rect.is_degenerate() {
        bail!(
            "invalid capture dimensions: {}x{}",
            rect.width(),
            rect.height()
        );
    }

    let center_x = rect.left + rect.width() / 2;
    let center_y = rect.top + rect.height() / 2;
    let monitor =
        Monitor::from_point(center_x, center_y).context("no monitor under capture region")?;
    let monitor_x = monitor.x();
    let monitor_y = monitor.y();

    let shot = monitor.capture_image().context("screen grab failed")?;
    let (shot_w, shot_h) = (shot.width(), shot.height());
    let frame = RgbaImage::from_raw(shot_w, shot_h, shot.into_raw())
        .context("screen grab returned a malformed buffer")?;

    // Window rects can hang off the monitor edge; capture the intersection.
    let x0 = (rect.left - monitor_x).clamp(0, shot_w as i32) as u32;
    let y0 = (rect.top - monitor_y).clamp(0, shot_h as i32) as u32;
    let x1 = (rect.right - monitor_x).clamp(0, shot_w as i32) as u32;
    let y1 = (rect.bottom - monitor_y).clamp(0, shot_h as i32) as u32;
    if x1 <= x0 || y1 <= y0 {
        bail!("capture region lies outside the visible display");
    }

    let cropped = image::imageops::crop_imm(&frame, x0, y0, x1 - x0, y1 - y0).to_image();
    encode_jpeg(cropped)
}

fn encode_jpeg(frame: RgbaImage) -> Result<Vec<u8>> {
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgba8(frame).to_rgb8();

    let mut jpeg = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY))
        .context("jpeg encode failed")?;
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_frames_to_jpeg_in_memory() {
        let frame = RgbaImage::from_fn(64, 48, |x, y| {
            image::Rgba([(x * 4) as u8, (y * 5) as u8, 128, 255])
        });

        let jpeg = encode_jpeg(frame).expect("encode failed");
        // JPEG SOI marker.
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert!(jpeg.len() > 100);
    }

    #[test]
    fn rejects_degenerate_rectangles() {
        let rect = WindowRect {
            left: 10,
            top: 10,
            right: 10,
            bottom: 500,
        };
        let err = capture_region(&rect).unwrap_err();
        assert!(err.to_string().contains("invalid capture dimensions"));
    }
}
