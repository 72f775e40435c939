//! Frame decoding and resizing ahead of detection

use crate::config::Resolution;
use crate::error::{AnalyticsError, Result};
use crate::types::Bbox;
use image::{imageops, RgbImage};
use std::borrow::Cow;

/// Frame after resolution capping, with the factors that map its pixel
/// coordinates back onto the original frame
pub struct PreparedFrame<'a> {
    pub image: Cow<'a, RgbImage>,
    pub original_width: u32,
    pub original_height: u32,
    scale_x: f32,
    scale_y: f32,
}

impl PreparedFrame<'_> {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn was_resized(&self) -> bool {
        matches!(self.image, Cow::Owned(_))
    }

    /// Map a box from resized-frame coordinates to original-frame coordinates
    pub fn to_original(&self, bbox: &Bbox) -> Bbox {
        bbox.scale(self.scale_x, self.scale_y)
    }
}

/// Decode encoded frame bytes (PNG, JPEG, ...) into RGB
pub fn decode_frame(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(AnalyticsError::invalid_frame("empty frame buffer"));
    }
    let img = image::load_from_memory(bytes)
        .map_err(|e| AnalyticsError::invalid_frame(format!("Failed to decode frame: {}", e)))?;
    let rgb = img.to_rgb8();
    check_dimensions(&rgb)?;
    Ok(rgb)
}

/// Wrap a raw RGB pixel buffer, checking its length against the dimensions
pub fn frame_from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<RgbImage> {
    let expected = width as usize * height as usize * 3;
    let actual = pixels.len();
    let frame = RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
        AnalyticsError::invalid_frame(format!(
            "pixel buffer of {} bytes does not match {}x{} RGB ({} bytes)",
            actual, width, height, expected
        ))
    })?;
    check_dimensions(&frame)?;
    Ok(frame)
}

pub fn check_dimensions(frame: &RgbImage) -> Result<()> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(AnalyticsError::invalid_frame(format!(
            "zero-sized frame {}x{}",
            frame.width(),
            frame.height()
        )));
    }
    Ok(())
}

/// Scale the frame down so it fits within `max`, preserving aspect ratio.
///
/// Frames already within bounds are borrowed untouched; frames are never
/// scaled up.
pub fn resize_to_fit(frame: &RgbImage, max: Resolution) -> PreparedFrame<'_> {
    let (width, height) = frame.dimensions();

    if width <= max.width && height <= max.height {
        return PreparedFrame {
            image: Cow::Borrowed(frame),
            original_width: width,
            original_height: height,
            scale_x: 1.0,
            scale_y: 1.0,
        };
    }

    let scale = f64::min(
        max.width as f64 / width as f64,
        max.height as f64 / height as f64,
    );
    let new_width = ((width as f64 * scale) as u32).clamp(1, max.width);
    let new_height = ((height as f64 * scale) as u32).clamp(1, max.height);

    log::debug!(
        "Resizing frame {}x{} -> {}x{}",
        width,
        height,
        new_width,
        new_height
    );

    // Triangle filter is fast enough for per-frame resizing
    let resized = imageops::resize(frame, new_width, new_height, imageops::FilterType::Triangle);

    PreparedFrame {
        image: Cow::Owned(resized),
        original_width: width,
        original_height: height,
        scale_x: width as f32 / new_width as f32,
        scale_y: height as f32 / new_height as f32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    #[test]
    fn test_small_frame_untouched() {
        let frame = RgbImage::new(640, 480);
        let prepared = resize_to_fit(&frame, Resolution::default());
        assert!(!prepared.was_resized());
        assert_eq!((prepared.width(), prepared.height()), (640, 480));
    }

    #[test]
    fn test_downscale_preserves_aspect() {
        let frame = RgbImage::new(3840, 2160);
        let prepared = resize_to_fit(&frame, Resolution::default());
        assert!(prepared.was_resized());
        assert_eq!((prepared.width(), prepared.height()), (1920, 1080));
        assert_eq!(prepared.original_width, 3840);

        let back = prepared.to_original(&Bbox::new(10.0, 10.0, 20.0, 20.0));
        assert_abs_diff_eq!(back.xmin, 20.0);
        assert_abs_diff_eq!(back.ymax, 40.0);
    }

    #[test]
    fn test_limited_by_tighter_dimension() {
        let frame = RgbImage::new(1000, 2000);
        let prepared = resize_to_fit(&frame, Resolution { width: 1920, height: 1080 });
        assert_eq!((prepared.width(), prepared.height()), (540, 1080));
    }

    #[test]
    fn test_decode_roundtrip_png() {
        let frame = RgbImage::from_pixel(4, 3, Rgb([0, 166, 81]));
        let mut bytes = Vec::new();
        frame
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let decoded = decode_frame(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(2, 1), &Rgb([0, 166, 81]));
    }

    #[test]
    fn test_decode_garbage_is_invalid_frame() {
        assert!(matches!(
            decode_frame(b"definitely not an image"),
            Err(AnalyticsError::InvalidFrame(_))
        ));
        assert!(matches!(decode_frame(&[]), Err(AnalyticsError::InvalidFrame(_))));
    }

    #[test]
    fn test_raw_buffer_length_checked() {
        assert!(frame_from_raw(2, 2, vec![0; 12]).is_ok());
        assert!(matches!(
            frame_from_raw(2, 2, vec![0; 11]),
            Err(AnalyticsError::InvalidFrame(_))
        ));
        assert!(frame_from_raw(0, 2, Vec::new()).is_err());
    }
}
