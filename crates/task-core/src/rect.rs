//! Normalized regions of interest

use serde::{Deserialize, Serialize};

/// Rectangle in normalized image coordinates.
///
/// Centre, width and height are fractions of the image size, each in
/// `[0, 1]`. `rotation` is in radians, clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x_center: f32,
    pub y_center: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub rotation: f32,
}

impl NormalizedRect {
    pub fn new(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            x_center,
            y_center,
            width,
            height,
            rotation: 0.0,
        }
    }

    /// Rectangle covering the entire image
    pub fn full_image() -> Self {
        Self::new(0.5, 0.5, 1.0, 1.0)
    }

    /// Whether every coordinate lies in `[0, 1]`
    pub fn is_normalized(&self) -> bool {
        [self.x_center, self.y_center, self.width, self.height]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }

    /// Axis-aligned pixel-space crop `(x, y, width, height)` clamped to the
    /// image bounds. `rotation` is not applied.
    pub fn to_pixel_crop(&self, image_width: u32, image_height: u32) -> (u32, u32, u32, u32) {
        let w = image_width as f32;
        let h = image_height as f32;
        let left = ((self.x_center - self.width / 2.0) * w).clamp(0.0, w);
        let top = ((self.y_center - self.height / 2.0) * h).clamp(0.0, h);
        let right = ((self.x_center + self.width / 2.0) * w).clamp(0.0, w);
        let bottom = ((self.y_center + self.height / 2.0) * h).clamp(0.0, h);
        (
            left.round() as u32,
            top.round() as u32,
            (right - left).round().max(1.0) as u32,
            (bottom - top).round().max(1.0) as u32,
        )
    }
}

impl Default for NormalizedRect {
    fn default() -> Self {
        Self::full_image()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_image() {
        let rect = NormalizedRect::full_image();
        assert_eq!(rect, NormalizedRect::new(0.5, 0.5, 1.0, 1.0));
        assert!(rect.is_normalized());
        assert_eq!(rect.to_pixel_crop(640, 480), (0, 0, 640, 480));
    }

    #[test]
    fn test_pixel_crop_clamps() {
        let rect = NormalizedRect::new(0.9, 0.5, 0.4, 0.5);
        assert_eq!(rect.to_pixel_crop(100, 100), (70, 25, 30, 50));
    }

    #[test]
    fn test_not_normalized() {
        assert!(!NormalizedRect::new(1.5, 0.5, 1.0, 1.0).is_normalized());
    }
}
