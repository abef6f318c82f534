//! Frames handed to vision tasks
//!
//! A frame is either CPU-backed (an owned `image::DynamicImage`) or GPU-backed
//! (an opaque texture handle owned by the caller's GPU context). Tasks built on
//! this crate only run CPU frames; GPU frames are carried so the dispatch layer
//! can reject them explicitly.

use image::{DynamicImage, RgbImage, RgbaImage};
use std::sync::Arc;

/// Handle to a texture living in GPU memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuBuffer {
    pub texture_id: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default)]
enum Storage {
    #[default]
    Empty,
    Cpu(Arc<DynamicImage>),
    Gpu(GpuBuffer),
}

/// An image frame plus its backing location.
///
/// Cloning shares the pixel buffer.
#[derive(Debug, Clone, Default)]
pub struct Image {
    storage: Storage,
}

impl Image {
    /// Frame with no pixels, used where an image slot has to be filled but no
    /// frame exists (e.g. failure reports)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self {
            storage: Storage::Cpu(Arc::new(image)),
        }
    }

    pub fn from_gpu_buffer(buffer: GpuBuffer) -> Self {
        Self {
            storage: Storage::Gpu(buffer),
        }
    }

    pub fn uses_gpu(&self) -> bool {
        matches!(self.storage, Storage::Gpu(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.storage, Storage::Empty)
    }

    /// CPU pixels, if this frame is CPU-backed
    pub fn as_dynamic(&self) -> Option<&DynamicImage> {
        match &self.storage {
            Storage::Cpu(image) => Some(image),
            _ => None,
        }
    }

    pub fn width(&self) -> u32 {
        match &self.storage {
            Storage::Empty => 0,
            Storage::Cpu(image) => image.width(),
            Storage::Gpu(buffer) => buffer.width,
        }
    }

    pub fn height(&self) -> u32 {
        match &self.storage {
            Storage::Empty => 0,
            Storage::Cpu(image) => image.height(),
            Storage::Gpu(buffer) => buffer.height,
        }
    }
}

impl From<DynamicImage> for Image {
    fn from(image: DynamicImage) -> Self {
        Self::from_dynamic(image)
    }
}

impl From<RgbImage> for Image {
    fn from(image: RgbImage) -> Self {
        Self::from_dynamic(DynamicImage::ImageRgb8(image))
    }
}

impl From<RgbaImage> for Image {
    fn from(image: RgbaImage) -> Self {
        Self::from_dynamic(DynamicImage::ImageRgba8(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_image() {
        let image = Image::from(RgbImage::new(4, 3));
        assert!(!image.uses_gpu());
        assert!(!image.is_empty());
        assert_eq!((image.width(), image.height()), (4, 3));
        assert!(image.as_dynamic().is_some());
    }

    #[test]
    fn test_gpu_image() {
        let image = Image::from_gpu_buffer(GpuBuffer {
            texture_id: 1,
            width: 640,
            height: 480,
        });
        assert!(image.uses_gpu());
        assert!(image.as_dynamic().is_none());
        assert_eq!(image.width(), 640);
    }

    #[test]
    fn test_empty_image() {
        let image = Image::empty();
        assert!(image.is_empty());
        assert!(!image.uses_gpu());
        assert_eq!(image.width(), 0);
    }
}
