use image::RgbImage;
use std::sync::Arc;

/// 解码后的视频帧
///
/// Pixels are shared, so handing a frame to the coordinator, the preview and
/// the monitor never copies the image.
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pub image: Arc<RgbImage>,
    pub seq: u64, // 帧序号
}

impl VideoFrame {
    pub fn new(image: RgbImage, seq: u64) -> Self {
        Self {
            image: Arc::new(image),
            seq,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Crop rectangle in source pixels, `[left, top, right)` x `[top, bottom)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRect {
    pub fn from_bounds([left, top, right, bottom]: [u32; 4]) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Clamps the rectangle to a `width` x `height` frame and returns
    /// `(x, y, w, h)`, or `None` if nothing of it lies inside the frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let right = self.right.min(width);
        let bottom = self.bottom.min(height);
        if self.left >= right || self.top >= bottom {
            return None;
        }
        Some((self.left, self.top, right - self.left, bottom - self.top))
    }
}
