use crate::frame::CropRect;
use image::{imageops, GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::map::{map_colors, map_colors2};

/// Gaussian sigma of the pre-processing blur (5x5 kernel equivalent).
pub const BLUR_SIGMA: f32 = 2.0;
/// Difference level above which a pixel counts as changed.
pub const DIFF_THRESHOLD: u8 = 20;
/// Radius of the disc used to merge nearby changed pixels.
pub const DILATE_RADIUS: u8 = 13;

/// 裁剪; 矩形完全落在画面外时返回 `None`
pub fn crop(image: &RgbImage, rect: &CropRect) -> Option<RgbImage> {
    let (x, y, w, h) = rect.clamp_to(image.width(), image.height())?;
    Some(imageops::crop_imm(image, x, y, w, h).to_image())
}

/// 灰度 + 高斯模糊
pub fn gray_blur(image: &RgbImage) -> GrayImage {
    let gray = imageops::grayscale(image);
    gaussian_blur_f32(&gray, BLUR_SIGMA)
}

/// |a - b| per pixel. Both images must have the same size.
pub fn abs_diff(a: &GrayImage, b: &GrayImage) -> GrayImage {
    map_colors2(a, b, |p, q| Luma([p[0].abs_diff(q[0])]))
}

/// Binary mask: 255 where the pixel is strictly above `level`, 0 elsewhere.
pub fn threshold(mask: &GrayImage, level: u8) -> GrayImage {
    map_colors(mask, |p| Luma([if p[0] > level { 255 } else { 0 }]))
}

pub fn dilate(mask: &GrayImage, radius: u8) -> GrayImage {
    imageproc::morphology::dilate(mask, Norm::L2, radius)
}

/// 帧差 → 阈值 → 膨胀, 得到变化区域的二值掩码
pub fn change_mask(prev: &GrayImage, curr: &GrayImage) -> GrayImage {
    let diff = abs_diff(prev, curr);
    dilate(&threshold(&diff, DIFF_THRESHOLD), DILATE_RADIUS)
}
