//! 画面适配: 等比缩放 + 居中裁剪到输出分辨率

use crate::error::OutputError;
use fast_image_resize as fr;
use image::RgbImage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitMode {
    /// Scale to the output height, crop the sides.
    FixedHeight,
    /// Scale to the output width, crop top and bottom.
    FixedWidth,
}

/// Resize-then-crop plan, expressed in scaled (output) pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitPlan {
    pub mode: FitMode,
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub crop_x: u32,
    pub crop_y: u32,
    pub out_width: u32,
    pub out_height: u32,
}

/// Picks the resize axis so that neither scaled dimension ends up smaller than
/// the target, then centres the crop window.
pub fn plan_fit(src_width: u32, src_height: u32, out_width: u32, out_height: u32) -> FitPlan {
    let (sw, sh) = (src_width.max(1) as u64, src_height.max(1) as u64);
    let (ow, oh) = (out_width.max(1) as u64, out_height.max(1) as u64);

    // 源宽高比 >= 目标宽高比: 固定高度, 否则固定宽度
    if sw * oh >= ow * sh {
        let scaled_width = ((sw * oh + sh / 2) / sh).max(ow) as u32;
        FitPlan {
            mode: FitMode::FixedHeight,
            scaled_width,
            scaled_height: out_height,
            crop_x: (scaled_width - out_width) / 2,
            crop_y: 0,
            out_width,
            out_height,
        }
    } else {
        let scaled_height = ((sh * ow + sw / 2) / sw).max(oh) as u32;
        FitPlan {
            mode: FitMode::FixedWidth,
            scaled_width: out_width,
            scaled_height,
            crop_x: 0,
            crop_y: (scaled_height - out_height) / 2,
            out_width,
            out_height,
        }
    }
}

impl FitPlan {
    /// Crop window mapped back to source pixels: `(left, top, width, height)`.
    pub fn source_window(&self, src_width: u32, src_height: u32) -> (f64, f64, f64, f64) {
        let sx = src_width as f64 / self.scaled_width as f64;
        let sy = src_height as f64 / self.scaled_height as f64;
        (
            self.crop_x as f64 * sx,
            self.crop_y as f64 * sy,
            self.out_width as f64 * sx,
            self.out_height as f64 * sy,
        )
    }
}

/// 缩放器 (复用内部缓冲)
pub struct Fitter {
    resizer: fr::Resizer,
    out_width: u32,
    out_height: u32,
}

impl Fitter {
    pub fn new(out_width: u32, out_height: u32) -> Self {
        Self {
            resizer: fr::Resizer::new(),
            out_width,
            out_height,
        }
    }

    pub fn out_size(&self) -> (u32, u32) {
        (self.out_width, self.out_height)
    }

    /// Aspect-preserving resize + centre crop to the output size.
    pub fn fit(&mut self, src: &RgbImage) -> Result<RgbImage, OutputError> {
        if src.dimensions() == (self.out_width, self.out_height) {
            return Ok(src.clone());
        }
        let plan = plan_fit(src.width(), src.height(), self.out_width, self.out_height);
        let (left, top, width, height) = plan.source_window(src.width(), src.height());
        let options = fr::ResizeOptions::new()
            .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear))
            .crop(left, top, width, height);
        resize_with(&mut self.resizer, src, self.out_width, self.out_height, &options)
    }
}

/// Plain resize to `width` x `height` (thumbnails).
pub fn resize_rgb(src: &RgbImage, width: u32, height: u32) -> Result<RgbImage, OutputError> {
    let options = fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear));
    resize_with(&mut fr::Resizer::new(), src, width, height, &options)
}

fn resize_with(
    resizer: &mut fr::Resizer,
    src: &RgbImage,
    width: u32,
    height: u32,
    options: &fr::ResizeOptions,
) -> Result<RgbImage, OutputError> {
    let src_image = fr::images::Image::from_vec_u8(
        src.width(),
        src.height(),
        src.as_raw().clone(),
        fr::PixelType::U8x3,
    )
    .map_err(|e| OutputError::Resize(e.to_string()))?;
    let mut dst_image = fr::images::Image::new(width, height, fr::PixelType::U8x3);
    resizer
        .resize(&src_image, &mut dst_image, options)
        .map_err(|e| OutputError::Resize(e.to_string()))?;
    RgbImage::from_raw(width, height, dst_image.into_vec())
        .ok_or_else(|| OutputError::Resize("destination buffer size mismatch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_wide_source_fixed_height() {
        let plan = plan_fit(1280, 480, 1920, 1080);
        assert_eq!(plan.mode, FitMode::FixedHeight);
        assert_eq!((plan.scaled_width, plan.scaled_height), (2880, 1080));
        assert_eq!((plan.crop_x, plan.crop_y), (480, 0));
    }

    #[test]
    fn test_tall_source_fixed_width() {
        let plan = plan_fit(640, 480, 1920, 1080);
        assert_eq!(plan.mode, FitMode::FixedWidth);
        assert_eq!((plan.scaled_width, plan.scaled_height), (1920, 1440));
        assert_eq!((plan.crop_x, plan.crop_y), (0, 180));
        let (l, t, w, h) = plan.source_window(640, 480);
        assert_eq!((l, t, w, h), (0.0, 60.0, 640.0, 360.0));
    }

    #[test]
    fn test_same_aspect_no_crop() {
        let plan = plan_fit(1280, 720, 1920, 1080);
        assert_eq!((plan.scaled_width, plan.scaled_height), (1920, 1080));
        assert_eq!((plan.crop_x, plan.crop_y), (0, 0));
    }

    #[test]
    fn test_fit_output_size_and_center() {
        // 左右两侧红色, 中间绿色: 裁剪后应只剩绿色
        let src = RgbImage::from_fn(300, 100, |x, _| {
            if (100..200).contains(&x) {
                Rgb([0, 255, 0])
            } else {
                Rgb([255, 0, 0])
            }
        });
        let mut fitter = Fitter::new(64, 64);
        let out = fitter.fit(&src).unwrap();
        assert_eq!(out.dimensions(), (64, 64));
        let Rgb([r, g, _]) = *out.get_pixel(32, 32);
        assert!(g > 200 && r < 50);
        let Rgb([r, g, _]) = *out.get_pixel(2, 32);
        assert!(g > 200 && r < 50);
    }

    #[test]
    fn test_resize_rgb() {
        let src = RgbImage::from_pixel(40, 20, Rgb([10, 20, 30]));
        let out = resize_rgb(&src, 8, 4).unwrap();
        assert_eq!(out.dimensions(), (8, 4));
        assert_eq!(*out.get_pixel(3, 2), Rgb([10, 20, 30]));
    }
}
