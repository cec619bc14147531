use super::scorer::{MotionScorer, ScoreSample, MIN_CONTOUR_AREA};
use crate::frame::CropRect;
use crate::vision::{change_mask, crop, external_contours, gray_blur, MotionContour, OpticalFlow, LucasKanade};
use image::{GrayImage, RgbImage};
use tracing::warn;

/// Everything produced while scoring one frame.
pub struct Analysis {
    pub sample: ScoreSample,
    /// Cropped input, before grayscale.
    pub processed: RgbImage,
    pub mask: GrayImage,
    pub contours: Vec<MotionContour>,
}

/// 逐帧运动分析: 裁剪 → 灰度+模糊 → 帧差掩码 → 外轮廓 → 评分
///
/// Keeps the previous processed frame; the first frame (and the first frame
/// after a resolution change) only primes that state.
pub struct MotionAnalyzer<F: OpticalFlow = LucasKanade> {
    crop: Option<CropRect>,
    scorer: MotionScorer<F>,
    prev: Option<GrayImage>,
    crop_warned: bool,
}

impl MotionAnalyzer<LucasKanade> {
    pub fn new(crop: Option<CropRect>, weight: u32, alpha: f64) -> Self {
        Self::with_scorer(crop, MotionScorer::new(weight, alpha))
    }
}

impl<F: OpticalFlow> MotionAnalyzer<F> {
    pub fn with_scorer(crop: Option<CropRect>, scorer: MotionScorer<F>) -> Self {
        Self {
            crop,
            scorer,
            prev: None,
            crop_warned: false,
        }
    }

    pub fn process(&mut self, frame: &RgbImage) -> Option<Analysis> {
        let processed = self.apply_crop(frame);
        let curr = gray_blur(&processed);

        let prev = match self.prev.take() {
            Some(prev) if prev.dimensions() == curr.dimensions() => prev,
            _ => {
                self.prev = Some(curr);
                return None;
            }
        };

        let mask = change_mask(&prev, &curr);
        let contours: Vec<MotionContour> = external_contours(&mask)
            .into_iter()
            .filter(|c| c.area >= MIN_CONTOUR_AREA)
            .collect();
        let sample = self.scorer.score(&prev, &curr, &contours);
        self.prev = Some(curr);

        Some(Analysis {
            sample,
            processed,
            mask,
            contours,
        })
    }

    fn apply_crop(&mut self, frame: &RgbImage) -> RgbImage {
        let Some(rect) = self.crop else {
            return frame.clone();
        };
        match crop(frame, &rect) {
            Some(cropped) => cropped,
            None => {
                if !self.crop_warned {
                    warn!(
                        "⚠️  crop {:?} lies outside the {}x{} frame, analysing the full frame",
                        rect,
                        frame.width(),
                        frame.height()
                    );
                    self.crop_warned = true;
                }
                frame.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn scene(square_x: i32) -> RgbImage {
        let mut img = RgbImage::from_pixel(160, 120, Rgb([20, 20, 20]));
        draw_filled_rect_mut(&mut img, Rect::at(square_x, 40).of_size(24, 24), Rgb([230, 230, 230]));
        img
    }

    #[test]
    fn test_first_frame_is_not_scored() {
        let mut analyzer = MotionAnalyzer::new(None, 1, 0.0);
        assert!(analyzer.process(&scene(30)).is_none());
        assert!(analyzer.process(&scene(30)).is_some());
    }

    #[test]
    fn test_static_scene_scores_zero() {
        let mut analyzer = MotionAnalyzer::new(None, 1, 0.0);
        analyzer.process(&scene(30));
        let a = analyzer.process(&scene(30)).unwrap();
        assert_eq!(a.sample.contours, 0);
        assert_eq!(a.sample.score, 0.0);
    }

    #[test]
    fn test_moving_square_has_motion() {
        let mut analyzer = MotionAnalyzer::new(None, 2, 0.0);
        analyzer.process(&scene(30));
        let a = analyzer.process(&scene(36)).unwrap();
        assert!(a.sample.contours >= 1);
        assert!(a.sample.area > MIN_CONTOUR_AREA);
        assert_eq!(a.sample.weight, 2);
        assert!(a.sample.score >= 0.0);
        assert_eq!(a.mask.dimensions(), (160, 120));
    }

    #[test]
    fn test_crop_outside_motion_is_ignored() {
        // 运动发生在裁剪区域之外
        let crop = CropRect::from_bounds([100, 0, 160, 120]);
        let mut analyzer = MotionAnalyzer::new(Some(crop), 1, 0.0);
        analyzer.process(&scene(30));
        let a = analyzer.process(&scene(36)).unwrap();
        assert_eq!(a.processed.dimensions(), (60, 120));
        assert_eq!(a.sample.contours, 0);
    }

    #[test]
    fn test_resolution_change_reprimes() {
        let mut analyzer = MotionAnalyzer::new(None, 1, 0.0);
        analyzer.process(&scene(30));
        assert!(analyzer.process(&RgbImage::new(80, 60)).is_none());
        assert!(analyzer.process(&RgbImage::new(80, 60)).is_some());
    }
}
