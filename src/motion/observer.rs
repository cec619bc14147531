//! 调试分析输出 (optional analysis observer)
//!
//! Called by the camera worker after scoring; never on the scoring path itself.

use super::scorer::ScoreSample;
use crate::error::OutputError;
use crate::output::fit::resize_rgb;
use crate::output::overlay::{draw_bar, draw_label, GREEN, RED, WHITE};
use crate::output::writer::{FrameWriter, Y4mWriter};
use crate::vision::MotionContour;
use ab_glyph::FontArc;
use image::{imageops, DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use std::path::PathBuf;
use tracing::info;

const TILE_W: u32 = 320;
const TILE_H: u32 = 180;

/// Read-only view of one scored frame.
pub struct AnalysisView<'a> {
    pub camera: &'a str,
    pub frame_seq: u64,
    pub processed: &'a RgbImage,
    pub mask: &'a GrayImage,
    pub contours: &'a [MotionContour],
    pub sample: &'a ScoreSample,
}

pub trait AnalysisObserver: Send {
    fn observe(&mut self, view: &AnalysisView<'_>) -> Result<(), OutputError>;
}

/// 2x2 拼图: 处理帧 | 掩码 / 轮廓叠加 | 统计, 写入 `<dir>/<camera>.y4m`
pub struct DebugCompositeObserver {
    path: PathBuf,
    fps: f64,
    font: Option<FontArc>,
    writer: Option<Y4mWriter>,
    peak_score: f64,
}

impl DebugCompositeObserver {
    pub fn new(path: PathBuf, fps: f64, font: Option<FontArc>) -> Self {
        Self {
            path,
            fps,
            font,
            writer: None,
            peak_score: 0.0,
        }
    }

    pub fn compose(&mut self, view: &AnalysisView<'_>) -> Result<RgbImage, OutputError> {
        let mut canvas = RgbImage::new(TILE_W * 2, TILE_H * 2);

        let processed = resize_rgb(view.processed, TILE_W, TILE_H)?;
        imageops::replace(&mut canvas, &processed, 0, 0);

        let mask = DynamicImage::ImageLuma8(view.mask.clone()).into_rgb8();
        let mask = resize_rgb(&mask, TILE_W, TILE_H)?;
        imageops::replace(&mut canvas, &mask, TILE_W as i64, 0);

        let mut overlay = view.processed.clone();
        for contour in view.contours {
            for p in &contour.points {
                if p.x >= 0 && p.y >= 0 && (p.x as u32) < overlay.width() && (p.y as u32) < overlay.height() {
                    overlay.put_pixel(p.x as u32, p.y as u32, GREEN);
                }
            }
            let c = (contour.centroid.x.round() as i32, contour.centroid.y.round() as i32);
            draw_filled_circle_mut(&mut overlay, c, 4, RED);
        }
        let overlay = resize_rgb(&overlay, TILE_W, TILE_H)?;
        imageops::replace(&mut canvas, &overlay, 0, TILE_H as i64);

        self.draw_stats(&mut canvas, view);
        Ok(canvas)
    }

    fn draw_stats(&mut self, canvas: &mut RgbImage, view: &AnalysisView<'_>) {
        let s = view.sample;
        self.peak_score = self.peak_score.max(s.score);
        let (x0, y0) = (TILE_W as i32 + 12, TILE_H as i32 + 12);

        match &self.font {
            Some(font) => {
                let lines = [
                    format!("{}  #{}", view.camera, view.frame_seq),
                    format!("contours  {}", s.contours),
                    format!("area      {:.0}", s.area),
                    format!("velocity  {:.1}", s.avg_velocity),
                    format!("weight    {}", s.weight),
                    format!("score     {:.0}", s.score),
                ];
                for (i, line) in lines.iter().enumerate() {
                    draw_label(canvas, font, line, x0, y0 + i as i32 * 24, 20.0, WHITE);
                }
            }
            None => {
                let fraction = if self.peak_score > 0.0 {
                    s.score / self.peak_score
                } else {
                    0.0
                };
                draw_bar(canvas, x0, y0, TILE_W - 24, 16, fraction, GREEN);
                draw_bar(canvas, x0, y0 + 24, TILE_W - 24, 16, s.contours as f64 / 10.0, Rgb([0, 160, 255]));
            }
        }
    }
}

impl AnalysisObserver for DebugCompositeObserver {
    fn observe(&mut self, view: &AnalysisView<'_>) -> Result<(), OutputError> {
        let composite = self.compose(view)?;
        if self.writer.is_none() {
            let writer = Y4mWriter::create(&self.path, self.fps, composite.dimensions())?;
            info!("🔍 analysis of '{}' written to {}", view.camera, self.path.display());
            self.writer = Some(writer);
        }
        match self.writer.as_mut() {
            Some(writer) => writer.write(&composite),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{VideoSource, Y4mSource};
    use imageproc::point::Point;

    #[test]
    fn test_composite_written_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis/top1.y4m");
        let mut observer = DebugCompositeObserver::new(path.clone(), 25.0, None);
        assert!(!path.exists());

        let processed = RgbImage::new(64, 48);
        let mask = GrayImage::new(64, 48);
        let contours = vec![MotionContour {
            points: vec![Point::new(1, 1), Point::new(10, 1), Point::new(10, 10)],
            area: 40.5,
            centroid: Point::new(7.0, 4.0),
        }];
        let sample = ScoreSample {
            contours: 1,
            area: 40.5,
            avg_velocity: 120.0,
            weight: 1,
            score: 4860.0,
        };
        let view = AnalysisView {
            camera: "top1",
            frame_seq: 3,
            processed: &processed,
            mask: &mask,
            contours: &contours,
            sample: &sample,
        };
        observer.observe(&view).unwrap();
        observer.observe(&view).unwrap();
        drop(observer);

        let mut src = Y4mSource::open(&path).unwrap();
        let frame = src.read().unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (640, 360));
        assert!(src.read().unwrap().is_some());
    }
}
