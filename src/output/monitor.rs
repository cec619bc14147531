//! 监视器拼图 (monitor composite)
//!
//! Thumbnail grid of every camera, on-air camera outlined in green, plus a
//! `CAM A V W S` table for the analyzed cameras.

use super::fit::Fitter;
use super::overlay::{draw_bar, draw_border, draw_label, GREEN, WHITE};
use crate::error::OutputError;
use crate::motion::ScoreSample;
use ab_glyph::FontArc;
use image::{imageops, Rgb, RgbImage};

pub const THUMB_W: u32 = 320;
pub const THUMB_H: u32 = 180;
const MAX_COLUMNS: usize = 4;
const ROW_H: u32 = 22;

/// One camera as shown on the monitor.
#[derive(Clone, Debug)]
pub struct MonitorTile<'a> {
    pub name: &'a str,
    pub frame: Option<&'a RgbImage>,
    pub sample: Option<ScoreSample>,
    pub analyzed: bool,
    pub on_air: bool,
    pub active: bool,
}

pub struct MonitorComposer {
    fitter: Fitter,
    font: Option<FontArc>,
    peak_score: f64,
}

impl MonitorComposer {
    pub fn new(font: Option<FontArc>) -> Self {
        Self {
            fitter: Fitter::new(THUMB_W, THUMB_H),
            font,
            peak_score: 0.0,
        }
    }

    /// Composite size for `tiles` cameras of which `analyzed` are scored.
    pub fn canvas_size(&self, tiles: usize, analyzed: usize) -> (u32, u32) {
        let cols = tiles.clamp(1, MAX_COLUMNS);
        let rows = tiles.max(1).div_ceil(cols);
        let stats_h = if self.font.is_some() {
            ROW_H + 8 + ROW_H * analyzed as u32
        } else {
            0
        };
        (cols as u32 * THUMB_W, rows as u32 * THUMB_H + stats_h)
    }

    pub fn compose(&mut self, tiles: &[MonitorTile<'_>]) -> Result<RgbImage, OutputError> {
        let analyzed: Vec<&MonitorTile<'_>> = tiles.iter().filter(|t| t.analyzed).collect();
        let (w, h) = self.canvas_size(tiles.len(), analyzed.len());
        let mut canvas = RgbImage::new(w, h);
        let cols = tiles.len().clamp(1, MAX_COLUMNS);

        for t in tiles.iter().filter_map(|t| t.sample) {
            self.peak_score = self.peak_score.max(t.score);
        }

        for (i, tile) in tiles.iter().enumerate() {
            let mut thumb = match tile.frame {
                Some(frame) => self.fitter.fit(frame)?,
                None => RgbImage::new(THUMB_W, THUMB_H),
            };
            if tile.on_air {
                draw_border(&mut thumb, 4, GREEN);
            }
            match &self.font {
                Some(font) => {
                    let label = if tile.active {
                        format!("#{} {}", i, tile.name)
                    } else {
                        format!("#{} {} (ended)", i, tile.name)
                    };
                    draw_label(&mut thumb, font, &label, 10, 8, 20.0, WHITE);
                }
                None => {
                    if let Some(sample) = tile.sample.filter(|_| tile.analyzed) {
                        let fraction = if self.peak_score > 0.0 {
                            sample.score / self.peak_score
                        } else {
                            0.0
                        };
                        draw_bar(&mut thumb, 8, THUMB_H as i32 - 18, THUMB_W - 16, 10, fraction, GREEN);
                    }
                }
            }
            let x = (i % cols) as i64 * THUMB_W as i64;
            let y = (i / cols) as i64 * THUMB_H as i64;
            imageops::replace(&mut canvas, &thumb, x, y);
        }

        if let Some(font) = &self.font {
            let top = (tiles.len().max(1).div_ceil(cols) as u32 * THUMB_H) as i32 + 4;
            let header = format!("{:<12}{:>12}{:>10}{:>4}{:>14}", "CAM", "A", "V", "W", "S");
            draw_label(&mut canvas, font, &header, 10, top, 18.0, Rgb([200, 200, 200]));
            for (row, tile) in analyzed.iter().enumerate() {
                let s = tile.sample.unwrap_or_default();
                let line = format!(
                    "{:<12}{:>12.0}{:>10.1}{:>4}{:>14.0}",
                    tile.name, s.area, s.avg_velocity, s.weight, s.score
                );
                let color = if tile.on_air { GREEN } else { WHITE };
                let y = top + ROW_H as i32 * (row as i32 + 1);
                draw_label(&mut canvas, font, &line, 10, y, 18.0, color);
            }
        }
        Ok(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile<'a>(name: &'a str, frame: Option<&'a RgbImage>, on_air: bool) -> MonitorTile<'a> {
        MonitorTile {
            name,
            frame,
            sample: Some(ScoreSample {
                score: if on_air { 50.0 } else { 10.0 },
                ..Default::default()
            }),
            analyzed: true,
            on_air,
            active: true,
        }
    }

    #[test]
    fn test_grid_layout_without_font() {
        let mut composer = MonitorComposer::new(None);
        let frame = RgbImage::from_pixel(64, 36, Rgb([0, 0, 200]));
        let tiles: Vec<_> = ["a", "b", "c", "d", "e"]
            .iter()
            .enumerate()
            .map(|(i, n)| tile(n, Some(&frame), i == 1))
            .collect();
        let out = composer.compose(&tiles).unwrap();
        assert_eq!(out.dimensions(), (4 * THUMB_W, 2 * THUMB_H));

        // 第二个缩略图带绿色边框, 第一个没有
        assert_eq!(*out.get_pixel(THUMB_W + 1, 1), GREEN);
        assert_eq!(*out.get_pixel(1, 1), Rgb([0, 0, 200]));
        // 第五个在第二行第一列
        assert_eq!(*out.get_pixel(THUMB_W / 2, THUMB_H + 40), Rgb([0, 0, 200]));
        // 空位保持黑色
        assert_eq!(*out.get_pixel(3 * THUMB_W + 10, THUMB_H + 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_missing_frame_is_black() {
        let mut composer = MonitorComposer::new(None);
        let out = composer.compose(&[tile("a", None, false)]).unwrap();
        assert_eq!(out.dimensions(), (THUMB_W, THUMB_H));
        assert_eq!(*out.get_pixel(100, 50), Rgb([0, 0, 0]));
    }
}
