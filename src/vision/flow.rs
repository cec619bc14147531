//! 稀疏光流 - 金字塔 Lucas-Kanade
//!
//! Tracks a handful of points (contour centroids) from one grayscale frame to
//! the next. Points whose neighbourhood has too little texture, that diverge,
//! or that leave the frame are reported as `None`.

use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::point::Point;

/// Sparse optical flow: for every input point, its position in `curr` or `None`.
pub trait OpticalFlow: Send + Sync {
    fn track(&self, prev: &GrayImage, curr: &GrayImage, points: &[Point<f32>]) -> Vec<Option<Point<f32>>>;
}

#[derive(Clone, Debug)]
pub struct LucasKanade {
    pub window_radius: i32, // 窗口半径 (21x21)
    pub levels: u32,        // 金字塔层数
    pub max_iterations: u32,
    pub epsilon: f32,       // 迭代收敛阈值(像素)
    pub min_eigen: f32,     // 最小特征值 / 窗口像素数
}

impl Default for LucasKanade {
    fn default() -> Self {
        Self {
            window_radius: 10,
            levels: 3,
            max_iterations: 30,
            epsilon: 0.01,
            min_eigen: 1e-3,
        }
    }
}

impl OpticalFlow for LucasKanade {
    fn track(&self, prev: &GrayImage, curr: &GrayImage, points: &[Point<f32>]) -> Vec<Option<Point<f32>>> {
        if points.is_empty() || prev.dimensions() != curr.dimensions() {
            return vec![None; points.len()];
        }
        let prev_pyr = self.pyramid(prev);
        let curr_pyr = self.pyramid(curr);
        points
            .iter()
            .map(|p| self.track_point(&prev_pyr, &curr_pyr, *p))
            .collect()
    }
}

impl LucasKanade {
    fn pyramid(&self, base: &GrayImage) -> Vec<GrayImage> {
        let min_side = (2 * self.window_radius + 1) as u32;
        let mut levels = vec![base.clone()];
        for _ in 1..self.levels.max(1) {
            let Some(last) = levels.last() else { break };
            let (w, h) = (last.width() / 2, last.height() / 2);
            if w < min_side || h < min_side {
                break;
            }
            let next = imageops::resize(last, w, h, FilterType::Triangle);
            levels.push(next);
        }
        levels
    }

    fn track_point(&self, prev: &[GrayImage], curr: &[GrayImage], point: Point<f32>) -> Option<Point<f32>> {
        let r = self.window_radius;
        let n = ((2 * r + 1) * (2 * r + 1)) as f32;
        let mut guess = (0.0f32, 0.0f32);

        for level in (0..prev.len()).rev() {
            let scale = (1u32 << level) as f32;
            let (px, py) = (point.x / scale, point.y / scale);
            let (img_i, img_j) = (&prev[level], &curr[level]);

            // 窗口内的模板与梯度
            let mut template = Vec::with_capacity(n as usize);
            let (mut gxx, mut gxy, mut gyy) = (0.0f32, 0.0f32, 0.0f32);
            for dy in -r..=r {
                for dx in -r..=r {
                    let (x, y) = (px + dx as f32, py + dy as f32);
                    let ix = (sample(img_i, x + 1.0, y) - sample(img_i, x - 1.0, y)) * 0.5;
                    let iy = (sample(img_i, x, y + 1.0) - sample(img_i, x, y - 1.0)) * 0.5;
                    gxx += ix * ix;
                    gxy += ix * iy;
                    gyy += iy * iy;
                    template.push((sample(img_i, x, y), ix, iy));
                }
            }

            let det = gxx * gyy - gxy * gxy;
            let trace_half = (gxx + gyy) * 0.5;
            let min_eig = trace_half - (trace_half * trace_half - det).max(0.0).sqrt();
            if min_eig / n < self.min_eigen || det.abs() < f32::EPSILON {
                return None;
            }

            let mut v = (0.0f32, 0.0f32);
            for _ in 0..self.max_iterations {
                let (mut bx, mut by) = (0.0f32, 0.0f32);
                let mut k = 0;
                for dy in -r..=r {
                    for dx in -r..=r {
                        let (i_val, ix, iy) = template[k];
                        k += 1;
                        let x = px + dx as f32 + guess.0 + v.0;
                        let y = py + dy as f32 + guess.1 + v.1;
                        let diff = i_val - sample(img_j, x, y);
                        bx += diff * ix;
                        by += diff * iy;
                    }
                }
                let eta = ((gyy * bx - gxy * by) / det, (gxx * by - gxy * bx) / det);
                v.0 += eta.0;
                v.1 += eta.1;
                if eta.0 * eta.0 + eta.1 * eta.1 < self.epsilon * self.epsilon {
                    break;
                }
            }

            guess = if level > 0 {
                (2.0 * (guess.0 + v.0), 2.0 * (guess.1 + v.1))
            } else {
                (guess.0 + v.0, guess.1 + v.1)
            };
        }

        let tracked = Point::new(point.x + guess.0, point.y + guess.1);
        let (w, h) = (prev[0].width() as f32, prev[0].height() as f32);
        let inside = tracked.x.is_finite()
            && tracked.y.is_finite()
            && tracked.x >= 0.0
            && tracked.y >= 0.0
            && tracked.x <= w - 1.0
            && tracked.y <= h - 1.0;
        inside.then_some(tracked)
    }
}

/// Bilinear sample with border replication.
fn sample(img: &GrayImage, x: f32, y: f32) -> f32 {
    let max_x = img.width() as f32 - 1.0;
    let max_y = img.height() as f32 - 1.0;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (x0, y0) = (x0 as u32, y0 as u32);
    let x1 = (x0 + 1).min(img.width() - 1);
    let y1 = (y0 + 1).min(img.height() - 1);
    let p = |x: u32, y: u32| img.get_pixel(x, y)[0] as f32;
    let top = p(x0, y0) * (1.0 - fx) + p(x1, y0) * fx;
    let bottom = p(x0, y1) * (1.0 - fx) + p(x1, y1) * fx;
    top * (1.0 - fy) + bottom * fy
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn blob(w: u32, h: u32, cx: f32, cy: f32, sigma: f32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let d2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
            Luma([(230.0 * (-d2 / (2.0 * sigma * sigma)).exp()) as u8 + 10])
        })
    }

    #[test]
    fn test_tracks_shifted_blob() {
        let prev = blob(96, 96, 40.0, 44.0, 7.0);
        let curr = blob(96, 96, 43.0, 46.0, 7.0);
        let tracked = LucasKanade::default().track(&prev, &curr, &[Point::new(40.0, 44.0)]);
        let p = tracked[0].expect("blob must be tracked");
        assert!((p.x - 43.0).abs() < 0.5, "x={}", p.x);
        assert!((p.y - 46.0).abs() < 0.5, "y={}", p.y);
    }

    #[test]
    fn test_flat_image_is_untrackable() {
        let flat = GrayImage::from_pixel(64, 64, Luma([100]));
        let tracked = LucasKanade::default().track(&flat, &flat, &[Point::new(32.0, 32.0)]);
        assert_eq!(tracked, vec![None]);
    }

    #[test]
    fn test_size_mismatch_tracks_nothing() {
        let a = GrayImage::new(32, 32);
        let b = GrayImage::new(16, 16);
        let pts = [Point::new(1.0, 1.0), Point::new(2.0, 2.0)];
        assert_eq!(LucasKanade::default().track(&a, &b, &pts), vec![None, None]);
    }

    #[test]
    fn test_bilinear_sample() {
        let img = GrayImage::from_raw(2, 2, vec![0, 100, 100, 200]).unwrap();
        assert_eq!(sample(&img, 0.5, 0.5), 100.0);
        assert_eq!(sample(&img, -3.0, 0.0), 0.0);
        assert_eq!(sample(&img, 5.0, 5.0), 200.0);
    }
}
