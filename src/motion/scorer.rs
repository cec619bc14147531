//! 运动评分 (Motion scorer)
//!
//! `score = area × avgVelocity × weight × n^alpha`, with `n` the number of
//! retained contours. Degenerate inputs (no contour, nothing tracked) score 0.

use crate::vision::{LucasKanade, MotionContour, OpticalFlow};
use image::GrayImage;
use imageproc::point::Point;

/// Contours below this area (px²) are noise and never reach the scorer.
pub const MIN_CONTOUR_AREA: f64 = 10.0;
/// Keeps sub-pixel centroid speeds meaningful in the product.
pub const VELOCITY_SCALE: f64 = 100.0;

/// One camera's motion measurement for one processed frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScoreSample {
    pub contours: usize,
    pub area: f64,
    pub avg_velocity: f64,
    pub weight: u32,
    pub score: f64,
}

/// Pure score formula. Returns 0 for `n == 0` and never a negative or NaN value.
pub fn compute_score(area: f64, avg_velocity: f64, weight: u32, n: usize, alpha: f64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let score = area * avg_velocity * weight as f64 * (n as f64).powf(alpha);
    if score.is_finite() && score > 0.0 {
        score
    } else {
        0.0
    }
}

/// Mean tracked displacement × [`VELOCITY_SCALE`]; 0 when no point was tracked.
pub fn average_velocity(from: &[Point<f32>], to: &[Option<Point<f32>>]) -> f64 {
    let (sum, count) = from
        .iter()
        .zip(to)
        .filter_map(|(a, b)| b.map(|b| (*a, b)))
        .fold((0.0f64, 0usize), |(sum, count), (a, b)| {
            let dx = (b.x - a.x) as f64;
            let dy = (b.y - a.y) as f64;
            (sum + (dx * dx + dy * dy).sqrt(), count + 1)
        });
    if count == 0 {
        return 0.0;
    }
    sum / count as f64 * VELOCITY_SCALE
}

pub struct MotionScorer<F: OpticalFlow = LucasKanade> {
    flow: F,
    weight: u32,
    alpha: f64,
}

impl MotionScorer<LucasKanade> {
    pub fn new(weight: u32, alpha: f64) -> Self {
        Self::with_flow(LucasKanade::default(), weight, alpha)
    }
}

impl<F: OpticalFlow> MotionScorer<F> {
    pub fn with_flow(flow: F, weight: u32, alpha: f64) -> Self {
        Self { flow, weight, alpha }
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Scores `contours` (already filtered by [`MIN_CONTOUR_AREA`]) between two
    /// consecutive pre-processed frames.
    pub fn score(&self, prev: &GrayImage, curr: &GrayImage, contours: &[MotionContour]) -> ScoreSample {
        let n = contours.len();
        let area: f64 = contours.iter().map(|c| c.area).sum();
        let avg_velocity = if n == 0 {
            0.0
        } else {
            let centroids: Vec<Point<f32>> = contours.iter().map(|c| c.centroid).collect();
            let tracked = self.flow.track(prev, curr, &centroids);
            average_velocity(&centroids, &tracked)
        };
        ScoreSample {
            contours: n,
            area,
            avg_velocity,
            weight: self.weight,
            score: compute_score(area, avg_velocity, self.weight, n, self.alpha),
        }
    }
}
