/// 运动分析 (Motion analysis)
pub mod analyzer;
pub mod observer;
pub mod scorer;

pub use analyzer::{Analysis, MotionAnalyzer};
pub use observer::{AnalysisObserver, AnalysisView, DebugCompositeObserver};
pub use scorer::{compute_score, MotionScorer, ScoreSample, MIN_CONTOUR_AREA};
