/// 输出系统 (Output sink)
///
/// - fit: 等比缩放 + 居中裁剪
/// - writer: 持久化输出 (y4m / png 序列 / ffmpeg)
/// - preview: macroquad 预览窗口
/// - monitor: 全部机位缩略图 + 统计
/// - fps_log: FPS CSV
pub mod fit;
pub mod fps_log;
pub mod monitor;
pub mod overlay;
pub mod preview;
pub mod sink;
pub mod writer;

pub use fit::{plan_fit, FitMode, FitPlan, Fitter};
pub use fps_log::FpsLog;
pub use monitor::{MonitorComposer, MonitorTile};
pub use preview::{preview_channel, PreviewHandle, PreviewPane};
pub use sink::OutputSink;
pub use writer::{open_writer, FrameWriter};

use crate::error::OutputError;
use crate::frame::VideoFrame;

/// Frame forwarded for one cycle.
pub struct OnAir<'a> {
    /// Committed analyzed camera.
    pub camera: &'a str,
    /// Camera whose frame is forwarded (an associated display camera, or `camera` itself).
    pub source: &'a str,
    pub frame: &'a VideoFrame,
    pub cycle: u64,
    /// Instantaneous rate of this cycle.
    pub cycle_fps: f64,
    /// Smoothed rate, refreshed every few cycles.
    pub display_fps: f64,
}

/// Where the coordinator sends the on-air frame and the monitor tiles.
pub trait FrameSink {
    fn present(&mut self, on_air: &OnAir<'_>) -> Result<(), OutputError>;

    fn monitor_enabled(&self) -> bool {
        false
    }

    fn refresh_monitor(&mut self, _tiles: &[MonitorTile<'_>]) -> Result<(), OutputError> {
        Ok(())
    }

    /// Flushes persistent outputs at the end of the run.
    fn finish(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
}
