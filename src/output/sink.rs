//! 输出汇 (output sink)
//!
//! Fit → persistent writer → FPS log → preview. Only writer failures are
//! returned to the coordinator; preview and monitor problems degrade locally.

use super::fit::Fitter;
use super::fps_log::FpsLog;
use super::monitor::{MonitorComposer, MonitorTile};
use super::preview::{PreviewHandle, PreviewPane};
use super::writer::{open_writer, FrameWriter};
use super::{FrameSink, OnAir};
use crate::error::OutputError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub const OUTPUT_SLOT: usize = 0;
pub const MONITOR_SLOT: usize = 1;

/// Monitor composite destination, opened on the first refresh once its size is known.
enum MonitorTarget {
    Pending { path: PathBuf, fps: f64 },
    Open(Box<dyn FrameWriter>),
    Disabled,
}

pub struct OutputSink {
    fitter: Fitter,
    writer: Box<dyn FrameWriter>,
    preview: Option<PreviewHandle>,
    monitor: Option<MonitorComposer>,
    monitor_target: MonitorTarget,
    fps_log: Option<FpsLog>,
}

impl OutputSink {
    pub fn new(writer: Box<dyn FrameWriter>, size: (u32, u32)) -> Self {
        Self {
            fitter: Fitter::new(size.0, size.1),
            writer,
            preview: None,
            monitor: None,
            monitor_target: MonitorTarget::Disabled,
            fps_log: None,
        }
    }

    pub fn with_preview(mut self, preview: PreviewHandle) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn with_fps_log(mut self, log: FpsLog) -> Self {
        self.fps_log = Some(log);
        self
    }

    /// Enables the monitor composite, optionally persisted to `path`.
    pub fn with_monitor(mut self, composer: MonitorComposer, path: Option<PathBuf>, fps: f64) -> Self {
        self.monitor = Some(composer);
        self.monitor_target = match path {
            Some(path) => MonitorTarget::Pending { path, fps },
            None => MonitorTarget::Disabled,
        };
        self
    }

    pub fn frames_written(&self) -> u64 {
        self.writer.frames_written()
    }

    fn show(&mut self, pane: PreviewPane) {
        let Some(preview) = &self.preview else {
            return;
        };
        if preview.show(pane).is_err() {
            // 窗口已关闭: 停止预览, 继续录制
            info!("🖥️  preview closed, recording continues");
            self.preview = None;
        }
    }

    fn persist_monitor(&mut self, composite: &image::RgbImage) {
        if let MonitorTarget::Pending { path, fps } = &self.monitor_target {
            self.monitor_target = match open_writer(path, "mpeg4", *fps, composite.dimensions()) {
                Ok(writer) => MonitorTarget::Open(writer),
                Err(e) => {
                    warn!("⚠️  monitor output {} disabled: {}", path.display(), e);
                    MonitorTarget::Disabled
                }
            };
        }
        if let MonitorTarget::Open(writer) = &mut self.monitor_target {
            if let Err(e) = writer.write(composite) {
                // 摄像头数量不变, 尺寸不应变化; 出错即停用
                warn!("⚠️  monitor output disabled: {}", e);
                self.monitor_target = MonitorTarget::Disabled;
            }
        }
    }
}

impl FrameSink for OutputSink {
    fn present(&mut self, on_air: &OnAir<'_>) -> Result<(), OutputError> {
        let fitted = self.fitter.fit(&on_air.frame.image)?;
        self.writer.write(&fitted)?;

        if let Some(log) = self.fps_log.as_mut() {
            log.record(on_air.cycle_fps)?;
        }

        if self.preview.is_some() {
            let title = if on_air.source == on_air.camera {
                on_air.camera.to_string()
            } else {
                format!("{} via {}", on_air.source, on_air.camera)
            };
            self.show(PreviewPane {
                slot: OUTPUT_SLOT,
                title,
                caption: format!("cycle {} | {:.0} fps", on_air.cycle, on_air.display_fps),
                image: Arc::new(fitted),
            });
        }
        Ok(())
    }

    fn monitor_enabled(&self) -> bool {
        self.monitor.is_some()
    }

    fn refresh_monitor(&mut self, tiles: &[MonitorTile<'_>]) -> Result<(), OutputError> {
        let Some(composer) = self.monitor.as_mut() else {
            return Ok(());
        };
        let composite = match composer.compose(tiles) {
            Ok(img) => img,
            Err(e) => {
                warn!("⚠️  monitor composite failed: {}", e);
                return Ok(());
            }
        };
        self.persist_monitor(&composite);
        if self.preview.is_some() {
            self.show(PreviewPane {
                slot: MONITOR_SLOT,
                title: "monitor".to_string(),
                caption: String::new(),
                image: Arc::new(composite),
            });
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), OutputError> {
        if let Some(log) = self.fps_log.as_mut() {
            log.flush()?;
        }
        if let MonitorTarget::Open(writer) = &mut self.monitor_target {
            if let Err(e) = writer.finish() {
                warn!("⚠️  monitor output: {}", e);
            }
        }
        self.writer.finish()?;
        info!("💾 output finished: {} frames", self.writer.frames_written());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::VideoFrame;
    use crate::output::preview::preview_channel;
    use image::{Rgb, RgbImage};
    use std::sync::Mutex;

    /// Shared record of what reached the writer.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<(u32, u32)>>>);

    struct CapturingWriter {
        captured: Captured,
        fail: bool,
    }

    impl FrameWriter for CapturingWriter {
        fn write(&mut self, frame: &RgbImage) -> Result<(), OutputError> {
            if self.fail {
                return Err(OutputError::Encoder("disk full".to_string()));
            }
            self.captured.0.lock().unwrap().push(frame.dimensions());
            Ok(())
        }

        fn frames_written(&self) -> u64 {
            self.captured.0.lock().unwrap().len() as u64
        }
    }

    fn on_air(frame: &VideoFrame) -> OnAir<'_> {
        OnAir {
            camera: "top",
            source: "wide",
            frame,
            cycle: 3,
            cycle_fps: 25.0,
            display_fps: 24.0,
        }
    }

    #[test]
    fn test_present_fits_and_writes() {
        let captured = Captured::default();
        let writer = CapturingWriter {
            captured: captured.clone(),
            fail: false,
        };
        let mut sink = OutputSink::new(Box::new(writer), (64, 36));
        let frame = VideoFrame::new(RgbImage::from_pixel(100, 100, Rgb([9, 9, 9])), 0);
        sink.present(&on_air(&frame)).unwrap();
        sink.present(&on_air(&frame)).unwrap();
        assert_eq!(*captured.0.lock().unwrap(), vec![(64, 36), (64, 36)]);
        assert_eq!(sink.frames_written(), 2);
    }

    #[test]
    fn test_writer_error_propagates() {
        let writer = CapturingWriter {
            captured: Captured::default(),
            fail: true,
        };
        let mut sink = OutputSink::new(Box::new(writer), (32, 18));
        let frame = VideoFrame::new(RgbImage::new(32, 18), 0);
        assert!(sink.present(&on_air(&frame)).is_err());
    }

    #[test]
    fn test_closed_preview_keeps_recording() {
        let captured = Captured::default();
        let writer = CapturingWriter {
            captured: captured.clone(),
            fail: false,
        };
        let (handle, rx) = preview_channel();
        let mut sink = OutputSink::new(Box::new(writer), (32, 18)).with_preview(handle);
        let frame = VideoFrame::new(RgbImage::new(32, 18), 0);

        sink.present(&on_air(&frame)).unwrap();
        let pane = rx.try_recv().unwrap();
        assert_eq!(pane.slot, OUTPUT_SLOT);
        assert_eq!(pane.title, "wide via top");

        drop(rx);
        sink.present(&on_air(&frame)).unwrap();
        sink.present(&on_air(&frame)).unwrap();
        assert!(sink.preview.is_none());
        assert_eq!(captured.0.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_monitor_persisted_and_previewed() {
        let dir = tempfile::tempdir().unwrap();
        let monitor_path = dir.path().join("monitor.y4m");
        let writer = CapturingWriter {
            captured: Captured::default(),
            fail: false,
        };
        let (handle, rx) = preview_channel();
        let mut sink = OutputSink::new(Box::new(writer), (32, 18))
            .with_preview(handle)
            .with_monitor(MonitorComposer::new(None), Some(monitor_path.clone()), 25.0);
        assert!(sink.monitor_enabled());

        let img = RgbImage::new(64, 36);
        let tiles = [MonitorTile {
            name: "a",
            frame: Some(&img),
            sample: None,
            analyzed: true,
            on_air: true,
            active: true,
        }];
        sink.refresh_monitor(&tiles).unwrap();
        sink.finish().unwrap();

        assert_eq!(rx.try_recv().unwrap().slot, MONITOR_SLOT);
        assert!(std::fs::metadata(&monitor_path).unwrap().len() > 0);
    }
}
