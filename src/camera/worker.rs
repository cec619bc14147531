//! 摄像头工作线程 (camera worker)
//!
//! read → cancellation check → analyse → observe → publish, once per source
//! frame. Display-only cameras skip analysis and publish with a zero score.

use super::mailbox::{MailboxSender, PublishError, Sample};
use crate::frame::{CropRect, VideoFrame};
use crate::input::VideoSource;
use crate::lifecycle::CancellationToken;
use crate::motion::{AnalysisObserver, AnalysisView, MotionAnalyzer, ScoreSample};
use crate::vision::{crop, OpticalFlow, LucasKanade};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Why a worker stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerExit {
    EndOfStream,
    Cancelled,
    /// The coordinator dropped its end of the mailbox.
    MailboxClosed,
    SourceFailed(String),
}

#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub camera: String,
    pub frames_read: u64,
    pub published: u64,
    pub exit: WorkerExit,
}

/// What the worker does with each frame.
pub enum WorkerMode<F: OpticalFlow = LucasKanade> {
    /// Score motion; publish the full original frame.
    Analyze(MotionAnalyzer<F>),
    /// Publish the (optionally cropped) frame with a zero score.
    Display { crop: Option<CropRect>, weight: u32 },
}

pub struct CameraWorker<S: VideoSource, F: OpticalFlow = LucasKanade> {
    name: String,
    source: S,
    mode: WorkerMode<F>,
    observer: Option<Box<dyn AnalysisObserver>>,
    mailbox: MailboxSender,
    token: CancellationToken,
}

impl<S: VideoSource, F: OpticalFlow> CameraWorker<S, F> {
    pub fn new(
        name: impl Into<String>,
        source: S,
        mode: WorkerMode<F>,
        mailbox: MailboxSender,
        token: CancellationToken,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            mode,
            observer: None,
            mailbox,
            token,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn AnalysisObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Runs until end of stream, source failure or cancellation. Dropping the
    /// mailbox sender on return tells the coordinator this camera is inactive.
    pub fn run(mut self) -> WorkerReport {
        info!("📹 camera '{}' started", self.name);
        let mut frames_read = 0u64;
        let mut published = 0u64;
        let mut count = 0usize;
        let mut last = Instant::now();

        let exit = loop {
            let frame = match self.source.read() {
                Ok(Some(frame)) => frame,
                Ok(None) => break WorkerExit::EndOfStream,
                Err(e) => {
                    error!("❌ camera '{}' read failed: {}", self.name, e);
                    break WorkerExit::SourceFailed(e.to_string());
                }
            };
            if self.token.is_cancelled() {
                break WorkerExit::Cancelled;
            }
            frames_read += 1;

            let Some(sample) = self.process(frame) else {
                continue;
            };
            match self.mailbox.publish(sample) {
                Ok(()) => published += 1,
                Err(PublishError::Cancelled) => break WorkerExit::Cancelled,
                Err(PublishError::Closed) => break WorkerExit::MailboxClosed,
            }

            count += 1;
            if last.elapsed().as_secs_f64() >= 1.0 {
                debug!(
                    "📹 '{}': {:.1} fps | read {} | published {}",
                    self.name,
                    count as f64 / last.elapsed().as_secs_f64(),
                    frames_read,
                    published
                );
                last = Instant::now();
                count = 0;
            }
        };

        info!(
            "✅ camera '{}' stopped ({:?}) after {} frames, {} published",
            self.name, exit, frames_read, published
        );
        WorkerReport {
            camera: self.name,
            frames_read,
            published,
            exit,
        }
    }

    fn process(&mut self, frame: VideoFrame) -> Option<Sample> {
        match &mut self.mode {
            WorkerMode::Analyze(analyzer) => {
                // 第一帧没有参考帧, 不评分也不发布
                let analysis = analyzer.process(&frame.image)?;
                if let Some(observer) = self.observer.as_mut() {
                    let view = AnalysisView {
                        camera: &self.name,
                        frame_seq: frame.seq,
                        processed: &analysis.processed,
                        mask: &analysis.mask,
                        contours: &analysis.contours,
                        sample: &analysis.sample,
                    };
                    let outcome = catch_unwind(AssertUnwindSafe(|| observer.observe(&view)));
                    let failure = match outcome {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(e.to_string()),
                        Err(_) => Some("observer panicked".to_string()),
                    };
                    if let Some(reason) = failure {
                        warn!("⚠️  analysis output of '{}' disabled: {}", self.name, reason);
                        self.observer = None;
                    }
                }
                Some(Sample {
                    frame,
                    score: analysis.sample,
                })
            }
            WorkerMode::Display { crop: rect, weight } => {
                let frame = match rect.and_then(|r| crop(&frame.image, &r)) {
                    Some(cropped) => VideoFrame::new(cropped, frame.seq),
                    None => frame,
                };
                Some(Sample {
                    frame,
                    score: ScoreSample {
                        weight: *weight,
                        ..Default::default()
                    },
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::mailbox::{mailbox, Received};
    use crate::error::{OutputError, SourceError};
    use crate::input::MemorySource;
    use image::{Rgb, RgbImage};
    use std::thread;

    fn frames(n: usize) -> Vec<RgbImage> {
        (0..n)
            .map(|i| RgbImage::from_pixel(32, 24, Rgb([(i * 10) as u8, 0, 0])))
            .collect()
    }

    fn drain(rx: &crate::camera::MailboxReceiver) -> Vec<Sample> {
        let mut out = Vec::new();
        while let Received::Sample(s) = rx.receive() {
            out.push(s);
        }
        out
    }

    #[test]
    fn test_display_worker_publishes_every_frame() {
        let token = CancellationToken::new();
        let (tx, rx) = mailbox(&token);
        let worker = CameraWorker::<_, LucasKanade>::new(
            "wide",
            MemorySource::new(frames(4)),
            WorkerMode::Display { crop: None, weight: 1 },
            tx,
            token,
        );
        let handle = thread::spawn(move || worker.run());
        let samples = drain(&rx);
        let report = handle.join().unwrap();

        assert_eq!(samples.len(), 4);
        assert!(samples.iter().all(|s| s.score.score == 0.0));
        assert_eq!(report.exit, WorkerExit::EndOfStream);
        assert_eq!((report.frames_read, report.published), (4, 4));
    }

    #[test]
    fn test_display_worker_crops() {
        let token = CancellationToken::new();
        let (tx, rx) = mailbox(&token);
        let crop = Some(CropRect::from_bounds([0, 0, 16, 12]));
        let worker = CameraWorker::<_, LucasKanade>::new(
            "wide",
            MemorySource::new(frames(1)),
            WorkerMode::Display { crop, weight: 1 },
            tx,
            token,
        );
        let handle = thread::spawn(move || worker.run());
        let samples = drain(&rx);
        handle.join().unwrap();
        assert_eq!(samples[0].frame.image.dimensions(), (16, 12));
    }

    #[test]
    fn test_analyzed_worker_skips_first_frame() {
        let token = CancellationToken::new();
        let (tx, rx) = mailbox(&token);
        let worker = CameraWorker::new(
            "top1",
            MemorySource::new(frames(3)),
            WorkerMode::Analyze(MotionAnalyzer::new(None, 1, 0.0)),
            tx,
            token,
        );
        let handle = thread::spawn(move || worker.run());
        let samples = drain(&rx);
        let report = handle.join().unwrap();
        assert_eq!(samples.len(), 2);
        // 原始整帧被发布, 而不是处理后的帧
        assert_eq!(samples[0].frame.seq, 1);
        assert_eq!(samples[0].frame.image.dimensions(), (32, 24));
        assert_eq!((report.frames_read, report.published), (3, 2));
    }

    struct FailingSource;

    impl VideoSource for FailingSource {
        fn read(&mut self) -> Result<Option<VideoFrame>, SourceError> {
            Err(SourceError::Decode("broken".to_string()))
        }

        fn is_open(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_source_failure_closes_mailbox() {
        let token = CancellationToken::new();
        let (tx, rx) = mailbox(&token);
        let worker = CameraWorker::<_, LucasKanade>::new(
            "bad",
            FailingSource,
            WorkerMode::Display { crop: None, weight: 1 },
            tx,
            token,
        );
        let report = worker.run();
        assert!(matches!(report.exit, WorkerExit::SourceFailed(_)));
        assert!(matches!(rx.receive(), Received::Closed));
    }

    #[test]
    fn test_cancelled_before_processing() {
        let token = CancellationToken::new();
        let (tx, _rx) = mailbox(&token);
        token.cancel();
        let worker = CameraWorker::<_, LucasKanade>::new(
            "wide",
            MemorySource::new(frames(3)),
            WorkerMode::Display { crop: None, weight: 1 },
            tx,
            token,
        );
        let report = worker.run();
        assert_eq!(report.exit, WorkerExit::Cancelled);
        assert_eq!(report.published, 0);
    }

    struct PanickingObserver;

    impl AnalysisObserver for PanickingObserver {
        fn observe(&mut self, _: &AnalysisView<'_>) -> Result<(), OutputError> {
            panic!("render failure");
        }
    }

    #[test]
    fn test_observer_panic_does_not_stop_scoring() {
        let token = CancellationToken::new();
        let (tx, rx) = mailbox(&token);
        let worker = CameraWorker::new(
            "top1",
            MemorySource::new(frames(4)),
            WorkerMode::Analyze(MotionAnalyzer::new(None, 1, 0.0)),
            tx,
            token,
        )
        .with_observer(Box::new(PanickingObserver));
        let handle = thread::spawn(move || worker.run());
        let samples = drain(&rx);
        let report = handle.join().unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(report.exit, WorkerExit::EndOfStream);
    }
}
