//! 导播引擎 (process wiring)
//!
//! 系统架构:
//! 1. 摄像头线程: 每个机位一个, 读取 → 分析 → 发布到单槽邮箱
//! 2. 协调线程:   顺序轮询邮箱, 投票, 输出
//! 3. 主线程:     预览窗口 (可选)
//!
//! Everything that can fail at startup (opening cameras, association
//! integrity, opening the writer) happens in [`Director::prepare`], before any
//! thread is spawned.

use crate::camera::{mailbox, CameraWorker, WorkerMode, WorkerReport};
use crate::config::{CameraConfig, SceneConfig};
use crate::error::{DirectorError, DirectorResult};
use crate::frame::CropRect;
use crate::input::{open_source, VideoSource};
use crate::lifecycle::CancellationToken;
use crate::motion::{DebugCompositeObserver, MotionAnalyzer};
use crate::output::overlay::load_font;
use crate::output::preview::{PreviewHandle, PreviewPane};
use crate::output::{open_writer, FpsLog, MonitorComposer, OutputSink};
use crate::switcher::{AssociationMap, CameraSlot, Coordinator, CoordinatorReport};
use crate::utils::gen_time_string;
use ab_glyph::FontArc;
use crossbeam_channel::select;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Opens every configured camera in order. The first failure aborts startup.
pub fn open_cameras(config: &SceneConfig) -> DirectorResult<Vec<Box<dyn VideoSource>>> {
    config
        .cameras
        .iter()
        .map(|cam| {
            let source = open_source(&cam.uri).map_err(|source| DirectorError::SourceOpen {
                name: cam.name.clone(),
                source,
            })?;
            info!("📹 camera '{}' opened: {}", cam.name, cam.uri);
            Ok(source)
        })
        .collect()
}

fn crop_of(cam: &CameraConfig) -> Option<CropRect> {
    cam.crop.map(CropRect::from_bounds)
}

fn weight_of(cam: &CameraConfig) -> u32 {
    u32::try_from(cam.weight).unwrap_or(1)
}

/// Joins worker threads, logging the ones that panicked.
fn join_all(handles: Vec<(String, JoinHandle<WorkerReport>)>) -> Vec<WorkerReport> {
    handles
        .into_iter()
        .filter_map(|(name, handle)| match handle.join() {
            Ok(report) => Some(report),
            Err(_) => {
                error!("❌ camera thread '{}' panicked", name);
                None
            }
        })
        .collect()
}

#[derive(Debug)]
pub struct RunReport {
    pub coordinator: CoordinatorReport,
    pub workers: Vec<WorkerReport>,
}

/// A scene whose cameras and outputs are open, ready to run.
pub struct Director {
    config: SceneConfig,
    sources: Vec<Box<dyn VideoSource>>,
    associations: AssociationMap,
    sink: OutputSink,
    font: Option<FontArc>,
    token: CancellationToken,
}

impl Director {
    pub fn prepare(config: SceneConfig, token: CancellationToken) -> DirectorResult<Self> {
        let associations = AssociationMap::from_config(&config)?;
        let sources = open_cameras(&config)?;

        let out = &config.out;
        let writer = open_writer(&out.path, &out.codec, out.fps, (out.width, out.height))?;
        let mut sink = OutputSink::new(writer, (out.width, out.height));

        if let Some(path) = &config.general.fps_log_path {
            sink = sink.with_fps_log(FpsLog::create(path)?);
            info!("📈 fps log: {}", path.display());
        }

        let needs_font =
            config.general.display_all_captures || config.cameras.iter().any(|c| c.display_analysis);
        let font = if needs_font {
            load_font(config.general.font_path.as_deref())
        } else {
            None
        };
        if config.general.display_all_captures {
            sink = sink.with_monitor(
                MonitorComposer::new(font.clone()),
                config.general.monitor_path.clone(),
                out.fps,
            );
        }

        Ok(Self {
            config,
            sources,
            associations,
            sink,
            font,
            token,
        })
    }

    /// Mirrors the output (and the monitor composite) to a preview window.
    pub fn with_preview(mut self, preview: PreviewHandle) -> Self {
        self.sink = self.sink.with_preview(preview);
        self
    }

    /// Spawns the camera threads, runs the coordinator on the calling thread,
    /// then cancels and joins every camera thread.
    pub fn run(self) -> DirectorResult<RunReport> {
        let Self {
            config,
            sources,
            associations,
            sink,
            font,
            token,
        } = self;
        info!("🚀 run {} started", gen_time_string("_"));

        let mut slots = Vec::with_capacity(sources.len());
        let mut handles = Vec::with_capacity(sources.len());
        for (cam, source) in config.cameras.iter().zip(sources) {
            let (tx, rx) = mailbox(&token);
            let analyzed = cam.role.is_analyzed();
            slots.push(CameraSlot::new(cam.name.clone(), analyzed, rx));

            let mode = if analyzed {
                WorkerMode::Analyze(MotionAnalyzer::new(crop_of(cam), weight_of(cam), config.general.alpha))
            } else {
                WorkerMode::Display {
                    crop: crop_of(cam),
                    weight: weight_of(cam),
                }
            };
            let mut worker = CameraWorker::new(cam.name.clone(), source, mode, tx, token.clone());
            if cam.display_analysis && analyzed {
                let path = config.general.analysis_dir.join(format!("{}.y4m", cam.name));
                info!("🔬 analysis of '{}' -> {}", cam.name, path.display());
                worker = worker.with_observer(Box::new(DebugCompositeObserver::new(
                    path,
                    config.out.fps,
                    font.clone(),
                )));
            }

            let spawned = thread::Builder::new()
                .name(format!("cam-{}", cam.name))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => handles.push((cam.name.clone(), handle)),
                Err(e) => {
                    token.cancel();
                    drop(slots);
                    join_all(handles);
                    return Err(DirectorError::Spawn {
                        name: cam.name.clone(),
                        source: e,
                    });
                }
            }
        }

        let coordinator = Coordinator::new(slots, associations, config.window_length(), sink, token.clone());
        let report = coordinator.run();

        // 显示机位和仍在读取的机位需要取消信号才能退出
        token.cancel();
        let workers = join_all(handles);
        info!("✅ all {} camera thread(s) joined", workers.len());
        Ok(RunReport {
            coordinator: report,
            workers,
        })
    }
}

/// `-d` mode: every camera straight to the preview grid, no scoring or switching.
pub struct Passthrough {
    names: Vec<String>,
    sources: Vec<Box<dyn VideoSource>>,
}

impl Passthrough {
    pub fn open(config: &SceneConfig) -> DirectorResult<Self> {
        Ok(Self {
            names: config.cameras.iter().map(|c| c.name.clone()).collect(),
            sources: open_cameras(config)?,
        })
    }

    /// Returns the number of frames handed to the preview. Ends when every
    /// source has ended, the preview is closed, or the run is cancelled.
    pub fn run(self, preview: PreviewHandle, token: CancellationToken) -> DirectorResult<u64> {
        let mut handles = Vec::with_capacity(self.sources.len());
        for (slot, (name, source)) in self.names.into_iter().zip(self.sources).enumerate() {
            let camera_preview = preview.clone();
            let camera_token = token.clone();
            let camera_name = name.clone();
            let spawned = thread::Builder::new()
                .name(format!("cam-{}", name))
                .spawn(move || pump(slot, &camera_name, source, &camera_preview, &camera_token));
            match spawned {
                Ok(handle) => handles.push((name, handle)),
                Err(e) => {
                    token.cancel();
                    join_counts(handles);
                    return Err(DirectorError::Spawn { name, source: e });
                }
            }
        }
        // 所有发送端释放后预览窗口自动关闭
        drop(preview);

        let total = join_counts(handles);
        info!("✅ passthrough finished: {} frame(s) shown", total);
        Ok(total)
    }
}

fn join_counts(handles: Vec<(String, JoinHandle<u64>)>) -> u64 {
    let mut total = 0;
    for (name, handle) in handles {
        match handle.join() {
            Ok(count) => total += count,
            Err(_) => error!("❌ camera thread '{}' panicked", name),
        }
    }
    total
}

/// Reads one camera into its preview slot, paced at the source frame rate.
fn pump(
    slot: usize,
    name: &str,
    mut source: Box<dyn VideoSource>,
    preview: &PreviewHandle,
    token: &CancellationToken,
) -> u64 {
    let interval = source
        .frame_rate()
        .filter(|fps| *fps > 0.0)
        .map(|fps| Duration::from_secs_f64(1.0 / fps));
    let mut shown = 0u64;
    let mut next = Instant::now();

    loop {
        let frame = match source.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!("⚠️  camera '{}' read failed: {}", name, e);
                break;
            }
        };
        if token.is_cancelled() {
            break;
        }
        let pane = PreviewPane {
            slot,
            title: name.to_string(),
            caption: format!("{}x{} #{}", frame.width(), frame.height(), frame.seq),
            image: frame.image,
        };
        if preview.show(pane).is_err() {
            break;
        }
        shown += 1;

        if let Some(interval) = interval {
            next += interval;
            let wait = next.saturating_duration_since(Instant::now());
            select! {
                recv(token.receiver()) -> _ => break,
                default(wait) => {}
            }
        }
    }
    info!("📴 camera '{}' passthrough ended after {} frame(s)", name, shown);
    shown
}
