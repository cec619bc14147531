//! 切换协调器 (switch coordinator)
//!
//! One cycle = one sequential pass over the active cameras in configuration
//! order. Each mailbox is drained exactly once per cycle, so a slow camera
//! holds back the whole cycle. The per-cycle winner is voted into
//! [`SwitchState`]; the committed camera is forwarded to the sink every cycle,
//! through its associated display cameras when one is still live.

use super::association::AssociationMap;
use super::selection::CycleSelection;
use super::votes::SwitchState;
use crate::camera::{MailboxReceiver, Received};
use crate::frame::VideoFrame;
use crate::lifecycle::CancellationToken;
use crate::motion::ScoreSample;
use crate::output::{FrameSink, MonitorTile, OnAir};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Monitor composite and displayed FPS are refreshed at this cadence.
pub const REFRESH_CYCLES: u64 = 15;

/// Coordinator side of one camera.
pub struct CameraSlot {
    name: String,
    analyzed: bool,
    mailbox: MailboxReceiver,
    active: bool,
    latest: Option<VideoFrame>,
    last_sample: Option<ScoreSample>,
}

impl CameraSlot {
    pub fn new(name: impl Into<String>, analyzed: bool, mailbox: MailboxReceiver) -> Self {
        Self {
            name: name.into(),
            analyzed,
            mailbox,
            active: true,
            latest: None,
            last_sample: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorExit {
    /// No analyzed camera is left.
    AllCamerasEnded,
    Cancelled,
    /// The sink failed; the run was cancelled.
    OutputFailed(String),
}

#[derive(Debug, Clone)]
pub struct CoordinatorReport {
    pub cycles: u64,
    pub switches: u64,
    pub presented: u64,
    pub committed: String,
    pub exit: CoordinatorExit,
}

/// Instantaneous and smoothed cycle rate.
struct CycleClock {
    last: Instant,
    window_start: Instant,
    window_cycles: u64,
    display_fps: f64,
}

impl CycleClock {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            last: now,
            window_start: now,
            window_cycles: 0,
            display_fps: 0.0,
        }
    }

    /// Returns `(cycle_fps, display_fps)` for the cycle that just completed.
    fn tick(&mut self) -> (f64, f64) {
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f64();
        self.last = now;
        let cycle_fps = if dt > 0.0 { 1.0 / dt } else { 0.0 };

        self.window_cycles += 1;
        if self.window_cycles >= REFRESH_CYCLES {
            let elapsed = now.duration_since(self.window_start).as_secs_f64();
            if elapsed > 0.0 {
                self.display_fps = self.window_cycles as f64 / elapsed;
            }
            self.window_start = now;
            self.window_cycles = 0;
        } else if self.display_fps == 0.0 {
            self.display_fps = cycle_fps;
        }
        (cycle_fps, self.display_fps)
    }
}

pub struct Coordinator<S: FrameSink> {
    cameras: Vec<CameraSlot>,
    associations: AssociationMap,
    state: SwitchState,
    sink: S,
    token: CancellationToken,
}

impl<S: FrameSink> Coordinator<S> {
    /// The on-air camera starts as the first analyzed camera.
    pub fn new(
        cameras: Vec<CameraSlot>,
        associations: AssociationMap,
        window: usize,
        sink: S,
        token: CancellationToken,
    ) -> Self {
        let initial = cameras.iter().position(|c| c.analyzed).unwrap_or(0);
        let state = SwitchState::new(cameras.len(), window, initial);
        Self {
            cameras,
            associations,
            state,
            sink,
            token,
        }
    }

    /// Runs cycles until every analyzed camera has ended, the run is
    /// cancelled, or the sink fails. Dropping `self` closes every mailbox.
    pub fn run(mut self) -> CoordinatorReport {
        info!(
            "🎬 coordinator started: {} camera(s), window {} cycles, on air '{}'",
            self.cameras.len(),
            self.state.window(),
            self.committed_name()
        );
        let mut clock = CycleClock::new();
        let mut switches = 0u64;
        let mut presented = 0u64;

        let exit = loop {
            let Some(selection) = self.poll_cycle() else {
                break CoordinatorExit::Cancelled;
            };
            let Some(winner) = selection.winner() else {
                break CoordinatorExit::AllCamerasEnded;
            };

            let before = self.state.committed();
            if let Some(committed) = self.state.record(winner) {
                if committed != before {
                    switches += 1;
                    info!(
                        "🔀 cycle {}: on air '{}' -> '{}'",
                        self.state.cycle(),
                        self.cameras[before].name,
                        self.cameras[committed].name
                    );
                }
            }
            let cycle = self.state.cycle();
            let (cycle_fps, display_fps) = clock.tick();

            let committed = self.state.committed();
            let source = self.forward_source(committed);
            if let Some(source) = source {
                let slot = &self.cameras[source];
                if let Some(frame) = slot.latest.as_ref() {
                    let on_air = OnAir {
                        camera: &self.cameras[committed].name,
                        source: &slot.name,
                        frame,
                        cycle,
                        cycle_fps,
                        display_fps,
                    };
                    if let Err(e) = self.sink.present(&on_air) {
                        error!("❌ output failed at cycle {}: {}", cycle, e);
                        self.token.cancel();
                        break CoordinatorExit::OutputFailed(e.to_string());
                    }
                    presented += 1;
                }
            } else {
                debug!("cycle {}: '{}' has no frame yet", cycle, self.committed_name());
            }

            if cycle % REFRESH_CYCLES == 0 {
                debug!("📊 cycle {}: {:.1} fps, votes {:?}", cycle, display_fps, self.state.votes());
                if self.sink.monitor_enabled() {
                    self.refresh_monitor(committed, source);
                }
            }
        };

        if let Err(e) = self.sink.finish() {
            error!("❌ output finish failed: {}", e);
        }
        info!(
            "✅ coordinator exited ({:?}) after {} cycles, {} switches",
            exit,
            self.state.cycle(),
            switches
        );
        CoordinatorReport {
            cycles: self.state.cycle(),
            switches,
            presented,
            committed: self.committed_name().to_string(),
            exit,
        }
    }

    /// Drains every active mailbox once, in order. `None` on cancellation.
    fn poll_cycle(&mut self) -> Option<CycleSelection> {
        let mut selection = CycleSelection::new();
        for (idx, slot) in self.cameras.iter_mut().enumerate() {
            if !slot.active {
                continue;
            }
            match slot.mailbox.receive() {
                Received::Sample(sample) => {
                    if slot.analyzed {
                        selection.offer(idx, sample.score.score);
                    }
                    slot.last_sample = Some(sample.score);
                    slot.latest = Some(sample.frame);
                }
                Received::Closed => {
                    slot.active = false;
                    info!("📴 camera '{}' inactive", slot.name);
                }
                Received::Cancelled => return None,
            }
        }
        Some(selection)
    }

    /// Picks the camera whose frame goes on air for `committed`:
    /// an active associated display camera, else the committed camera itself.
    /// Frames of ended cameras are used only when nothing live is left.
    fn forward_source(&self, committed: usize) -> Option<usize> {
        let candidates = || {
            self.associations
                .displays_for(committed)
                .iter()
                .copied()
                .chain(std::iter::once(committed))
        };
        let has_frame = |idx: usize| self.cameras.get(idx).is_some_and(|c| c.latest.is_some());
        let is_active = |idx: usize| self.cameras.get(idx).is_some_and(|c| c.active);

        candidates()
            .find(|&idx| is_active(idx) && has_frame(idx))
            .or_else(|| candidates().find(|&idx| has_frame(idx)))
    }

    fn refresh_monitor(&mut self, committed: usize, source: Option<usize>) {
        let tiles: Vec<MonitorTile<'_>> = self
            .cameras
            .iter()
            .enumerate()
            .map(|(idx, slot)| MonitorTile {
                name: &slot.name,
                frame: slot.latest.as_ref().map(|f| f.image.as_ref()),
                sample: slot.last_sample,
                analyzed: slot.analyzed,
                on_air: idx == committed || Some(idx) == source,
                active: slot.active,
            })
            .collect();
        if let Err(e) = self.sink.refresh_monitor(&tiles) {
            warn!("⚠️  monitor refresh failed: {}", e);
        }
    }

    fn committed_name(&self) -> &str {
        self.cameras
            .get(self.state.committed())
            .map(|c| c.name.as_str())
            .unwrap_or("-")
    }
}
