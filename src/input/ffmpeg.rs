/// FFmpeg 拉流解码器
/// RTSP / container file / capture device decoding through ez-ffmpeg.
///
/// Decoding runs on its own thread inside the FFmpeg scheduler. The frame
/// filter converts each YUV420P frame to RGB and hands it over a bounded
/// channel, so the decoder never runs more than a few frames ahead of the
/// camera worker. Dropping the source closes the channel and the filter stops
/// the pipeline on its next frame.
use super::VideoSource;
use crate::error::SourceError;
use crate::frame::VideoFrame;
use crate::utils::yuv::{planar_to_rgb, ChromaLayout};
use crossbeam_channel::{bounded, Receiver, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Frame, Input};
use image::RgbImage;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

const QUEUE_DEPTH: usize = 2;

pub struct FfmpegSource {
    uri: String,
    frames: Receiver<RgbImage>,
    seq: u64,
    open: bool,
}

impl FfmpegSource {
    /// Builds and starts the FFmpeg pipeline; fails if the input cannot be opened.
    pub fn open(uri: &str) -> Result<Self, SourceError> {
        let (frame_tx, frame_rx) = bounded(QUEUE_DEPTH);
        let (open_tx, open_rx) = bounded::<Result<(), String>>(1);
        let url = uri.to_string();

        thread::Builder::new()
            .name(format!("ffmpeg-{}", short_name(uri)))
            .spawn(move || {
                let filter = DecodeFilter::new(url.clone(), frame_tx);
                let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
                let pipe = pipe.filter("decode", Box::new(filter));
                let out = create_null_output().add_frame_pipeline(pipe);

                let ctx = match FfmpegContext::builder()
                    .input(make_input(&url))
                    .filter_descs(["format=yuv420p"].into())
                    .output(out)
                    .build()
                {
                    Ok(ctx) => ctx,
                    Err(e) => {
                        let _ = open_tx.send(Err(format!("build failed: {e}")));
                        return;
                    }
                };
                let sch = match ctx.start() {
                    Ok(sch) => sch,
                    Err(e) => {
                        let _ = open_tx.send(Err(format!("start failed: {e}")));
                        return;
                    }
                };
                let _ = open_tx.send(Ok(()));
                if let Err(e) = sch.wait() {
                    debug!("ffmpeg '{}' finished: {}", url, e);
                }
            })
            .map_err(|e| SourceError::open(uri, e.to_string()))?;

        match open_rx.recv() {
            Ok(Ok(())) => {
                info!("📹 FFmpeg source '{}' opened", uri);
                Ok(Self {
                    uri: uri.to_string(),
                    frames: frame_rx,
                    seq: 0,
                    open: true,
                })
            }
            Ok(Err(reason)) => Err(SourceError::open(uri, reason)),
            Err(_) => Err(SourceError::open(uri, "decoder thread exited")),
        }
    }
}

impl VideoSource for FfmpegSource {
    fn read(&mut self) -> Result<Option<VideoFrame>, SourceError> {
        if !self.open {
            return Ok(None);
        }
        match self.frames.recv() {
            Ok(image) => {
                let frame = VideoFrame::new(image, self.seq);
                self.seq += 1;
                Ok(Some(frame))
            }
            Err(_) => {
                // 解码线程结束: 流结束
                self.open = false;
                debug!("'{}' end of stream after {} frames", self.uri, self.seq);
                Ok(None)
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

fn make_input(url: &str) -> Input {
    if url.starts_with("rtsp://") || url.starts_with("rtsps://") {
        Input::new(url).set_input_opts(
            [
                ("rtsp_transport", "tcp"),
                ("buffer_size", "67108864"),
                ("rtsp_flags", "prefer_tcp"),
            ]
            .into(),
        )
    } else if url.starts_with("/dev/video") {
        Input::new(url).set_format("v4l2")
    } else if url.starts_with("video=") {
        Input::new(url).set_format("dshow")
    } else {
        Input::new(url)
    }
}

fn short_name(uri: &str) -> String {
    uri.rsplit(['/', '\\']).next().unwrap_or(uri).chars().take(12).collect()
}

/// FFmpeg解码过滤器: YUV420P帧 → RGB图像
struct DecodeFilter {
    url: String,
    tx: Sender<RgbImage>,
    planes: Vec<u8>,
    count: usize,
    total_frames: usize,
    dropped_frames: usize,
    last: Instant,
}

impl DecodeFilter {
    fn new(url: String, tx: Sender<RgbImage>) -> Self {
        Self {
            url,
            tx,
            planes: Vec::new(),
            count: 0,
            total_frames: 0,
            dropped_frames: 0,
            last: Instant::now(),
        }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        debug!("✅ decode thread started for '{}'", self.url);
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        self.total_frames += 1;

        let image = unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                return Ok(None);
            }
            let raw = &*frame.as_ptr();
            let (w, h) = (raw.width as usize, raw.height as usize);
            let y_stride = raw.linesize[0] as usize;
            let uv_stride = raw.linesize[1] as usize;
            if w == 0
                || h == 0
                || raw.data[0].is_null()
                || raw.data[1].is_null()
                || raw.data[2].is_null()
                || y_stride < w
                || uv_stride < w.div_ceil(2)
            {
                self.dropped_frames += 1;
                if self.total_frames <= 10 {
                    warn!("⚠️  '{}' dropped frame #{}: bad plane layout", self.url, self.total_frames);
                }
                return Ok(None);
            }

            // 按行拷贝去掉步长填充, 得到紧凑的 Y/U/V 平面
            let (cw, ch) = ChromaLayout::Yuv420.chroma_size(w, h);
            self.planes.clear();
            self.planes.reserve(ChromaLayout::Yuv420.frame_len(w, h));
            for row in 0..h {
                let src = std::slice::from_raw_parts(raw.data[0].add(row * y_stride), w);
                self.planes.extend_from_slice(src);
            }
            for plane in [raw.data[1], raw.data[2]] {
                for row in 0..ch {
                    let src = std::slice::from_raw_parts(plane.add(row * uv_stride), cw);
                    self.planes.extend_from_slice(src);
                }
            }
            planar_to_rgb(&self.planes, w as u32, h as u32, ChromaLayout::Yuv420)
        };

        let Some(image) = image else {
            self.dropped_frames += 1;
            return Ok(None);
        };

        self.count += 1;
        if self.last.elapsed().as_secs_f64() >= 1.0 {
            let elapsed = self.last.elapsed().as_secs_f64();
            debug!(
                "📺 '{}' decode: {:.1}fps | total {} | dropped {}",
                self.url,
                self.count as f64 / elapsed,
                self.total_frames,
                self.dropped_frames
            );
            self.last = Instant::now();
            self.count = 0;
        }

        // 接收端已关闭(摄像头线程退出): 停止解码
        if self.tx.send(image).is_err() {
            return Err("receiver closed".to_string());
        }
        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        if self.total_frames == 0 {
            error!("❌ '{}' produced no frames", self.url);
        }
        debug!("✅ decode thread for '{}' exited", self.url);
    }
}
