//! 持久化输出 (Persistent writers)
//!
//! `open_writer` picks the backend from the output path:
//! - `*.y4m`: YUV4MPEG2 4:2:0, written directly
//! - no extension: numbered PNG files in that directory
//! - anything else: the `ffmpeg` CLI, fed raw RGB24 frames on stdin

use crate::error::OutputError;
use crate::utils::yuv::rgb_to_yuv420;
use image::RgbImage;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use tracing::{debug, info, warn};

pub trait FrameWriter: Send {
    /// Appends one frame. Frames must match the size the writer was opened with.
    fn write(&mut self, frame: &RgbImage) -> Result<(), OutputError>;

    /// Flushes and closes the stream. Further writes are invalid.
    fn finish(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn frames_written(&self) -> u64;
}

/// Opens the writer for `path`, creating parent directories as needed.
pub fn open_writer(
    path: &Path,
    codec: &str,
    fps: f64,
    size: (u32, u32),
) -> Result<Box<dyn FrameWriter>, OutputError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let writer: Box<dyn FrameWriter> = match ext.as_deref() {
        Some("y4m") => Box::new(Y4mWriter::create(path, fps, size)?),
        None => Box::new(ImageSequenceWriter::create(path, size)?),
        Some(_) => Box::new(FfmpegPipeWriter::spawn(path, codec, fps, size)?),
    };
    info!(
        "💾 writing {}x{} @ {} fps to {}",
        size.0,
        size.1,
        fps,
        path.display()
    );
    Ok(writer)
}

fn ensure_parent(path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn check_size(expected: (u32, u32), frame: &RgbImage) -> Result<(), OutputError> {
    if frame.dimensions() != expected {
        return Err(OutputError::SizeMismatch {
            width: expected.0,
            height: expected.1,
            got_width: frame.width(),
            got_height: frame.height(),
        });
    }
    Ok(())
}

/// `F<num>:<den>` with millisecond precision for fractional rates.
fn frame_rate_ratio(fps: f64) -> (u64, u64) {
    if (fps - fps.round()).abs() < 1e-6 {
        ((fps.round() as u64).max(1), 1)
    } else {
        (((fps * 1000.0).round() as u64).max(1), 1000)
    }
}

/// YUV4MPEG2 writer (4:2:0, full range).
pub struct Y4mWriter {
    out: Option<BufWriter<File>>,
    size: (u32, u32),
    written: u64,
}

impl Y4mWriter {
    pub fn create(path: &Path, fps: f64, size: (u32, u32)) -> Result<Self, OutputError> {
        ensure_parent(path)?;
        let mut out = BufWriter::new(File::create(path)?);
        let (num, den) = frame_rate_ratio(fps);
        writeln!(
            out,
            "YUV4MPEG2 W{} H{} F{}:{} Ip A1:1 C420jpeg",
            size.0, size.1, num, den
        )?;
        Ok(Self {
            out: Some(out),
            size,
            written: 0,
        })
    }
}

impl FrameWriter for Y4mWriter {
    fn write(&mut self, frame: &RgbImage) -> Result<(), OutputError> {
        check_size(self.size, frame)?;
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| OutputError::Encoder("y4m stream already finished".to_string()))?;
        out.write_all(b"FRAME\n")?;
        out.write_all(&rgb_to_yuv420(frame))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), OutputError> {
        if let Some(mut out) = self.out.take() {
            out.flush()?;
        }
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }
}

impl Drop for Y4mWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("⚠️  y4m flush failed: {}", e);
        }
    }
}

/// 图片序列输出: `<dir>/000000.png`, `<dir>/000001.png`, ...
pub struct ImageSequenceWriter {
    dir: PathBuf,
    size: (u32, u32),
    written: u64,
}

impl ImageSequenceWriter {
    pub fn create(dir: &Path, size: (u32, u32)) -> Result<Self, OutputError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            size,
            written: 0,
        })
    }
}

impl FrameWriter for ImageSequenceWriter {
    fn write(&mut self, frame: &RgbImage) -> Result<(), OutputError> {
        check_size(self.size, frame)?;
        let path = self.dir.join(format!("{:06}.png", self.written));
        frame.save(&path)?;
        self.written += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }
}

/// FFmpeg CLI encoder: raw RGB24 on stdin → `path` with `-c:v <codec>`.
pub struct FfmpegPipeWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    path: PathBuf,
    size: (u32, u32),
    written: u64,
}

impl FfmpegPipeWriter {
    pub fn spawn(path: &Path, codec: &str, fps: f64, size: (u32, u32)) -> Result<Self, OutputError> {
        let ffmpeg = which::which("ffmpeg").map_err(|_| OutputError::FfmpegNotFound(path.to_path_buf()))?;
        ensure_parent(path)?;

        let args = build_args(path, codec, fps, size);
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| OutputError::Encoder("ffmpeg stdin not captured".to_string()))?;
        Ok(Self {
            child,
            stdin: Some(stdin),
            path: path.to_path_buf(),
            size,
            written: 0,
        })
    }
}

fn build_args(path: &Path, codec: &str, fps: f64, size: (u32, u32)) -> Vec<String> {
    let mut args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-y",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgb24",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.extend([
        "-s".to_string(),
        format!("{}x{}", size.0, size.1),
        "-r".to_string(),
        format!("{fps}"),
        "-i".to_string(),
        "-".to_string(),
        "-c:v".to_string(),
        codec.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ]);
    args.push(path.display().to_string());
    args
}

impl FrameWriter for FfmpegPipeWriter {
    fn write(&mut self, frame: &RgbImage) -> Result<(), OutputError> {
        check_size(self.size, frame)?;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| OutputError::Encoder("ffmpeg stream already finished".to_string()))?;
        stdin
            .write_all(frame.as_raw())
            .map_err(|e| OutputError::Encoder(format!("ffmpeg pipe closed: {e}")))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), OutputError> {
        let Some(stdin) = self.stdin.take() else {
            return Ok(());
        };
        // 关闭 stdin 让 ffmpeg 写完文件尾
        drop(stdin);
        let status = self.child.wait()?;
        if !status.success() {
            return Err(OutputError::Encoder(format!(
                "ffmpeg exited with {} while writing {}",
                status,
                self.path.display()
            )));
        }
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }
}

impl Drop for FfmpegPipeWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("⚠️  {}", e);
        }
    }
}
