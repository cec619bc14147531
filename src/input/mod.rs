/// 视频输入系统 (Video Input System)
///
/// 每个摄像头拥有一个 `VideoSource`, 由其工作线程独占读取
/// - Y4mSource: YUV4MPEG2 文件 (内置解析)
/// - ImageSequenceSource: 图片序列目录
/// - FfmpegSource: RTSP / 容器文件 / 本地设备 (需要 `ffmpeg` 特性)
/// - MemorySource: 内存帧 (测试与回放)
pub mod memory;
pub mod sequence;
pub mod y4m;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub use memory::MemorySource;
pub use sequence::ImageSequenceSource;
pub use y4m::Y4mSource;

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegSource;

use crate::error::SourceError;
use crate::frame::VideoFrame;
use std::path::Path;

/// Capability set a camera worker needs from its video source.
pub trait VideoSource: Send {
    /// Next frame, or `Ok(None)` at end of stream. After `Ok(None)` or an
    /// error the source is closed and must not be read again.
    fn read(&mut self) -> Result<Option<VideoFrame>, SourceError>;

    fn is_open(&self) -> bool;

    /// Nominal frame rate when the container declares one.
    fn frame_rate(&self) -> Option<f64> {
        None
    }
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn read(&mut self) -> Result<Option<VideoFrame>, SourceError> {
        (**self).read()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn frame_rate(&self) -> Option<f64> {
        (**self).frame_rate()
    }
}

/// Opens the source for `uri`, dispatching on its shape:
/// `*.y4m` file, image directory, or (with the `ffmpeg` feature) anything FFmpeg can read.
pub fn open_source(uri: &str) -> Result<Box<dyn VideoSource>, SourceError> {
    let path = Path::new(uri);
    let is_y4m = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("y4m"));

    if is_y4m {
        return Ok(Box::new(Y4mSource::open(path)?));
    }
    if path.is_dir() {
        return Ok(Box::new(ImageSequenceSource::open(path)?));
    }

    #[cfg(feature = "ffmpeg")]
    {
        Ok(Box::new(FfmpegSource::open(uri)?))
    }

    #[cfg(not(feature = "ffmpeg"))]
    {
        Err(SourceError::open(
            uri,
            "unsupported source (only .y4m files and image directories are built in, rebuild with --features ffmpeg)",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_y4m_fails() {
        let err = open_source("/definitely/not/here.y4m").err().unwrap();
        assert!(matches!(err, SourceError::Open { .. }));
    }

    #[test]
    fn test_open_directory() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::new(4, 4)
            .save(dir.path().join("0001.png"))
            .unwrap();
        let mut src = open_source(dir.path().to_str().unwrap()).unwrap();
        assert!(src.is_open());
        assert!(src.read().unwrap().is_some());
        assert!(src.read().unwrap().is_none());
        assert!(!src.is_open());
    }

    #[cfg(not(feature = "ffmpeg"))]
    #[test]
    fn test_unsupported_uri_without_ffmpeg() {
        assert!(matches!(
            open_source("rtsp://127.0.0.1/live"),
            Err(SourceError::Open { .. })
        ));
    }
}
