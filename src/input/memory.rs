use super::VideoSource;
use crate::error::SourceError;
use crate::frame::VideoFrame;
use image::RgbImage;
use std::collections::VecDeque;

/// 内存帧源: 按顺序返回预先提供的帧, 用尽即结束
pub struct MemorySource {
    frames: VecDeque<RgbImage>,
    seq: u64,
    frame_rate: Option<f64>,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = RgbImage>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            seq: 0,
            frame_rate: None,
        }
    }

    pub fn with_frame_rate(mut self, fps: f64) -> Self {
        self.frame_rate = Some(fps);
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl VideoSource for MemorySource {
    fn read(&mut self) -> Result<Option<VideoFrame>, SourceError> {
        Ok(self.frames.pop_front().map(|image| {
            let frame = VideoFrame::new(image, self.seq);
            self.seq += 1;
            frame
        }))
    }

    fn is_open(&self) -> bool {
        !self.frames.is_empty()
    }

    fn frame_rate(&self) -> Option<f64> {
        self.frame_rate
    }
}
