//! YUV4MPEG2 解码 (无需 FFmpeg)
//!
//! Stream header: `YUV4MPEG2 W<w> H<h> F<num>:<den> [I.. A.. C<colorspace> X..]`,
//! then repeated `FRAME[ params]\n` + planar 8-bit data.

use super::VideoSource;
use crate::error::SourceError;
use crate::frame::VideoFrame;
use crate::utils::yuv::{planar_to_rgb, ChromaLayout};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

const MAGIC: &str = "YUV4MPEG2";
const MAX_LINE: usize = 1024;
/// Largest accepted width or height (16K).
const MAX_DIMENSION: u32 = 16_384;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Y4mHeader {
    pub width: u32,
    pub height: u32,
    pub frame_rate: Option<f64>,
    pub layout: ChromaLayout,
}

impl Y4mHeader {
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut tokens = line.split_ascii_whitespace();
        if tokens.next() != Some(MAGIC) {
            return Err("missing YUV4MPEG2 signature".to_string());
        }
        let mut width = None;
        let mut height = None;
        let mut frame_rate = None;
        let mut layout = ChromaLayout::Yuv420;

        for token in tokens {
            let mut chars = token.chars();
            let tag = chars.next();
            let value = chars.as_str();
            match tag {
                Some('W') => width = value.parse::<u32>().ok(),
                Some('H') => height = value.parse::<u32>().ok(),
                Some('F') => {
                    if let Some((num, den)) = value.split_once(':') {
                        let num = num.parse::<f64>().unwrap_or(0.0);
                        let den = den.parse::<f64>().unwrap_or(0.0);
                        if num > 0.0 && den > 0.0 {
                            frame_rate = Some(num / den);
                        }
                    }
                }
                Some('C') => {
                    layout = match value {
                        "420" | "420jpeg" | "420paldv" | "420mpeg2" => ChromaLayout::Yuv420,
                        "422" => ChromaLayout::Yuv422,
                        "444" => ChromaLayout::Yuv444,
                        "mono" => ChromaLayout::Mono,
                        other => return Err(format!("unsupported colorspace C{other}")),
                    }
                }
                // 交错/像素比/扩展参数不影响解码
                _ => {}
            }
        }

        let (width, height) = match (width, height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => (width, height),
            _ => return Err("missing or invalid W/H in stream header".to_string()),
        };
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(format!("frame size overflow: {width}x{height}"));
        }
        layout
            .checked_frame_len(width as usize, height as usize)
            .ok_or_else(|| "frame size overflow".to_string())?;
        Ok(Self {
            width,
            height,
            frame_rate,
            layout,
        })
    }

    /// Always fits in memory: dimensions are bounded by [`Y4mHeader::parse`].
    pub fn frame_len(&self) -> usize {
        self.layout
            .frame_len(self.width as usize, self.height as usize)
    }
}

/// Reads a `.y4m` stream frame by frame.
pub struct Y4mSource<R: BufRead + Send = BufReader<File>> {
    reader: R,
    uri: String,
    header: Y4mHeader,
    buffer: Vec<u8>,
    seq: u64,
    open: bool,
}

impl Y4mSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let uri = path.display().to_string();
        let file = File::open(path).map_err(|e| SourceError::open(&uri, e.to_string()))?;
        Self::from_reader(BufReader::new(file), uri)
    }
}

impl<R: BufRead + Send> Y4mSource<R> {
    pub fn from_reader(mut reader: R, uri: impl Into<String>) -> Result<Self, SourceError> {
        let uri = uri.into();
        let line = read_line(&mut reader)
            .map_err(|e| SourceError::open(&uri, e.to_string()))?
            .ok_or_else(|| SourceError::open(&uri, "empty stream"))?;
        let header = Y4mHeader::parse(&line).map_err(|e| SourceError::open(&uri, e))?;
        debug!(
            "y4m '{}': {}x{} {:?} fps={:?}",
            uri, header.width, header.height, header.layout, header.frame_rate
        );
        Ok(Self {
            reader,
            uri,
            buffer: vec![0; header.frame_len()],
            header,
            seq: 0,
            open: true,
        })
    }

    pub fn header(&self) -> &Y4mHeader {
        &self.header
    }
}

impl<R: BufRead + Send> VideoSource for Y4mSource<R> {
    fn read(&mut self) -> Result<Option<VideoFrame>, SourceError> {
        if !self.open {
            return Ok(None);
        }
        let marker = match read_line(&mut self.reader) {
            Ok(Some(line)) => line,
            Ok(None) => {
                self.open = false;
                return Ok(None);
            }
            Err(e) => {
                self.open = false;
                return Err(e.into());
            }
        };
        if !marker.starts_with("FRAME") {
            self.open = false;
            return Err(SourceError::Decode(format!(
                "'{}': expected FRAME marker after frame {}",
                self.uri, self.seq
            )));
        }

        if let Err(e) = self.reader.read_exact(&mut self.buffer) {
            self.open = false;
            if e.kind() == io::ErrorKind::UnexpectedEof {
                warn!("⚠️  '{}' truncated after frame {}", self.uri, self.seq);
                return Ok(None);
            }
            return Err(e.into());
        }

        let Y4mHeader {
            width,
            height,
            layout,
            ..
        } = self.header;
        let image = planar_to_rgb(&self.buffer, width, height, layout)
            .ok_or_else(|| SourceError::Decode(format!("'{}': short frame", self.uri)))?;
        let frame = VideoFrame::new(image, self.seq);
        self.seq += 1;
        Ok(Some(frame))
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn frame_rate(&self) -> Option<f64> {
        self.header.frame_rate
    }
}

/// One `\n`-terminated ASCII line, `None` at clean end of stream.
fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut line = Vec::new();
    let n = reader
        .by_ref()
        .take(MAX_LINE as u64)
        .read_until(b'\n', &mut line)?;
    if n == 0 {
        return Ok(None);
    }
    if line.last() != Some(&b'\n') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "unterminated header line",
        ));
    }
    line.pop();
    String::from_utf8(line)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
