use super::VideoSource;
use crate::error::SourceError;
use crate::frame::VideoFrame;
use std::fs;
use std::path::{Path, PathBuf};

const EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// 图片序列: 目录内的图片按文件名排序依次作为帧
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    next: usize,
    open: bool,
}

impl ImageSequenceSource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let uri = dir.display().to_string();
        let entries = fs::read_dir(dir).map_err(|e| SourceError::open(&uri, e.to_string()))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            })
            .collect();
        if files.is_empty() {
            return Err(SourceError::open(uri, "directory contains no png/jpg/bmp images"));
        }
        files.sort();
        Ok(Self {
            files,
            next: 0,
            open: true,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl VideoSource for ImageSequenceSource {
    fn read(&mut self) -> Result<Option<VideoFrame>, SourceError> {
        let Some(path) = self.files.get(self.next).filter(|_| self.open) else {
            self.open = false;
            return Ok(None);
        };
        let image = match image::open(path) {
            Ok(img) => img.into_rgb8(),
            Err(e) => {
                self.open = false;
                return Err(e.into());
            }
        };
        let frame = VideoFrame::new(image, self.next as u64);
        self.next += 1;
        Ok(Some(frame))
    }

    fn is_open(&self) -> bool {
        self.open && self.next < self.files.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for (name, v) in [("b_002.png", 20u8), ("a_001.png", 10), ("c_003.bmp", 30)] {
            RgbImage::from_pixel(3, 2, Rgb([v, v, v]))
                .save(dir.path().join(name))
                .unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut src = ImageSequenceSource::open(dir.path()).unwrap();
        assert_eq!(src.len(), 3);
        let values: Vec<u8> = std::iter::from_fn(|| src.read().unwrap())
            .map(|f| f.image.get_pixel(0, 0).0[0])
            .collect();
        assert_eq!(values, vec![10, 20, 30]);
        assert!(!src.is_open());
    }

    #[test]
    fn test_empty_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequenceSource::open(dir.path()),
            Err(SourceError::Open { .. })
        ));
    }
}
