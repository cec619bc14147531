use crate::error::OutputError;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Rates at or above this are timing artefacts and are not logged.
const MAX_FPS: f64 = 3000.0;

/// FPS 记录: CSV, 表头 `fps`, 每周期一行整数
pub struct FpsLog {
    out: BufWriter<File>,
    rows: u64,
}

impl FpsLog {
    pub fn create(path: &Path) -> Result<Self, OutputError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "fps")?;
        Ok(Self { out, rows: 0 })
    }

    /// Appends `fps` truncated to an integer when strictly inside (0, 3000).
    pub fn record(&mut self, fps: f64) -> Result<(), OutputError> {
        if fps > 0.0 && fps < MAX_FPS {
            writeln!(self.out, "{}", fps as u64)?;
            self.rows += 1;
        }
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.out.flush()?;
        Ok(())
    }
}
