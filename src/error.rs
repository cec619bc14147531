//! 错误类型 (Error taxonomy)
//!
//! Startup failures (configuration, source open, writer open) are fatal and
//! surface as [`DirectorError`]. End-of-stream is not an error: sources
//! return `Ok(None)`. Output failures during a cycle are [`OutputError`]s that
//! the coordinator turns into an orderly shutdown.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type DirectorResult<T> = Result<T, DirectorError>;

/// Top-level error of the director engine.
#[derive(Debug, Error)]
pub enum DirectorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to open camera '{name}': {source}")]
    SourceOpen {
        name: String,
        #[source]
        source: SourceError,
    },

    #[error("output error: {0}")]
    Output(#[from] OutputError),

    #[error("failed to spawn thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid or unreadable scene configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}. Check the config file name and path, --help for help")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("undefined section label '{0}'")]
    UnknownSection(String),

    #[error("camera '{0}' is declared more than once")]
    DuplicateCamera(String),

    #[error("{context} refers to unknown camera '{name}'")]
    UnknownCamera { context: String, name: String },

    #[error("the weight value '{weight}' of camera '{camera}' is not included in the [1-5] interval")]
    WeightOutOfRange { camera: String, weight: i64 },

    #[error("the smoothing window '{0}' must be greater than 0")]
    InvalidSmoothing(i64),

    #[error("the alpha value '{0}' is not included in the ]-1,1[ interval")]
    AlphaOutOfRange(f64),

    #[error("analyzed camera '{0}' has no associated display camera")]
    MissingAssociation(String),

    #[error("camera '{display}' associated with '{analyzed}' is not a display camera")]
    NotDisplayable { analyzed: String, display: String },

    #[error("crop rectangle of camera '{0}' is empty (expected [left, top, right, bottom] with left < right and top < bottom)")]
    InvalidCrop(String),

    #[error("no camera with role 'analyze' or 'both' is configured")]
    NoAnalyzedCamera,

    #[error("output size {width}x{height} is invalid")]
    InvalidOutputSize { width: u32, height: u32 },

    #[error("output frame rate '{0}' must be a positive number")]
    InvalidFrameRate(f64),
}

/// Video source failures.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open '{uri}': {reason}")]
    Open { uri: String, reason: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl SourceError {
    pub fn open(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Open {
            uri: uri.into(),
            reason: reason.into(),
        }
    }
}

/// Persistent writer, preview and monitor failures.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("FFmpeg not found in PATH (needed to encode '{0}')")]
    FfmpegNotFound(PathBuf),

    #[error("encoder failed: {0}")]
    Encoder(String),

    #[error("frame size {got_width}x{got_height} does not match stream size {width}x{height}")]
    SizeMismatch {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("resize error: {0}")]
    Resize(String),
}
