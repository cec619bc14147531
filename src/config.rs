//! 场景配置 - 通过JSON文件描述摄像头、关联与输出
//!
//! ```json
//! {
//!   "cameras": [
//!     { "name": "top1", "uri": "cams/top1.y4m", "role": "analyze", "weight": 2, "crop": [0, 120, 1920, 1080] },
//!     { "name": "wide", "uri": "rtsp://10.0.0.5/live", "role": "display" }
//!   ],
//!   "associations": { "top1": ["wide"] },
//!   "out": { "path": "out/out.mp4", "width": 1920, "height": 1080 },
//!   "general": { "smoothing_window": 20, "alpha": 0.0 }
//! }
//! ```

use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default config location when `-c` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "scene.json";

const SECTIONS: [&str; 4] = ["cameras", "associations", "out", "general"];

pub const MIN_WEIGHT: i64 = 1;
pub const MAX_WEIGHT: i64 = 5;

/// 摄像头角色
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraRole {
    /// 仅参与运动评分
    Analyze,
    /// 仅用于画面输出
    Display,
    /// 两者兼有
    Both,
}

impl CameraRole {
    pub fn is_analyzed(self) -> bool {
        matches!(self, Self::Analyze | Self::Both)
    }

    pub fn is_displayable(self) -> bool {
        matches!(self, Self::Display | Self::Both)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Display => "display",
            Self::Both => "both",
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraConfig {
    pub name: String,
    pub uri: String,
    pub role: CameraRole,
    /// [left, top, right, bottom] 像素
    #[serde(default)]
    pub crop: Option<[u32; 4]>,
    #[serde(default = "default_weight")]
    pub weight: i64,
    #[serde(default)]
    pub display_analysis: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String, // 传给 ffmpeg -c:v
    pub display_output: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("out/out.mp4"),
            width: 1920,
            height: 1080,
            fps: 25.0,
            codec: "mpeg4".to_string(),
            display_output: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    pub smoothing_window: i64,          // 平滑窗口(周期数)
    pub alpha: f64,                     // 轮廓数量指数
    pub display_all_captures: bool,     // 监视器拼图
    pub fps_log_path: Option<PathBuf>,  // FPS CSV
    pub monitor_path: Option<PathBuf>,  // 监视器拼图持久化
    pub analysis_dir: PathBuf,          // 调试分析输出目录
    pub font_path: Option<PathBuf>,     // 文字叠加字体
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            smoothing_window: 20,
            alpha: 0.0,
            display_all_captures: false,
            fps_log_path: None,
            monitor_path: None,
            analysis_dir: PathBuf::from("out/analysis"),
            font_path: None,
        }
    }
}

/// Whole scene as loaded from disk. Validated on load and never mutated afterwards.
#[derive(Clone, Debug, Deserialize)]
pub struct SceneConfig {
    pub cameras: Vec<CameraConfig>,
    #[serde(default)]
    pub associations: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub out: OutputConfig,
    #[serde(default)]
    pub general: GeneralConfig,
}

fn default_weight() -> i64 {
    MIN_WEIGHT
}

impl SceneConfig {
    /// 从JSON文件加载并校验配置
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&json)?;
        info!("✅ scene loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if let Some(sections) = value.as_object() {
            if let Some(unknown) = sections.keys().find(|k| !SECTIONS.contains(&k.as_str())) {
                return Err(ConfigError::UnknownSection(unknown.clone()));
            }
        }
        let config: SceneConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for cam in &self.cameras {
            if !names.insert(cam.name.as_str()) {
                return Err(ConfigError::DuplicateCamera(cam.name.clone()));
            }
            if !(MIN_WEIGHT..=MAX_WEIGHT).contains(&cam.weight) {
                return Err(ConfigError::WeightOutOfRange {
                    camera: cam.name.clone(),
                    weight: cam.weight,
                });
            }
            if let Some([left, top, right, bottom]) = cam.crop {
                if left >= right || top >= bottom {
                    return Err(ConfigError::InvalidCrop(cam.name.clone()));
                }
            }
        }

        if self.general.smoothing_window <= 0 {
            return Err(ConfigError::InvalidSmoothing(self.general.smoothing_window));
        }
        let alpha = self.general.alpha;
        if !(alpha > -1.0 && alpha < 1.0) {
            return Err(ConfigError::AlphaOutOfRange(alpha));
        }
        if self.out.width == 0 || self.out.height == 0 {
            return Err(ConfigError::InvalidOutputSize {
                width: self.out.width,
                height: self.out.height,
            });
        }
        if !(self.out.fps.is_finite() && self.out.fps > 0.0) {
            return Err(ConfigError::InvalidFrameRate(self.out.fps));
        }

        for (analyzed, displays) in &self.associations {
            let Some(source) = self.camera(analyzed) else {
                return Err(ConfigError::UnknownCamera {
                    context: "association".to_string(),
                    name: analyzed.clone(),
                });
            };
            if !source.role.is_analyzed() {
                warn!(
                    "⚠️  association of '{}' ignored: camera role is '{}'",
                    analyzed,
                    source.role.as_str()
                );
            }
            for display in displays {
                let Some(target) = self.camera(display) else {
                    return Err(ConfigError::UnknownCamera {
                        context: format!("association of '{}'", analyzed),
                        name: display.clone(),
                    });
                };
                if !target.role.is_displayable() {
                    return Err(ConfigError::NotDisplayable {
                        analyzed: analyzed.clone(),
                        display: display.clone(),
                    });
                }
            }
        }

        let mut any_analyzed = false;
        for cam in self.cameras.iter().filter(|c| c.role.is_analyzed()) {
            any_analyzed = true;
            let mapped = self.associations.get(&cam.name).is_some_and(|d| !d.is_empty());
            if !mapped {
                return Err(ConfigError::MissingAssociation(cam.name.clone()));
            }
        }
        if !any_analyzed {
            return Err(ConfigError::NoAnalyzedCamera);
        }
        Ok(())
    }

    pub fn camera(&self, name: &str) -> Option<&CameraConfig> {
        self.cameras.iter().find(|c| c.name == name)
    }

    pub fn camera_index(&self, name: &str) -> Option<usize> {
        self.cameras.iter().position(|c| c.name == name)
    }

    /// Cycles between two commits of the on-air camera. Always > 0 after validation.
    pub fn window_length(&self) -> usize {
        usize::try_from(self.general.smoothing_window).unwrap_or(1).max(1)
    }

    /// 打印配置摘要
    pub fn log_summary(&self) {
        info!("📋 scene: {} camera(s)", self.cameras.len());
        for (idx, cam) in self.cameras.iter().enumerate() {
            let crop = match cam.crop {
                Some([l, t, r, b]) => format!("[{l}, {t}, {r}, {b}]"),
                None => "full frame".to_string(),
            };
            info!(
                "   #{} {:<12} role={:<7} weight={} crop={} analysis={} uri={}",
                idx,
                cam.name,
                cam.role.as_str(),
                cam.weight,
                crop,
                cam.display_analysis,
                cam.uri
            );
        }
        for cam in self.cameras.iter().filter(|c| c.role.is_analyzed()) {
            if let Some(displays) = self.associations.get(&cam.name) {
                info!("   🔗 {} -> {}", cam.name, displays.join(", "));
            }
        }
        info!(
            "   🎬 out: {} {}x{} @ {} fps codec={} display={}",
            self.out.path.display(),
            self.out.width,
            self.out.height,
            self.out.fps,
            self.out.codec,
            self.out.display_output
        );
        info!(
            "   ⚙️  smoothing={} alpha={} monitor={}",
            self.general.smoothing_window, self.general.alpha, self.general.display_all_captures
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"{
        "cameras": [
            { "name": "top1", "uri": "a.y4m", "role": "analyze", "weight": 2, "crop": [0, 10, 100, 90] },
            { "name": "top2", "uri": "b.y4m", "role": "both" },
            { "name": "wide", "uri": "c.y4m", "role": "display" }
        ],
        "associations": { "top1": ["wide", "top2"], "top2": ["top2"] },
        "general": { "smoothing_window": 5, "alpha": 0.5 }
    }"#;

    fn with_camera_field(field: &str) -> String {
        format!(
            r#"{{
                "cameras": [ {{ "name": "a", "uri": "a.y4m", "role": "both", {field} }} ],
                "associations": {{ "a": ["a"] }}
            }}"#
        )
    }

    fn with_general(general: &str) -> String {
        format!(
            r#"{{
                "cameras": [ {{ "name": "a", "uri": "a.y4m", "role": "both" }} ],
                "associations": {{ "a": ["a"] }},
                "general": {general}
            }}"#
        )
    }

    #[test]
    fn test_parse_scene() {
        let cfg = SceneConfig::from_json(SCENE).unwrap();
        assert_eq!(cfg.cameras.len(), 3);
        assert_eq!(cfg.cameras[0].weight, 2);
        assert_eq!(cfg.cameras[1].weight, 1);
        assert_eq!(cfg.cameras[0].crop, Some([0, 10, 100, 90]));
        assert_eq!(cfg.window_length(), 5);
        assert_eq!(cfg.camera_index("wide"), Some(2));
        assert_eq!(cfg.associations["top1"], vec!["wide", "top2"]);
    }

    #[test]
    fn test_defaults() {
        let cfg = SceneConfig::from_json(&with_general("{}")).unwrap();
        assert_eq!(cfg.out.width, 1920);
        assert_eq!(cfg.out.height, 1080);
        assert_eq!(cfg.out.path, PathBuf::from("out/out.mp4"));
        assert_eq!(cfg.window_length(), 20);
        assert_eq!(cfg.general.alpha, 0.0);
        assert!(!cfg.out.display_output);
    }

    #[test]
    fn test_unknown_section() {
        let json = r#"{ "cameras": [], "extras": {} }"#;
        assert!(matches!(
            SceneConfig::from_json(json),
            Err(ConfigError::UnknownSection(s)) if s == "extras"
        ));
    }

    #[test]
    fn test_weight_range() {
        for weight in [0, 6, -1] {
            let json = with_camera_field(&format!(r#""weight": {weight}"#));
            assert!(matches!(
                SceneConfig::from_json(&json),
                Err(ConfigError::WeightOutOfRange { weight: w, .. }) if w == weight
            ));
        }
        for weight in [1, 5] {
            let json = with_camera_field(&format!(r#""weight": {weight}"#));
            assert!(SceneConfig::from_json(&json).is_ok());
        }
    }

    #[test]
    fn test_smoothing_must_be_positive() {
        for window in [0, -3] {
            let json = with_general(&format!(r#"{{ "smoothing_window": {window} }}"#));
            assert!(matches!(
                SceneConfig::from_json(&json),
                Err(ConfigError::InvalidSmoothing(_))
            ));
        }
    }

    #[test]
    fn test_alpha_open_interval() {
        for alpha in ["1.0", "-1.0", "1.5"] {
            let json = with_general(&format!(r#"{{ "alpha": {alpha} }}"#));
            assert!(matches!(
                SceneConfig::from_json(&json),
                Err(ConfigError::AlphaOutOfRange(_))
            ));
        }
        let json = with_general(r#"{ "alpha": -0.99 }"#);
        assert!(SceneConfig::from_json(&json).is_ok());
    }

    #[test]
    fn test_missing_association() {
        let json = r#"{
            "cameras": [
                { "name": "a", "uri": "a.y4m", "role": "analyze" },
                { "name": "w", "uri": "w.y4m", "role": "display" }
            ]
        }"#;
        assert!(matches!(
            SceneConfig::from_json(json),
            Err(ConfigError::MissingAssociation(name)) if name == "a"
        ));
    }

    #[test]
    fn test_association_target_must_display() {
        let json = r#"{
            "cameras": [
                { "name": "a", "uri": "a.y4m", "role": "analyze" },
                { "name": "b", "uri": "b.y4m", "role": "analyze" }
            ],
            "associations": { "a": ["b"], "b": ["a"] }
        }"#;
        assert!(matches!(
            SceneConfig::from_json(json),
            Err(ConfigError::NotDisplayable { .. })
        ));
    }

    #[test]
    fn test_association_unknown_camera() {
        let json = r#"{
            "cameras": [ { "name": "a", "uri": "a.y4m", "role": "both" } ],
            "associations": { "a": ["ghost"] }
        }"#;
        assert!(matches!(
            SceneConfig::from_json(json),
            Err(ConfigError::UnknownCamera { name, .. }) if name == "ghost"
        ));
    }

    #[test]
    fn test_duplicate_and_crop() {
        let json = r#"{
            "cameras": [
                { "name": "a", "uri": "a.y4m", "role": "both" },
                { "name": "a", "uri": "b.y4m", "role": "both" }
            ],
            "associations": { "a": ["a"] }
        }"#;
        assert!(matches!(
            SceneConfig::from_json(json),
            Err(ConfigError::DuplicateCamera(_))
        ));

        let json = with_camera_field(r#""crop": [50, 0, 50, 10]"#);
        assert!(matches!(
            SceneConfig::from_json(&json),
            Err(ConfigError::InvalidCrop(_))
        ));
    }

    #[test]
    fn test_no_analyzed_camera() {
        let json = r#"{ "cameras": [ { "name": "w", "uri": "w.y4m", "role": "display" } ] }"#;
        assert!(matches!(
            SceneConfig::from_json(json),
            Err(ConfigError::NoAnalyzedCamera)
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        fs::write(&path, SCENE).unwrap();
        let cfg = SceneConfig::load(&path).unwrap();
        assert_eq!(cfg.cameras[2].role, CameraRole::Display);

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            SceneConfig::load(&missing),
            Err(ConfigError::Read { .. })
        ));
    }
}
