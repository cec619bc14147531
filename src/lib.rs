// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 自动导播 (Auto director)
//!
//! Scores the motion seen by every camera, votes for the busiest one each
//! cycle and commits the on-air camera once per smoothing window.
pub mod camera; // 摄像头工作线程与单槽邮箱
pub mod config; // 场景配置
pub mod director; // 线程编排
pub mod error; // 错误类型
pub mod frame; // 帧与裁剪区域
pub mod input; // 视频输入系统
pub mod lifecycle; // 取消令牌
pub mod motion; // 运动评分
pub mod output; // 输出系统
pub mod switcher; // 机位切换
pub mod utils;
pub mod vision; // 图像原语

pub use crate::config::SceneConfig;
pub use crate::director::{Director, Passthrough, RunReport};
pub use crate::error::{ConfigError, DirectorError, DirectorResult, OutputError, SourceError};
pub use crate::lifecycle::CancellationToken;
