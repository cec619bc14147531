/// 图像处理原语 (Image primitives)
///
/// - imaging: 裁剪 / 灰度+模糊 / 帧差 / 阈值 / 膨胀
/// - contours: 外轮廓 / 面积 / 质心
/// - flow: 稀疏光流 (金字塔 Lucas-Kanade)
pub mod contours;
pub mod flow;
pub mod imaging;

pub use contours::{external_contours, MotionContour};
pub use flow::{LucasKanade, OpticalFlow};
pub use imaging::{abs_diff, change_mask, crop, dilate, gray_blur, threshold};
