/// 机位切换 (Switch coordinator)
///
/// - selection: 每周期的最大分数候选
/// - votes: 窗口投票与提交
/// - association: 分析机位 → 显示机位
/// - coordinator: 顺序轮询所有邮箱的主循环
pub mod association;
pub mod coordinator;
pub mod selection;
pub mod votes;

pub use association::AssociationMap;
pub use coordinator::{CameraSlot, Coordinator, CoordinatorExit, CoordinatorReport, REFRESH_CYCLES};
pub use selection::CycleSelection;
pub use votes::SwitchState;
