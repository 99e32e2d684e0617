/// 检测跟踪流水线 (Detection Tracking Pipeline)
///
/// 双线程架构,通过有界队列通信:
/// - 主线程:   提交帧 / 取出事件 / 分发给监听器
/// - 检测线程: 目标检测 + 标签跟踪 (AsyncProcess 工作线程)
pub mod async_process;
pub mod detection_tracker;

pub use async_process::{push_newest, AsyncProcess, PipelineStats};
pub use detection_tracker::DetectionTracker;
