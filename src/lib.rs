// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 跟踪器配置参数
pub mod detection; // 检测与标签跟踪
pub mod error; // 错误类型
pub mod input; // 帧输入 (合成场景)
pub mod pipeline; // 异步检测跟踪流水线
pub mod renderer; // 结果标注

pub use crate::config::TrackerConfig;
pub use crate::detection::{
    BBox, BlobDetector, Detector, EventBatch, Follower, Point2, Smoothable, SmoothTracker,
    TrackState, Trackable, TrackedObject, Tracker, TrackerEvent, TrackerFollower,
};
pub use crate::error::{Error, Result};
pub use crate::input::SyntheticScene;
pub use crate::pipeline::{AsyncProcess, DetectionTracker, PipelineStats};
