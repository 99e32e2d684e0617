/// 检测与跟踪系统 (Detection & Tracking System)
///
/// 在检测线程中运行:
/// - Detector:        单帧目标检测
/// - Tracker:         贪心最近邻标签跟踪
/// - SmoothTracker:   指数平滑 (渲染用)
/// - TrackerFollower: 每个标签一个有状态跟随者
pub mod detector;
pub mod follower;
pub mod smooth;
pub mod trackable;
pub mod tracker;
pub mod types;

pub use detector::{BlobDetector, Detector};
pub use follower::{Follower, TrackerFollower};
pub use smooth::SmoothTracker;
pub use trackable::{Smoothable, Trackable};
pub use tracker::{TrackedObject, Tracker};
pub use types::{BBox, EventBatch, Point2, TrackState, TrackerEvent};
