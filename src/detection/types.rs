/// 检测与跟踪系统数据结构定义
/// Data structures for the detection/tracking system
use std::ops::Sub;

// ========== 数据结构 ==========

/// 二维点 (像素坐标)
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const ZERO: Point2 = Point2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// 向量长度
    pub fn norm(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

impl Sub for Point2 {
    type Output = Point2;

    fn sub(self, rhs: Point2) -> Point2 {
        Point2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// 检测框 (Detection bounding box)
///
/// `confidence` 取值 `[0, +inf)`: 0 表示无置信度, 大于1 表示高置信度。
/// 具体量纲由检测器决定, 跟踪器不做归一化。
#[derive(Clone, Debug, PartialEq, Default)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: u32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id: 0,
        }
    }

    /// 由左上角 + 宽高构造
    pub fn from_xywh(x: f32, y: f32, w: f32, h: f32, confidence: f32) -> Self {
        Self::new(x, y, x + w, y + h, confidence)
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// 获取中心点
    pub fn center(&self) -> Point2 {
        Point2::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// 计算两个边界框的IOU (Intersection over Union)
    pub fn iou(&self, other: &BBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;

        if union <= 0.0 {
            return 0.0;
        }

        intersection / union
    }
}

/// 跟踪状态 (生命周期事件类型)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackState {
    Begin,
    Update,
    End,
}

/// 跟踪事件 (检测线程 → 主线程)
#[derive(Clone, Debug, PartialEq)]
pub struct TrackerEvent {
    pub state: TrackState,
    pub label: usize,
    pub age: u64,
    pub last_seen: u64,
    /// 当前检测框 (END 事件为 None)
    pub detection: Option<BBox>,
    /// 上一帧的检测框 (BEGIN 事件为 None)
    pub previous_detection: Option<BBox>,
}

/// 一帧的跟踪结果 (检测线程 → 主线程)
#[derive(Clone, Debug, Default)]
pub struct EventBatch {
    pub frame_id: u64,
    pub events: Vec<TrackerEvent>,
    /// 处理完本帧后仍存活的全部标签 (含幽灵轨迹)
    pub live_labels: Vec<usize>,
    pub detect_ms: f64,
    pub track_ms: f64,
}
