//! 可跟踪对象的能力约束
//! Capability traits for tracked payloads
//!
//! 跟踪器只需要: 中心点、两对象间的空间差异度;
//! 平滑跟踪器额外需要插值 (lerp)。

use super::types::{BBox, Point2};

/// 可被 [`Tracker`](super::Tracker) 跟踪的对象
pub trait Trackable: Clone {
    /// 对象中心点
    fn center(&self) -> Point2;

    /// 空间差异度 (>= 0), 只用于阈值判断与排序
    fn distance(&self, other: &Self) -> f32;
}

/// 可被 [`SmoothTracker`](super::SmoothTracker) 平滑的对象
pub trait Smoothable: Trackable {
    /// 线性插值: rate=0 返回 self, rate=1 返回 target
    fn lerp(&self, target: &Self, rate: f32) -> Self;
}

fn lerp_f32(a: f32, b: f32, rate: f32) -> f32 {
    a + (b - a) * rate
}

impl Trackable for Point2 {
    fn center(&self) -> Point2 {
        *self
    }

    fn distance(&self, other: &Self) -> f32 {
        (*self - *other).norm()
    }
}

impl Smoothable for Point2 {
    fn lerp(&self, target: &Self, rate: f32) -> Self {
        Point2::new(
            lerp_f32(self.x, target.x, rate),
            lerp_f32(self.y, target.y, rate),
        )
    }
}

impl Trackable for BBox {
    fn center(&self) -> Point2 {
        BBox::center(self)
    }

    /// 中心位移 + 尺寸差
    fn distance(&self, other: &Self) -> f32 {
        let center_distance = (BBox::center(self) - BBox::center(other)).norm();
        let size_distance = Point2::new(
            self.width() - other.width(),
            self.height() - other.height(),
        )
        .norm();
        center_distance + size_distance
    }
}

impl Smoothable for BBox {
    /// 四个角点分别插值, 置信度与类别取最新值
    fn lerp(&self, target: &Self, rate: f32) -> Self {
        BBox {
            x1: lerp_f32(self.x1, target.x1, rate),
            y1: lerp_f32(self.y1, target.y1, rate),
            x2: lerp_f32(self.x2, target.x2, rate),
            y2: lerp_f32(self.y2, target.y2, rate),
            confidence: target.confidence,
            class_id: target.class_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_distance() {
        let a = BBox::from_xywh(0.0, 0.0, 20.0, 20.0, 1.0);
        // 平移 (3,4) → 中心位移 5
        let b = BBox::from_xywh(3.0, 4.0, 20.0, 20.0, 1.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-5);

        // 同中心, 尺寸差 (6,8) → 10
        let c = BBox::new(-3.0, -4.0, 23.0, 24.0, 1.0);
        assert!((a.distance(&c) - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_bbox_lerp() {
        let a = BBox::from_xywh(0.0, 0.0, 10.0, 10.0, 0.2);
        let b = BBox::from_xywh(10.0, 20.0, 10.0, 10.0, 0.8);
        let mid = a.lerp(&b, 0.5);
        assert_eq!(mid, BBox::new(5.0, 10.0, 15.0, 20.0, 0.8));
        assert_eq!(a.lerp(&b, 0.0).x1, a.x1);
        assert_eq!(a.lerp(&b, 1.0).y2, b.y2);
    }

    #[test]
    fn test_point_lerp() {
        let p = Point2::new(0.0, 10.0).lerp(&Point2::new(10.0, 0.0), 0.25);
        assert_eq!(p, Point2::new(2.5, 7.5));
    }
}
