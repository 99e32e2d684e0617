//! 平滑跟踪器 (指数平滑装饰器)
//! Exponential smoothing on top of [`Tracker`]
//!
//! 渲染使用平滑值, 匹配与速度计算始终使用原始检测值。

use std::collections::HashMap;
use std::ops::Deref;

use super::trackable::Smoothable;
use super::tracker::Tracker;
use super::types::Point2;
use crate::config::TrackerConfig;

/// 默认平滑系数 (新观测权重)
pub const DEFAULT_SMOOTHING_RATE: f32 = 0.5;

pub struct SmoothTracker<T> {
    tracker: Tracker<T>,
    smoothed: HashMap<usize, T>,
    smoothing_rate: f32,
}

impl<T: Smoothable> SmoothTracker<T> {
    pub fn new() -> Self {
        Self {
            tracker: Tracker::new(),
            smoothed: HashMap::new(),
            smoothing_rate: DEFAULT_SMOOTHING_RATE,
        }
    }

    pub fn with_config(config: &TrackerConfig) -> Self {
        let mut smooth = Self {
            tracker: Tracker::with_config(config),
            smoothed: HashMap::new(),
            smoothing_rate: DEFAULT_SMOOTHING_RATE,
        };
        smooth.set_smoothing_rate(config.smoothing_rate);
        smooth
    }

    pub fn set_persistence(&mut self, persistence: u64) {
        self.tracker.set_persistence(persistence);
    }

    pub fn set_maximum_distance(&mut self, maximum_distance: f32) {
        self.tracker.set_maximum_distance(maximum_distance);
    }

    /// 平滑系数, 限制在 [0, 1]
    pub fn set_smoothing_rate(&mut self, rate: f32) {
        self.smoothing_rate = rate.clamp(0.0, 1.0);
    }

    pub fn smoothing_rate(&self) -> f32 {
        self.smoothing_rate
    }

    pub fn track(&mut self, objects: &[T]) -> &[usize] {
        self.tracker.track(objects);

        for &label in self.tracker.labels() {
            let raw = self.tracker.get_current(label);
            let next = match self.smoothed.get(&label) {
                Some(previous) => previous.lerp(raw, self.smoothing_rate),
                None => raw.clone(),
            };
            self.smoothed.insert(label, next);
        }

        // 清理已淘汰的标签 (幽灵轨迹保留平滑值)
        let tracker = &self.tracker;
        self.smoothed.retain(|label, _| tracker.exists_current(*label));

        self.tracker.labels()
    }

    /// # Panics
    /// 标签没有平滑值 (不在当前代中)
    pub fn get_smoothed(&self, label: usize) -> &T {
        match self.smoothed.get(&label) {
            Some(value) => value,
            None => panic!("标签 {} 没有平滑值", label),
        }
    }

    pub fn smoothed(&self, label: usize) -> Option<&T> {
        self.smoothed.get(&label)
    }

    /// 第 `index` 个输入的原始速度 (当前中心 - 上一帧中心)
    ///
    /// # Panics
    /// `index` 超出最近一次输入的范围
    pub fn get_velocity(&self, index: usize) -> Point2 {
        let label = self.tracker.labels()[index];
        match self.tracker.previous_object(label) {
            Some(previous) => {
                self.tracker.get_current(label).center() - previous.object().center()
            }
            None => Point2::ZERO,
        }
    }
}

impl<T: Smoothable> Default for SmoothTracker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for SmoothTracker<T> {
    type Target = Tracker<T>;

    fn deref(&self) -> &Tracker<T> {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::BBox;

    #[test]
    fn test_first_frame_uses_raw_value() {
        let mut tracker: SmoothTracker<Point2> = SmoothTracker::new();
        let label = tracker.track(&[Point2::new(10.0, 10.0)])[0];
        assert_eq!(tracker.get_smoothed(label), &Point2::new(10.0, 10.0));
    }

    #[test]
    fn test_exponential_smoothing() {
        let mut tracker: SmoothTracker<Point2> = SmoothTracker::new();
        tracker.set_smoothing_rate(0.5);
        let label = tracker.track(&[Point2::new(0.0, 0.0)])[0];
        tracker.track(&[Point2::new(8.0, 0.0)]);
        assert_eq!(tracker.get_smoothed(label), &Point2::new(4.0, 0.0));
        tracker.track(&[Point2::new(8.0, 0.0)]);
        assert_eq!(tracker.get_smoothed(label), &Point2::new(6.0, 0.0));
        // 原始值不受平滑影响
        assert_eq!(tracker.get_current(label), &Point2::new(8.0, 0.0));
    }

    #[test]
    fn test_rate_is_clamped() {
        let mut tracker: SmoothTracker<Point2> = SmoothTracker::new();
        tracker.set_smoothing_rate(3.0);
        assert_eq!(tracker.smoothing_rate(), 1.0);
        tracker.set_smoothing_rate(-1.0);
        assert_eq!(tracker.smoothing_rate(), 0.0);
    }

    #[test]
    fn test_dead_labels_are_purged() {
        let mut tracker: SmoothTracker<Point2> = SmoothTracker::new();
        tracker.set_persistence(1);
        let label = tracker.track(&[Point2::new(0.0, 0.0)])[0];
        tracker.track(&[]);
        // 幽灵轨迹保留平滑值
        assert!(tracker.smoothed(label).is_some());
        tracker.track(&[]);
        assert_eq!(tracker.dead_labels(), vec![label]);
        assert!(tracker.smoothed(label).is_none());
    }

    #[test]
    fn test_velocity() {
        let mut tracker: SmoothTracker<BBox> = SmoothTracker::new();
        tracker.track(&[BBox::from_xywh(0.0, 0.0, 10.0, 10.0, 1.0)]);
        assert_eq!(tracker.get_velocity(0), Point2::ZERO);

        tracker.track(&[
            BBox::from_xywh(100.0, 100.0, 10.0, 10.0, 1.0),
            BBox::from_xywh(3.0, -2.0, 10.0, 10.0, 1.0),
        ]);
        assert_eq!(tracker.get_velocity(0), Point2::ZERO);
        assert_eq!(tracker.get_velocity(1), Point2::new(3.0, -2.0));
    }
}
