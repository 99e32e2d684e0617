//! 多目标跟踪器 (贪心最近邻匹配)
//! Greedy nearest-neighbour multi-object tracker
//!
//! 每次 `track()`:
//! 1. 计算新观测 × 上一代对象的距离, 只保留 `distance < maximum_distance` 的候选
//! 2. 候选按距离稳定排序 (i 外层 j 内层的发现顺序决定平局)
//! 3. 贪心接受: i 与 j 都未被占用才匹配
//! 4. 未匹配的新观测 → 新标签; 未匹配的旧对象在 `persistence` 内保留为幽灵轨迹
//!
//! 标签映射使用 `label → Vec 下标`, 每次调用重建, 不向外暴露引用以外的句柄。

use std::collections::HashMap;

use super::trackable::Trackable;
use crate::config::TrackerConfig;

/// 默认最大丢失帧数
pub const DEFAULT_PERSISTENCE: u64 = 15;
/// 默认最大匹配距离 (像素)
pub const DEFAULT_MAXIMUM_DISTANCE: f32 = 64.0;

/// 跟踪对象
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedObject<T> {
    object: T,
    label: usize,
    index: Option<usize>,
    age: u64,
    last_seen: u64,
}

impl<T> TrackedObject<T> {
    /// 当前观测值
    pub fn object(&self) -> &T {
        &self.object
    }

    /// 唯一跟踪标签
    pub fn label(&self) -> usize {
        self.label
    }

    /// 在最近一次输入中的位置; 本帧未匹配 (幽灵轨迹) 时为 None
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// 自创建以来的更新次数
    pub fn age(&self) -> u64 {
        self.age
    }

    /// 连续未匹配次数
    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }
}

/// 贪心多目标跟踪器
#[derive(Clone, Debug)]
pub struct Tracker<T> {
    previous: Vec<TrackedObject<T>>,
    current: Vec<TrackedObject<T>>,
    previous_label_map: HashMap<usize, usize>,
    current_label_map: HashMap<usize, usize>,

    previous_labels: Vec<usize>,
    current_labels: Vec<usize>,
    new_labels: Vec<usize>,
    dead_labels: Vec<usize>,

    /// 下一个分配的标签 (永不复用)
    next_label: usize,

    /// 最大允许连续丢失次数
    persistence: u64,

    /// 匹配距离硬阈值
    maximum_distance: f32,
}

impl<T: Trackable> Tracker<T> {
    pub fn new() -> Self {
        Self {
            previous: Vec::new(),
            current: Vec::new(),
            previous_label_map: HashMap::new(),
            current_label_map: HashMap::new(),
            previous_labels: Vec::new(),
            current_labels: Vec::new(),
            new_labels: Vec::new(),
            dead_labels: Vec::new(),
            next_label: 0,
            persistence: DEFAULT_PERSISTENCE,
            maximum_distance: DEFAULT_MAXIMUM_DISTANCE,
        }
    }

    pub fn with_config(config: &TrackerConfig) -> Self {
        let mut tracker = Self::new();
        tracker.set_persistence(config.persistence);
        tracker.set_maximum_distance(config.maximum_distance);
        tracker
    }

    pub fn set_persistence(&mut self, persistence: u64) {
        self.persistence = persistence;
    }

    pub fn set_maximum_distance(&mut self, maximum_distance: f32) {
        self.maximum_distance = maximum_distance;
    }

    pub fn persistence(&self) -> u64 {
        self.persistence
    }

    pub fn maximum_distance(&self) -> f32 {
        self.maximum_distance
    }

    /// 更新跟踪, 返回与输入等长的标签序列 (`labels[i]` 对应 `objects[i]`)
    pub fn track(&mut self, objects: &[T]) -> &[usize] {
        self.previous = std::mem::take(&mut self.current);
        let n = objects.len();
        let m = self.previous.len();

        // 1. 距离候选 (硬阈值)
        let mut candidates: Vec<(usize, usize, f32)> = Vec::new();
        for (i, object) in objects.iter().enumerate() {
            for (j, previous) in self.previous.iter().enumerate() {
                let distance = object.distance(&previous.object);
                if distance < self.maximum_distance {
                    candidates.push((i, j, distance));
                }
            }
        }

        // 2. 稳定排序: 距离相同保持发现顺序
        candidates.sort_by(|a, b| a.2.total_cmp(&b.2));

        // 3. 贪心匹配
        self.current_labels.clear();
        self.current_labels.resize(n, 0);
        let mut matched_objects = vec![false; n];
        let mut matched_previous = vec![false; m];

        for (i, j, _) in candidates {
            if matched_objects[i] || matched_previous[j] {
                continue;
            }
            matched_objects[i] = true;
            matched_previous[j] = true;

            let previous = &self.previous[j];
            self.current.push(TrackedObject {
                object: objects[i].clone(),
                label: previous.label,
                index: Some(i),
                age: previous.age + 1,
                last_seen: 0,
            });
            self.current_labels[i] = previous.label;
        }

        // 4. 未匹配的新观测 → 新建轨迹
        self.new_labels.clear();
        for (i, object) in objects.iter().enumerate() {
            if matched_objects[i] {
                continue;
            }
            let label = self.next_label;
            self.next_label += 1;

            self.current.push(TrackedObject {
                object: object.clone(),
                label,
                index: Some(i),
                age: 1,
                last_seen: 0,
            });
            self.current_labels[i] = label;
            self.new_labels.push(label);
        }

        // 5. 未匹配的旧轨迹 → 幽灵保留或淘汰
        self.dead_labels.clear();
        for (j, previous) in self.previous.iter().enumerate() {
            if matched_previous[j] {
                continue;
            }
            if previous.last_seen < self.persistence {
                let mut ghost = previous.clone();
                ghost.age += 1;
                ghost.last_seen += 1;
                ghost.index = None;
                self.current.push(ghost);
            } else {
                self.dead_labels.push(previous.label);
            }
        }

        // 6. 重建标签映射
        self.previous_labels = self.previous.iter().map(|o| o.label).collect();
        self.previous_label_map = Self::build_label_map(&self.previous);
        self.current_label_map = Self::build_label_map(&self.current);

        &self.current_labels
    }

    /// 清除所有轨迹 (标签计数器保留, 标签不会复用)
    pub fn reset(&mut self) {
        self.previous.clear();
        self.current.clear();
        self.previous_label_map.clear();
        self.current_label_map.clear();
        self.previous_labels.clear();
        self.current_labels.clear();
        self.new_labels.clear();
        self.dead_labels.clear();
    }

    fn build_label_map(objects: &[TrackedObject<T>]) -> HashMap<usize, usize> {
        objects
            .iter()
            .enumerate()
            .map(|(index, object)| (object.label, index))
            .collect()
    }
}

impl<T> Tracker<T> {
    // ========== 查询接口 ==========

    pub fn exists_current(&self, label: usize) -> bool {
        self.current_label_map.contains_key(&label)
    }

    pub fn exists_previous(&self, label: usize) -> bool {
        self.previous_label_map.contains_key(&label)
    }

    pub fn current_object(&self, label: usize) -> Option<&TrackedObject<T>> {
        self.current_label_map
            .get(&label)
            .map(|&index| &self.current[index])
    }

    pub fn previous_object(&self, label: usize) -> Option<&TrackedObject<T>> {
        self.previous_label_map
            .get(&label)
            .map(|&index| &self.previous[index])
    }

    /// 当前代所有对象 (包含幽灵轨迹)
    pub fn current_objects(&self) -> impl Iterator<Item = &TrackedObject<T>> {
        self.current.iter()
    }

    /// # Panics
    /// 标签不在当前代中 (调用前用 [`exists_current`](Self::exists_current) 检查)
    pub fn get_current(&self, label: usize) -> &T {
        &self.expect_current(label).object
    }

    /// # Panics
    /// 标签不在上一代中 (调用前用 [`exists_previous`](Self::exists_previous) 检查)
    pub fn get_previous(&self, label: usize) -> &T {
        match self.previous_object(label) {
            Some(object) => &object.object,
            None => panic!("标签 {} 不在上一帧的跟踪集合中", label),
        }
    }

    pub fn get_age(&self, label: usize) -> u64 {
        self.expect_current(label).age
    }

    pub fn get_last_seen(&self, label: usize) -> u64 {
        self.expect_current(label).last_seen
    }

    pub fn get_index_from_label(&self, label: usize) -> Option<usize> {
        self.expect_current(label).index
    }

    /// 本次输入对应的标签 (输入顺序)
    pub fn current_labels(&self) -> Vec<usize> {
        self.current_labels.clone()
    }

    /// 上一代全部标签 (包含当时的幽灵轨迹)
    pub fn previous_labels(&self) -> Vec<usize> {
        self.previous_labels.clone()
    }

    /// 本次新出现的标签
    pub fn new_labels(&self) -> Vec<usize> {
        self.new_labels.clone()
    }

    /// 本次被淘汰的标签
    pub fn dead_labels(&self) -> Vec<usize> {
        self.dead_labels.clone()
    }

    pub(crate) fn labels(&self) -> &[usize] {
        &self.current_labels
    }

    fn expect_current(&self, label: usize) -> &TrackedObject<T> {
        match self.current_object(label) {
            Some(object) => object,
            None => panic!("标签 {} 不在当前跟踪集合中", label),
        }
    }
}

impl<T: Trackable> Default for Tracker<T> {
    fn default() -> Self {
        Self::new()
    }
}
