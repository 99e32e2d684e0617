//! 检测跟踪编排器 (DetectionTracker)
//! 职责: 主线程提交帧 → 检测线程 检测+跟踪 → 生命周期事件 → 主线程分发
//!
//! 事件分发顺序固定: 先全部 END, 再全部 BEGIN, 最后全部 UPDATE。
//! 每个分发过 BEGIN 的标签最终恰好收到一次 END, 即使中间结果被丢弃。
//! `tracks` 只在主线程的 `update()` 中修改, 不需要锁。

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tracing::{debug, info, warn};

use super::async_process::{AsyncProcess, PipelineStats};
use crate::config::TrackerConfig;
use crate::detection::{BBox, Detector, EventBatch, TrackState, Tracker, TrackerEvent};
use crate::error::Result;

type Listener = Box<dyn FnMut(&TrackerEvent)>;

/// 检测线程中的状态: 检测器 + 跟踪器 (只被工作线程访问)
struct TrackingWorker<D> {
    detector: D,
    tracker: Tracker<BBox>,
    min_confidence: f32,

    // 统计
    count: u64,
    last: Instant,
    current_fps: f64,
}

impl<D: Detector> TrackingWorker<D> {
    fn process(&mut self, frame_id: u64, frame: D::Frame) -> Option<EventBatch> {
        // 1. 检测
        let detect_start = Instant::now();
        let detections = match self.detector.find(&frame) {
            Ok(detections) => detections,
            Err(e) => {
                warn!("❌ 帧{} 检测失败: {:#}", frame_id, e);
                return None;
            }
        };
        let detect_ms = detect_start.elapsed().as_secs_f64() * 1000.0;

        let detections: Vec<BBox> = detections
            .into_iter()
            .filter(|d| d.confidence >= self.min_confidence)
            .collect();

        // 2. 跟踪 + 生成事件
        let track_start = Instant::now();
        self.tracker.track(&detections);
        let events = self.collect_events();
        let live_labels = self
            .tracker
            .current_objects()
            .map(|object| object.label())
            .collect();
        let track_ms = track_start.elapsed().as_secs_f64() * 1000.0;

        // 3. 更新统计
        self.count += 1;
        let elapsed = self.last.elapsed();
        if elapsed.as_secs() >= 1 {
            self.current_fps = self.count as f64 / elapsed.as_secs_f64();
            debug!(
                "🎯 检测+跟踪: {}个目标 | {:.1}fps (检测:{:.1}ms | 跟踪:{:.2}ms)",
                detections.len(),
                self.current_fps,
                detect_ms,
                track_ms
            );
            self.count = 0;
            self.last = Instant::now();
        }

        Some(EventBatch {
            frame_id,
            events,
            live_labels,
            detect_ms,
            track_ms,
        })
    }

    fn collect_events(&self) -> Vec<TrackerEvent> {
        let tracker = &self.tracker;
        let new_labels = tracker.new_labels();
        let mut events = Vec::new();

        for label in tracker.dead_labels() {
            if let Some(previous) = tracker.previous_object(label) {
                events.push(TrackerEvent {
                    state: TrackState::End,
                    label,
                    age: previous.age(),
                    last_seen: previous.last_seen(),
                    detection: None,
                    previous_detection: Some(previous.object().clone()),
                });
            }
        }

        for &label in &new_labels {
            if let Some(current) = tracker.current_object(label) {
                events.push(TrackerEvent {
                    state: TrackState::Begin,
                    label,
                    age: current.age(),
                    last_seen: current.last_seen(),
                    detection: Some(current.object().clone()),
                    previous_detection: None,
                });
            }
        }

        for label in tracker.current_labels() {
            if new_labels.contains(&label) {
                continue;
            }
            if let Some(current) = tracker.current_object(label) {
                events.push(TrackerEvent {
                    state: TrackState::Update,
                    label,
                    age: current.age(),
                    last_seen: current.last_seen(),
                    detection: Some(current.object().clone()),
                    previous_detection: tracker
                        .previous_object(label)
                        .map(|previous| previous.object().clone()),
                });
            }
        }

        events
    }
}

/// 检测跟踪编排器
///
/// 字段顺序保证先停止工作线程, 再释放监听器。
pub struct DetectionTracker<F> {
    process: AsyncProcess<(u64, F), EventBatch>,
    tracks: HashMap<usize, BBox>,
    /// 标签 → (age, last_seen), 补发 END 时使用
    lifetimes: HashMap<usize, (u64, u64)>,
    listeners: Vec<Listener>,
    next_frame_id: u64,
    last_frame_id: Option<u64>,

    // 统计
    batch_count: u64,
    rate_last: Instant,
    batches_per_second: f64,
    detect_ms: f64,
    track_ms: f64,
}

impl<F: Send + 'static> DetectionTracker<F> {
    pub fn new<D>(detector: D, config: &TrackerConfig) -> Result<Self>
    where
        D: Detector<Frame = F>,
    {
        config.validate()?;

        let mut worker = TrackingWorker {
            detector,
            tracker: Tracker::with_config(config),
            min_confidence: config.min_confidence,
            count: 0,
            last: Instant::now(),
            current_fps: 0.0,
        };

        let process = AsyncProcess::new(
            move |(frame_id, frame): (u64, F)| worker.process(frame_id, frame),
            config.input_capacity,
            config.output_capacity,
        )?;

        info!(
            "🎯 跟踪器: 贪心最近邻 (最大丢失{}帧, 匹配距离{:.1})",
            config.persistence, config.maximum_distance
        );

        Ok(Self {
            process,
            tracks: HashMap::new(),
            lifetimes: HashMap::new(),
            listeners: Vec::new(),
            next_frame_id: 0,
            last_frame_id: None,
            batch_count: 0,
            rate_last: Instant::now(),
            batches_per_second: 0.0,
            detect_ms: 0.0,
            track_ms: 0.0,
        })
    }
}

impl<F> DetectionTracker<F> {
    /// 注册事件监听器 (在调用 `update()` 的线程中同步执行)
    pub fn on_event<L>(&mut self, listener: L)
    where
        L: FnMut(&TrackerEvent) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// 非阻塞提交一帧; 检测线程繁忙且队列已满时返回 false (该帧丢弃)
    ///
    /// 帧序号在提交时分配, 被丢弃的帧同样占用序号。
    pub fn track_frame(&mut self, frame: F) -> bool {
        let frame_id = self.next_frame_id;
        self.next_frame_id += 1;
        self.process.try_enqueue_input((frame_id, frame))
    }

    /// 主线程每帧调用: 取出全部结果并分发事件, 返回分发的事件数
    pub fn update(&mut self) -> usize {
        let mut dispatched = 0;

        for batch in self.process.drain_outputs() {
            self.last_frame_id = Some(batch.frame_id);
            self.detect_ms = batch.detect_ms;
            self.track_ms = batch.track_ms;

            for event in self.ordered_events(batch) {
                match (event.state, &event.detection) {
                    (TrackState::End, _) => {
                        self.tracks.remove(&event.label);
                        self.lifetimes.remove(&event.label);
                    }
                    (_, Some(detection)) => {
                        self.tracks.insert(event.label, detection.clone());
                        self.lifetimes
                            .insert(event.label, (event.age, event.last_seen));
                    }
                    (_, None) => {}
                }

                for listener in self.listeners.iter_mut() {
                    listener(&event);
                }
                dispatched += 1;
            }

            self.batch_count += 1;
        }

        let elapsed = self.rate_last.elapsed();
        if elapsed.as_secs() >= 1 {
            self.batches_per_second = self.batch_count as f64 / elapsed.as_secs_f64();
            self.batch_count = 0;
            self.rate_last = Instant::now();
        }

        dispatched
    }

    /// 按 END → BEGIN → UPDATE 排列本批事件
    ///
    /// 之前的结果可能被挤出输出队列, 因此以本批的存活标签为准修正生命周期:
    /// - 已不存活却没有收到 END 的标签: 补发 END
    /// - 从未 BEGIN 的标签: 丢弃其 END, 把 UPDATE 当作 BEGIN 分发
    fn ordered_events(&self, batch: EventBatch) -> Vec<TrackerEvent> {
        let live: HashSet<usize> = batch.live_labels.iter().copied().collect();
        let ending: HashSet<usize> = batch
            .events
            .iter()
            .filter(|e| e.state == TrackState::End)
            .map(|e| e.label)
            .collect();

        let mut stale: Vec<usize> = self
            .tracks
            .keys()
            .filter(|&&label| !live.contains(&label) && !ending.contains(&label))
            .copied()
            .collect();
        stale.sort_unstable();

        let mut ordered: Vec<TrackerEvent> = stale
            .into_iter()
            .map(|label| {
                let (age, last_seen) = self.lifetimes.get(&label).copied().unwrap_or_default();
                TrackerEvent {
                    state: TrackState::End,
                    label,
                    age,
                    last_seen,
                    detection: None,
                    previous_detection: self.tracks.get(&label).cloned(),
                }
            })
            .collect();
        if !ordered.is_empty() {
            debug!("⚠️ 帧{} 补发{}个 END (结果曾被丢弃)", batch.frame_id, ordered.len());
        }

        let mut begins = Vec::new();
        let mut updates = Vec::new();
        for mut event in batch.events {
            let known = self.tracks.contains_key(&event.label);
            match event.state {
                TrackState::End if known => ordered.push(event),
                TrackState::End => {}
                TrackState::Begin => begins.push(event),
                TrackState::Update if known => updates.push(event),
                TrackState::Update => {
                    event.state = TrackState::Begin;
                    event.previous_detection = None;
                    begins.push(event);
                }
            }
        }
        ordered.extend(begins);
        ordered.extend(updates);
        ordered
    }

    /// 当前活跃轨迹: 标签 → 最近一次检测框
    pub fn tracks(&self) -> &HashMap<usize, BBox> {
        &self.tracks
    }

    /// 最近一次交付结果的帧序号
    pub fn last_frame_id(&self) -> Option<u64> {
        self.last_frame_id
    }

    pub fn batches_per_second(&self) -> f64 {
        self.batches_per_second
    }

    /// 最近一次交付结果的耗时 (检测ms, 跟踪ms)
    pub fn last_timings(&self) -> (f64, f64) {
        (self.detect_ms, self.track_ms)
    }

    pub fn stats(&self) -> PipelineStats {
        self.process.stats()
    }

    pub fn reset_stats(&self) {
        self.process.reset_counts();
    }

    /// 停止检测线程 (Drop 时自动调用)
    pub fn shutdown(&mut self) {
        self.process.shutdown();
    }
}
