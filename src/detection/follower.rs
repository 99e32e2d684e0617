//! 跟踪跟随者 (每个标签一个有状态对象)
//! Per-label follower objects driven by [`Tracker`]
//!
//! 新标签 → `setup`, 持续标签 → `update`, 淘汰标签 → `kill`。
//! 被 kill 的跟随者保留在死亡列表中, 直到 `is_dead()` 为真 (用于淡出动画等)。

use super::trackable::Trackable;
use super::tracker::Tracker;

/// 跟随者接口
pub trait Follower<T> {
    /// 标签首次出现
    fn setup(&mut self, label: usize, track: &T);

    /// 标签本帧再次匹配
    fn update(&mut self, track: &T);

    /// 标签被淘汰
    fn kill(&mut self);

    /// 是否可以释放
    fn is_dead(&self) -> bool;
}

pub struct TrackerFollower<T, F> {
    tracker: Tracker<T>,
    labels: Vec<usize>,
    followers: Vec<F>,
    dead_followers: Vec<F>,
}

impl<T, F> TrackerFollower<T, F>
where
    T: Trackable,
    F: Follower<T> + Default,
{
    pub fn new(tracker: Tracker<T>) -> Self {
        Self {
            tracker,
            labels: Vec::new(),
            followers: Vec::new(),
            dead_followers: Vec::new(),
        }
    }

    pub fn track(&mut self, objects: &[T]) -> &[usize] {
        self.tracker.track(objects);

        // 淘汰
        for label in self.tracker.dead_labels() {
            if let Some(pos) = self.labels.iter().position(|&l| l == label) {
                self.labels.remove(pos);
                let mut follower = self.followers.remove(pos);
                follower.kill();
                self.dead_followers.push(follower);
            }
        }

        // 新建
        for label in self.tracker.new_labels() {
            let mut follower = F::default();
            follower.setup(label, self.tracker.get_current(label));
            self.labels.push(label);
            self.followers.push(follower);
        }

        // 更新 (幽灵轨迹不更新)
        for (label, follower) in self.labels.iter().zip(self.followers.iter_mut()) {
            if let Some(object) = self.tracker.current_object(*label) {
                if object.index().is_some() && object.age() > 1 {
                    follower.update(object.object());
                }
            }
        }

        self.dead_followers.retain(|follower| !follower.is_dead());

        self.tracker.labels()
    }

    /// 活跃的跟随者及其标签
    pub fn followers(&self) -> impl Iterator<Item = (usize, &F)> {
        self.labels.iter().copied().zip(self.followers.iter())
    }

    /// 已被 kill 但尚未死亡的跟随者
    pub fn dead_followers(&self) -> &[F] {
        &self.dead_followers
    }

    pub fn tracker(&self) -> &Tracker<T> {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut Tracker<T> {
        &mut self.tracker
    }
}
