//! 异步处理器 (AsyncProcess)
//! 职责: 独立工作线程 + 输入/输出两个有界队列
//!
//! 丢帧策略:
//! - 输入: 队列满时 `try_enqueue_input` 直接返回 false; 工作线程取出一项后,
//!   若后面还有排队的输入, 跳过当前这项 (只处理最新帧)
//! - 输出: 队列满时先弹出最旧的结果再放入新结果 (滑动窗口)
//!
//! 关闭顺序: 先禁用队列 (唤醒阻塞的 recv), 再 join 工作线程。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// 流水线统计 (单调递增, 仅 `reset_counts` 清零)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// 调用变换函数的次数
    pub processed: u64,
    /// 输入队列满被拒绝 + 被更新输入顶替的过期输入
    pub dropped_inputs: u64,
    /// 输出队列满时被挤掉的旧结果
    pub dropped_outputs: u64,
    /// 变换函数返回 None 的次数
    pub declined: u64,
}

type Counts = Arc<Mutex<PipelineStats>>;

fn lock_counts(counts: &Mutex<PipelineStats>) -> MutexGuard<'_, PipelineStats> {
    counts.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 放入最新项, 队列满时弹出最旧项, 返回被挤掉的数量
///
/// 只允许一个生产者调用 (工作线程)。
pub fn push_newest<T>(tx: &Sender<T>, rx: &Receiver<T>, item: T) -> u64 {
    let mut item = item;
    let mut evicted = 0;
    loop {
        match tx.try_send(item) {
            Ok(()) => return evicted,
            Err(TrySendError::Full(back)) => {
                // 消费者可能刚取走一项: 先重试一次, 仍满才挤掉最旧项
                match tx.try_send(back) {
                    Ok(()) => return evicted,
                    Err(TrySendError::Full(back)) => {
                        item = back;
                        if rx.try_recv().is_ok() {
                            evicted += 1;
                        }
                    }
                    Err(TrySendError::Disconnected(_)) => return evicted,
                }
            }
            Err(TrySendError::Disconnected(_)) => return evicted,
        }
    }
}

struct Worker<In, Out, F> {
    input_rx: Receiver<In>,
    output_tx: Sender<Out>,
    output_rx: Receiver<Out>,
    enabled: Arc<AtomicBool>,
    counts: Counts,
    transform: F,
}

impl<In, Out, F> Worker<In, Out, F>
where
    F: FnMut(In) -> Option<Out>,
{
    fn run(mut self) {
        debug!("✅ 工作线程启动");

        while let Ok(item) = self.input_rx.recv() {
            if !self.enabled.load(Ordering::Acquire) {
                break;
            }

            // 后面还有更新的输入: 丢弃当前过期项
            if !self.input_rx.is_empty() {
                lock_counts(&self.counts).dropped_inputs += 1;
                continue;
            }

            let result = (self.transform)(item);

            match result {
                Some(output) => {
                    let evicted = push_newest(&self.output_tx, &self.output_rx, output);
                    let mut counts = lock_counts(&self.counts);
                    counts.dropped_outputs += evicted;
                    counts.processed += 1;
                }
                None => {
                    let mut counts = lock_counts(&self.counts);
                    counts.declined += 1;
                    counts.processed += 1;
                }
            }
        }

        debug!("✅ 工作线程退出");
    }
}

/// 在独立线程中执行阻塞变换 `In → Option<Out>`
pub struct AsyncProcess<In, Out> {
    input_tx: Option<Sender<In>>,
    output_rx: Receiver<Out>,
    enabled: Arc<AtomicBool>,
    counts: Counts,
    worker: Option<JoinHandle<()>>,
}

impl<In, Out> AsyncProcess<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// 创建并立即启动工作线程 (容量最小为1)
    pub fn new<F>(transform: F, input_capacity: usize, output_capacity: usize) -> Result<Self>
    where
        F: FnMut(In) -> Option<Out> + Send + 'static,
    {
        let (input_tx, input_rx) = bounded(input_capacity.max(1));
        let (output_tx, output_rx) = bounded(output_capacity.max(1));
        let enabled = Arc::new(AtomicBool::new(true));
        let counts = Counts::default();

        let worker = Worker {
            input_rx,
            output_tx,
            output_rx: output_rx.clone(),
            enabled: Arc::clone(&enabled),
            counts: Arc::clone(&counts),
            transform,
        };

        let handle = thread::Builder::new()
            .name("async-process".to_string())
            .spawn(move || worker.run())
            .map_err(Error::Spawn)?;

        info!(
            "🚀 异步处理器启动 (输入队列{} / 输出队列{})",
            input_capacity.max(1),
            output_capacity.max(1)
        );

        Ok(Self {
            input_tx: Some(input_tx),
            output_rx,
            enabled,
            counts,
            worker: Some(handle),
        })
    }
}

impl<In, Out> AsyncProcess<In, Out> {
    /// 非阻塞提交; 队列满或已关闭时返回 false, 该项被丢弃并计数
    pub fn try_enqueue_input(&self, item: In) -> bool {
        let accepted = match &self.input_tx {
            Some(tx) if self.enabled.load(Ordering::Acquire) => tx.try_send(item).is_ok(),
            _ => false,
        };
        if !accepted {
            lock_counts(&self.counts).dropped_inputs += 1;
        }
        accepted
    }

    /// 非阻塞取出最旧的结果
    pub fn try_dequeue_output(&self) -> Option<Out> {
        self.output_rx.try_recv().ok()
    }

    /// 非阻塞取出当前所有结果 (FIFO)
    pub fn drain_outputs(&self) -> Vec<Out> {
        self.output_rx.try_iter().collect()
    }

    pub fn dropped_inputs_count(&self) -> u64 {
        lock_counts(&self.counts).dropped_inputs
    }

    pub fn dropped_outputs_count(&self) -> u64 {
        lock_counts(&self.counts).dropped_outputs
    }

    pub fn declined_count(&self) -> u64 {
        lock_counts(&self.counts).declined
    }

    pub fn processed_count(&self) -> u64 {
        lock_counts(&self.counts).processed
    }

    pub fn stats(&self) -> PipelineStats {
        *lock_counts(&self.counts)
    }

    pub fn reset_counts(&self) {
        *lock_counts(&self.counts) = PipelineStats::default();
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// 禁用队列并等待工作线程退出 (可重复调用)
    ///
    /// 已排队但未处理的输入被丢弃; 正在执行的变换会执行完。
    pub fn shutdown(&mut self) {
        self.enabled.store(false, Ordering::Release);
        // 断开输入队列, 唤醒阻塞在 recv 上的工作线程
        self.input_tx.take();

        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("⚠️ 工作线程异常退出");
            } else {
                info!("🛑 异步处理器已停止");
            }
        }
    }
}

impl<In, Out> Drop for AsyncProcess<In, Out> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_push_newest_evicts_oldest() {
        let (tx, rx) = bounded(2);
        assert_eq!(push_newest(&tx, &rx, 1), 0);
        assert_eq!(push_newest(&tx, &rx, 2), 0);
        assert_eq!(push_newest(&tx, &rx, 3), 1);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_push_newest_with_concurrent_consumer() {
        let (tx, rx) = bounded::<u32>(1);
        let consumer_rx = rx.clone();
        let consumer = thread::spawn(move || {
            let mut received = Vec::new();
            let deadline = Instant::now() + Duration::from_secs(5);
            while Instant::now() < deadline {
                match consumer_rx.recv_timeout(Duration::from_millis(50)) {
                    Ok(item) => received.push(item),
                    Err(_) => break,
                }
            }
            received
        });

        let mut evicted = 0;
        for item in 0..2000u32 {
            evicted += push_newest(&tx, &rx, item);
        }
        let remaining: Vec<u32> = rx.try_iter().collect();
        drop(tx);
        let received = consumer.join().unwrap();

        // 每一项要么被取走, 要么被计为挤掉, 不会重复也不会丢失
        assert_eq!(received.len() as u64 + remaining.len() as u64 + evicted, 2000);
        assert!(received.windows(2).all(|w| w[0] < w[1]));
        let mut seen: Vec<u32> = received.iter().chain(remaining.iter()).copied().collect();
        let total = seen.len();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), total);
    }

    #[test]
    fn test_results_in_order() {
        let process = AsyncProcess::new(|x: u32| Some(x * 2), 4, 8).unwrap();
        for i in 1..=5u32 {
            assert!(process.try_enqueue_input(i));
            assert!(wait_until(|| process.processed_count() == i as u64));
        }
        assert_eq!(process.drain_outputs(), vec![2, 4, 6, 8, 10]);
        assert_eq!(process.try_dequeue_output(), None);
        let expected = PipelineStats {
            processed: 5,
            ..Default::default()
        };
        assert_eq!(process.stats(), expected);
    }

    #[test]
    fn test_backpressure_keeps_freshest_input() {
        let (started_tx, started_rx) = crossbeam_channel::unbounded();
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);

        let capacity = 3;
        let process = AsyncProcess::new(
            move |x: u32| {
                let _ = started_tx.send(x);
                if x == 0 {
                    // 第一项阻塞, 模拟慢速检测
                    let _ = gate_rx.recv();
                }
                Some(x)
            },
            capacity,
            8,
        )
        .unwrap();

        assert!(process.try_enqueue_input(0));
        assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)), Ok(0));

        // 工作线程阻塞期间提交 1..=10: 只有前 capacity 个进入队列
        let k = 10u32;
        let accepted: Vec<u32> = (1..=k).filter(|&i| process.try_enqueue_input(i)).collect();
        assert_eq!(accepted, vec![1, 2, 3]);

        gate_tx.send(()).unwrap();
        assert!(wait_until(|| process.processed_count() == 2));

        // 过期的 1、2 被跳过, 只处理最后进入队列的 3
        assert_eq!(process.drain_outputs(), vec![0, 3]);
        let submitted = (k + 1) as u64;
        assert_eq!(
            process.dropped_inputs_count(),
            submitted - process.processed_count()
        );
        assert_eq!(process.dropped_outputs_count(), 0);
    }

    #[test]
    fn test_output_evicts_oldest_when_full() {
        let process = AsyncProcess::new(|x: u32| Some(x), 4, 2).unwrap();
        for i in 1..=2u32 {
            assert!(process.try_enqueue_input(i));
            assert!(wait_until(|| process.processed_count() == i as u64));
        }
        assert_eq!(process.dropped_outputs_count(), 0);

        assert!(process.try_enqueue_input(3));
        assert!(wait_until(|| process.processed_count() == 3));
        assert_eq!(process.dropped_outputs_count(), 1);
        assert_eq!(process.drain_outputs(), vec![2, 3]);
    }

    #[test]
    fn test_declined_results_counted_separately() {
        let process = AsyncProcess::new(|x: u32| (x % 2 == 0).then_some(x), 4, 4).unwrap();
        for i in 1..=4u32 {
            assert!(process.try_enqueue_input(i));
            assert!(wait_until(|| process.processed_count() == i as u64));
        }
        assert_eq!(process.declined_count(), 2);
        assert_eq!(process.dropped_inputs_count(), 0);
        assert_eq!(process.dropped_outputs_count(), 0);
        assert_eq!(process.drain_outputs(), vec![2, 4]);
    }

    #[test]
    fn test_reset_counts() {
        let process = AsyncProcess::new(|_: u32| None::<u32>, 1, 1).unwrap();
        assert!(process.try_enqueue_input(1));
        assert!(wait_until(|| process.declined_count() == 1));
        process.reset_counts();
        assert_eq!(process.stats(), PipelineStats::default());
    }

    #[test]
    fn test_shutdown_while_blocked_on_empty_input() {
        let mut process = AsyncProcess::new(|x: u32| Some(x), 1, 1).unwrap();
        // 工作线程阻塞在空队列上
        thread::sleep(Duration::from_millis(20));

        let start = Instant::now();
        process.shutdown();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(!process.is_running());

        // 关闭后提交失败, 重复关闭无副作用
        assert!(!process.try_enqueue_input(1));
        process.shutdown();
    }

    #[test]
    fn test_drop_joins_worker() {
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<()>();
        {
            let _process = AsyncProcess::new(
                move |x: u32| {
                    let _ = &done_tx;
                    Some(x)
                },
                1,
                1,
            )
            .unwrap();
        }
        // 工作线程退出后闭包被释放, done_tx 随之断开
        assert!(done_rx.recv_timeout(Duration::from_secs(2)).is_err());
        assert!(matches!(
            done_rx.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        ));
    }
}
