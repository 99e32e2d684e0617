//! 合成场景跟踪演示 - 双线程架构 (主线程提交/分发 + 检测线程检测/跟踪)
//!
//! 主程序入口 - 直接运行: cargo run --bin tracker_demo --release
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use detection_tracker::renderer::annotate;
use detection_tracker::{
    BBox, BlobDetector, DetectionTracker, Smoothable, SyntheticScene, TrackState, TrackerConfig,
    TrackerEvent,
};

/// 合成场景跟踪演示程序
#[derive(Parser, Debug)]
#[command(author, version, about = "亮斑检测 + 贪心最近邻跟踪演示", long_about = None)]
struct Args {
    /// 配置文件路径 (不存在时写入默认配置)
    #[arg(short, long, default_value = "tracker_config.json")]
    config: PathBuf,

    /// 生成帧数
    #[arg(short, long, default_value_t = 300)]
    frames: u64,

    /// 场景中的方块数量
    #[arg(short, long, default_value_t = 5)]
    objects: usize,

    /// 随机种子
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// 帧宽
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// 帧高
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// 标注帧输出目录 (PNG), 不指定则不保存
    #[arg(long)]
    output: Option<PathBuf>,

    /// 帧间隔(毫秒)
    #[arg(long, default_value_t = 33)]
    tick_ms: u64,
}

fn log_event(event: &TrackerEvent) {
    match event.state {
        TrackState::Begin => info!("🆕 目标#{} 出现", event.label),
        TrackState::End => info!(
            "💀 目标#{} 消失 (存活{}帧, 丢失{}帧)",
            event.label, event.age, event.last_seen
        ),
        TrackState::Update => {}
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = TrackerConfig::load(&args.config);
    config.log_summary();

    if let Some(dir) = &args.output {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("无法创建输出目录 {}", dir.display()))?;
        info!("💾 标注帧输出到: {}", dir.display());
    }

    let mut scene = SyntheticScene::new(args.width, args.height, args.objects, args.seed);
    info!(
        "🎬 合成场景: {}x{} | {}个目标 | 种子{}",
        scene.width(),
        scene.height(),
        args.objects,
        args.seed
    );

    let detector = BlobDetector::with_config(&config);
    let mut tracker = DetectionTracker::new(detector, &config).context("启动检测线程失败")?;
    tracker.on_event(log_event);

    let tick = Duration::from_millis(args.tick_ms);
    let mut rejected = 0u64;
    let mut events = 0usize;
    let mut last_report = Instant::now();
    // 标注用的平滑框 (标签 → 平滑后的检测框)
    let mut smoothed_tracks: HashMap<usize, BBox> = HashMap::new();

    for _ in 0..args.frames {
        let frame_start = Instant::now();
        let frame = scene.next_frame();

        if !tracker.track_frame(frame.clone()) {
            rejected += 1;
        }
        events += tracker.update();

        for (label, bbox) in tracker.tracks() {
            let smoothed = match smoothed_tracks.get(label) {
                Some(previous) => previous.lerp(bbox, config.smoothing_rate),
                None => bbox.clone(),
            };
            smoothed_tracks.insert(*label, smoothed);
        }
        smoothed_tracks.retain(|label, _| tracker.tracks().contains_key(label));

        if let Some(dir) = &args.output {
            let path = dir.join(format!("frame_{:05}.png", scene.frame_index()));
            if let Err(e) = annotate(&frame, &smoothed_tracks).save(&path) {
                warn!("❌ 保存 {} 失败: {}", path.display(), e);
            }
        }

        if last_report.elapsed().as_secs() >= 1 {
            let stats = tracker.stats();
            let (detect_ms, track_ms) = tracker.last_timings();
            info!(
                "📊 跟踪{}个 (真值{}) | {:.1}批/秒 (检测:{:.1}ms | 跟踪:{:.2}ms) | 处理{} 丢输入{} 丢输出{} 失败{}",
                tracker.tracks().len(),
                scene.ground_truth().len(),
                tracker.batches_per_second(),
                detect_ms,
                track_ms,
                stats.processed,
                stats.dropped_inputs,
                stats.dropped_outputs,
                stats.declined
            );
            last_report = Instant::now();
        }

        if let Some(rest) = tick.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    // 收尾: 给检测线程一点时间交付最后的结果
    std::thread::sleep(tick);
    events += tracker.update();
    tracker.shutdown();

    let stats = tracker.stats();
    info!(
        "✅ 完成: {}帧 | {}个事件 | 提交被拒{} | 处理{} | 丢输入{} | 丢输出{}",
        args.frames, events, rejected, stats.processed, stats.dropped_inputs, stats.dropped_outputs
    );

    Ok(())
}
