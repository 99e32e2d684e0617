//! 合成场景 (SyntheticScene)
//! 深色背景上若干匀速运动的亮色方块, 碰到边缘反弹, 偶尔短暂消失。
//! 同一个种子生成完全相同的帧序列。

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::detection::{BBox, Point2};

const BACKGROUND: Rgb<u8> = Rgb([16, 16, 24]);

/// 默认每帧消失概率
const DEFAULT_BLINK_PROBABILITY: f64 = 0.02;

#[derive(Clone, Debug)]
struct SceneObject {
    position: Point2, // 左上角
    velocity: Point2,
    size: u32,
    color: Rgb<u8>,
    hidden_frames: u32,
}

impl SceneObject {
    fn pixel_origin(&self) -> (u32, u32) {
        (self.position.x.round() as u32, self.position.y.round() as u32)
    }
}

/// 合成测试场景
pub struct SyntheticScene {
    width: u32,
    height: u32,
    rng: StdRng,
    objects: Vec<SceneObject>,
    blink_probability: f64,
    frame_index: u64,
}

impl SyntheticScene {
    pub fn new(width: u32, height: u32, object_count: usize, seed: u64) -> Self {
        let width = width.max(32);
        let height = height.max(32);
        let mut rng = StdRng::seed_from_u64(seed);

        let max_size = (width.min(height) / 6).max(8);
        let objects = (0..object_count)
            .map(|_| {
                let size = rng.gen_range(8..=max_size);
                let position = Point2::new(
                    rng.gen_range(0.0..(width - size) as f32),
                    rng.gen_range(0.0..(height - size) as f32),
                );
                let speed = rng.gen_range(1.0..4.0f32);
                let angle = rng.gen_range(0.0..std::f32::consts::TAU);
                // 亮色, 灰度一定高于128
                let color = Rgb([
                    rng.gen_range(160..=255),
                    rng.gen_range(160..=255),
                    rng.gen_range(160..=255),
                ]);
                SceneObject {
                    position,
                    velocity: Point2::new(speed * angle.cos(), speed * angle.sin()),
                    size,
                    color,
                    hidden_frames: 0,
                }
            })
            .collect();

        Self {
            width,
            height,
            rng,
            objects,
            blink_probability: DEFAULT_BLINK_PROBABILITY,
            frame_index: 0,
        }
    }

    /// 设置每帧消失概率 (0 表示从不消失)
    pub fn with_blink_probability(mut self, probability: f64) -> Self {
        self.blink_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// 已生成的帧数
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// 推进一步并渲染
    pub fn next_frame(&mut self) -> RgbImage {
        self.step();
        self.frame_index += 1;

        let mut frame = RgbImage::from_pixel(self.width, self.height, BACKGROUND);
        for object in self.objects.iter().filter(|o| o.hidden_frames == 0) {
            let (x, y) = object.pixel_origin();
            draw_filled_rect_mut(
                &mut frame,
                Rect::at(x as i32, y as i32).of_size(object.size, object.size),
                object.color,
            );
        }
        frame
    }

    /// 当前帧中可见方块的真实位置
    pub fn ground_truth(&self) -> Vec<BBox> {
        self.objects
            .iter()
            .filter(|o| o.hidden_frames == 0)
            .map(|o| {
                let (x, y) = o.pixel_origin();
                BBox::from_xywh(x as f32, y as f32, o.size as f32, o.size as f32, 1.0)
            })
            .collect()
    }

    fn step(&mut self) {
        let (width, height) = (self.width as f32, self.height as f32);

        for object in &mut self.objects {
            let size = object.size as f32;

            object.position.x += object.velocity.x;
            object.position.y += object.velocity.y;

            // 边缘反弹
            if object.position.x < 0.0 {
                object.position.x = -object.position.x;
                object.velocity.x = -object.velocity.x;
            } else if object.position.x > width - size {
                object.position.x = 2.0 * (width - size) - object.position.x;
                object.velocity.x = -object.velocity.x;
            }
            if object.position.y < 0.0 {
                object.position.y = -object.position.y;
                object.velocity.y = -object.velocity.y;
            } else if object.position.y > height - size {
                object.position.y = 2.0 * (height - size) - object.position.y;
                object.velocity.y = -object.velocity.y;
            }
            object.position.x = object.position.x.clamp(0.0, width - size);
            object.position.y = object.position.y.clamp(0.0, height - size);

            // 闪烁
            if object.hidden_frames > 0 {
                object.hidden_frames -= 1;
            } else if self.blink_probability > 0.0 && self.rng.gen_bool(self.blink_probability) {
                object.hidden_frames = self.rng.gen_range(1..=3);
            }
        }
    }
}
