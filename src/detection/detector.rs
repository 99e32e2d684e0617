//! 检测器 (Detector)
//! 职责: 单帧图像 → 检测框列表, 在检测线程中反复调用

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use image::{imageops, Luma, RgbImage};
use imageproc::region_labelling::{connected_components, Connectivity};

use super::types::BBox;
use crate::config::TrackerConfig;

/// 检测器接口
///
/// 只会在检测线程中被调用, 可以有状态, 可以很慢。
/// 失败时返回 Err, 该帧不产生跟踪结果。
pub trait Detector: Send + 'static {
    type Frame: Send + 'static;

    fn find(&mut self, frame: &Self::Frame) -> Result<Vec<BBox>>;
}

/// 亮斑检测器: 亮度阈值 → 8连通域 → 外接矩形
///
/// 置信度 = 连通域像素数 / 外接矩形面积 × `confidence_scale`
#[derive(Clone, Debug)]
pub struct BlobDetector {
    threshold: u8,
    min_area: u32,
    confidence_scale: f32,
}

/// 连通域统计
struct Blob {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    pixels: u32,
}

impl BlobDetector {
    pub fn new(threshold: u8, min_area: u32) -> Self {
        Self {
            threshold,
            min_area,
            confidence_scale: 1.0,
        }
    }

    pub fn with_config(config: &TrackerConfig) -> Self {
        Self::new(config.blob_threshold, config.blob_min_area)
    }

    pub fn with_confidence_scale(mut self, scale: f32) -> Self {
        self.confidence_scale = scale;
        self
    }
}

impl Default for BlobDetector {
    fn default() -> Self {
        Self::new(128, 16)
    }
}

impl Detector for BlobDetector {
    type Frame = RgbImage;

    fn find(&mut self, frame: &RgbImage) -> Result<Vec<BBox>> {
        if frame.width() == 0 || frame.height() == 0 {
            bail!("空图像 {}x{}", frame.width(), frame.height());
        }

        // 1. RGB → 灰度 → 二值
        let mut mask = imageops::grayscale(frame);
        for pixel in mask.pixels_mut() {
            pixel.0[0] = if pixel.0[0] >= self.threshold { 255 } else { 0 };
        }

        // 2. 连通域标记 (背景为0)
        let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

        // 3. 统计每个连通域 (BTreeMap 保证输出顺序稳定)
        let mut blobs: BTreeMap<u32, Blob> = BTreeMap::new();
        for (x, y, pixel) in labels.enumerate_pixels() {
            let id = pixel.0[0];
            if id == 0 {
                continue;
            }
            let blob = blobs.entry(id).or_insert(Blob {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
                pixels: 0,
            });
            blob.min_x = blob.min_x.min(x);
            blob.min_y = blob.min_y.min(y);
            blob.max_x = blob.max_x.max(x);
            blob.max_y = blob.max_y.max(y);
            blob.pixels += 1;
        }

        // 4. 过滤小连通域 → 检测框
        let bboxes = blobs
            .values()
            .filter(|blob| blob.pixels >= self.min_area)
            .map(|blob| {
                let w = (blob.max_x - blob.min_x + 1) as f32;
                let h = (blob.max_y - blob.min_y + 1) as f32;
                let fill = blob.pixels as f32 / (w * h);
                BBox::from_xywh(
                    blob.min_x as f32,
                    blob.min_y as f32,
                    w,
                    h,
                    fill * self.confidence_scale,
                )
            })
            .collect();

        Ok(bboxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn fill_rect(image: &mut RgbImage, x: u32, y: u32, w: u32, h: u32) {
        for yy in y..y + h {
            for xx in x..x + w {
                image.put_pixel(xx, yy, Rgb([255, 255, 255]));
            }
        }
    }

    #[test]
    fn test_detects_bright_squares() {
        let mut frame = RgbImage::new(100, 80);
        fill_rect(&mut frame, 10, 10, 20, 20);
        fill_rect(&mut frame, 60, 40, 10, 15);

        let mut detector = BlobDetector::new(128, 16);
        let bboxes = detector.find(&frame).unwrap();
        assert_eq!(bboxes.len(), 2);
        assert_eq!(bboxes[0], BBox::from_xywh(10.0, 10.0, 20.0, 20.0, 1.0));
        assert_eq!(bboxes[1], BBox::from_xywh(60.0, 40.0, 10.0, 15.0, 1.0));
    }

    #[test]
    fn test_small_blobs_filtered() {
        let mut frame = RgbImage::new(50, 50);
        fill_rect(&mut frame, 5, 5, 3, 3);
        let mut detector = BlobDetector::new(128, 16);
        assert!(detector.find(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_confidence_is_fill_ratio() {
        let mut frame = RgbImage::new(50, 50);
        // L 形: 外接矩形 10x10, 填充 19 像素
        fill_rect(&mut frame, 10, 10, 10, 1);
        fill_rect(&mut frame, 10, 11, 1, 9);
        let mut detector = BlobDetector::new(128, 4).with_confidence_scale(2.0);
        let bboxes = detector.find(&frame).unwrap();
        assert_eq!(bboxes.len(), 1);
        assert!((bboxes[0].confidence - 2.0 * 19.0 / 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_frame_is_error() {
        let mut detector = BlobDetector::default();
        assert!(detector.find(&RgbImage::new(0, 0)).is_err());
    }
}
