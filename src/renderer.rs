//! 结果标注 (演示输出用)

use std::collections::HashMap;

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::detection::BBox;

/// 边框线宽(像素)
const LINE_WIDTH: i32 = 2;

/// 在帧上为每条轨迹画出按标签着色的矩形框
pub fn annotate(frame: &RgbImage, tracks: &HashMap<usize, BBox>) -> RgbImage {
    let mut canvas = frame.clone();

    // 按标签排序, 重叠时绘制结果稳定
    let mut labels: Vec<&usize> = tracks.keys().collect();
    labels.sort();

    for label in labels {
        let bbox = &tracks[label];
        let color = label_to_color(*label);
        for inset in 0..LINE_WIDTH {
            let w = (bbox.width() as i32 - 2 * inset).max(1) as u32;
            let h = (bbox.height() as i32 - 2 * inset).max(1) as u32;
            let rect = Rect::at(bbox.x1 as i32 + inset, bbox.y1 as i32 + inset).of_size(w, h);
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }
    }

    canvas
}

/// 根据标签生成不同颜色
pub fn label_to_color(label: usize) -> Rgb<u8> {
    let hue = (label as f32 * 137.508) % 360.0; // 黄金角度采样
    let (r, g, b) = hsv_to_rgb(hue, 0.8, 0.9);
    Rgb([r, g, b])
}

/// HSV转RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (u8, u8, u8) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    (
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_colors_differ() {
        assert_ne!(label_to_color(0), label_to_color(1));
        assert_ne!(label_to_color(1), label_to_color(2));
        assert_eq!(label_to_color(5), label_to_color(5));
    }

    #[test]
    fn test_hsv_primary_hues() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), (255, 0, 0));
        assert_eq!(hsv_to_rgb(120.0, 1.0, 1.0), (0, 255, 0));
        assert_eq!(hsv_to_rgb(240.0, 1.0, 1.0), (0, 0, 255));
    }

    #[test]
    fn test_annotate_draws_border_only() {
        let frame = RgbImage::new(40, 40);
        let mut tracks = HashMap::new();
        tracks.insert(3, BBox::from_xywh(10.0, 10.0, 10.0, 10.0, 1.0));

        let out = annotate(&frame, &tracks);
        let color = label_to_color(3);
        assert_eq!(*out.get_pixel(10, 10), color);
        assert_eq!(*out.get_pixel(11, 15), color);
        assert_eq!(*out.get_pixel(15, 15), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(0, 0), Rgb([0, 0, 0]));
        // 原图不变
        assert_eq!(*frame.get_pixel(10, 10), Rgb([0, 0, 0]));
    }
}
