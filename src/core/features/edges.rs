use image::{GrayImage, Luma};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use super::config::EdgeThresholds;

const EDGE_ON: u8 = 255;

/// Canny 边缘检测：Sobel（不做高斯预平滑）+ L1 幅值 + 非极大值抑制 + 双阈值滞后连接
/// 边界按复制像素处理，纯色图不会产生边框伪边缘
pub fn canny(gray: &GrayImage, thresholds: EdgeThresholds) -> GrayImage {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let mut edges = GrayImage::new(gray.width(), gray.height());
    if w == 0 || h == 0 {
        return edges;
    }

    let (gx, gy, magnitude) = sobel(gray);
    let candidates = suppress_non_maxima(&gx, &gy, &magnitude, w, h, thresholds.low);

    // 强边缘作为种子，沿 8 邻域吸收弱边缘
    let mut accepted = vec![false; w * h];
    let mut stack: Vec<usize> = Vec::new();
    for (idx, &is_candidate) in candidates.iter().enumerate() {
        if is_candidate && magnitude[idx] as f32 > thresholds.high {
            accepted[idx] = true;
            stack.push(idx);
        }
    }

    while let Some(idx) = stack.pop() {
        let (x, y) = ((idx % w) as i64, (idx / w) as i64);
        for ny in (y - 1)..=(y + 1) {
            for nx in (x - 1)..=(x + 1) {
                if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                    continue;
                }
                let n = ny as usize * w + nx as usize;
                if candidates[n] && !accepted[n] {
                    accepted[n] = true;
                    stack.push(n);
                }
            }
        }
    }

    for (idx, &on) in accepted.iter().enumerate() {
        if on {
            edges.put_pixel((idx % w) as u32, (idx / w) as u32, Luma([EDGE_ON]));
        }
    }
    edges
}

/// Arithmetic mean of an edge map.
pub fn mean_intensity(edges: &GrayImage) -> f64 {
    let count = edges.width() as usize * edges.height() as usize;
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = edges.pixels().map(|p| p.0[0] as u64).sum();
    sum as f64 / count as f64
}

/// 3x3 Sobel，imageproc 在边界复制像素
fn sobel(gray: &GrayImage) -> (Vec<i32>, Vec<i32>, Vec<i32>) {
    let gx: Vec<i32> = horizontal_sobel(gray).into_raw().into_iter().map(i32::from).collect();
    let gy: Vec<i32> = vertical_sobel(gray).into_raw().into_iter().map(i32::from).collect();
    let magnitude = gx.iter().zip(&gy).map(|(dx, dy)| dx.abs() + dy.abs()).collect();
    (gx, gy, magnitude)
}

fn suppress_non_maxima(
    gx: &[i32],
    gy: &[i32],
    magnitude: &[i32],
    w: usize,
    h: usize,
    low: f32,
) -> Vec<bool> {
    // tan(22.5°), tan(67.5°)
    const TAN_22_5: f64 = 0.414_213_562;
    const TAN_67_5: f64 = 2.414_213_562;

    let mag_at = |x: i64, y: i64| -> i32 {
        if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
            0
        } else {
            magnitude[y as usize * w + x as usize]
        }
    };

    let mut kept = vec![false; w * h];
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let idx = y as usize * w + x as usize;
            let m = magnitude[idx];
            if m as f32 <= low {
                continue;
            }

            let ax = (gx[idx] as f64).abs();
            let ay = (gy[idx] as f64).abs();

            let (before, after) = if ay <= ax * TAN_22_5 {
                (mag_at(x - 1, y), mag_at(x + 1, y))
            } else if ay > ax * TAN_67_5 {
                (mag_at(x, y - 1), mag_at(x, y + 1))
            } else if (gx[idx] > 0) == (gy[idx] > 0) {
                (mag_at(x - 1, y - 1), mag_at(x + 1, y + 1))
            } else {
                (mag_at(x + 1, y - 1), mag_at(x - 1, y + 1))
            };

            kept[idx] = m > before && m >= after;
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLDS: EdgeThresholds = EdgeThresholds {
        low: 100.0,
        high: 200.0,
    };

    fn create_step_image(width: u32, height: u32, split_x: u32, left: u8, right: u8) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| {
            if x < split_x {
                Luma([left])
            } else {
                Luma([right])
            }
        })
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        let gray = GrayImage::from_pixel(64, 64, Luma([128]));
        let edges = canny(&gray, THRESHOLDS);
        assert_eq!(mean_intensity(&edges), 0.0);
    }

    #[test]
    fn test_step_edge_is_one_pixel_wide() {
        let gray = create_step_image(100, 40, 50, 0, 255);
        let edges = canny(&gray, THRESHOLDS);

        for y in 0..40 {
            assert_eq!(edges.get_pixel(49, y).0[0], 255, "row {}", y);
            assert_eq!(edges.get_pixel(50, y).0[0], 0, "row {}", y);
            assert_eq!(edges.get_pixel(10, y).0[0], 0, "row {}", y);
        }

        let expected = 255.0 * 40.0 / (100.0 * 40.0);
        assert!((mean_intensity(&edges) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_low_contrast_step_is_ignored() {
        // Sobel 幅值 4 * 10 = 40，低于低阈值
        let gray = create_step_image(100, 40, 50, 100, 110);
        let edges = canny(&gray, THRESHOLDS);
        assert_eq!(mean_intensity(&edges), 0.0);
    }

    #[test]
    fn test_weak_edge_survives_only_when_connected() {
        // 幅值 4 * 40 = 160：介于高低阈值之间，没有强边缘种子
        let gray = create_step_image(60, 20, 30, 100, 140);
        let edges = canny(&gray, THRESHOLDS);
        assert_eq!(mean_intensity(&edges), 0.0);

        let looser = EdgeThresholds {
            low: 50.0,
            high: 150.0,
        };
        let edges = canny(&gray, looser);
        assert!(mean_intensity(&edges) > 0.0);
    }

    #[test]
    fn test_sobel_signs_and_replicated_border() {
        let gray = create_step_image(10, 6, 5, 0, 255);
        let (gx, gy, magnitude) = sobel(&gray);

        // 左暗右亮：gx 为正，gy 为 0
        let idx = 2 * 10 + 4;
        assert_eq!(gx[idx], 4 * 255);
        assert_eq!(gy[idx], 0);
        assert_eq!(magnitude[idx], 4 * 255);

        // 图像边界复制像素，纯色区域梯度为 0
        assert_eq!(magnitude[0], 0);
        assert_eq!(magnitude[9], 0);

        let rows = GrayImage::from_fn(6, 10, |_, y| if y < 5 { Luma([0]) } else { Luma([255]) });
        let (_, gy, _) = sobel(&rows);
        assert_eq!(gy[4 * 6 + 2], 4 * 255);
    }
}
