use image::GrayImage;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::config::LineDetectorConfig;

const NUM_ANGLES: usize = 180;
const SHIFT: i64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSegment {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl LineSegment {
    /// `atan2(dy, dx)`，单位为度，范围 [-180, 180]
    pub fn angle_degrees(&self) -> f64 {
        ((self.y2 - self.y1) as f64)
            .atan2((self.x2 - self.x1) as f64)
            .to_degrees()
    }
}

/// 渐进式概率 Hough 变换（rho = 1px，theta = 1°）
///
/// Edge points are visited in a seeded shuffled order; once a point pushes an
/// accumulator cell past the vote threshold, the line through it is walked in
/// both directions (bridging gaps up to `max_gap`) and its pixels are removed
/// from further voting.
pub struct SegmentDetector {
    config: LineDetectorConfig,
    cos_table: Vec<f64>,
    sin_table: Vec<f64>,
}

impl SegmentDetector {
    pub fn new(config: LineDetectorConfig) -> Self {
        let (cos_table, sin_table): (Vec<f64>, Vec<f64>) = (0..NUM_ANGLES)
            .map(|n| {
                let theta = (n as f64).to_radians();
                (theta.cos(), theta.sin())
            })
            .unzip();

        Self {
            config,
            cos_table,
            sin_table,
        }
    }

    pub fn detect(&self, edges: &GrayImage) -> Vec<LineSegment> {
        let (w, h) = (edges.width() as i64, edges.height() as i64);
        if w == 0 || h == 0 {
            return Vec::new();
        }

        let num_rho = ((w + h) * 2 + 1) as usize;
        let rho_offset = (num_rho as i64 - 1) / 2;
        let mut accum = vec![0u32; NUM_ANGLES * num_rho];
        let mut mask = vec![false; (w * h) as usize];
        let mut points = Vec::new();

        for (x, y, p) in edges.enumerate_pixels() {
            if p.0[0] > 0 {
                mask[(y as i64 * w + x as i64) as usize] = true;
                points.push((x as i64, y as i64));
            }
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        points.shuffle(&mut rng);

        let rho_index = |n: usize, x: i64, y: i64| -> usize {
            let r = (x as f64 * self.cos_table[n] + y as f64 * self.sin_table[n]).round() as i64;
            n * num_rho + (r + rho_offset) as usize
        };

        let threshold = self.config.vote_threshold.max(1);
        let mut segments = Vec::new();

        for &(x, y) in &points {
            if !mask[(y * w + x) as usize] {
                continue;
            }

            let mut max_val = threshold - 1;
            let mut max_n = 0usize;
            for n in 0..NUM_ANGLES {
                let cell = &mut accum[rho_index(n, x, y)];
                *cell += 1;
                if *cell > max_val {
                    max_val = *cell;
                    max_n = n;
                }
            }

            if max_val < threshold {
                continue;
            }

            let walk = LineWalk::new(x, y, -self.sin_table[max_n], self.cos_table[max_n]);

            // 第一遍：找到两端端点
            let mut line_end = [(x, y); 2];
            for (k, end) in line_end.iter_mut().enumerate() {
                let mut gap = 0u32;
                for (px, py) in walk.steps(k == 1) {
                    if px < 0 || px >= w || py < 0 || py >= h {
                        break;
                    }
                    if mask[(py * w + px) as usize] {
                        gap = 0;
                        *end = (px, py);
                    } else {
                        gap += 1;
                        if gap > self.config.max_gap {
                            break;
                        }
                    }
                }
            }

            let min_length = self.config.min_length as i64;
            let good_line = (line_end[1].0 - line_end[0].0).abs() >= min_length
                || (line_end[1].1 - line_end[0].1).abs() >= min_length;

            // 第二遍：清除已归属像素，合格线段同时撤回投票
            for (k, end) in line_end.iter().enumerate() {
                for (px, py) in walk.steps(k == 1) {
                    let idx = (py * w + px) as usize;
                    if mask[idx] {
                        if good_line {
                            for n in 0..NUM_ANGLES {
                                let cell = &mut accum[rho_index(n, px, py)];
                                *cell = cell.saturating_sub(1);
                            }
                        }
                        mask[idx] = false;
                    }
                    if (px, py) == *end {
                        break;
                    }
                }
            }

            if good_line {
                segments.push(LineSegment {
                    x1: line_end[0].0,
                    y1: line_end[0].1,
                    x2: line_end[1].0,
                    y2: line_end[1].1,
                });
            }
        }

        segments
    }
}

/// Fixed-point stepping along direction `(a, b)`: the dominant axis moves one
/// pixel per step, the other accumulates a 16-bit fraction.
struct LineWalk {
    x0: i64,
    y0: i64,
    dx: i64,
    dy: i64,
    x_major: bool,
}

impl LineWalk {
    fn new(x: i64, y: i64, a: f64, b: f64) -> Self {
        let one = (1i64 << SHIFT) as f64;
        if a.abs() > b.abs() {
            Self {
                x0: x,
                y0: (y << SHIFT) + (1 << (SHIFT - 1)),
                dx: if a > 0.0 { 1 } else { -1 },
                dy: (b * one / a.abs()).round() as i64,
                x_major: true,
            }
        } else {
            Self {
                x0: (x << SHIFT) + (1 << (SHIFT - 1)),
                y0: y,
                dx: (a * one / b.abs()).round() as i64,
                dy: if b > 0.0 { 1 } else { -1 },
                x_major: false,
            }
        }
    }

    /// Pixel positions starting at the seed point, forward or reversed.
    fn steps(&self, reverse: bool) -> impl Iterator<Item = (i64, i64)> + '_ {
        let sign = if reverse { -1 } else { 1 };
        (0i64..).map(move |i| {
            let cx = self.x0 + sign * i * self.dx;
            let cy = self.y0 + sign * i * self.dy;
            if self.x_major {
                (cx, cy >> SHIFT)
            } else {
                (cx >> SHIFT, cy)
            }
        })
    }
}

/// 所有线段角度的中位数，没有线段时为 0
pub fn median_angle(segments: &[LineSegment]) -> f64 {
    if segments.is_empty() {
        return 0.0;
    }

    let mut angles: Vec<f64> = segments.iter().map(LineSegment::angle_degrees).collect();
    angles.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = angles.len() / 2;
    if angles.len() % 2 == 0 {
        (angles[mid - 1] + angles[mid]) / 2.0
    } else {
        angles[mid]
    }
}
