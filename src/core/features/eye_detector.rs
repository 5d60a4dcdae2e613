//! 眼部检测
//!
//! `HaarEyeDetector` 的级联权重是手工设定的，不是训练得到的模型：
//! 它只认"暗斑 + 更亮的周围"这一结构。纹理噪声、暗色斜条纹等都可能误检，
//! 所以 `eye_visible` 只是粗略的存在性信号。需要更准确的结果时，
//! 通过 `EyeDetector` 替换为真正训练过的检测器。

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::integral_image::{integral_image, integral_squared_image};

use super::config::EyeDetectorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// 眼部区域检测。只作为"是否可见"的粗略判断，误检是已知局限
pub trait EyeDetector: Send + Sync {
    fn detect(&self, gray: &GrayImage) -> Vec<EyeRegion>;
}

pub struct MockEyeDetector {
    regions: Vec<EyeRegion>,
}

impl MockEyeDetector {
    pub fn none() -> Self {
        Self {
            regions: Vec::new(),
        }
    }

    pub fn with_regions(regions: Vec<EyeRegion>) -> Self {
        Self { regions }
    }
}

impl Default for MockEyeDetector {
    fn default() -> Self {
        Self::none()
    }
}

impl EyeDetector for MockEyeDetector {
    fn detect(&self, _gray: &GrayImage) -> Vec<EyeRegion> {
        self.regions.clone()
    }
}

// ---------------------------------------------------------------------------
// Haar-like cascade
// ---------------------------------------------------------------------------

const BASE_WINDOW: u32 = 20;
const BASE_STEP: f64 = 2.0;
/// 窗口内标准差低于此值视为平坦区域，直接跳过
const MIN_WINDOW_STD: f64 = 8.0;
/// Rectangle grouping tolerance.
const GROUP_EPS: f64 = 0.2;

struct HaarRect {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    weight: f64,
}

struct WeakClassifier {
    /// The first rectangle's weight is re-derived per scale so a flat window
    /// always scores exactly zero.
    rects: &'static [HaarRect],
    threshold: f64,
    below: f64,
    above: f64,
}

struct CascadeStage {
    classifiers: &'static [WeakClassifier],
    threshold: f64,
}

const fn rect(x: u32, y: u32, w: u32, h: u32, weight: f64) -> HaarRect {
    HaarRect { x, y, w, h, weight }
}

/// 20x20 窗口内的手工级联（非训练权重）：
/// stage 0 - 中心暗于周围（虹膜/瞳孔）且中间横带偏暗（眼裂）
/// stage 1 - 中心暗于左右两侧（眼白/眼睑）
static EYE_CASCADE: &[CascadeStage] = &[
    CascadeStage {
        classifiers: &[
            WeakClassifier {
                rects: &[rect(4, 4, 12, 12, 1.0), rect(7, 7, 6, 6, -4.0)],
                threshold: 0.1,
                below: -1.0,
                above: 1.0,
            },
            WeakClassifier {
                rects: &[rect(2, 4, 16, 12, 1.0), rect(2, 8, 16, 4, -3.0)],
                threshold: 0.05,
                below: -0.4,
                above: 0.4,
            },
        ],
        threshold: 1.2,
    },
    CascadeStage {
        classifiers: &[WeakClassifier {
            rects: &[
                rect(8, 7, 4, 6, -2.0),
                rect(3, 7, 4, 6, 1.0),
                rect(13, 7, 4, 6, 1.0),
            ],
            threshold: 0.05,
            below: -1.0,
            above: 1.0,
        }],
        threshold: 0.5,
    },
];

/// Sliding-window cascade over integral images, multi-scale, with neighbour
/// grouping of raw hits.
pub struct HaarEyeDetector {
    config: EyeDetectorConfig,
}

impl HaarEyeDetector {
    pub fn new() -> Self {
        Self::with_config(EyeDetectorConfig::default())
    }

    pub fn with_config(config: EyeDetectorConfig) -> Self {
        Self { config }
    }

    fn scan(&self, integral: &IntegralImage) -> Vec<EyeRegion> {
        let mut hits = Vec::new();
        // scale_factor <= 1 会导致死循环
        let scale_factor = self.config.scale_factor.max(1.01);
        let mut scale = 1.0f64;

        loop {
            let win = (BASE_WINDOW as f64 * scale).round() as u32;
            if win > integral.width || win > integral.height {
                break;
            }

            let step = ((BASE_STEP * scale).round() as u32).max(1);
            let scaled = ScaledCascade::new(scale);

            let mut y = 0;
            while y + win <= integral.height {
                let mut x = 0;
                while x + win <= integral.width {
                    if scaled.accepts(integral, x, y, win) {
                        hits.push(EyeRegion {
                            x,
                            y,
                            width: win,
                            height: win,
                        });
                    }
                    x += step;
                }
                y += step;
            }

            scale *= scale_factor;
        }

        hits
    }
}

impl Default for HaarEyeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl EyeDetector for HaarEyeDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<EyeRegion> {
        let integral = IntegralImage::new(gray);
        let hits = self.scan(&integral);
        group_regions(&hits, self.config.min_neighbors)
    }
}

struct ScaledRect {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    weight: f64,
}

struct ScaledStage {
    classifiers: Vec<(Vec<ScaledRect>, &'static WeakClassifier)>,
    threshold: f64,
}

struct ScaledCascade {
    stages: Vec<ScaledStage>,
}

impl ScaledCascade {
    fn new(scale: f64) -> Self {
        let scale_dim = |v: u32| ((v as f64 * scale).round() as u32).max(1);

        let stages = EYE_CASCADE
            .iter()
            .map(|stage| ScaledStage {
                classifiers: stage
                    .classifiers
                    .iter()
                    .map(|weak| {
                        let mut rects: Vec<ScaledRect> = weak
                            .rects
                            .iter()
                            .map(|r| ScaledRect {
                                x: (r.x as f64 * scale).round() as u32,
                                y: (r.y as f64 * scale).round() as u32,
                                w: scale_dim(r.w),
                                h: scale_dim(r.h),
                                weight: r.weight,
                            })
                            .collect();

                        let rest: f64 = rects
                            .iter()
                            .skip(1)
                            .map(|r| r.weight * (r.w * r.h) as f64)
                            .sum();
                        if let Some(first) = rects.first_mut() {
                            first.weight = -rest / (first.w * first.h) as f64;
                        }
                        (rects, weak)
                    })
                    .collect(),
                threshold: stage.threshold,
            })
            .collect();

        Self { stages }
    }

    fn accepts(&self, integral: &IntegralImage, x: u32, y: u32, win: u32) -> bool {
        let area = (win as f64) * (win as f64);
        let sum = integral.sum(x, y, win, win) as f64;
        let sq_sum = integral.sq_sum(x, y, win, win) as f64;
        let mean = sum / area;
        let variance = sq_sum / area - mean * mean;
        if variance < MIN_WINDOW_STD * MIN_WINDOW_STD {
            return false;
        }
        let norm = area * variance.sqrt();

        self.stages.iter().all(|stage| {
            let score: f64 = stage
                .classifiers
                .iter()
                .map(|(rects, weak)| {
                    let raw: f64 = rects
                        .iter()
                        .map(|r| r.weight * integral.sum(x + r.x, y + r.y, r.w, r.h) as f64)
                        .sum();
                    if raw / norm < weak.threshold {
                        weak.below
                    } else {
                        weak.above
                    }
                })
                .sum();
            score >= stage.threshold
        })
    }
}

/// 积分图与平方积分图，尺寸为 (w+1)x(h+1)，首行首列为 0
struct IntegralImage {
    width: u32,
    height: u32,
    sums: Image<Luma<u64>>,
    sq_sums: Image<Luma<u64>>,
}

impl IntegralImage {
    fn new(gray: &GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        Self {
            width,
            height,
            sums: integral_image::<_, u64>(gray),
            sq_sums: integral_squared_image::<_, u64>(gray),
        }
    }

    fn region(table: &Image<Luma<u64>>, x: u32, y: u32, w: u32, h: u32) -> u64 {
        let at = |px: u32, py: u32| table.get_pixel(px, py).0[0];
        let (x1, y1) = (x + w, y + h);
        at(x1, y1) + at(x, y) - at(x1, y) - at(x, y1)
    }

    fn sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        Self::region(&self.sums, x, y, w, h)
    }

    fn sq_sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        Self::region(&self.sq_sums, x, y, w, h)
    }
}

fn similar(a: &EyeRegion, b: &EyeRegion) -> bool {
    let delta = GROUP_EPS * (a.width.min(b.width) + a.height.min(b.height)) as f64 * 0.5;
    let close = |p: u32, q: u32| (p as f64 - q as f64).abs() <= delta;
    close(a.x, b.x)
        && close(a.y, b.y)
        && close(a.x + a.width, b.x + b.width)
        && close(a.y + a.height, b.y + b.height)
}

fn find_root(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// 聚类相似窗口，只保留命中数超过 `min_neighbors` 的簇，输出簇内平均框
fn group_regions(hits: &[EyeRegion], min_neighbors: u32) -> Vec<EyeRegion> {
    if min_neighbors == 0 {
        return hits.to_vec();
    }

    let mut parent: Vec<usize> = (0..hits.len()).collect();
    for i in 0..hits.len() {
        for j in (i + 1)..hits.len() {
            if similar(&hits[i], &hits[j]) {
                let (ri, rj) = (find_root(&mut parent, i), find_root(&mut parent, j));
                if ri != rj {
                    parent[rj] = ri;
                }
            }
        }
    }

    // root -> (count, sum x, sum y, sum w, sum h)
    let mut clusters: Vec<(usize, [u64; 5])> = Vec::new();
    for i in 0..hits.len() {
        let root = find_root(&mut parent, i);
        let hit = &hits[i];
        let slot = match clusters.iter().position(|(r, _)| *r == root) {
            Some(slot) => slot,
            None => {
                clusters.push((root, [0; 5]));
                clusters.len() - 1
            }
        };
        let acc = &mut clusters[slot].1;
        acc[0] += 1;
        acc[1] += hit.x as u64;
        acc[2] += hit.y as u64;
        acc[3] += hit.width as u64;
        acc[4] += hit.height as u64;
    }

    clusters
        .into_iter()
        .filter(|(_, acc)| acc[0] > min_neighbors as u64)
        .map(|(_, acc)| {
            let n = acc[0];
            EyeRegion {
                x: (acc[1] / n) as u32,
                y: (acc[2] / n) as u32,
                width: (acc[3] / n) as u32,
                height: (acc[4] / n) as u32,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_disk_image(size: u32, cx: i64, cy: i64, radius: i64) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let (dx, dy) = (x as i64 - cx, y as i64 - cy);
            if dx * dx + dy * dy <= radius * radius {
                Luma([30])
            } else {
                Luma([200])
            }
        })
    }

    #[test]
    fn test_mock_detector() {
        let gray = GrayImage::new(10, 10);
        assert!(MockEyeDetector::none().detect(&gray).is_empty());

        let region = EyeRegion {
            x: 1,
            y: 2,
            width: 3,
            height: 4,
        };
        let detector = MockEyeDetector::with_regions(vec![region]);
        assert_eq!(detector.detect(&gray), vec![region]);
    }

    #[test]
    fn test_integral_sums() {
        let gray = GrayImage::from_fn(4, 3, |x, y| Luma([(x + y * 4) as u8]));
        let integral = IntegralImage::new(&gray);
        assert_eq!(integral.sum(0, 0, 4, 3), (0..12).sum::<u64>());
        assert_eq!(integral.sum(1, 1, 2, 2), 5 + 6 + 9 + 10);
        assert_eq!(integral.sq_sum(0, 0, 2, 1), 1);
    }

    #[test]
    fn test_flat_image_has_no_eyes() {
        let gray = GrayImage::from_pixel(224, 224, Luma([128]));
        assert!(HaarEyeDetector::new().detect(&gray).is_empty());
    }

    #[test]
    fn test_dark_disk_is_detected() {
        let gray = create_disk_image(64, 32, 32, 4);
        let regions = HaarEyeDetector::new().detect(&gray);

        assert!(!regions.is_empty());
        let r = regions[0];
        assert!(r.x <= 32 && 32 <= r.x + r.width);
        assert!(r.y <= 32 && 32 <= r.y + r.height);
    }

    #[test]
    fn test_bright_disk_is_not_an_eye() {
        let gray = GrayImage::from_fn(64, 64, |x, y| {
            let (dx, dy) = (x as i64 - 32, y as i64 - 32);
            if dx * dx + dy * dy <= 16 {
                Luma([230])
            } else {
                Luma([40])
            }
        });
        assert!(HaarEyeDetector::new().detect(&gray).is_empty());
    }

    #[test]
    fn test_grouping_drops_isolated_hits() {
        let hit = |x: u32| EyeRegion {
            x,
            y: 0,
            width: 20,
            height: 20,
        };
        let hits = vec![hit(0), hit(1), hit(2), hit(1), hit(0), hit(150)];

        let grouped = group_regions(&hits, 4);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].x, 0);

        assert_eq!(group_regions(&hits, 0).len(), hits.len());
    }
}
