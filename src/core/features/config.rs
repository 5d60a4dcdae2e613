use serde::{Deserialize, Serialize};

/// 归一化后的正方形边长
pub const TARGET_SIZE: u32 = 224;

/// 边缘强度使用的 Canny 阈值
pub const EDGE_LOW_THRESHOLD: f32 = 100.0;
pub const EDGE_HIGH_THRESHOLD: f32 = 200.0;

/// 姿态估计使用的宽松 Canny 阈值
pub const LINE_EDGE_LOW_THRESHOLD: f32 = 50.0;
pub const LINE_EDGE_HIGH_THRESHOLD: f32 = 150.0;

/// Probabilistic Hough parameters (rho = 1px, theta = 1 degree).
pub const LINE_VOTE_THRESHOLD: u32 = 50;
pub const LINE_MIN_LENGTH: u32 = 50;
pub const LINE_MAX_GAP: u32 = 10;
pub const LINE_SAMPLE_SEED: u64 = 0x5eed_1e55;

/// Eye cascade sliding-window parameters.
pub const EYE_SCALE_FACTOR: f64 = 1.1;
pub const EYE_MIN_NEIGHBORS: u32 = 4;

/// 下半部平均亮度低于该值视为张嘴（粗略启发式）
pub const MOUTH_BRIGHTNESS_THRESHOLD: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeThresholds {
    pub low: f32,
    pub high: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineDetectorConfig {
    pub vote_threshold: u32,
    pub min_length: u32,
    pub max_gap: u32,
    pub seed: u64,
}

impl Default for LineDetectorConfig {
    fn default() -> Self {
        Self {
            vote_threshold: LINE_VOTE_THRESHOLD,
            min_length: LINE_MIN_LENGTH,
            max_gap: LINE_MAX_GAP,
            seed: LINE_SAMPLE_SEED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeDetectorConfig {
    pub scale_factor: f64,
    pub min_neighbors: u32,
}

impl Default for EyeDetectorConfig {
    fn default() -> Self {
        Self {
            scale_factor: EYE_SCALE_FACTOR,
            min_neighbors: EYE_MIN_NEIGHBORS,
        }
    }
}

/// Every threshold the extractor uses. Missing JSON fields fall back to the
/// defaults above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub target_size: u32,
    pub edge: EdgeThresholds,
    pub line_edge: EdgeThresholds,
    pub lines: LineDetectorConfig,
    pub eyes: EyeDetectorConfig,
    pub mouth_brightness_threshold: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            target_size: TARGET_SIZE,
            edge: EdgeThresholds {
                low: EDGE_LOW_THRESHOLD,
                high: EDGE_HIGH_THRESHOLD,
            },
            line_edge: EdgeThresholds {
                low: LINE_EDGE_LOW_THRESHOLD,
                high: LINE_EDGE_HIGH_THRESHOLD,
            },
            lines: LineDetectorConfig::default(),
            eyes: EyeDetectorConfig::default(),
            mouth_brightness_threshold: MOUTH_BRIGHTNESS_THRESHOLD,
        }
    }
}

impl ExtractorConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
