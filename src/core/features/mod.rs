//! 图像特征提取 - 从单张动物照片中得到固定结构的特征记录
//!
//! 处理流程：
//! 1. 归一化 - 缩放到固定正方形分辨率，阈值与原图尺寸无关
//! 2. 边缘强度 - Canny 边缘图的均值
//! 3. 姿态角度 - 宽松 Canny + 概率 Hough 线段，取角度中位数
//! 4. 眼部可见 - Haar 级联的存在性判断（粗略启发式）
//! 5. 张嘴判断 - 下半部平均亮度（粗略启发式）
//! 6. 主色调 - HSV 色相均值

pub mod config;
pub mod edges;
pub mod error;
pub mod extractor;
pub mod eye_detector;
pub mod lines;
pub mod raster;

pub use config::{EdgeThresholds, EyeDetectorConfig, ExtractorConfig, LineDetectorConfig};
pub use error::ExtractionError;
pub use extractor::{FeatureExtractor, FeatureRecord};
pub use eye_detector::{EyeDetector, EyeRegion, HaarEyeDetector, MockEyeDetector};
pub use lines::{LineSegment, SegmentDetector};
pub use raster::{PixelLayout, RasterImage};
