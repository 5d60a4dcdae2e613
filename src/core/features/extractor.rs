use std::panic::{self, AssertUnwindSafe};

use log::{debug, error};
use serde::{Deserialize, Serialize};

use super::config::ExtractorConfig;
use super::edges::{canny, mean_intensity};
use super::error::ExtractionError;
use super::eye_detector::{EyeDetector, HaarEyeDetector};
use super::lines::{median_angle, SegmentDetector};
use super::raster::{lower_half_mean, mean_hue, normalize_resolution, to_luminance, RasterImage};

/// 单张图像的结构化特征，产出后不可变且字段完整
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Median line-segment orientation in degrees, 0 when no segments exist.
    pub posture_angle: f64,
    pub eye_visible: bool,
    /// Brightness proxy only: a dark lower half is read as a possibly open
    /// mouth.
    pub mouth_open_likely: bool,
    pub edge_intensity: f64,
    /// Mean hue in degrees, `[0, 360)`.
    pub color_dominance: f64,
}

impl FeatureRecord {
    fn is_complete(&self) -> bool {
        self.posture_angle.is_finite()
            && self.edge_intensity.is_finite()
            && self.edge_intensity >= 0.0
            && self.color_dominance.is_finite()
            && (0.0..360.0).contains(&self.color_dominance)
    }
}

pub struct FeatureExtractor {
    config: ExtractorConfig,
    segment_detector: SegmentDetector,
    eye_detector: Box<dyn EyeDetector>,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::with_config(ExtractorConfig::default())
    }

    pub fn with_config(config: ExtractorConfig) -> Self {
        let eye_detector = Box::new(HaarEyeDetector::with_config(config.eyes));
        Self::with_eye_detector(config, eye_detector)
    }

    pub fn with_eye_detector(config: ExtractorConfig, eye_detector: Box<dyn EyeDetector>) -> Self {
        Self {
            segment_detector: SegmentDetector::new(config.lines),
            config,
            eye_detector,
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// 提取特征。任何内部异常（包括 panic）都归为 `ExtractionError`，
    /// 不会返回不完整的记录
    pub fn extract(&self, image: &RasterImage) -> Result<FeatureRecord, ExtractionError> {
        image.validate()?;
        self.check_config()?;
        guard_faults(|| self.compute(image))
    }

    /// Decodes uploaded bytes and extracts, with the decoder running inside
    /// the same fault boundary as the feature computation.
    pub fn extract_encoded(&self, bytes: &[u8]) -> Result<FeatureRecord, ExtractionError> {
        self.check_config()?;
        guard_faults(|| {
            let image = RasterImage::decode(bytes)?;
            image.validate()?;
            debug!("🖼️ Decoded {}x{} upload", image.width, image.height);
            self.compute(&image)
        })
    }

    fn check_config(&self) -> Result<(), ExtractionError> {
        if self.config.target_size == 0 {
            return Err(ExtractionError::Internal(
                "target size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn compute(&self, image: &RasterImage) -> Result<FeatureRecord, ExtractionError> {
        let rgb = normalize_resolution(image.to_rgb_image()?, self.config.target_size);
        let gray = to_luminance(&rgb);

        let edge_intensity = mean_intensity(&canny(&gray, self.config.edge));

        let line_edges = canny(&gray, self.config.line_edge);
        let segments = self.segment_detector.detect(&line_edges);
        let posture_angle = median_angle(&segments);

        let eye_regions = self.eye_detector.detect(&gray);

        let lower_mean = lower_half_mean(&gray);
        let mouth_open_likely = lower_mean < self.config.mouth_brightness_threshold;

        let color_dominance = mean_hue(&rgb);

        debug!(
            "🔍 {}x{} -> {} segments, {} eye regions, lower-half mean {:.1}",
            image.width,
            image.height,
            segments.len(),
            eye_regions.len(),
            lower_mean
        );

        Ok(FeatureRecord {
            posture_angle,
            eye_visible: !eye_regions.is_empty(),
            mouth_open_likely,
            edge_intensity,
            color_dominance,
        })
    }
}

/// panic 转为 `ExtractionError::Internal`，并拒绝不完整的记录
fn guard_faults<F>(work: F) -> Result<FeatureRecord, ExtractionError>
where
    F: FnOnce() -> Result<FeatureRecord, ExtractionError>,
{
    let record = match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(result) => result?,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("❌ Feature extraction panicked: {}", message);
            return Err(ExtractionError::Internal(message));
        }
    };

    if !record.is_complete() {
        return Err(ExtractionError::Internal(format!(
            "incomplete feature record: {:?}",
            record
        )));
    }
    Ok(record)
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}
