use std::sync::atomic::{AtomicBool, Ordering};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::core::features::{ExtractionError, FeatureExtractor, FeatureRecord, RasterImage};
use crate::core::inference::{InferenceError, InferenceGateway};
use crate::core::normalizer::normalize;
use crate::core::prompt::{build_prompt, PromptInput};

#[derive(Debug, Clone)]
pub enum ImageInput {
    /// 上传的原始文件字节，由提取阶段负责解码
    Encoded(Vec<u8>),
    Decoded(RasterImage),
}

/// Exactly one of `image` / `description` is expected.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub image: Option<ImageInput>,
    pub description: Option<String>,
}

impl AnalysisRequest {
    pub fn from_image(image: ImageInput) -> Self {
        Self {
            image: Some(image),
            description: None,
        }
    }

    pub fn from_description(description: impl Into<String>) -> Self {
        Self {
            image: None,
            description: Some(description.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Extraction,
    Inference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnalysisResult {
    Success {
        text: String,
        features: Option<FeatureRecord>,
    },
    Failure {
        stage: FailureStage,
        detail: String,
        /// Only set for inference failures on the image path.
        features: Option<FeatureRecord>,
    },
}

impl AnalysisResult {
    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisResult::Success { .. })
    }

    pub fn features(&self) -> Option<&FeatureRecord> {
        match self {
            AnalysisResult::Success { features, .. } | AnalysisResult::Failure { features, .. } => {
                features.as_ref()
            }
        }
    }

    pub fn failure_stage(&self) -> Option<FailureStage> {
        match self {
            AnalysisResult::Success { .. } => None,
            AnalysisResult::Failure { stage, .. } => Some(*stage),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn extraction_failure(detail: String) -> Self {
        AnalysisResult::Failure {
            stage: FailureStage::Extraction,
            detail,
            features: None,
        }
    }

    fn inference_failure(err: &InferenceError, features: Option<FeatureRecord>) -> Self {
        AnalysisResult::Failure {
            stage: FailureStage::Inference,
            detail: err.to_string(),
            features,
        }
    }
}

/// 特征提取 → 提示词 → 推理，各阶段失败互相隔离
pub struct AnalysisPipeline {
    extractor: FeatureExtractor,
    gateway: InferenceGateway,
}

impl AnalysisPipeline {
    pub fn new(extractor: FeatureExtractor, gateway: InferenceGateway) -> Self {
        Self { extractor, gateway }
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn run(&self, request: AnalysisRequest) -> AnalysisResult {
        let never = AtomicBool::new(false);
        self.run_cancellable(request, &never)
    }

    /// The flag is only checked between stages: before extraction and before
    /// the gateway call.
    pub fn run_cancellable(&self, request: AnalysisRequest, cancelled: &AtomicBool) -> AnalysisResult {
        if cancelled.load(Ordering::SeqCst) {
            warn!("⏹️ Analysis cancelled before extraction");
            return AnalysisResult::extraction_failure(ExtractionError::Cancelled.to_string());
        }

        let (prompt, features) = match (request.image, request.description) {
            (Some(image), None) => match self.extract(image) {
                Ok(record) => (build_prompt(PromptInput::Features(&record)), Some(record)),
                Err(e) => {
                    error!("❌ Feature extraction failed: {}", e);
                    return AnalysisResult::extraction_failure(e.to_string());
                }
            },
            (None, Some(description)) => match normalize(&description) {
                Ok(text) => (build_prompt(PromptInput::Description(&text)), None),
                Err(e) => {
                    error!("❌ Description rejected: {}", e);
                    return AnalysisResult::extraction_failure(e.to_string());
                }
            },
            (None, None) => {
                return AnalysisResult::extraction_failure(ExtractionError::MissingInput.to_string())
            }
            (Some(_), Some(_)) => {
                return AnalysisResult::extraction_failure(
                    ExtractionError::AmbiguousInput.to_string(),
                )
            }
        };

        if cancelled.load(Ordering::SeqCst) {
            warn!("⏹️ Analysis cancelled before inference");
            return AnalysisResult::inference_failure(&InferenceError::Cancelled, features);
        }

        match self.gateway.infer(&prompt) {
            Ok(text) => {
                info!("✅ Analysis complete");
                AnalysisResult::Success { text, features }
            }
            Err(e) => AnalysisResult::inference_failure(&e, features),
        }
    }

    fn extract(&self, image: ImageInput) -> Result<FeatureRecord, ExtractionError> {
        match image {
            ImageInput::Encoded(bytes) => {
                info!("🖼️ Extracting features from {} encoded bytes", bytes.len());
                self.extractor.extract_encoded(&bytes)
            }
            ImageInput::Decoded(raster) => {
                info!("🖼️ Extracting features from {}x{} image", raster.width, raster.height);
                self.extractor.extract(&raster)
            }
        }
    }
}
