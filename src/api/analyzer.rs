//! 动物健康分析器

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use flutter_rust_bridge::frb;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::core::features::{ExtractorConfig, FeatureExtractor};
use crate::core::inference::{
    gemini, openai, CompletionBackend, GatewayConfig, GeminiClient, InferenceGateway,
    OpenAiCompatibleClient, DEFAULT_TIMEOUT_SECS,
};
use crate::core::orchestrator::{AnalysisPipeline, AnalysisRequest, AnalysisResult, ImageInput};

/// 分析器 API 错误类型，FRB 友好的设计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerApiError {
    pub error_type: String,
    pub message: String,
}

impl AnalyzerApiError {
    fn invalid_config(e: String) -> Self {
        Self {
            error_type: "InvalidConfig".to_string(),
            message: format!("提取配置无效: {}", e),
        }
    }

    fn missing_api_key() -> Self {
        Self {
            error_type: "MissingApiKey".to_string(),
            message: "Gemini 需要 API key".to_string(),
        }
    }

    fn client_setup(e: String) -> Self {
        Self {
            error_type: "ClientSetup".to_string(),
            message: format!("HTTP 客户端创建失败: {}", e),
        }
    }
}

impl std::fmt::Display for AnalyzerApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.error_type, self.message)
    }
}

impl std::error::Error for AnalyzerApiError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceProvider {
    /// Any `/chat/completions` endpoint (OpenAI, local gateways)
    OpenAiCompatible,
    Gemini,
}

/// Settings handed over by the host app.
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub provider: InferenceProvider,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    /// JSON overrides for `ExtractorConfig`, e.g. `{"target_size": 256}`
    pub extractor_config_json: Option<String>,
}

impl AnalyzerSettings {
    fn extractor_config(&self) -> Result<ExtractorConfig, AnalyzerApiError> {
        match self.extractor_config_json.as_deref() {
            Some(json) if !json.trim().is_empty() => ExtractorConfig::from_json(json)
                .map_err(|e| AnalyzerApiError::invalid_config(e.to_string())),
            _ => Ok(ExtractorConfig::default()),
        }
    }

    fn backend(&self, gateway: &GatewayConfig) -> Result<Box<dyn CompletionBackend>, AnalyzerApiError> {
        match self.provider {
            InferenceProvider::OpenAiCompatible => {
                let base_url = self.base_url.as_deref().unwrap_or(openai::DEFAULT_BASE_URL);
                let client = OpenAiCompatibleClient::new(base_url, self.api_key.clone(), gateway)
                    .map_err(|e| AnalyzerApiError::client_setup(e.to_string()))?;
                Ok(Box::new(client))
            }
            InferenceProvider::Gemini => {
                let api_key = self
                    .api_key
                    .clone()
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(AnalyzerApiError::missing_api_key)?;
                let base_url = self.base_url.as_deref().unwrap_or(gemini::DEFAULT_BASE_URL);
                let client = GeminiClient::new(base_url, api_key, gateway)
                    .map_err(|e| AnalyzerApiError::client_setup(e.to_string()))?;
                Ok(Box::new(client))
            }
        }
    }

    fn default_model(&self) -> &'static str {
        match self.provider {
            InferenceProvider::OpenAiCompatible => openai::DEFAULT_MODEL,
            InferenceProvider::Gemini => gemini::DEFAULT_MODEL,
        }
    }
}

/// 动物健康分析器 - 图片特征提取 + 大模型推理
///
/// ```dart
/// final analyzer = HealthAnalyzer.create(settings: settings);
/// final result = await analyzer.analyzeImage(imageBytes: bytes);
/// ```
#[frb(opaque)]
pub struct HealthAnalyzer {
    pipeline: AnalysisPipeline,
    cancelled: AtomicBool,
}

impl HealthAnalyzer {
    #[frb(sync)]
    pub fn create(settings: AnalyzerSettings) -> Result<Self, AnalyzerApiError> {
        let extractor = FeatureExtractor::with_config(settings.extractor_config()?);

        let model = settings
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| settings.default_model().to_string());
        let timeout = Duration::from_secs(settings.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let gateway_config = GatewayConfig::new(model).with_timeout(timeout);
        let backend = settings.backend(&gateway_config)?;

        info!(
            "🐄 HealthAnalyzer: created ({:?}, model {})",
            settings.provider, gateway_config.model
        );
        Ok(Self::with_pipeline(AnalysisPipeline::new(
            extractor,
            InferenceGateway::new(backend, gateway_config.model),
        )))
    }

    #[frb(ignore)]
    pub fn with_pipeline(pipeline: AnalysisPipeline) -> Self {
        Self {
            pipeline,
            cancelled: AtomicBool::new(false),
        }
    }

    /// 分析上传的图片（PNG/JPEG/GIF/BMP）
    #[frb]
    pub fn analyze_image(&self, image_bytes: Vec<u8>) -> AnalysisResult {
        let request = AnalysisRequest::from_image(ImageInput::Encoded(image_bytes));
        self.pipeline.run_cancellable(request, &self.cancelled)
    }

    /// 分析表情文字描述
    #[frb]
    pub fn analyze_description(&self, description: String) -> AnalysisResult {
        let request = AnalysisRequest::from_description(description);
        self.pipeline.run_cancellable(request, &self.cancelled)
    }

    /// Same as `analyze_image`, serialized for hosts that forward the result
    /// as-is.
    #[frb]
    pub fn analyze_image_json(&self, image_bytes: Vec<u8>) -> Result<String, AnalyzerApiError> {
        self.analyze_image(image_bytes)
            .to_json()
            .map_err(|e| AnalyzerApiError {
                error_type: "Serialization".to_string(),
                message: e.to_string(),
            })
    }

    /// 取消进行中的分析；在 `reset_cancellation` 之前一直生效
    #[frb(sync)]
    pub fn cancel(&self) {
        warn!("⏹️ HealthAnalyzer: cancel requested");
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[frb(sync)]
    pub fn reset_cancellation(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

impl Drop for HealthAnalyzer {
    fn drop(&mut self) {
        info!("🗑️ HealthAnalyzer: released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inference::MockCompletionBackend;
    use crate::core::orchestrator::FailureStage;
    use std::sync::Arc;

    fn settings(provider: InferenceProvider) -> AnalyzerSettings {
        AnalyzerSettings {
            provider,
            api_key: Some("test-key".to_string()),
            model: None,
            base_url: None,
            timeout_secs: Some(5),
            extractor_config_json: None,
        }
    }

    fn mock_analyzer(backend: Arc<MockCompletionBackend>) -> HealthAnalyzer {
        HealthAnalyzer::with_pipeline(AnalysisPipeline::new(
            FeatureExtractor::new(),
            InferenceGateway::new(Box::new(backend), "mock-model"),
        ))
    }

    fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([90, 140, 60]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .expect("encode png");
        bytes
    }

    #[test]
    fn test_create_both_providers() {
        assert!(HealthAnalyzer::create(settings(InferenceProvider::OpenAiCompatible)).is_ok());
        assert!(HealthAnalyzer::create(settings(InferenceProvider::Gemini)).is_ok());
    }

    #[test]
    fn test_gemini_requires_api_key() {
        let mut s = settings(InferenceProvider::Gemini);
        s.api_key = None;
        let err = HealthAnalyzer::create(s).err().expect("should fail");
        assert_eq!(err.error_type, "MissingApiKey");
    }

    #[test]
    fn test_invalid_extractor_config() {
        let mut s = settings(InferenceProvider::OpenAiCompatible);
        s.extractor_config_json = Some("{not json".to_string());
        let err = HealthAnalyzer::create(s).err().expect("should fail");
        assert_eq!(err.error_type, "InvalidConfig");
        assert!(err.to_string().starts_with("[InvalidConfig]"));
    }

    #[test]
    fn test_analyze_encoded_png() {
        let backend = Arc::new(MockCompletionBackend::replying("Healthy"));
        let analyzer = mock_analyzer(backend.clone());

        let result = analyzer.analyze_image(encode_png(64, 48));

        assert!(result.is_success());
        let features = result.features().expect("features attached");
        assert!((0.0..360.0).contains(&features.color_dominance));
        assert_eq!(backend.call_count(), 1);
    }

    #[test]
    fn test_analyze_image_json() {
        let backend = Arc::new(MockCompletionBackend::replying("Healthy"));
        let analyzer = mock_analyzer(backend);

        let json = analyzer.analyze_image_json(vec![0, 1, 2]).expect("serializable");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["status"], "failure");
        assert_eq!(value["stage"], "extraction");
    }

    #[test]
    fn test_cancel_and_reset() {
        let backend = Arc::new(MockCompletionBackend::replying("Healthy"));
        let analyzer = mock_analyzer(backend.clone());

        analyzer.cancel();
        let result = analyzer.analyze_description("droopy eyes".to_string());
        assert_eq!(result.failure_stage(), Some(FailureStage::Extraction));
        assert_eq!(backend.call_count(), 0);

        analyzer.reset_cancellation();
        let result = analyzer.analyze_description("droopy eyes".to_string());
        assert!(result.is_success());
        assert_eq!(backend.call_count(), 1);
    }
}
