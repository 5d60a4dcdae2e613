//! 推理网关 - 隔离与外部文本生成服务的全部交互
//!
//! 网关只负责一次调用与错误归类，不做任何自动重试

pub mod error;
pub mod gemini;
pub mod openai;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use log::{error, info};
use serde::{Deserialize, Serialize};

pub use error::InferenceError;
pub use gemini::GeminiClient;
pub use openai::OpenAiCompatibleClient;

use crate::core::prompt::Prompt;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// 外部文本补全能力：`(model, messages) -> text`
pub trait CompletionBackend: Send + Sync {
    fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, InferenceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub model: String,
    /// Upper bound for one call; concrete clients apply it to their HTTP
    /// client.
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct InferenceGateway {
    backend: Box<dyn CompletionBackend>,
    model: String,
}

impl InferenceGateway {
    pub fn new(backend: Box<dyn CompletionBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn infer(&self, prompt: &Prompt) -> Result<String, InferenceError> {
        info!(
            "🤖 Inference request: model={}, prompt {} chars",
            self.model,
            prompt.as_str().len()
        );

        let messages = [ChatMessage::user(prompt.as_str())];
        match self.backend.complete(&self.model, &messages) {
            Ok(text) => {
                info!("✅ Inference complete: {} chars", text.len());
                Ok(text)
            }
            Err(e) => {
                error!("❌ Inference failed: {}", e);
                Err(e)
            }
        }
    }
}

/// 测试替身：返回固定结果并记录调用
pub struct MockCompletionBackend {
    response: Result<String, String>,
    calls: AtomicUsize,
    last_messages: Mutex<Vec<ChatMessage>>,
}

impl MockCompletionBackend {
    pub fn replying(text: &str) -> Self {
        Self {
            response: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            response: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last_messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl CompletionBackend for MockCompletionBackend {
    fn complete(&self, _model: &str, messages: &[ChatMessage]) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_messages.lock() {
            *last = messages.to_vec();
        }
        self.response
            .clone()
            .map_err(InferenceError::Transport)
    }
}

/// Lets a shared handle be boxed into a gateway while the test keeps its own
/// reference for assertions.
impl<T: CompletionBackend + ?Sized> CompletionBackend for std::sync::Arc<T> {
    fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, InferenceError> {
        (**self).complete(model, messages)
    }
}
