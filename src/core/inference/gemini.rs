use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, CompletionBackend, GatewayConfig, InferenceError, Role};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-pro";

/// Gemini `generateContent` 客户端，API key 由调用方注入
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    client: Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: String, config: &GatewayConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| InferenceError::ClientSetup(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            timeout_secs: config.timeout.as_secs(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

fn to_request(messages: &[ChatMessage]) -> GenerateContentRequest {
    let contents = messages
        .iter()
        .map(|m| Content {
            role: Some(
                match m.role {
                    Role::User => "user",
                }
                .to_string(),
            ),
            parts: vec![Part {
                text: Some(m.content.clone()),
            }],
        })
        .collect();
    GenerateContentRequest { contents }
}

/// 拼接第一个候选的全部文本片段
pub(crate) fn parse_generate_content(body: &str) -> Result<String, InferenceError> {
    let parsed: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;

    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(InferenceError::MalformedResponse(
            "response has no candidate text".to_string(),
        ));
    }
    Ok(text)
}

impl CompletionBackend for GeminiClient {
    fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, InferenceError> {
        let url = self.endpoint(model);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&to_request(messages))
            .send()
            .map_err(|e| InferenceError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| InferenceError::from_reqwest(e, self.timeout_secs))?;
        if !status.is_success() {
            return Err(InferenceError::from_status(status.as_u16(), body));
        }

        parse_generate_content(&body)
    }
}
