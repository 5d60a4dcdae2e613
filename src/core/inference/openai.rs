use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, CompletionBackend, GatewayConfig, InferenceError};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI 兼容的 `/chat/completions` 客户端
pub struct OpenAiCompatibleClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
    timeout_secs: u64,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        config: &GatewayConfig,
    ) -> Result<Self, InferenceError> {
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

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pull the first choice's text out of a response body.
pub(crate) fn parse_completion(body: &str) -> Result<String, InferenceError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| InferenceError::MalformedResponse("response has no completion text".to_string()))
}

impl CompletionBackend for OpenAiCompatibleClient {
    fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, InferenceError> {
        let url = self.endpoint();
        debug!("POST {}", url);

        let mut request = self
            .client
            .post(&url)
            .json(&ChatCompletionRequest { model, messages });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .map_err(|e| InferenceError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| InferenceError::from_reqwest(e, self.timeout_secs))?;
        if !status.is_success() {
            return Err(InferenceError::from_status(status.as_u16(), body));
        }

        parse_completion(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Looks healthy."}},
                       {"message":{"role":"assistant","content":"ignored"}}]}"#;
        assert_eq!(parse_completion(body).expect("parses"), "Looks healthy.");
    }

    #[test]
    fn test_parse_empty_choices_is_malformed() {
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(InferenceError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_completion(r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(InferenceError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        assert!(matches!(
            parse_completion("<html>bad gateway</html>"),
            Err(InferenceError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let messages = [ChatMessage::user("describe")];
        let body = serde_json::to_value(ChatCompletionRequest {
            model: DEFAULT_MODEL,
            messages: &messages,
        })
        .expect("serialize");

        assert_eq!(
            body,
            serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [{"role": "user", "content": "describe"}]
            })
        );
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = OpenAiCompatibleClient::new(
            "http://localhost:8080/v1/",
            None,
            &GatewayConfig::new(DEFAULT_MODEL),
        )
        .expect("client builds");
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_unreachable_host_is_transport_error() {
        let config = GatewayConfig::new(DEFAULT_MODEL).with_timeout(std::time::Duration::from_secs(2));
        let client = OpenAiCompatibleClient::new("http://127.0.0.1:9", None, &config)
            .expect("client builds");

        let result = client.complete(DEFAULT_MODEL, &[ChatMessage::user("hi")]);
        assert!(matches!(
            result,
            Err(InferenceError::Transport(_)) | Err(InferenceError::Timeout(_))
        ));
    }
}
