use thiserror::Error;

/// 推理服务调用失败，统一归类为 inference 阶段
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Transport(String),
    #[error("inference request timed out after {0}s")]
    Timeout(u64),
    #[error("inference service rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },
    #[error("inference service rate limit reached: {body}")]
    RateLimited { body: String },
    #[error("inference service error (HTTP {status}): {body}")]
    Service { status: u16, body: String },
    #[error("malformed inference response: {0}")]
    MalformedResponse(String),
    #[error("failed to build HTTP client: {0}")]
    ClientSetup(String),
    #[error("analysis cancelled before inference")]
    Cancelled,
}

impl InferenceError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => InferenceError::Unauthorized { status },
            429 => InferenceError::RateLimited { body },
            _ => InferenceError::Service { status, body },
        }
    }

    pub fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            InferenceError::Timeout(timeout_secs)
        } else if err.is_decode() {
            InferenceError::MalformedResponse(err.to_string())
        } else {
            InferenceError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            InferenceError::from_status(401, String::new()),
            InferenceError::Unauthorized { status: 401 }
        ));
        assert!(matches!(
            InferenceError::from_status(403, String::new()),
            InferenceError::Unauthorized { status: 403 }
        ));
        assert!(matches!(
            InferenceError::from_status(429, "slow down".to_string()),
            InferenceError::RateLimited { .. }
        ));
        assert!(matches!(
            InferenceError::from_status(503, "overloaded".to_string()),
            InferenceError::Service { status: 503, .. }
        ));
    }

    #[test]
    fn test_messages_are_human_readable() {
        assert_eq!(
            InferenceError::Timeout(30).to_string(),
            "inference request timed out after 30s"
        );
        assert_eq!(
            InferenceError::from_status(500, "boom".to_string()).to_string(),
            "inference service error (HTTP 500): boom"
        );
    }
}
