use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },
    #[error("{url} answered with HTTP status {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("{var} is not set; analysis requires a Gemini API key")]
    MissingCredential { var: &'static str },
    #[error("AI response could not be read: {0}")]
    AiResponse(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CrawlError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Network { .. } => ErrorCode::E101Network,
            Self::HttpStatus { .. } => ErrorCode::E102HttpStatus,
            Self::MissingCredential { .. } => ErrorCode::E201MissingApiKey,
            Self::AiResponse(_) => ErrorCode::E202AiResponse,
            Self::InvalidConfig(_) => ErrorCode::E301ConfigInvalid,
        }
    }

    /// Transport failures, throttling and server-side errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    E101Network,
    E102HttpStatus,
    E201MissingApiKey,
    E202AiResponse,
    E301ConfigInvalid,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E101Network => "E101_NETWORK",
            Self::E102HttpStatus => "E102_HTTP_STATUS",
            Self::E201MissingApiKey => "E201_MISSING_API_KEY",
            Self::E202AiResponse => "E202_AI_RESPONSE",
            Self::E301ConfigInvalid => "E301_CONFIG_INVALID",
        }
    }
}
