use std::fmt;

use thiserror::Error;

/// Status code reported by the Gemini API for a failed call.
///
/// Derived from the `error.status` field of the provider's error body when
/// present, otherwise from the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiCode {
    InvalidArgument,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    ResourceExhausted,
    Unavailable,
    Internal,
    DeadlineExceeded,
    Unknown(u16),
}

impl ApiCode {
    pub fn from_status_name(name: &str) -> Option<Self> {
        match name {
            "INVALID_ARGUMENT" => Some(ApiCode::InvalidArgument),
            "UNAUTHENTICATED" => Some(ApiCode::Unauthenticated),
            "PERMISSION_DENIED" => Some(ApiCode::PermissionDenied),
            "NOT_FOUND" => Some(ApiCode::NotFound),
            "RESOURCE_EXHAUSTED" => Some(ApiCode::ResourceExhausted),
            "UNAVAILABLE" => Some(ApiCode::Unavailable),
            "INTERNAL" => Some(ApiCode::Internal),
            "DEADLINE_EXCEEDED" => Some(ApiCode::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => ApiCode::InvalidArgument,
            401 => ApiCode::Unauthenticated,
            403 => ApiCode::PermissionDenied,
            404 => ApiCode::NotFound,
            429 => ApiCode::ResourceExhausted,
            500 => ApiCode::Internal,
            502 | 503 => ApiCode::Unavailable,
            504 => ApiCode::DeadlineExceeded,
            other => ApiCode::Unknown(other),
        }
    }

    /// Server-side trouble that may clear up on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiCode::Unavailable
                | ApiCode::ResourceExhausted
                | ApiCode::Internal
                | ApiCode::DeadlineExceeded
        )
    }
}

impl fmt::Display for ApiCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiCode::InvalidArgument => write!(f, "INVALID_ARGUMENT"),
            ApiCode::Unauthenticated => write!(f, "UNAUTHENTICATED"),
            ApiCode::PermissionDenied => write!(f, "PERMISSION_DENIED"),
            ApiCode::NotFound => write!(f, "NOT_FOUND"),
            ApiCode::ResourceExhausted => write!(f, "RESOURCE_EXHAUSTED"),
            ApiCode::Unavailable => write!(f, "UNAVAILABLE"),
            ApiCode::Internal => write!(f, "INTERNAL"),
            ApiCode::DeadlineExceeded => write!(f, "DEADLINE_EXCEEDED"),
            ApiCode::Unknown(status) => write!(f, "HTTP {status}"),
        }
    }
}

/// Why a successfully delivered response could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    EmptyResponse,
    Blocked(String),
    EmptyContent,
    NoText,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::EmptyResponse => write!(f, "empty response"),
            RejectReason::Blocked(reason) => write!(f, "blocked: {reason}"),
            RejectReason::EmptyContent => write!(f, "empty content"),
            RejectReason::NoText => write!(f, "no text in content"),
        }
    }
}

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Gemini API error ({code}): {message}")]
    Api { code: ApiCode, message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Response rejected: {reason}")]
    ResponseRejected { reason: RejectReason },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("{label} failed after {attempts} attempts (retries exhausted): {source}")]
    RetriesExhausted {
        label: String,
        attempts: u32,
        source: Box<GeminiError>,
    },

    #[error("File upload failed: {source}")]
    UploadFailed { source: Box<GeminiError> },

    #[error("File processing failed on server side: {name}")]
    ProcessingFailed { name: String },

    #[error("File processing timed out after {timeout_ms}ms: {name}")]
    ProcessingTimeout { name: String, timeout_ms: u64 },
}

/// Coarse category for callers that pick exit codes or higher-level retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    InvalidInput,
    ContentBlocked,
    Transport,
    RetriesExhausted,
    Offload,
    Cancelled,
    Parse,
}

/// Classification of a failure, computed on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    Transient(ApiCode),
    Permanent(Option<ApiCode>),
    ResponseRejected(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

impl RetryDecision {
    pub fn should_retry(self) -> bool {
        self == RetryDecision::Retry
    }
}

impl GeminiError {
    pub fn configuration(message: impl Into<String>) -> Self {
        GeminiError::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        GeminiError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        GeminiError::ResponseRejected { reason }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GeminiError::Configuration { .. } => ErrorKind::Configuration,
            GeminiError::InvalidInput { .. } => ErrorKind::InvalidInput,
            GeminiError::Api { .. } | GeminiError::Network { .. } => ErrorKind::Transport,
            GeminiError::Parse { .. } => ErrorKind::Parse,
            GeminiError::ResponseRejected { .. } => ErrorKind::ContentBlocked,
            GeminiError::Cancelled | GeminiError::DeadlineExceeded => ErrorKind::Cancelled,
            GeminiError::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            GeminiError::UploadFailed { .. }
            | GeminiError::ProcessingFailed { .. }
            | GeminiError::ProcessingTimeout { .. } => ErrorKind::Offload,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            GeminiError::ResponseRejected { reason } => ErrorClass::ResponseRejected(reason.clone()),
            GeminiError::Api { code, .. } if code.is_transient() => ErrorClass::Transient(*code),
            GeminiError::Api { code, .. } => ErrorClass::Permanent(Some(*code)),
            _ => ErrorClass::Permanent(None),
        }
    }

    /// Innermost error behind retry and upload wrappers.
    pub fn root_cause(&self) -> &GeminiError {
        match self {
            GeminiError::RetriesExhausted { source, .. } | GeminiError::UploadFailed { source } => {
                source.root_cause()
            }
            other => other,
        }
    }

    pub fn api_code(&self) -> Option<ApiCode> {
        match self.root_cause() {
            GeminiError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_response_rejected(&self) -> bool {
        matches!(self, GeminiError::ResponseRejected { .. })
    }

    /// Raised by the caller's own context rather than by the provider.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, GeminiError::Cancelled | GeminiError::DeadlineExceeded)
    }

    pub fn from_reqwest_error(error: reqwest::Error) -> Self {
        let message = error.to_string();
        if error.is_timeout() {
            GeminiError::Api {
                code: ApiCode::DeadlineExceeded,
                message,
            }
        } else if error.is_connect() {
            GeminiError::Api {
                code: ApiCode::Unavailable,
                message,
            }
        } else if let Some(status) = error.status() {
            GeminiError::Api {
                code: ApiCode::from_http_status(status.as_u16()),
                message,
            }
        } else if error.is_decode() {
            GeminiError::Parse { message }
        } else {
            GeminiError::Network { message }
        }
    }

    pub fn from_status_and_body(status: reqwest::StatusCode, body: &str) -> Self {
        let status_code = status.as_u16();
        let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
        let detail = parsed.as_ref().and_then(|value| value.get("error"));

        let message = detail
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or(body)
            .to_string();

        let code = detail
            .and_then(|e| e.get("status"))
            .and_then(|s| s.as_str())
            .and_then(ApiCode::from_status_name)
            .unwrap_or_else(|| ApiCode::from_http_status(status_code));

        GeminiError::Api { code, message }
    }
}

/// Decides whether a failed call is worth another attempt.
///
/// Only transport codes that signal transient server-side trouble are
/// retried; everything else, including unknown error shapes, is not.
pub fn classify(err: &GeminiError) -> RetryDecision {
    match err.class() {
        ErrorClass::Transient(_) => RetryDecision::Retry,
        ErrorClass::Permanent(_) | ErrorClass::ResponseRejected(_) => RetryDecision::NoRetry,
    }
}
