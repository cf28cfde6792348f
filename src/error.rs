use thiserror::Error;

/// Error taxonomy propagated from the ingestion core to its caller.
///
/// The variants are closed: every fallible boundary in this crate returns one of
/// these, never a bare `anyhow`-style error. Panics are reserved for invariant
/// violations a caller cannot trigger from request data.
#[derive(Error, Debug, Clone)]
pub enum IngestError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("quota exceeded")]
    QuotaExceeded,

    #[error("api configuration error: {0}")]
    ApiConfigError(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("request deadline elapsed")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            IngestError::Timeout
        } else {
            IngestError::ServiceUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Internal(format!("json: {err}"))
    }
}

impl IngestError {
    /// The error kind as a stable machine-readable code for the HTTP boundary.
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::InvalidInput(_) => "invalid_input",
            IngestError::ResourceNotFound(_) => "resource_not_found",
            IngestError::QuotaExceeded => "quota_exceeded",
            IngestError::ApiConfigError(_) => "api_config_error",
            IngestError::ServiceUnavailable(_) => "service_unavailable",
            IngestError::Timeout => "timeout",
            IngestError::Internal(_) => "internal",
        }
    }

    /// Suggested retry-after, if the error kind implies one. `None` means "don't
    /// retry automatically" or "retrying won't help soon".
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            IngestError::QuotaExceeded => Some(3600),
            IngestError::ServiceUnavailable(_) => Some(30),
            _ => None,
        }
    }
}
