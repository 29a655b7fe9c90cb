use crate::contract::ValidationError;

/// Every way a single analysis request can fail.
///
/// Transport failures are flattened to their message so the error can be
/// cloned into session state and compared in tests.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmissionError {
    #[error("Please select a file first.")]
    NoFileProvided,
    #[error("Could not reach the analysis service: {0}")]
    TransportError(String),
    #[error("Failed to analyze file: the analysis service responded with HTTP {0}")]
    HttpError(u16),
    #[error("The analysis service returned an unusable result: {0}")]
    MalformedResult(ValidationError),
    #[error("The analysis service could not analyze this file: {0}")]
    ServiceRejected(String),
}

impl SubmissionError {
    /// Whether re-submitting the same file may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SubmissionError::TransportError(_) => true,
            SubmissionError::HttpError(status) => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SubmissionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SubmissionError::TransportError(format!("request timed out: {err}"))
        } else if let Some(status) = err.status() {
            SubmissionError::HttpError(status.as_u16())
        } else {
            SubmissionError::TransportError(err.to_string())
        }
    }
}

impl From<ValidationError> for SubmissionError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::ServiceReported(message) => SubmissionError::ServiceRejected(message),
            other => SubmissionError::MalformedResult(other),
        }
    }
}
