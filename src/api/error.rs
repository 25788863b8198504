//! Error types for the pattern service client.

use thiserror::Error;

/// Errors returned by `PatternApi` operations.
#[derive(Debug, Error)]
pub enum ApiError {
  /// The request never completed (connection refused, timeout, TLS...)
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  /// The pattern addressed by an id route does not exist
  #[error("proxy pattern {id} not found")]
  NotFound { id: i64 },

  /// Any other non-2xx response
  #[error("server returned {status}: {message}")]
  Status { status: u16, message: String },

  /// A 2xx response whose body did not match the expected shape
  #[error("failed to decode response: {0}")]
  Decode(#[from] serde_json::Error),

  #[error("invalid base URL: {0}")]
  InvalidUrl(String),
}

impl ApiError {
  /// Whether the failure happened before the server answered
  pub fn is_transport(&self) -> bool {
    matches!(self, ApiError::Http(_))
  }

  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::NotFound { .. } => Some(404),
      ApiError::Status { status, .. } => Some(*status),
      ApiError::Http(e) => e.status().map(|s| s.as_u16()),
      _ => None,
    }
  }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
