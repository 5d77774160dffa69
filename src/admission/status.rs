//! Typed request outcomes.
//!
//! Rejections carry a code and a client-safe message. Handler faults that
//! are not already a [`RequestStatus`] are collapsed into `Internal` by the
//! gate so no internal detail reaches the caller.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Unavailable,
    Internal,
    Cancelled,
    PermissionDenied,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusCode::Unavailable => "UNAVAILABLE",
            StatusCode::Internal => "INTERNAL",
            StatusCode::Cancelled => "CANCELLED",
            StatusCode::PermissionDenied => "PERMISSION_DENIED",
        };
        f.write_str(s)
    }
}

/// Outcome returned to callers for anything other than success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct RequestStatus {
    code: StatusCode,
    message: String,
}

impl RequestStatus {
    /// Status with `code` and a client-safe `message`.
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// `UNAVAILABLE` with `message`.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unavailable, message)
    }

    /// Generic `INTERNAL` without detail.
    pub fn internal() -> Self {
        Self::new(StatusCode::Internal, "Internal error")
    }

    /// `CANCELLED` for requests abandoned by the caller.
    pub fn cancelled() -> Self {
        Self::new(StatusCode::Cancelled, "Request cancelled")
    }

    /// Status code.
    pub fn code(&self) -> StatusCode {
        self.code
    }

    /// Client-safe message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error type returned by request handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Already classified; passed through the gate unchanged.
    #[error(transparent)]
    Status(#[from] RequestStatus),

    /// Anything else. Logged and replaced by `Internal`.
    #[error(transparent)]
    Fault(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Wrap any error as a fault.
    pub fn fault<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        HandlerError::Fault(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let status = RequestStatus::unavailable("Service is paused");
        assert_eq!(status.to_string(), "UNAVAILABLE: Service is paused");
        assert_eq!(RequestStatus::internal().code(), StatusCode::Internal);
    }

    #[test]
    fn fault_from_any_error() {
        let err = HandlerError::fault("job helper exited");
        assert!(matches!(err, HandlerError::Fault(_)));
        let err: HandlerError = RequestStatus::cancelled().into();
        assert!(matches!(err, HandlerError::Status(_)));
    }
}
