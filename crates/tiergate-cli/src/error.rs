//! Error types and gateway error codes

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tiergate_core::CascadeError;
use tiergate_store::TierError;

/// Header carrying the machine-readable error code
pub const ERROR_CODE_HEADER: &str = "x-tiergate-error-code";

/// Gateway error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidDigest,
    InvalidKey,
    MethodNotAllowed,
    NoSuchKey,
    BackendFailure,
}

impl ErrorCode {
    /// Get the error code string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidDigest => "InvalidDigest",
            Self::InvalidKey => "InvalidKey",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::NoSuchKey => "NoSuchKey",
            Self::BackendFailure => "BackendFailure",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidDigest | Self::InvalidKey => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::NoSuchKey => StatusCode::NOT_FOUND,
            Self::BackendFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Gateway { code: ErrorCode, message: String },

    #[error("{0}")]
    Cascade(#[from] CascadeError),

    #[error("{0}")]
    Tier(#[from] TierError),
}

impl ApiError {
    /// Create an error with an explicit code
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Gateway {
            code,
            message: message.into(),
        }
    }

    /// Get the error code
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Gateway { code, .. } => *code,
            Self::Cascade(e) => match e {
                CascadeError::NotFound { .. } => ErrorCode::NoSuchKey,
                CascadeError::Tier { .. } | CascadeError::Incomplete { .. } => {
                    ErrorCode::BackendFailure
                }
            },
            Self::Tier(e) => match e {
                TierError::InvalidKey(_) => ErrorCode::InvalidKey,
                TierError::NotFound(_) => ErrorCode::NoSuchKey,
                _ => ErrorCode::BackendFailure,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.error_code();
        let status = code.status_code();

        if status.is_server_error() {
            tracing::error!(code = code.as_str(), error = %self, "Request failed");
        } else {
            tracing::debug!(code = code.as_str(), error = %self, "Request rejected");
        }

        // HEAD responses drop the body, so the code also travels as a header
        (
            status,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::HeaderName::from_static(ERROR_CODE_HEADER), code.as_str()),
            ],
            format!("{}\n", self),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorCode::InvalidKey, StatusCode::BAD_REQUEST)]
    #[case(ErrorCode::InvalidDigest, StatusCode::BAD_REQUEST)]
    #[case(ErrorCode::NoSuchKey, StatusCode::NOT_FOUND)]
    #[case(ErrorCode::MethodNotAllowed, StatusCode::METHOD_NOT_ALLOWED)]
    #[case(ErrorCode::BackendFailure, StatusCode::INTERNAL_SERVER_ERROR)]
    fn test_status_codes(#[case] code: ErrorCode, #[case] status: StatusCode) {
        assert_eq!(code.status_code(), status);
    }

    #[test]
    fn test_cascade_error_mapping() {
        let not_found = ApiError::from(CascadeError::NotFound { key: "k".into() });
        assert_eq!(not_found.error_code(), ErrorCode::NoSuchKey);

        let failed = ApiError::from(CascadeError::Tier {
            tier: "b2:photos".into(),
            source: TierError::Timeout { seconds: 30 },
        });
        assert_eq!(failed.error_code(), ErrorCode::BackendFailure);
        assert!(failed.to_string().contains("b2:photos"));

        let invalid = ApiError::from(TierError::InvalidKey("..".into()));
        assert_eq!(invalid.error_code(), ErrorCode::InvalidKey);
    }

    #[test]
    fn test_response_carries_code_header() {
        let response = ApiError::new(ErrorCode::InvalidDigest, "digest mismatch").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(ERROR_CODE_HEADER).unwrap(),
            "InvalidDigest"
        );
        assert!(response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
    }
}
