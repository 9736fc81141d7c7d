use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Challenge sent with every 401.
pub const BASIC_CHALLENGE: &str = "Basic realm=\"OPDS\"";

/// Upstream bodies quoted in error details are cut to this many characters.
const BODY_EXCERPT_LEN: usize = 200;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// No usable Basic credentials were presented.
    #[error("Auth required")]
    AuthRequired,

    /// Credentials were presented but do not match.
    #[error("Invalid credentials")]
    AuthInvalid,

    /// The Authorization header could not be decoded as `user:pass`.
    #[error("Malformed Authorization")]
    AuthMalformed,

    /// Invalid request parameters.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The upstream server could not be reached at all.
    #[error("Upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    /// The upstream server answered a metadata call with a non-200 status.
    #[error("Upstream GET {path} -> {status} {body}")]
    UpstreamError {
        /// Request path on the upstream server.
        path: String,
        /// Status returned by the upstream server.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// The upstream server refused a download; its status is relayed as-is.
    #[error("{body}")]
    DownloadFailed {
        /// Status returned by the upstream server.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthRequired | AppError::AuthInvalid => StatusCode::UNAUTHORIZED,
            AppError::AuthMalformed | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamUnreachable(_) | AppError::UpstreamError { .. } => {
                StatusCode::BAD_GATEWAY
            }
            AppError::DownloadFailed { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request error");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        match self {
            AppError::AuthRequired | AppError::AuthInvalid => (
                status,
                [(header::WWW_AUTHENTICATE, BASIC_CHALLENGE)],
                self.to_string(),
            )
                .into_response(),
            _ => (status, self.to_string()).into_response(),
        }
    }
}

/// Cut an upstream body down to a short excerpt for error details.
pub fn excerpt(body: &str) -> String {
    match body.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_keeps_short_bodies() {
        assert_eq!(excerpt("not found"), "not found");
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        let body = "é".repeat(250);
        let cut = excerpt(&body);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
    }

    #[test]
    fn download_failure_keeps_upstream_status() {
        let err = AppError::DownloadFailed {
            status: 404,
            body: "missing".to_string(),
        };
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = AppError::UpstreamError {
            path: "/api/items/x".to_string(),
            status: 404,
            body: String::new(),
        };
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn auth_errors_carry_challenge() {
        let response = AppError::AuthInvalid.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            BASIC_CHALLENGE
        );

        let response = AppError::AuthMalformed.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }
}
