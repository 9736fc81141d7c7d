//! HTTP Basic authentication for OPDS clients.

use crate::config::AuthConfig;
use crate::error::{AppError, Result};
use crate::server::AppState;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use base64::{Engine, engine::general_purpose::STANDARD};

/// Credentials every request must present. Stateless; checked per request.
#[derive(Debug, Clone, Default)]
pub struct BasicAuth {
    credentials: Option<(String, String)>,
}

impl BasicAuth {
    /// Require the given credentials. With neither set, auth is disabled.
    ///
    /// When only one is set the other must be sent empty.
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        let username = username.filter(|u| !u.is_empty());
        let password = password.filter(|p| !p.is_empty());

        let credentials = match (username, password) {
            (None, None) => None,
            (user, pass) => Some((user.unwrap_or_default(), pass.unwrap_or_default())),
        };
        Self { credentials }
    }

    /// Build from the `[auth]` config section.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.username.clone(), config.password.clone())
    }

    /// Whether requests are checked at all.
    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    /// Check a request's headers.
    pub fn check(&self, headers: &HeaderMap) -> Result<()> {
        let Some((user, pass)) = &self.credentials else {
            return Ok(());
        };

        let encoded = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("basic"))
            .map(|(_, rest)| rest.trim())
            .ok_or(AppError::AuthRequired)?;

        let decoded = STANDARD
            .decode(encoded)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or(AppError::AuthMalformed)?;
        let (got_user, got_pass) = decoded.split_once(':').ok_or(AppError::AuthMalformed)?;

        if got_user != user.as_str() || got_pass != pass.as_str() {
            return Err(AppError::AuthInvalid);
        }
        Ok(())
    }
}

/// Middleware rejecting requests before any handler runs.
pub async fn require_basic_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    state.auth.check(request.headers())?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn basic(user_pass: &str) -> HeaderMap {
        headers_with(&format!("Basic {}", STANDARD.encode(user_pass)))
    }

    #[test]
    fn disabled_without_credentials() {
        let auth = BasicAuth::new(None, Some(String::new()));
        assert!(!auth.is_enabled());
        assert!(auth.check(&HeaderMap::new()).is_ok());
        assert!(auth.check(&headers_with("garbage")).is_ok());
    }

    #[test]
    fn accepts_matching_credentials() {
        let auth = BasicAuth::new(Some("reader".into()), Some("s3cret:x".into()));
        assert!(auth.check(&basic("reader:s3cret:x")).is_ok());
        let lowercase = format!("basic {}", STANDARD.encode("reader:s3cret:x"));
        assert!(auth.check(&headers_with(&lowercase)).is_ok());
    }

    #[test]
    fn missing_or_foreign_scheme_requires_auth() {
        let auth = BasicAuth::new(Some("reader".into()), Some("pw".into()));
        assert!(matches!(auth.check(&HeaderMap::new()), Err(AppError::AuthRequired)));
        assert!(matches!(auth.check(&headers_with("Bearer abc")), Err(AppError::AuthRequired)));
        assert!(matches!(auth.check(&headers_with("Basic")), Err(AppError::AuthRequired)));
    }

    #[test]
    fn undecodable_header_is_malformed() {
        let auth = BasicAuth::new(Some("reader".into()), Some("pw".into()));
        assert!(matches!(auth.check(&headers_with("Basic !!!")), Err(AppError::AuthMalformed)));
        assert!(matches!(auth.check(&basic("no-colon")), Err(AppError::AuthMalformed)));
    }

    #[test]
    fn wrong_credentials_are_invalid() {
        let auth = BasicAuth::new(Some("reader".into()), Some("pw".into()));
        assert!(matches!(auth.check(&basic("reader:nope")), Err(AppError::AuthInvalid)));
        assert!(matches!(auth.check(&basic("Reader:pw")), Err(AppError::AuthInvalid)));
    }

    #[test]
    fn username_only_requires_empty_password() {
        let auth = BasicAuth::new(Some("reader".into()), None);
        assert!(auth.is_enabled());
        assert!(auth.check(&basic("reader:")).is_ok());
        assert!(matches!(auth.check(&basic("reader:pw")), Err(AppError::AuthInvalid)));
    }
}
