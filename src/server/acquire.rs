//! File acquisition: relays upstream downloads to the client.

use crate::error::{AppError, Result};
use crate::formats::OCTET_STREAM;
use crate::server::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, header},
    response::Response,
};

/// Upstream headers relayed unchanged when present.
const PASSTHROUGH_HEADERS: [header::HeaderName; 3] = [
    header::CONTENT_LENGTH,
    header::ACCEPT_RANGES,
    header::CONTENT_RANGE,
];

/// Download by item id; the filename comes from upstream.
pub async fn acquire(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response<Body>> {
    relay(&state, &item_id, None, &headers).await
}

/// Download by item id under the filename given in the URL.
pub async fn acquire_named(
    State(state): State<AppState>,
    Path((item_id, slug)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response<Body>> {
    relay(&state, &item_id, Some(slug), &headers).await
}

async fn relay(
    state: &AppState,
    item_id: &str,
    slug: Option<String>,
    request_headers: &HeaderMap,
) -> Result<Response<Body>> {
    let mut forward = HeaderMap::new();
    if let Some(range) = request_headers.get(header::RANGE) {
        forward.insert(header::RANGE, range.clone());
    }

    let download = state.upstream.stream_download(item_id, forward).await?;

    let filename = slug
        .filter(|s| !s.is_empty())
        .or_else(|| {
            download
                .headers
                .get(header::CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok())
                .and_then(filename_from_disposition)
        })
        .unwrap_or_else(|| format!("{}.bin", item_id));

    tracing::info!(
        item = item_id,
        status = download.status.as_u16(),
        filename = %filename,
        ranged = request_headers.contains_key(header::RANGE),
        "Relaying download"
    );

    let content_type = download
        .headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(OCTET_STREAM));

    let mut builder = Response::builder()
        .status(download.status)
        .header(header::CONTENT_TYPE, content_type);
    for name in PASSTHROUGH_HEADERS {
        if let Some(value) = download.headers.get(&name) {
            builder = builder.header(name, value.clone());
        }
    }

    // The body is pulled chunk by chunk as the client reads; if the client
    // goes away the stream is dropped and the upstream connection with it.
    builder
        .header(header::CONTENT_DISPOSITION, content_disposition(&filename))
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(Body::from_stream(download.body))
        .map_err(|e| AppError::Internal(format!("Failed to build download response: {}", e)))
}

/// RFC 5987 attachment disposition for a filename.
pub fn content_disposition(filename: &str) -> String {
    format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

/// Filename from a `Content-Disposition` value, preferring `filename*`.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in split_params(value) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let raw = raw.trim().trim_matches('"');
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // charset'language'value
                let encoded = raw.splitn(3, '\'').nth(2).unwrap_or(raw);
                extended = urlencoding::decode(encoded).ok().map(|s| s.into_owned());
            }
            "filename" => plain = Some(raw.to_string()),
            _ => {}
        }
    }

    extended.or(plain).filter(|name| !name.is_empty())
}

/// Split header parameters on `;`, ignoring separators inside quotes.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut quoted = false;

    for (idx, c) in value.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ';' if !quoted => {
                params.push(value[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    params.push(value[start..].trim());
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_prefers_extended_filename() {
        let value = r#"attachment; filename="fallback.epub"; filename*=UTF-8''Caf%C3%A9%20Book.epub"#;
        assert_eq!(
            filename_from_disposition(value).as_deref(),
            Some("Café Book.epub")
        );
    }

    #[test]
    fn disposition_plain_filename() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="My Book.pdf""#).as_deref(),
            Some("My Book.pdf")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=book.cbz").as_deref(),
            Some("book.cbz")
        );
    }

    #[test]
    fn disposition_quoted_filename_with_semicolon() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="a; b.epub""#).as_deref(),
            Some("a; b.epub")
        );
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="x;y.pdf"; size=10"#).as_deref(),
            Some("x;y.pdf")
        );
    }

    #[test]
    fn disposition_without_filename() {
        assert_eq!(filename_from_disposition("attachment"), None);
        assert_eq!(filename_from_disposition(r#"inline; filename="""#), None);
    }

    #[test]
    fn disposition_is_percent_encoded() {
        assert_eq!(
            content_disposition("A B Test.epub"),
            "attachment; filename*=UTF-8''A%20B%20Test.epub"
        );
        assert_eq!(
            content_disposition("Café.pdf"),
            "attachment; filename*=UTF-8''Caf%C3%A9.pdf"
        );
    }
}
