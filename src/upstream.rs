//! HTTP client for the upstream media server.

pub mod shape;

use crate::cache::TtlCache;
use crate::config::UpstreamConfig;
use crate::error::{AppError, Result, excerpt};
use crate::library::{Item, Library};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use bytes::Bytes;
use futures_util::TryStreamExt;
use futures_util::stream::{BoxStream, StreamExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::{ReaderStream, StreamReader};

/// Size of the chunks relayed to clients during downloads.
pub const DOWNLOAD_CHUNK_SIZE: usize = 16 * 1024;

/// Query parameters. The map keeps keys sorted so equal queries give equal
/// cache keys regardless of how they were assembled.
pub type Params = BTreeMap<&'static str, String>;

/// Download body: the upstream response re-chunked into [`DOWNLOAD_CHUNK_SIZE`]
/// pieces, read lazily as the consumer polls.
pub type ByteChunks = ReaderStream<StreamReader<BoxStream<'static, io::Result<Bytes>>, Bytes>>;

/// An in-flight download from the upstream server.
pub struct Download {
    /// Upstream status, 200 or 206.
    pub status: StatusCode,
    /// Upstream response headers.
    pub headers: HeaderMap,
    /// Response body, not yet read.
    pub body: ByteChunks,
}

/// The ways the item listing endpoint can be paged, tried in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageQuery {
    Page,
    Offset,
    LimitOnly,
}

const PAGE_QUERIES: [PageQuery; 3] = [PageQuery::Page, PageQuery::Offset, PageQuery::LimitOnly];

impl PageQuery {
    fn params(self, page: u32, limit: u32) -> Params {
        let mut params = Params::new();
        params.insert("limit", limit.to_string());
        params.insert("collapseseries", "0".to_string());
        match self {
            PageQuery::Page => {
                params.insert("page", page.to_string());
            }
            PageQuery::Offset => {
                let offset = u64::from(page.saturating_sub(1)) * u64::from(limit);
                params.insert("offset", offset.to_string());
            }
            PageQuery::LimitOnly => {}
        }
        params
    }
}

/// Cache key for a GET: the full URL plus its canonically ordered query.
pub fn cache_key(url: &str, params: &Params) -> String {
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", url, query)
}

/// Client for the upstream media server API.
///
/// Owns the metadata cache; clones share it.
#[derive(Clone)]
pub struct UpstreamClient {
    inner: Arc<UpstreamClientInner>,
}

struct UpstreamClientInner {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
    download_http: reqwest::Client,
    cache: TtlCache<Value>,
}

impl UpstreamClient {
    /// Create a client from configuration.
    pub fn new(config: &UpstreamConfig, default_ttl: Duration) -> Result<Self> {
        let token = config.token.clone().filter(|t| !t.is_empty());

        let mut auth_headers = HeaderMap::new();
        if let Some(token) = &token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| AppError::Config(format!("Invalid upstream token: {}", e)))?;
            value.set_sensitive(true);
            auth_headers.insert(header::AUTHORIZATION, value);
        }

        let mut json_headers = auth_headers.clone();
        json_headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(json_headers)
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        // No overall deadline for downloads, only per-read inactivity.
        let download_http = reqwest::Client::builder()
            .default_headers(auth_headers)
            .connect_timeout(config.download_timeout())
            .read_timeout(config.download_timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            inner: Arc::new(UpstreamClientInner {
                base_url: config.base().to_string(),
                token,
                http,
                download_http,
                cache: TtlCache::new(default_ttl),
            }),
        })
    }

    /// Base URL of the upstream server, without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// The metadata cache.
    pub fn cache(&self) -> &TtlCache<Value> {
        &self.inner.cache
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    /// GET a JSON document, served from the cache while fresh.
    pub async fn get_json(
        &self,
        path: &str,
        params: &Params,
        ttl: Option<Duration>,
    ) -> Result<Value> {
        let url = self.url(path);
        let key = cache_key(&url, params);

        if let Some(cached) = self.inner.cache.get(&key) {
            tracing::debug!(key = %key, "Upstream cache hit");
            return Ok(cached);
        }
        tracing::debug!(key = %key, "Upstream cache miss");

        let response = self
            .inner
            .http
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnreachable(format!("GET {} failed: {}", path, e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamError {
                path: path.to_string(),
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::UpstreamUnreachable(format!("GET {} failed: {}", path, e)))?;
        let data: Value = serde_json::from_slice(&body).map_err(|e| AppError::UpstreamError {
            path: path.to_string(),
            status: status.as_u16(),
            body: format!("invalid JSON: {}", e),
        })?;

        self.inner.cache.set(key, data.clone(), ttl);
        Ok(data)
    }

    /// All upstream libraries, regardless of media type.
    pub async fn list_libraries(&self) -> Result<Vec<Library>> {
        let doc = self.get_json("/api/libraries", &Params::new(), None).await?;
        let libraries = doc
            .get("libraries")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Library::from_value).collect())
            .unwrap_or_default();
        Ok(libraries)
    }

    /// One page of a library's items.
    ///
    /// Deployments differ in how the listing is paged, so `page`, then
    /// `offset`, then a bare `limit` query are tried until one yields items.
    pub async fn fetch_page_items(&self, lib_id: &str, page: u32, limit: u32) -> Result<Vec<Item>> {
        let path = format!("/api/libraries/{}/items", urlencoding::encode(lib_id));

        for query in PAGE_QUERIES {
            let doc = self.get_json(&path, &query.params(page, limit), None).await?;
            let items = shape::extract_list(&doc, shape::ITEM_LIST);
            if !items.is_empty() {
                tracing::debug!(
                    library = lib_id,
                    strategy = ?query,
                    count = items.len(),
                    "Fetched library page"
                );
                return Ok(items.into_iter().map(Item::new).collect());
            }
        }

        Ok(Vec::new())
    }

    /// Full record of a single item.
    pub async fn item_details(&self, item_id: &str) -> Result<Item> {
        let path = format!("/api/items/{}", urlencoding::encode(item_id));
        let doc = self.get_json(&path, &Params::new(), None).await?;
        Ok(Item::new(doc))
    }

    /// Raw search hits for one library. Hits wrap the item under
    /// `libraryItem`; see [`Item::from_search_hit`].
    pub async fn search_items(&self, lib_id: &str, q: &str) -> Result<Vec<Value>> {
        let path = format!("/api/libraries/{}/search", urlencoding::encode(lib_id));
        let mut params = Params::new();
        params.insert("q", q.to_string());

        let doc = self.get_json(&path, &params, None).await?;
        Ok(shape::extract_list(&doc, shape::SEARCH_RESULTS))
    }

    /// Start downloading an item's file.
    ///
    /// `headers` are sent verbatim (typically just `Range`). The body is not
    /// read here; dropping the returned stream closes the upstream connection.
    pub async fn stream_download(&self, item_id: &str, headers: HeaderMap) -> Result<Download> {
        let url = self.url(&format!("/api/items/{}/download", urlencoding::encode(item_id)));

        let mut request = self.inner.download_http.get(&url).headers(headers);
        if let Some(token) = &self.inner.token {
            request = request.query(&[("token", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| {
                AppError::UpstreamUnreachable(format!("Download of {} failed: {}", item_id, e))
            })?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::DownloadFailed {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        let headers = response.headers().clone();
        let stream = response.bytes_stream().map_err(io::Error::other).boxed();
        let body = ReaderStream::with_capacity(StreamReader::new(stream), DOWNLOAD_CHUNK_SIZE);

        Ok(Download {
            status,
            headers,
            body,
        })
    }
}
