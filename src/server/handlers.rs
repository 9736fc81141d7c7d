//! OPDS catalog handlers.

use crate::error::{AppError, Result};
use crate::library::Item;
use crate::opds::{self, FeedBuilder, FeedKind};
use crate::server::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::Response,
};
use futures_util::future;
use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::HashSet;

/// Detail lookups run concurrently up to this many per feed.
const DETAIL_CONCURRENCY: usize = 8;

/// Largest page a client may ask for.
const MAX_LIMIT: u32 = 500;

/// Build a catalog response with client-side caching disabled.
fn catalog_response(content_type: &str, body: String) -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
        .header(header::PRAGMA, "no-cache")
        .header(header::EXPIRES, "0")
        .body(Body::from(body))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("Internal error"))
                .unwrap_or_default()
        })
}

/// Keep only items that can be downloaded, in their original order.
///
/// List responses may leave out `ebookFile`, in which case the item's full
/// record is fetched to decide. An item whose record cannot be fetched is
/// dropped rather than failing the whole feed.
async fn resolve_acquirable(state: &AppState, items: Vec<Item>) -> Vec<Item> {
    stream::iter(items)
        .map(|item| confirm_acquirable(state, item))
        .buffered(DETAIL_CONCURRENCY)
        .filter_map(future::ready)
        .collect()
        .await
}

async fn confirm_acquirable(state: &AppState, item: Item) -> Option<Item> {
    let id = item.id()?.to_string();

    let detail = if item.has_ebook_file() {
        item
    } else {
        match state.upstream.item_details(&id).await {
            Ok(detail) => detail,
            Err(e) => {
                tracing::warn!(item = %id, error = %e, "Skipping item, detail lookup failed");
                return None;
            }
        }
    };

    detail.is_acquirable().then_some(detail)
}

/// Catalog root: one entry per book library plus search.
pub async fn catalog_root(State(state): State<AppState>) -> Result<Response<Body>> {
    let libraries = state.upstream.list_libraries().await?;

    let mut feed = FeedBuilder::new(state.title(), opds::ROOT_PATH, FeedKind::Navigation)
        .start_link()
        .search_links();

    for library in libraries.iter().filter(|l| l.is_book()) {
        let name = if library.name.is_empty() {
            library.id.as_str()
        } else {
            library.name.as_str()
        };
        feed = feed.navigation_entry(
            name,
            format!(
                "/opds/library/{}?page=1",
                urlencoding::encode(&library.id)
            ),
        );
    }
    feed = feed.search_entry("Search");

    Ok(catalog_response(
        &FeedKind::Navigation.content_type(),
        feed.build(),
    ))
}

/// Library paging parameters.
#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    100
}

/// Display title of a library feed. Best effort: the library list is
/// usually cached already.
async fn library_title(state: &AppState, lib_id: &str) -> String {
    let name = match state.upstream.list_libraries().await {
        Ok(libraries) => libraries
            .into_iter()
            .find(|l| l.id == lib_id)
            .map(|l| l.name)
            .filter(|name| !name.is_empty()),
        Err(e) => {
            tracing::debug!(library = lib_id, error = %e, "Library name lookup failed");
            None
        }
    };
    name.unwrap_or_else(|| format!("Library {}", lib_id))
}

/// Acquisition feed for one page of a library.
pub async fn catalog_library(
    State(state): State<AppState>,
    Path(lib_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Response<Body>> {
    let PageParams { page, limit } = params;
    if page < 1 {
        return Err(AppError::BadRequest("page must be at least 1".to_string()));
    }
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }

    let raw_items = state.upstream.fetch_page_items(&lib_id, page, limit).await?;
    // Without a total from upstream, a full page is taken to mean more follow.
    let has_next = raw_items.len() == limit as usize;
    let fetched = raw_items.len();
    let items = resolve_acquirable(&state, raw_items).await;

    tracing::debug!(
        library = %lib_id,
        page,
        limit,
        fetched,
        acquirable = items.len(),
        "Building library feed"
    );

    let base_path = format!("/opds/library/{}", urlencoding::encode(&lib_id));
    let mut feed = FeedBuilder::new(
        library_title(&state, &lib_id).await,
        format!("{}?page={}&limit={}", base_path, page, limit),
        FeedKind::Acquisition,
    )
    .start_link();

    for item in &items {
        feed = feed.book_entry(item, state.upstream.base_url());
    }
    feed = feed.pagination_links(&base_path, page, limit, has_next);

    Ok(catalog_response(
        &FeedKind::Acquisition.content_type(),
        feed.build(),
    ))
}

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: String,
}

/// Search feed across all book libraries.
///
/// A library whose search fails is skipped; the others still contribute.
pub async fn catalog_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Response<Body>> {
    let q = params.q.trim();

    let mut feed = FeedBuilder::new(
        format!("Search: {}", q),
        format!("{}?q={}", opds::SEARCH_PATH, urlencoding::encode(q)),
        FeedKind::Acquisition,
    )
    .start_link();

    if !q.is_empty() {
        let libraries = state.upstream.list_libraries().await?;
        let mut seen = HashSet::new();
        let mut hits = Vec::new();

        for library in libraries.iter().filter(|l| l.is_book()) {
            match state.upstream.search_items(&library.id, q).await {
                Ok(found) => {
                    for item in found.into_iter().map(Item::from_search_hit) {
                        let Some(id) = item.id() else { continue };
                        if seen.insert(id.to_string()) {
                            hits.push(item);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(library = %library.id, error = %e, "Search failed, skipping library");
                }
            }
        }

        for item in &resolve_acquirable(&state, hits).await {
            feed = feed.book_entry(item, state.upstream.base_url());
        }
    }

    Ok(catalog_response(
        &FeedKind::Acquisition.content_type(),
        feed.build(),
    ))
}

/// OpenSearch description.
pub async fn opensearch(State(state): State<AppState>) -> Response<Body> {
    catalog_response(
        opds::OPENSEARCH_MIME,
        opds::generate_opensearch(state.title()),
    )
}
