//! opds-bridge: an OPDS catalog in front of a JSON media-server API.
//!
//! E-reader clients browse Atom/OPDS feeds synthesized from the upstream
//! server's library and search endpoints, and download files through the
//! gateway, which relays them from upstream without buffering.
//!
//! # Features
//!
//! - Navigation feed of book libraries
//! - Paginated acquisition feeds, tolerant of several upstream list layouts
//! - Cross-library search with an OpenSearch description
//! - Range-aware download passthrough
//! - Short-lived in-memory cache for upstream metadata
//! - Optional HTTP Basic authentication

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// HTTP Basic authentication.
pub mod auth;
/// Time-bounded metadata cache.
pub mod cache;
/// Configuration and CLI.
pub mod config;
/// Error types.
pub mod error;
/// Ebook format table and filename helpers.
pub mod formats;
/// Library and item models.
pub mod library;
/// OPDS feed generation.
pub mod opds;
/// HTTP server.
pub mod server;
/// Upstream media server client.
pub mod upstream;


pub use config::{Cli, Command, Config};
pub use error::{AppError, Result};
pub use server::AppState;
pub use upstream::UpstreamClient;
