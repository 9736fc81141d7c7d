use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// OPDS gateway in front of an Audiobookshelf-style media server.
#[derive(Parser, Debug, Clone)]
#[command(name = "opds-bridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "OPDS_BRIDGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Settings overriding the config file.
    #[command(flatten)]
    pub overrides: Overrides,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the gateway (default if no command given).
    Serve,

    /// List the upstream book libraries and exit.
    Libraries,

    /// Create a default config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// Settings that can be given on the command line or through the environment.
/// Anything set here wins over the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Address to bind the server to.
    #[arg(short, long, env = "OPDS_BIND", global = true)]
    pub bind: Option<SocketAddr>,

    /// Base URL of the upstream media server.
    #[arg(long, env = "OPDS_UPSTREAM_URL", global = true)]
    pub upstream_url: Option<String>,

    /// Bearer token for the upstream media server.
    #[arg(long, env = "OPDS_UPSTREAM_TOKEN", hide_env_values = true, global = true)]
    pub upstream_token: Option<String>,

    /// Basic auth username required from OPDS clients.
    #[arg(long, env = "OPDS_BASIC_USER", global = true)]
    pub basic_user: Option<String>,

    /// Basic auth password required from OPDS clients.
    #[arg(long, env = "OPDS_BASIC_PASS", hide_env_values = true, global = true)]
    pub basic_pass: Option<String>,

    /// Default lifetime of cached upstream responses, in seconds.
    #[arg(long, env = "OPDS_CACHE_TTL", global = true)]
    pub cache_ttl: Option<u64>,
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream media server configuration.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Client authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Metadata cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Catalog title.
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            title: default_title(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        8080,
    )
}

fn default_title() -> String {
    "Audiobookshelf OPDS".to_string()
}

/// Upstream media server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the media server, e.g. `http://localhost:13378`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API token sent as `Authorization: Bearer`.
    #[serde(default)]
    pub token: Option<String>,

    /// Timeout for catalog/metadata calls.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Connect/read timeout for file downloads.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_seconds: default_timeout(),
            download_timeout_seconds: default_download_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:13378".to_string()
}

fn default_timeout() -> u64 {
    20
}

fn default_download_timeout() -> u64 {
    120
}

impl UpstreamConfig {
    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Timeout for metadata calls.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Timeout for downloads.
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_seconds)
    }
}

/// Client authentication configuration.
///
/// Leaving both fields unset disables authentication.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Required username.
    #[serde(default)]
    pub username: Option<String>,

    /// Required password.
    #[serde(default)]
    pub password: Option<String>,
}

/// Metadata cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default time-to-live for cached upstream JSON, in seconds.
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
        }
    }
}

fn default_ttl() -> u64 {
    30
}

impl CacheConfig {
    /// Default time-to-live as a duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &PathBuf) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("opds-bridge.toml"),
            dirs::config_dir()
                .map(|p| p.join("opds-bridge").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/opds-bridge/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Apply command line / environment overrides.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(bind) = overrides.bind {
            self.server.bind = bind;
        }
        if let Some(url) = overrides.upstream_url {
            self.upstream.base_url = url;
        }
        if let Some(token) = overrides.upstream_token {
            self.upstream.token = Some(token);
        }
        if let Some(user) = overrides.basic_user {
            self.auth.username = Some(user);
        }
        if let Some(pass) = overrides.basic_pass {
            self.auth.password = Some(pass);
        }
        if let Some(ttl) = overrides.cache_ttl {
            self.cache.ttl_seconds = ttl;
        }
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# opds-bridge configuration

[server]
bind = "0.0.0.0:8080"
title = "Audiobookshelf OPDS"

[upstream]
base_url = "http://localhost:13378"
# token = "api-token"
timeout_seconds = 20
download_timeout_seconds = 120

[auth]
# Leave both unset to disable Basic auth for OPDS clients.
# username = "reader"
# password = "secret"

[cache]
# Lifetime of cached upstream JSON responses
ttl_seconds = 30
"#
        .to_string()
    }
}
