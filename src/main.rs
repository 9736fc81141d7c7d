//! opds-bridge entry point.

use clap::Parser;
use opds_bridge::{
    config::{Cli, Command, Config},
    server,
};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let mut config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };
    config.apply(cli.overrides);

    match cli.command {
        Some(Command::Init { force }) => cmd_init(force),
        Some(Command::Libraries) => cmd_libraries(config).await,
        Some(Command::Serve) | None => cmd_serve(config).await,
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opds_bridge=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Write a default config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());
    println!("\nSet [upstream] base_url and token, then run: opds-bridge serve");

    Ok(())
}

/// Print the upstream book libraries.
async fn cmd_libraries(config: Config) -> anyhow::Result<()> {
    init_logging();

    let state = server::AppState::new(config)?;
    let libraries = state.upstream.list_libraries().await?;
    let books: Vec<_> = libraries.into_iter().filter(|l| l.is_book()).collect();

    if books.is_empty() {
        println!("No book libraries found at {}", state.upstream.base_url());
    } else {
        println!("{:<40} NAME", "ID");
        println!("{}", "-".repeat(80));
        for library in books {
            println!("{:<40} {}", library.id, library.name);
        }
    }

    Ok(())
}

/// Start the server.
async fn cmd_serve(config: Config) -> anyhow::Result<()> {
    init_logging();

    let bind = config.server.bind;
    let state = server::AppState::new(config)?;

    tracing::info!(
        bind = %bind,
        upstream = %state.upstream.base_url(),
        auth = state.auth.is_enabled(),
        cache_ttl = ?state.upstream.cache().default_ttl(),
        "Starting opds-bridge"
    );

    let app = server::create_router(state);

    let listener = TcpListener::bind(bind).await?;
    tracing::info!(address = %bind, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
