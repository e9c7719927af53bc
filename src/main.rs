mod cache;
mod config;
mod event;
mod feed;
mod import;
mod ingest;
mod janitor;
mod rate_limit;
mod relay;
mod repository;
mod scoring;
mod server;
mod viral;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use config::Settings;
use repository::Repository;
use server::AppState;
use viral::ViralPool;

/// Command line interface entry point.
#[derive(Parser)]
#[command(name = "algostr", author, version, about = "Algorithmic feed relay for Nostr")]
struct Cli {
    /// Path to the `.env` configuration file.
    #[arg(long, default_value = ".env")]
    env: String,
    /// Run the one-shot backfill import and exit.
    #[arg(long)]
    import: bool,
}

/// Connect, bootstrap, and either import or serve.
async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = Settings::from_env(&cli.env)?;
    let pool = repository::connect(&cfg).await?;
    repository::bootstrap(&pool).await?;
    let repo = Repository::new(pool);

    if cli.import {
        return import::run(&cfg, &repo).await;
    }

    tokio::spawn(ingest::run(cfg.clone(), repo.clone()));
    tokio::spawn(janitor::run(repo.clone(), cfg.purge_months));

    let viral = Arc::new(ViralPool::new());
    tokio::spawn(Arc::clone(&viral).run(repo.clone(), cfg.weights.clone()));

    let addr: SocketAddr = cfg.bind.parse()?;
    let state = Arc::new(AppState::new(repo, viral, cfg));
    info!(%addr, "relay listening");
    server::serve(addr, state, std::future::pending()).await
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("algostr=info,sqlx=warn,tungstenite=warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();

    run(Cli::parse()).await
}
