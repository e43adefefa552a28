use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use agora::config::{Cli, Config};
use agora::state::AppState;
use agora::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    let pool = db::create_pool(config.db_path())?;
    db::run_migrations(&pool)?;

    // Hourly sweep of expired sessions. Validation already drops expired
    // rows lazily, so this is housekeeping, not correctness.
    let sweep_pool = pool.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            if let Err(e) = db::clean_expired_sessions(&sweep_pool) {
                tracing::warn!("Session cleanup failed: {}", e);
            }
        }
    });

    let state = AppState {
        db: pool,
        config: config.clone(),
    };

    let app = Router::new()
        .merge(routes::auth::router())
        .merge(routes::forum::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
