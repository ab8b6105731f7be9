use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use arenahub::config::{Cli, Config};
use arenahub::db;
use arenahub::routes;
use arenahub::sgg::HttpUpstream;
use arenahub::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        return Err(e);
    }

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;
    db::ensure_bootstrap_admin(&pool, &config.auth)?;

    // validate() guarantees a token is present
    let token = config.startgg.token().unwrap_or_default().to_string();
    let upstream = Arc::new(HttpUpstream::new(config.startgg.endpoint.clone(), token));

    let state = AppState::new(pool, config.clone(), upstream);
    let app = routes::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
