use campus_portal::{app, config::config, is_development, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config().clone();
    tracing::info!(
        "Starting campus portal in {:?} mode for root domain {}",
        config.environment,
        config.tenant.root_domain
    );

    if is_development!() {
        tracing::warn!("Development mode: tokens are signed with the built-in development secret unless JWT_SECRET is set");
    }

    let port = config.api.port;
    let state = AppState::from_config(config).await?;

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Campus portal listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
