use anyhow::Context;

use roster_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    roster_observability::init();

    let config = ApiConfig::from_env();
    let services = roster_api::app::services::build_services(&config.ledger)
        .await
        .context("failed to open participant ledger")?;

    let app = roster_api::app::build_app(services);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        backend = ?config.ledger.backend,
        "listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
