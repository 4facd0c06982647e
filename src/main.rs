use anyhow::Context;
use record_lookup::config::Config;
use record_lookup::query::QueryService;
use record_lookup::state::AppState;
use record_lookup::{logging, routes, store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_logging();

    tracing::info!("record-lookup starting");

    let config = Config::from_env()?;
    config.log_startup();

    let store = store::connect(&config).await?;
    let addr = format!("{}:{}", config.service_host, config.service_port);

    let state = AppState {
        query: QueryService::new(store),
    };

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("record-lookup stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, shutting down");
}
