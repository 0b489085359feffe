mod query_payload;
mod rag_response;
mod routes;

use anyhow::Result;
use routes::{cors_layer, router, AppState};
use visual_rag::{RagConfig, RagRuntime};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = RagConfig::from_env()?;
    let bind = config.api_bind.clone();
    let cors = cors_layer(&config.cors_origin)?;

    let runtime = RagRuntime::new(config)?;
    log::info!("Visual RAG runtime initialized");

    let app = router(
        AppState {
            query_service: runtime.query_service(),
        },
        cors,
    );

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    log::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    runtime.shutdown()?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received");
}
