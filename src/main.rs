//! `gerar-pdf-api` server binary.
//!
//! Reads configuration from the environment (and `app.env`), serves the
//! HTTP façade until Ctrl-C or SIGTERM, then closes the browser once.

use std::sync::Arc;

use gerar_pdf_api::PdfService;
use gerar_pdf_api::config::env::from_env;
use gerar_pdf_api::integrations::axum::{create_router, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting gerar-pdf-api v{}...", env!("CARGO_PKG_VERSION"));

    let config = from_env()?;
    let service = Arc::new(PdfService::from_config(&config)?);

    if config.eager_launch {
        if let Err(e) = service.warmup().await {
            log::warn!("⚠️ Eager browser launch failed, will retry on first request: {}", e);
        }
    }

    let app = create_router(Arc::clone(&service), &config);
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    log::info!("🌐 Listening on http://{}", listener.local_addr()?);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    service.shutdown();
    log::info!("Cleanup complete");

    served?;
    Ok(())
}
