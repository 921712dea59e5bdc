use dp_search_api::{
    api::{build_router, AppState},
    config::Config,
    elasticsearch::{signer, HttpEsClient},
    health::HealthMonitor,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "dp_search_api={level},tower_http={level}",
            level = config.observability.log_level
        )
        .into()
    });
    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Some(e) = config_error {
        tracing::warn!(error = %e, "Failed to load configuration, using defaults");
    }
    tracing::info!("Starting dp-search-api v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = dp_search_api::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    // Elasticsearch client, signed when running against a managed cluster
    let request_signer = signer::from_config(&config.elasticsearch.signer).await?;
    let es = Arc::new(HttpEsClient::new(
        config.elasticsearch.url.clone(),
        Duration::from_secs(config.server.request_timeout_secs),
        request_signer,
    )?);
    tracing::info!(
        url = %config.elasticsearch.url,
        signed = config.elasticsearch.signer.enabled,
        "Elasticsearch client initialized"
    );

    let shutdown = CancellationToken::new();
    let monitor = HealthMonitor::new(
        es.clone(),
        config.server.healthcheck_interval(),
        config.server.healthcheck_critical_timeout(),
    )
    .spawn(shutdown.clone());

    let state = AppState::new(es)?.with_admin_token(&config.upstream.service_auth_token);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!("HTTP API server listening on http://{}", config.server.bind_addr);

    let signal = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
    shutdown.cancel();

    let timeout = config.server.graceful_shutdown_timeout();
    match tokio::time::timeout(timeout, server).await {
        Ok(Ok(Ok(()))) => tracing::info!("HTTP server stopped gracefully"),
        Ok(Ok(Err(e))) => tracing::error!("HTTP server error: {}", e),
        Ok(Err(e)) => tracing::error!("HTTP server task failed: {}", e),
        Err(_) => {
            tracing::error!(
                timeout_secs = timeout.as_secs(),
                "Shutdown timed out, exiting with requests in flight"
            );
            return Err("graceful shutdown timed out".into());
        }
    }

    let _ = monitor.await;
    Ok(())
}
