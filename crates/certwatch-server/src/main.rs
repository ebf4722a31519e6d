use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use certwatch_notify::Dispatcher;
use certwatch_storage::DomainStore;
use chrono::Utc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use certwatch_server::app;
use certwatch_server::config::ServerConfig;
use certwatch_server::probe::NetworkProber;
use certwatch_server::provider::CloudflareProvider;
use certwatch_server::renew::CommandRenewer;
use certwatch_server::scan::{Reconciler, ScanScheduler};
use certwatch_server::sink::DispatchSink;
use certwatch_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|e| anyhow::anyhow!("Failed to install default CryptoProvider: {e:?}"))?;

    certwatch_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("certwatch=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("config/server.toml");
    let config = Arc::new(ServerConfig::load(config_path)?);

    tracing::info!(
        http_port = config.http_port,
        data_dir = %config.database.data_dir,
        db = %config.database.redacted_url(),
        "certwatch-server starting"
    );

    std::fs::create_dir_all(&config.database.data_dir)?;
    let store = Arc::new(DomainStore::new(&config.database.connection_url()).await?);
    let dispatcher = Arc::new(Dispatcher::new());
    let sink: Arc<dyn certwatch_notify::EventSink> =
        Arc::new(DispatchSink::new(store.clone(), dispatcher.clone()));
    let reconciler = Arc::new(Reconciler::new(store.clone(), sink.clone()));
    let prober = Arc::new(NetworkProber::new(Duration::from_secs(
        config.scan.connect_timeout_secs,
    )));
    let provider = Arc::new(CloudflareProvider::new(
        &config.cloudflare.api_base,
        &config.cloudflare.api_token,
    ));
    let renewer = Arc::new(CommandRenewer::new(&config.renew.command));

    if !provider.is_configured() {
        tracing::warn!("Cloudflare api_token is empty, provider sync will fail until configured");
    }

    if config.scan.enabled {
        let scheduler = ScanScheduler::new(
            store.clone(),
            reconciler.clone(),
            prober.clone(),
            config.scan.interval_secs,
            config.scan.max_concurrent,
            config.scan.warning_days,
        );
        tokio::spawn(async move {
            scheduler.run().await;
        });
    } else {
        tracing::info!("scheduled scanning disabled");
    }

    let state = AppState {
        store,
        dispatcher,
        sink,
        reconciler,
        prober,
        provider,
        renewer,
        config: config.clone(),
        start_time: Utc::now(),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening");

    axum::serve(listener, app::build_http_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("certwatch-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}
