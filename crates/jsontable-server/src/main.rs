use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use jsontable_client::ReqwestFetcher;
use jsontable_core::{PanelPoller, PanelState, TracingPollerReporter};
use jsontable_server::config::ServerConfig;
use jsontable_server::routes;
use jsontable_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("jsontable=info".parse()?))
        .with_target(false)
        .init();

    let server_config = ServerConfig::from_env()?;
    let panel_config = server_config.load_panel()?;
    if server_config.admin_token.is_none() {
        tracing::warn!("JSONTABLE_ADMIN_TOKEN not set: POST /v1/fetch is disabled");
    }

    let fetcher = ReqwestFetcher::new()?;
    let panel = PanelState::new();

    let state = Arc::new(AppState {
        panel: panel.clone(),
        config: panel_config.clone(),
        fetcher: fetcher.clone(),
        admin_token: server_config.admin_token.clone(),
    });

    let cancel_token = CancellationToken::new();
    let poller = PanelPoller::new(fetcher, panel_config, panel);
    let poller_handle = {
        let token = cancel_token.clone();
        tokio::spawn(async move { poller.run(token, &TracingPollerReporter).await })
    };

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", server_config.port);
    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel_token.cancel();
    poller_handle.await??;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
