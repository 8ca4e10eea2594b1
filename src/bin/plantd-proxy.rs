//! plantd-proxy: HTTP server for the PlantD control-plane proxy.
//!
//! Configuration is read from `PLANTD_PROXY_CONFIG` or the XDG config file,
//! with `PLANTD_PROXY_BIND` / `PLANTD_PROXY_PORT` overriding the listen address.

use std::sync::Arc;

use plantd_proxy::config::ProxyConfig;
use plantd_proxy::dispatch::Dispatcher;
use plantd_proxy::gateway::ObjectGateway;
use plantd_proxy::paths::ProxyPaths;
use plantd_proxy::server::{AppState, router};
use plantd_proxy::store;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let paths = ProxyPaths::resolve().unwrap_or_else(|e| {
        tracing::error!("failed to resolve XDG paths: {e}");
        std::process::exit(1);
    });
    if let Err(e) = paths.ensure_dirs() {
        tracing::error!("failed to create XDG directories: {e}");
        std::process::exit(1);
    }

    let config = ProxyConfig::resolve(&paths).unwrap_or_else(|e| {
        tracing::error!("failed to load configuration: {e}");
        std::process::exit(1);
    });

    let backing = store::open(&config.store, &paths).unwrap_or_else(|e| {
        tracing::error!("failed to open store: {e}");
        std::process::exit(1);
    });
    tracing::info!(backend = ?config.store.backend, "store opened");

    let gateway = ObjectGateway::new(backing);
    if let Err(e) = gateway.seed_core(&config.core) {
        tracing::error!("failed to seed core config: {e}");
        std::process::exit(1);
    }

    let dispatcher = Dispatcher::new(gateway);
    let state = Arc::new(AppState::new(dispatcher, config.archive));
    let app = router(state, config.server.max_body_bytes);

    let addr = config.server.addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!("plantd-proxy listening on {addr}");

    // Serve with graceful shutdown on SIGTERM/SIGINT.
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let ctrl_c = tokio::signal::ctrl_c();
            #[cfg(unix)]
            {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        tokio::select! {
                            _ = ctrl_c => {},
                            _ = sigterm.recv() => {},
                        }
                    }
                    Err(e) => {
                        tracing::warn!("failed to register SIGTERM handler: {e}");
                        ctrl_c.await.ok();
                    }
                }
            }
            #[cfg(not(unix))]
            {
                ctrl_c.await.ok();
            }
            tracing::info!("plantd-proxy shutting down");
        })
        .await;

    if let Err(e) = served {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}
