use std::future::Future;
use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

use crate::config::{Mode, ServerConfig};
use crate::connection::ConnectionManager;

mod handlers;

pub struct AppState {
    pub mode: Mode,
    pub connections: Arc<ConnectionManager>,
}

/// Builds the HTTP surface for `mode`. `/configure` only exists in stateful mode.
pub fn router(mode: Mode, connections: Arc<ConnectionManager>) -> Router {
    let state = Arc::new(AppState { mode, connections });

    let mut router = Router::new().route("/query", post(handlers::query));
    if mode == Mode::Stateful {
        router = router.route("/configure", post(handlers::configure));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Binds `config.socket_addr()` and serves until SIGINT or SIGTERM.
pub async fn start_server(
    config: &ServerConfig,
    connections: Arc<ConnectionManager>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.socket_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, mode = %config.mode, "docgate listening");

    serve(listener, config.mode, connections, shutdown_signal()).await?;
    Ok(())
}

/// Serves on an already bound listener until `shutdown` resolves, then
/// closes the shared connection.
pub async fn serve<F>(
    listener: TcpListener,
    mode: Mode,
    connections: Arc<ConnectionManager>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(mode, Arc::clone(&connections));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    connections.shutdown().await;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received terminate signal, shutting down"),
    }
}
