use std::net::SocketAddr;

use axum::Router;
use color_eyre::eyre::{Context, eyre};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// The bridge's HTTP listener. Serves the debug endpoints and the OAuth callback.
pub struct HttpServer {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl HttpServer {
    /// Binds `0.0.0.0:port` and serves `router` in the background.
    ///
    /// Returns once the listener is bound, so callbacks can arrive immediately.
    pub async fn start(port: u16, router: Router) -> color_eyre::Result<Self> {
        let app = router.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
            .await
            .wrap_err_with(|| eyre!("Failed to bind to port {}", port))?;
        let local_addr = listener
            .local_addr()
            .wrap_err("Failed to read listener address")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(err) = result {
                tracing::error!(error = %err, "HTTP server stopped with an error");
            }
        });

        tracing::info!(%local_addr, "HTTP server listening");
        Ok(Self {
            local_addr,
            shutdown_tx,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn stop(self) -> color_eyre::Result<()> {
        let _ = self.shutdown_tx.send(());
        self.task.await.wrap_err("HTTP server task panicked")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_server::debug::DebugService;

    #[tokio::test]
    async fn test_serves_and_stops() {
        let server = HttpServer::start(0, DebugService::default().routes())
            .await
            .unwrap();

        let url = format!("http://127.0.0.1:{}/health", server.local_addr().port());
        let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
        assert_eq!(body, "OK");

        server.stop().await.unwrap();
        assert!(reqwest::get(&url).await.is_err());
    }

    #[tokio::test]
    async fn test_port_in_use_fails() {
        let server = HttpServer::start(0, Router::new()).await.unwrap();
        let result = HttpServer::start(server.local_addr().port(), Router::new()).await;
        assert!(result.is_err());
        server.stop().await.unwrap();
    }
}
