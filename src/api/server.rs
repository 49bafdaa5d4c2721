//! # API Server
//!
//! Runs the axum router on an already-bound listener until the shared
//! shutdown signal fires. In-flight requests are allowed to finish.

use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

pub struct ApiServer {
    listener: TcpListener,
    router: Router,
    shutdown_rx: watch::Receiver<bool>,
}

impl ApiServer {
    pub fn new(listener: TcpListener, router: Router, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            listener,
            router,
            shutdown_rx,
        }
    }

    /// Binds `addr` and wraps the listener.
    pub async fn bind(addr: SocketAddr, router: Router, shutdown_rx: watch::Receiver<bool>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::new(listener, router, shutdown_rx))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Returns a future that serves requests until shutdown is signalled.
    pub fn run(self) -> impl Future<Output = ()> {
        let mut shutdown_rx = self.shutdown_rx;
        async move {
            let shutdown = async move {
                shutdown_rx.changed().await.ok();
                info!("API server received shutdown signal.");
            };
            if let Err(e) = axum::serve(self.listener, self.router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("API server error: {}", e);
            }
            info!("API server task finished.");
        }
    }
}
