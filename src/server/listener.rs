use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::info;

use crate::config::Config;
use crate::gateway::Gateway;
use crate::http::connection::Connection;

/// Binds the configured address and serves until `shutdown` resolves.
pub async fn run(
    cfg: &Config,
    gateway: Arc<Gateway>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.server.listen_addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    serve(listener, gateway, shutdown).await
}

/// Accepts connections on `listener` until `shutdown` resolves.
///
/// Connection tasks live in a `JoinSet` owned by this function, so they are
/// aborted (and their sockets closed) however the loop ends.
pub async fn serve(
    listener: TcpListener,
    gateway: Arc<Gateway>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let mut connections = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(in_flight = connections.len(), "Shutting down listener");
                break;
            }

            accepted = listener.accept() => {
                let (socket, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                        continue;
                    }
                };
                tracing::debug!("Accepted connection from {}", peer);

                let gateway = Arc::clone(&gateway);
                connections.spawn(async move {
                    let mut conn = Connection::new(socket, peer, gateway);
                    if let Err(e) = conn.run().await {
                        tracing::error!("Connection error from {}: {}", peer, e);
                    }
                });
            }

            Some(finished) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = finished {
                    if e.is_panic() {
                        tracing::error!(error = %e, "Connection task panicked");
                    }
                }
            }
        }
    }

    connections.shutdown().await;
    Ok(())
}
