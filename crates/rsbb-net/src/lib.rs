//! ---
//! rsbb_section: "05-networking-external-interfaces"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Network connectivity for the robot and the referee stub."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
//! HTTP surfaces of the dummy robot: a bridge that lets external tools publish
//! on the in-process bus, a service client that reaches a referee box over
//! HTTP, and a referee stub serving services from an in-process registry.

use std::net::{SocketAddr, TcpListener as StdTcpListener};

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub mod bridge;
pub mod client;
pub mod referee;

pub use bridge::{spawn_bridge, BridgeState};
pub use client::HttpServiceClient;
pub use referee::{spawn_referee, RefereeStub};

/// Handle to a running HTTP server.
#[derive(Debug)]
pub struct HttpServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl HttpServer {
    /// Bound address; differs from the requested one when port 0 was used.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(err.into()),
        }
    }
}

fn serve(router: Router, addr: SocketAddr, label: &'static str) -> Result<HttpServer> {
    let listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind {label} listener {addr}"))?;
    listener
        .set_nonblocking(true)
        .with_context(|| format!("failed to configure {label} listener as non-blocking"))?;
    let bound = listener
        .local_addr()
        .with_context(|| format!("failed to read {label} listener address"))?;
    let tcp_listener =
        TcpListener::from_std(listener).context("failed to create tokio listener")?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task: JoinHandle<Result<()>> = tokio::spawn(async move {
        info!(address = %bound, server = label, "http server listening");
        if let Err(err) = axum::serve(tcp_listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
        {
            error!(address = %bound, server = label, error = %err, "http server exited with error");
            return Err(err.into());
        }
        Ok(())
    });

    Ok(HttpServer {
        addr: bound,
        shutdown: Some(shutdown_tx),
        task,
    })
}

/// Map a wildcard path capture back to a topic or service name.
pub(crate) fn absolute_name(captured: &str) -> String {
    if captured.starts_with('/') {
        captured.to_owned()
    } else {
        format!("/{captured}")
    }
}

#[cfg(test)]
mod tests {
    use super::absolute_name;

    #[test]
    fn captured_paths_gain_leading_slash() {
        assert_eq!(absolute_name("roah_rsbb/benchmark"), "/roah_rsbb/benchmark");
        assert_eq!(absolute_name("/roah_rsbb/end_prepare"), "/roah_rsbb/end_prepare");
    }
}
