//! The hyper shell around a [`Dispatcher`].
//!
//! # Lifecycle
//!
//! [`Router::build`] runs once when serving starts. The resulting dispatcher
//! sits behind an `Arc` and every connection task reads it without locking.
//! Each accepted socket gets its own task speaking HTTP/1.1 or HTTP/2.
//!
//! On shutdown (SIGTERM, Ctrl-C, or the caller's own signal) the accept loop
//! stops first. Connections already open keep going until their last
//! response is written, and only then does `serve` return. Orchestrators
//! that send SIGKILL after a grace period should allow for the slowest
//! chain.
//!
//! # Abandoned requests
//!
//! Each request's [`Context`](crate::Context) lives inside the future hyper
//! polls for it. When a client disconnects mid-chain hyper drops that
//! future, and the context goes with it; no other request is affected.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::response::Response;
use crate::router::Router;

/// Binds a [`Router`] to a TCP address.
pub struct Server {
    addr: SocketAddr,
    request_timeout: Option<Duration>,
}

impl Server {
    /// ```rust,no_run
    /// use stacks::Server;
    /// let server = Server::bind(([127, 0, 0, 1], 8080).into());
    /// ```
    pub fn bind(addr: SocketAddr) -> Self {
        Self { addr, request_timeout: None }
    }

    /// Address and request timeout taken from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            addr: config.addr,
            request_timeout: config.request_timeout(),
        }
    }

    /// Answers `503` to requests whose chain takes longer than `timeout`.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Serves until SIGTERM or Ctrl-C, then drains open connections.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Like [`serve`](Self::serve), but stops when `signal` resolves.
    pub async fn serve_with_shutdown<S>(self, router: Router, signal: S) -> Result<(), Error>
    where
        S: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve_listener(listener, router, signal).await
    }

    /// Serves on an already-bound listener. The configured address is
    /// ignored.
    pub async fn serve_listener<S>(
        self,
        listener: TcpListener,
        router: Router,
        signal: S,
    ) -> Result<(), Error>
    where
        S: Future<Output = ()>,
    {
        let dispatcher = Arc::new(router.build());
        let timeout = self.request_timeout;
        let mut connections = JoinSet::new();

        info!(
            addr = %listener.local_addr()?,
            routes = dispatcher.routes().len(),
            "stacks listening"
        );

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Shutdown wins over a queued accept.
                biased;

                () = &mut signal => {
                    info!(open = connections.len(), "shutting down, draining connections");
                    break;
                }

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(connection(Arc::clone(&dispatcher), stream, peer, timeout));
                    }
                    Err(e) => error!("accept failed: {e}"),
                },

                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        while connections.join_next().await.is_some() {}

        info!("stacks stopped");
        Ok(())
    }
}

/// Drives one client socket until it closes.
async fn connection(
    dispatcher: Arc<Dispatcher>,
    stream: TcpStream,
    peer: SocketAddr,
    timeout: Option<Duration>,
) {
    debug!(%peer, "connection accepted");
    let service = service_fn(move |req| {
        let dispatcher = Arc::clone(&dispatcher);
        async move { Ok::<_, Infallible>(respond(&dispatcher, req, timeout).await) }
    });

    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        error!(%peer, "connection error: {e}");
    }
}

async fn respond(
    dispatcher: &Dispatcher,
    req: http::Request<hyper::body::Incoming>,
    timeout: Option<Duration>,
) -> http::Response<Full<Bytes>> {
    let Some(limit) = timeout else {
        return dispatcher.dispatch(req).await;
    };

    let path = req.uri().path().to_owned();
    match tokio::time::timeout(limit, dispatcher.dispatch(req)).await {
        Ok(res) => res,
        Err(_) => {
            let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
            warn!(path, timeout_ms, "request timed out");
            let mut res = Response::new();
            let _ = res.error(StatusCode::SERVICE_UNAVAILABLE, "Request timed out");
            res.into_http()
        }
    }
}

/// Completes when the process is asked to stop: Ctrl-C anywhere, SIGTERM on
/// Unix as well. A handler that cannot be installed is logged and never
/// fires.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => info!("received Ctrl-C"),
        () = terminate => info!("received SIGTERM"),
    }
}
