//! HTTP server and graceful shutdown.
//!
//! The server owns a [`Router`] until it starts, then freezes it into a
//! [`RouteTable`] shared by every connection task. It accepts connections and
//! hands each one to hyper; all request handling happens in
//! [`RouteTable::dispatch`].
//!
//! # Graceful shutdown
//!
//! A drain is triggered by **SIGTERM** / **Ctrl-C** (waiting up to
//! [`ServerConfig::shutdown_grace`]) or by [`ShutdownHandle::shutdown`] with
//! an explicit deadline. Either way the server:
//!
//! 1. Stops accepting new connections.
//! 2. Asks every open connection to finish its in-flight requests and close.
//! 3. Waits for them up to the deadline, then aborts whatever is left.
//!
//! When running under Kubernetes, keep `terminationGracePeriodSeconds` above
//! the configured grace period so the drain finishes before SIGKILL.

use std::convert::Infallible;
use std::net::SocketAddr;
#[cfg(feature = "tls")]
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::Error;
use crate::handler::Handler;
use crate::router::{RouteTable, Router};

/// The HTTP server.
///
/// ```rust,no_run
/// use seed::{middleware, Context, Request, Server};
///
/// async fn hello(_: Context, _: Request) -> &'static str { "hello" }
///
/// #[tokio::main]
/// async fn main() -> Result<(), seed::Error> {
///     let mut server = Server::bind("0.0.0.0:3000");
///     server
///         .router()
///         .use_middleware(middleware::logger())
///         .use_middleware(middleware::recoverer())
///         .get("/", hello);
///     server.run().await
/// }
/// ```
pub struct Server {
    config: ServerConfig,
    router: Router,
    shutdown_tx: mpsc::Sender<ShutdownRequest>,
    shutdown_rx: mpsc::Receiver<ShutdownRequest>,
}

#[derive(Debug)]
struct ShutdownRequest {
    deadline: Duration,
    drained: oneshot::Sender<bool>,
}

/// Triggers a graceful shutdown of a running [`Server`] from elsewhere.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    tx: mpsc::Sender<ShutdownRequest>,
}

impl ShutdownHandle {
    /// Stops the server and waits for in-flight connections, at most
    /// `deadline`. Connections still open after that are aborted and
    /// [`Error::ShutdownTimeout`] is returned.
    ///
    /// Returns `Ok` right away if the server already stopped.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), Error> {
        let (drained, rx) = oneshot::channel();
        if self.tx.send(ShutdownRequest { deadline, drained }).await.is_err() {
            return Ok(());
        }
        match rx.await {
            Ok(false) => Err(Error::ShutdownTimeout(deadline)),
            Ok(true) | Err(_) => Ok(()),
        }
    }
}

impl Server {
    /// A server listening on `addr` (`host:port`) once started. The address
    /// is validated by [`run`](Self::run).
    pub fn bind(addr: impl Into<String>) -> Self {
        Self::with_config(ServerConfig { addr: addr.into(), ..ServerConfig::default() })
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let mut router = Router::new();
        router.max_body_size(config.max_body_size);
        Self { config, router, shutdown_tx, shutdown_rx }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The route builder. Everything registered here is frozen when the
    /// server starts.
    pub fn router(&mut self) -> &mut Router {
        &mut self.router
    }

    /// See [`Router::not_found`].
    pub fn not_found(&mut self, handler: impl Handler) -> &mut Self {
        self.router.not_found(handler);
        self
    }

    /// See [`Router::static_files`].
    pub fn static_files(&mut self, prefix: &str, root: impl Into<PathBuf>) -> &mut Self {
        self.router.static_files(prefix, root);
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle { tx: self.shutdown_tx.clone() }
    }

    /// Binds the configured address and serves until shut down. With the
    /// `tls` feature and a `tls` section in the config, serves HTTPS.
    pub async fn run(self) -> Result<(), Error> {
        #[cfg(feature = "tls")]
        if let Some(tls) = self.config.tls.clone() {
            return self.run_tls(tls.cert, tls.key).await;
        }
        let listener = TcpListener::bind(self.config.socket_addr()?).await?;
        self.serve(listener).await
    }

    /// Serves HTTPS with the PEM certificate chain and private key.
    #[cfg(feature = "tls")]
    pub async fn run_tls(self, cert: impl AsRef<Path>, key: impl AsRef<Path>) -> Result<(), Error> {
        let acceptor = crate::tls::acceptor(cert.as_ref(), key.as_ref())?;
        let listener = TcpListener::bind(self.config.socket_addr()?).await?;
        self.serve_with(listener, Acceptor::Tls(acceptor)).await
    }

    /// Serves plain HTTP on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), Error> {
        self.serve_with(listener, Acceptor::Plain).await
    }

    async fn serve_with(self, listener: TcpListener, acceptor: Acceptor) -> Result<(), Error> {
        let Server { config, router, shutdown_tx, shutdown_rx: mut requests } = self;
        drop(shutdown_tx);

        let table = Arc::new(router.build());
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        let signal = shutdown_signal();
        tokio::pin!(signal);

        info!(addr = %listener.local_addr()?, "seed listening");

        let (deadline, reply) = loop {
            tokio::select! {
                biased;

                () = &mut signal => {
                    info!("shutdown signal received");
                    break (config.shutdown_grace(), None);
                }

                Some(req) = requests.recv() => {
                    info!(deadline = ?req.deadline, "shutdown requested");
                    break (req.deadline, Some(req.drained));
                }

                res = listener.accept() => {
                    let (stream, remote) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };
                    let table = Arc::clone(&table);
                    let stop = stop_rx.clone();
                    match &acceptor {
                        Acceptor::Plain => {
                            tasks.spawn(serve_connection(stream, table, remote, stop));
                        }
                        #[cfg(feature = "tls")]
                        Acceptor::Tls(tls) => {
                            let tls = tls.clone();
                            tasks.spawn(async move {
                                match tls.accept(stream).await {
                                    Ok(stream) => serve_connection(stream, table, remote, stop).await,
                                    Err(e) => debug!(peer = %remote, "tls handshake failed: {e}"),
                                }
                            });
                        }
                    }
                }

                Some(res) = tasks.join_next(), if !tasks.is_empty() => reap(res),
            }
        };

        drop(listener);
        info!(in_flight = tasks.len(), ?deadline, "draining connections");
        stop_tx.send_replace(true);

        let drain = async {
            while let Some(res) = tasks.join_next().await {
                reap(res);
            }
        };
        let drained = tokio::time::timeout(deadline, drain).await.is_ok();
        if !drained {
            warn!(remaining = tasks.len(), ?deadline, "drain deadline passed, aborting connections");
            tasks.shutdown().await;
        }

        if let Some(reply) = reply {
            let _ = reply.send(drained);
        }
        info!("seed stopped");
        if drained { Ok(()) } else { Err(Error::ShutdownTimeout(deadline)) }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

enum Acceptor {
    Plain,
    #[cfg(feature = "tls")]
    Tls(tokio_rustls::TlsAcceptor),
}

/// Serves one connection until it closes, or until `stop` flips and its
/// in-flight requests are done.
async fn serve_connection<S>(
    stream: S,
    table: Arc<RouteTable>,
    remote: SocketAddr,
    mut stop: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    // Called once per request on the connection, not once per connection.
    let svc = service_fn(move |req| {
        let table = Arc::clone(&table);
        async move { Ok::<_, Infallible>(table.dispatch(req, Some(remote)).await) }
    });

    // HTTP/1.1 and HTTP/2, whichever the client speaks.
    let builder = ConnBuilder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(stream), svc);
    tokio::pin!(conn);

    let res = tokio::select! {
        res = conn.as_mut() => res,
        _ = stop.changed() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = res {
        debug!(peer = %remote, "connection error: {e}");
    }
}

fn reap(res: Result<(), JoinError>) {
    match res {
        Err(e) if e.is_panic() => debug!("connection dropped by an unrecovered panic"),
        Err(e) if e.is_cancelled() => debug!("connection aborted"),
        _ => {}
    }
}

/// Resolves on SIGTERM or Ctrl-C. A signal that cannot be installed is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("installing Ctrl-C handler failed: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("installing SIGTERM handler failed: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = sigterm => {}
    }
}
