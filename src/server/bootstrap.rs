//! Accept loop and per-connection dispatch.

use axum::Router;
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, watch};
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;

use crate::error::ServeError;
use crate::net::listener::{ListenAddr, ListeningSocket, Stream};

use super::handle::{ServerHandle, ServerState};

/// Combine a listening socket with an application into a runnable
/// server.
///
/// Threaded mode dispatches every accepted connection to its own task;
/// single-threaded mode serves one connection to completion before the
/// next accept.
pub fn make_server(socket: ListeningSocket, app: Router, threaded: bool) -> Server {
    Server::new(socket, app, threaded)
}

/// A server that has been built but not necessarily started.
///
/// The listening socket is exclusively owned here and released exactly
/// once, when the serving loop exits.
pub struct Server {
    socket: ListeningSocket,
    app: Router,
    threaded: bool,
    shutdown_tx: broadcast::Sender<()>,
    // Subscribed at construction so a shutdown signalled before
    // `serve_forever` is not lost.
    shutdown_rx: broadcast::Receiver<()>,
    inline_rx: broadcast::Receiver<()>,
    state_tx: watch::Sender<ServerState>,
    state_rx: watch::Receiver<ServerState>,
}

impl Server {
    pub fn new(socket: ListeningSocket, app: Router, threaded: bool) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let inline_rx = shutdown_tx.subscribe();
        let (state_tx, state_rx) = watch::channel(ServerState::Created);
        Self {
            socket,
            app,
            threaded,
            shutdown_tx,
            shutdown_rx,
            inline_rx,
            state_tx,
            state_rx,
        }
    }

    /// Control handle, valid before and after the loop runs.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle::new(self.shutdown_tx.clone(), self.state_rx.clone())
    }

    pub fn local_addr(&self) -> &ListenAddr {
        self.socket.local_addr()
    }

    pub fn tls_active(&self) -> bool {
        self.socket.tls_active()
    }

    /// Run the accept loop until a handle signals shutdown.
    ///
    /// Consuming `self` makes a second start unrepresentable. Threaded
    /// connections already in flight keep running after this returns;
    /// in single-threaded mode the in-flight connection is cancelled
    /// rather than run to completion.
    pub async fn serve_forever(self) -> Result<(), ServeError> {
        let Server {
            socket,
            app,
            threaded,
            shutdown_tx: _shutdown_tx,
            mut shutdown_rx,
            mut inline_rx,
            state_tx,
            state_rx: _,
        } = self;
        let acceptor = socket.tls_acceptor();

        let _ = state_tx.send(ServerState::Serving);
        tracing::info!(
            address = %socket.local_addr(),
            threaded,
            tls = socket.tls_active(),
            "server serving"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                accepted = socket.accept() => match accepted {
                    Ok(stream) => {
                        let conn = handle_connection(stream, acceptor.clone(), app.clone());
                        if threaded {
                            tokio::spawn(conn);
                        } else {
                            tokio::select! {
                                biased;
                                _ = inline_rx.recv() => break,
                                _ = conn => {}
                            }
                        }
                    }
                    // Transient accept failures must not kill the
                    // listener.
                    Err(err) => tracing::warn!(error = %err, "accept failed"),
                },
            }
        }

        let _ = state_tx.send(ServerState::ShuttingDown);
        tracing::info!(address = %socket.local_addr(), "server shutting down");
        drop(socket);
        let _ = state_tx.send(ServerState::Stopped);
        Ok(())
    }
}

/// Optionally wrap the stream in TLS, then serve HTTP on it.
///
/// Handshake failures are isolated to the connection.
async fn handle_connection(stream: Stream, acceptor: Option<TlsAcceptor>, app: Router) {
    match acceptor {
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(tls_stream) => serve_stream(tls_stream, app).await,
            Err(err) => tracing::warn!(error = %err, "TLS handshake failed"),
        },
        None => serve_stream(stream, app).await,
    }
}

async fn serve_stream<I>(io: I, app: Router)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = hyper::service::service_fn(move |request: Request<Incoming>| {
        app.clone().oneshot(request)
    });

    if let Err(err) = auto::Builder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(io), service)
        .await
    {
        // Client disconnects mid-request land here; not the server's
        // problem.
        tracing::debug!(error = %err, "connection ended with error");
    }
}
