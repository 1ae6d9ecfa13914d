//! Test harness: run a real server on a background task for the
//! duration of a test.
//!
//! # Data Flow
//! ```text
//! TestServer::start(app)
//!     → choose_port (probe socket on port 0)
//!     → make_socket on the chosen port   (bound before return)
//!     → serve_forever on a spawned task
//! TestServer::close()
//!     → handle.shutdown() → join task (bounded)
//! ```
//!
//! # Design Decisions
//! - The socket is bound and listening before `start` returns, so a
//!   client can connect immediately without racing the server task
//! - `close` never swallows a join failure: a task that does not stop
//!   is reported as a leak
//! - Dropping without `close` signals shutdown and aborts the task as
//!   a fallback

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::task::JoinHandle;

use crate::error::ServeError;
use crate::net::listener::make_socket;
use crate::net::tls::{generate_adhoc_context, TlsContext};
use crate::server::{make_server, ServerHandle};
use crate::AddressSpec;

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Pick an unused TCP port by binding a throwaway probe socket to port
/// 0 and reading back the assignment.
///
/// The port is released before this returns; another process could
/// claim it before the real listener binds, a residual race accepted
/// by design.
pub fn choose_port(host: &str) -> Result<u16, ServeError> {
    let probe = std::net::TcpListener::bind((host, 0))?;
    Ok(probe.local_addr()?.port())
}

/// A server running on a background task for the duration of a test.
///
/// Acquire with [`TestServer::start`] (or [`TestServer::builder`]),
/// release with [`TestServer::close`].
pub struct TestServer {
    addr: SocketAddr,
    tls: bool,
    handle: ServerHandle,
    task: Option<JoinHandle<Result<(), ServeError>>>,
}

/// Options for a [`TestServer`].
#[derive(Default)]
pub struct TestServerBuilder {
    threaded: bool,
    tls: Option<TlsContext>,
    adhoc_tls: bool,
}

impl TestServerBuilder {
    /// Dispatch each connection to its own task.
    pub fn threaded(mut self, threaded: bool) -> Self {
        self.threaded = threaded;
        self
    }

    /// Wrap connections using the given TLS context.
    pub fn tls(mut self, tls: TlsContext) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Wrap connections using a freshly generated ad-hoc context.
    pub fn adhoc_tls(mut self) -> Self {
        self.adhoc_tls = true;
        self
    }

    pub async fn start(self, app: Router) -> Result<TestServer, ServeError> {
        let tls = match (self.tls, self.adhoc_tls) {
            (Some(tls), _) => Some(tls),
            (None, true) => Some(generate_adhoc_context()?),
            (None, false) => None,
        };
        let tls_active = tls.is_some();

        let host = "127.0.0.1";
        let port = choose_port(host)?;
        let spec = AddressSpec::Tcp { host: host.into(), port: Some(port) };

        // Bound and listening here, before the task is spawned: a
        // client may connect as soon as `start` returns.
        let socket = make_socket(&spec, tls).await?;
        let addr = match socket.local_addr() {
            crate::net::ListenAddr::Inet(addr) => *addr,
            crate::net::ListenAddr::Unix(_) => unreachable!("test server listens on TCP"),
        };

        let server = make_server(socket, app, self.threaded);
        let handle = server.handle();
        let task = tokio::spawn(server.serve_forever());

        Ok(TestServer { addr, tls: tls_active, handle, task: Some(task) })
    }
}

impl TestServer {
    /// Start with default options: single-threaded, no TLS.
    pub async fn start(app: Router) -> Result<Self, ServeError> {
        Self::builder().start(app).await
    }

    pub fn builder() -> TestServerBuilder {
        TestServerBuilder::default()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn tls_active(&self) -> bool {
        self.tls
    }

    /// Base URL for requests against this server.
    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}", self.addr)
    }

    /// Control handle for the running server.
    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Shut the server down and join the background task.
    ///
    /// A task that fails to terminate within the join timeout is a
    /// resource leak and is reported as an error, never ignored.
    pub async fn close(mut self) -> Result<(), ServeError> {
        self.handle.shutdown();
        let task = self.task.take().expect("close consumes the task");
        match tokio::time::timeout(JOIN_TIMEOUT, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ServeError::Io(std::io::Error::other(format!(
                "server task failed: {join_err}"
            )))),
            Err(_) => Err(ServeError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "server task did not stop within the join timeout; leaked",
            ))),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.handle.shutdown();
            task.abort();
        }
    }
}
