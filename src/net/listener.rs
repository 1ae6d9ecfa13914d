//! Socket factory: turn an [`AddressSpec`] into a bound, listening
//! socket.
//!
//! # Responsibilities
//! - Resolve TCP hosts to an address family (IPv4 or IPv6)
//! - Bind with address reuse and a fixed accept backlog
//! - Adopt inherited descriptors without re-binding
//! - Carry the optional TLS context alongside the listener
//!
//! # Design Decisions
//! - Accept returns the raw stream; the TLS handshake happens in the
//!   connection handler so it can never block the accept loop
//! - A stale unix socket file is removed and rebound; a live one is an
//!   `AddressInUse` conflict
//! - No read/write timeouts are imposed on accepted connections

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};
use tokio_rustls::TlsAcceptor;

use crate::addr::{AddressSpec, Scheme};
use crate::error::ServeError;
use crate::net::tls::{generate_adhoc_context, TlsContext};

const BACKLOG: u32 = 128;

/// Local address of a listening socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    Inet(SocketAddr),
    Unix(PathBuf),
}

impl ListenAddr {
    pub fn port(&self) -> Option<u16> {
        match self {
            ListenAddr::Inet(addr) => Some(addr.port()),
            ListenAddr::Unix(_) => None,
        }
    }

    pub fn family(&self) -> AddressFamily {
        match self {
            ListenAddr::Inet(addr) if addr.is_ipv4() => AddressFamily::Ipv4,
            ListenAddr::Inet(_) => AddressFamily::Ipv6,
            ListenAddr::Unix(_) => AddressFamily::Unix,
        }
    }
}

impl std::fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenAddr::Inet(addr) => addr.fmt(f),
            ListenAddr::Unix(path) => path.display().fmt(f),
        }
    }
}

/// Address family of a listening socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
    Unix,
}

/// A bound, listening socket with optional TLS material attached.
///
/// Exclusively owned by the server that serves it; dropping it closes
/// the underlying socket.
#[derive(Debug)]
pub struct ListeningSocket {
    inner: ListenerKind,
    tls: Option<TlsContext>,
    local_addr: ListenAddr,
}

#[derive(Debug)]
enum ListenerKind {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl ListeningSocket {
    /// Accept one connection, returning the raw (not yet TLS-wrapped)
    /// stream.
    pub async fn accept(&self) -> io::Result<Stream> {
        match &self.inner {
            ListenerKind::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                tracing::debug!(peer = %peer, "connection accepted");
                Ok(Stream::Tcp(stream))
            }
            #[cfg(unix)]
            ListenerKind::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                tracing::debug!(path = %self.local_addr, "connection accepted");
                Ok(Stream::Unix(stream))
            }
        }
    }

    pub fn local_addr(&self) -> &ListenAddr {
        &self.local_addr
    }

    pub fn port(&self) -> Option<u16> {
        self.local_addr.port()
    }

    pub fn family(&self) -> AddressFamily {
        self.local_addr.family()
    }

    /// Whether accepted connections are to be wrapped in TLS.
    pub fn tls_active(&self) -> bool {
        self.tls.is_some()
    }

    /// Acceptor for wrapping accepted connections, when TLS is active.
    pub fn tls_acceptor(&self) -> Option<TlsAcceptor> {
        self.tls.as_ref().map(TlsContext::acceptor)
    }
}

/// A single accepted, not yet TLS-wrapped connection.
#[derive(Debug)]
pub enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(unix)]
            Stream::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Stream::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(unix)]
            Stream::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(unix)]
            Stream::Unix(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(unix)]
            Stream::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Build a listening socket for the given spec.
///
/// An `https` URL spec with no TLS material falls back to an ad-hoc
/// generated context; the context's temporary files then live exactly
/// as long as the returned socket.
pub async fn make_socket(
    spec: &AddressSpec,
    tls: Option<TlsContext>,
) -> Result<ListeningSocket, ServeError> {
    match spec {
        AddressSpec::Tcp { host, port } => {
            let port = port.unwrap_or(if tls.is_some() { 443 } else { 80 });
            bind_tcp(host, port, tls).await
        }
        AddressSpec::Url { scheme, host, port } => {
            let tls = match (scheme, tls) {
                (Scheme::Https, None) => Some(generate_adhoc_context()?),
                (_, tls) => tls,
            };
            bind_tcp(host, *port, tls).await
        }
        AddressSpec::Unix { path } => bind_unix(path, tls).await,
        AddressSpec::Fd { fd } => adopt_fd(*fd, tls),
    }
}

async fn bind_tcp(
    host: &str,
    port: u16,
    tls: Option<TlsContext>,
) -> Result<ListeningSocket, ServeError> {
    let addr = resolve(host, port).await?;
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr).map_err(|err| ServeError::from_bind(err, addr))?;
    let listener = socket
        .listen(BACKLOG)
        .map_err(|err| ServeError::from_bind(err, addr))?;
    let local = listener.local_addr()?;

    tracing::info!(address = %local, tls = tls.is_some(), "listener bound");
    Ok(ListeningSocket {
        inner: ListenerKind::Tcp(listener),
        tls,
        local_addr: ListenAddr::Inet(local),
    })
}

/// Resolve a host to one socket address, preferring a literal parse
/// over a lookup.
async fn resolve(host: &str, port: u16) -> Result<SocketAddr, ServeError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|err| ServeError::InvalidAddress(format!("cannot resolve {host}: {err}")))?
        .next()
        .ok_or_else(|| ServeError::InvalidAddress(format!("cannot resolve {host}")))
}

#[cfg(unix)]
async fn bind_unix(
    path: &std::path::Path,
    tls: Option<TlsContext>,
) -> Result<ListeningSocket, ServeError> {
    let listener = match UnixListener::bind(path) {
        Ok(listener) => listener,
        Err(err) if err.kind() == io::ErrorKind::AddrInUse => {
            // A live socket on the path is a genuine conflict; a stale
            // file left by a dead server is removed and rebound.
            if UnixStream::connect(path).await.is_ok() {
                return Err(ServeError::AddressInUse(path.display().to_string()));
            }
            std::fs::remove_file(path)?;
            UnixListener::bind(path).map_err(|err| ServeError::from_bind(err, path.display()))?
        }
        Err(err) => return Err(ServeError::from_bind(err, path.display())),
    };

    tracing::info!(path = %path.display(), tls = tls.is_some(), "unix listener bound");
    Ok(ListeningSocket {
        inner: ListenerKind::Unix(listener),
        tls,
        local_addr: ListenAddr::Unix(path.to_path_buf()),
    })
}

#[cfg(not(unix))]
async fn bind_unix(
    path: &std::path::Path,
    _tls: Option<TlsContext>,
) -> Result<ListeningSocket, ServeError> {
    Err(ServeError::InvalidAddress(format!(
        "unix sockets are not supported on this platform: {}",
        path.display()
    )))
}

#[cfg(unix)]
fn adopt_fd(fd: i32, tls: Option<TlsContext>) -> Result<ListeningSocket, ServeError> {
    use std::os::fd::FromRawFd;

    // Safety: the launcher handed this descriptor to the process for
    // exactly this purpose, and it is adopted at most once.
    let std_listener = unsafe { std::net::TcpListener::from_raw_fd(fd) };
    std_listener.set_nonblocking(true)?;
    let listener = TcpListener::from_std(std_listener)?;
    let local = listener.local_addr()?;

    tracing::info!(fd, address = %local, tls = tls.is_some(), "inherited listener adopted");
    Ok(ListeningSocket {
        inner: ListenerKind::Tcp(listener),
        tls,
        local_addr: ListenAddr::Inet(local),
    })
}

#[cfg(not(unix))]
fn adopt_fd(fd: i32, _tls: Option<TlsContext>) -> Result<ListeningSocket, ServeError> {
    Err(ServeError::InvalidAddress(format!(
        "inherited descriptors are not supported on this platform: {fd}"
    )))
}
