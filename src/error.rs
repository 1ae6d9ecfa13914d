//! Error definitions shared across the crate.

use thiserror::Error;

/// Errors that can occur while parsing addresses, building TLS
/// material, or standing up a listening socket.
///
/// The variants are deliberately distinct so callers can react
/// differently, e.g. retry with another port on [`AddressInUse`].
///
/// [`AddressInUse`]: ServeError::AddressInUse
#[derive(Debug, Error)]
pub enum ServeError {
    /// Malformed or unsupported address input.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The requested address or socket path is already bound.
    #[error("address in use: {0}")]
    AddressInUse(String),

    /// Privileged port or restricted filesystem path.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Missing, unreadable, or invalid certificate or key material.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServeError {
    /// Map a bind/listen error onto the taxonomy, keeping the offending
    /// address in the message.
    pub(crate) fn from_bind(err: std::io::Error, addr: impl std::fmt::Display) -> Self {
        match err.kind() {
            std::io::ErrorKind::AddrInUse => Self::AddressInUse(addr.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(addr.to_string()),
            _ => Self::Io(err),
        }
    }
}
