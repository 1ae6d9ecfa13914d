//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! AddressSpec
//!     → listener.rs (resolve, bind or adopt, listen)
//!     → tls.rs (optional server-side TLS material)
//!     → ListeningSocket (handed to the server bootstrap)
//! ```
//!
//! # Design Decisions
//! - The listener never performs TLS handshakes itself; it only carries
//!   the acceptor so connection handlers can wrap their own stream
//! - Ad-hoc certificate files are owned by a disposer guard inside the
//!   TLS context, so they cannot be deleted while a listener still
//!   references them
//! - Bind errors map onto the shared error taxonomy by `ErrorKind`

pub mod listener;
pub mod tls;

pub use listener::{make_socket, ListenAddr, ListeningSocket};
pub use tls::{generate_adhoc_context, load_tls_config, make_ssl_devcert, TlsContext};
