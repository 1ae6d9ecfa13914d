//! Helpers for standing up HTTP(S) servers from heterogeneous address
//! specifications, plus a test harness that runs a server on a
//! background task for the duration of a test.

pub mod addr;
pub mod cli;
pub mod config;
pub mod error;
pub mod net;
pub mod server;
pub mod testing;

pub use addr::{AddressSpec, Scheme};
pub use error::ServeError;
pub use net::listener::{make_socket, ListenAddr, ListeningSocket};
pub use net::tls::{
    generate_adhoc_context, generate_adhoc_pair, load_tls_config, make_ssl_devcert, TlsContext,
};
pub use server::{make_server, Server, ServerHandle, ServerState};
pub use testing::{choose_port, TestServer};
