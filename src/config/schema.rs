//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config
//! files.

use serde::{Deserialize, Serialize};

/// Root configuration for a server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServeConfig {
    /// Listener configuration (address, serving mode).
    pub listener: ListenerConfig,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Address string, same forms as the `--address` flag
    /// (e.g. "localhost:8080", "https://0.0.0.0").
    pub address: String,

    /// Dispatch each connection to its own task.
    pub threaded: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self { address: "localhost:8080".to_string(), threaded: false }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to the certificate file (PEM).
    pub cert_path: String,

    /// Path to the private key file (PEM). When absent the key is
    /// read from the certificate file.
    pub key_path: Option<String>,
}
