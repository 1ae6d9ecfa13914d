//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, semantic checks)
//!     → ServeConfig (validated, immutable)
//!     → main.rs (merged with CLI flags)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so a minimal config file works
//! - Config is immutable once loaded
//! - CLI flags take precedence over file values

pub mod loader;
pub mod schema;

pub use loader::{load_config, ConfigError};
pub use schema::{ListenerConfig, ServeConfig, TlsConfig};
