//! Address specification subsystem.
//!
//! # Data Flow
//! ```text
//! CLI / config / caller input
//!     → spec.rs (classify into one AddressSpec variant)
//!     → net::listener (bind or adopt the described endpoint)
//! ```
//!
//! # Design Decisions
//! - The four address forms are a closed set, so they are an enum with
//!   exhaustive matching in the socket factory, not a trait hierarchy
//! - Parsing is pure: no resolution or socket calls happen here
//! - Scheme and port defaulting follow TLS presence (no scheme) and the
//!   scheme (no port) respectively

pub mod spec;

pub use spec::{AddressSpec, Scheme};
