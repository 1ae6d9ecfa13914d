//! Server bootstrap subsystem.
//!
//! # Data Flow
//! ```text
//! ListeningSocket + application Router + mode
//!     → bootstrap.rs (accept loop, per-connection dispatch)
//!     → handle.rs (lifecycle state, shutdown coordination)
//!
//! Lifecycle:
//!     Created → Serving → ShuttingDown → Stopped
//! ```
//!
//! # Design Decisions
//! - `serve_forever` consumes the server, so a second start is
//!   unrepresentable
//! - Shutdown is level-triggered via a broadcast channel; the biased
//!   select guarantees no accept once shutdown has begun
//! - Threaded mode spawns a task per connection with no implicit
//!   concurrency limit; single-threaded mode serves connections one at
//!   a time

pub mod bootstrap;
pub mod handle;

pub use bootstrap::{make_server, Server};
pub use handle::{ServerHandle, ServerState};
