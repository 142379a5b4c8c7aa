//! Worker-side tracing: the `BulkTrace`/`Heartbeat` service, the
//! idle-timing trace server, and the register/serve lifecycle.

pub mod server;
pub mod service;

pub use server::serve;
pub use service::TraceService;

use std::time::Duration;

/// Minimum wait between registration attempts.
pub const REGISTER_PERIOD: Duration = Duration::from_millis(500);

/// How long the trace server waits for an order or heartbeat before
/// shutting down and re-entering the register loop.
pub const IDLE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Deadline on the registration call itself.
pub const REGISTRATION_TIMEOUT: Duration = Duration::from_millis(10_000);
