use serde::{Deserialize, Serialize};

/// Version byte carried by every frame header. Bumped whenever any message
/// layout changes.
pub const PROTOCOL_VERSION: u8 = 1;

/// Worker → master registration request: the port the worker's trace
/// server listens on. The master derives the rest of the address from the
/// connection's peer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkerLink {
    pub port: u32,
}

/// Master → worker registration response: the binary-encoded immutable
/// environment plus the screen geometry every work order is relative to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterState {
    pub state: Vec<u8>,
    pub screen_width: u32,
    pub screen_height: u32,
}

/// One partition's worth of tracing: a screen-space window plus the frame's
/// binary-encoded mutable environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub diff: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Colour {
    pub r: u32,
    pub g: u32,
    pub b: u32,
}

/// The colours traced for a work order, exactly `width * height` entries
/// ordered `results[i * height + j]` for window offset `(i, j)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceResults {
    pub results: Vec<Colour>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    Register(WorkerLink),
    BulkTrace(WorkOrder),
    Heartbeat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Registered(MasterState),
    Trace(TraceResults),
    HeartbeatAck,
    /// The callee abandoned the request because its deadline expired.
    Cancelled,
    Error(String),
}

/// The envelope around every message: a call id for multiplexing and, on
/// requests, the caller's relative deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame<T> {
    pub id: u64,
    pub deadline_ms: Option<u64>,
    pub body: T,
}
