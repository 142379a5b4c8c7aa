//! The wire protocol between the master and its workers.
//!
//! Three RPCs ride on one versioned frame schema: `Register` (worker →
//! master, once per session), `BulkTrace` and `Heartbeat` (master → worker,
//! multiplexed over one connection). Frames are length-prefixed bincode
//! with a version byte; calls carry relative deadlines.

pub mod client;
pub mod codec;
pub mod error;
pub mod messages;

pub use client::{register, RpcClient};
pub use codec::{read_frame, write_frame};
pub use error::ProtocolError;
pub use messages::{
    Colour, Frame, MasterState, Request, Response, TraceResults, WorkOrder, WorkerLink,
    PROTOCOL_VERSION,
};
