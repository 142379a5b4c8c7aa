use thiserror::Error;

/// Errors raised by the RPC layer.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("unsupported protocol version {0}")]
    Version(u8),

    #[error("frame of {0} bytes exceeds the protocol limit")]
    Oversized(u32),

    #[error("call timed out")]
    Timeout,

    #[error("call cancelled by deadline")]
    Cancelled,

    #[error("connection closed")]
    Closed,

    #[error("remote error: {0}")]
    Remote(String),
}
