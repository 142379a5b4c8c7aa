use crate::error::ProtocolError;
use crate::messages::PROTOCOL_VERSION;
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame. A full-screen trace result for a very
/// large surface stays well under this; anything bigger is a corrupt
/// length prefix.
const MAX_FRAME_BYTES: u32 = 256 * 1024 * 1024;

/// Writes one length-prefixed, versioned bincode frame.
pub async fn write_frame<T, W>(writer: &mut W, message: &T) -> Result<(), ProtocolError>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let data = bincode::serialize(message).map_err(|e| ProtocolError::Encode(e.to_string()))?;
    let len = u32::try_from(data.len()).map_err(|_| ProtocolError::Oversized(u32::MAX))?;
    if len > MAX_FRAME_BYTES {
        return Err(ProtocolError::Oversized(len));
    }

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&[PROTOCOL_VERSION]).await?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame, rejecting version mismatches and oversized payloads.
pub async fn read_frame<T, R>(reader: &mut R) -> Result<T, ProtocolError>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(ProtocolError::Oversized(len));
    }

    let mut version = [0u8; 1];
    reader.read_exact(&mut version).await?;
    if version[0] != PROTOCOL_VERSION {
        return Err(ProtocolError::Version(version[0]));
    }

    let mut data = vec![0u8; len as usize];
    reader.read_exact(&mut data).await?;
    bincode::deserialize(&data).map_err(|e| ProtocolError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Colour, Frame, Request, Response, TraceResults, WorkOrder};

    #[tokio::test]
    async fn frames_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(64 * 1024);

        let sent = Frame {
            id: 7,
            deadline_ms: Some(1000),
            body: Request::BulkTrace(WorkOrder {
                x: 1,
                y: 2,
                width: 3,
                height: 4,
                diff: vec![1, 2, 3],
            }),
        };
        write_frame(&mut a, &sent).await.unwrap();

        let got: Frame<Request> = read_frame(&mut b).await.unwrap();
        assert_eq!(got.id, 7);
        assert_eq!(got.deadline_ms, Some(1000));
        match got.body {
            Request::BulkTrace(order) => {
                assert_eq!((order.x, order.y, order.width, order.height), (1, 2, 3, 4));
                assert_eq!(order.diff, vec![1, 2, 3]);
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[tokio::test]
    async fn multiple_frames_stay_delimited() {
        let (mut a, mut b) = tokio::io::duplex(64 * 1024);

        for id in 0..3u64 {
            let frame = Frame {
                id,
                deadline_ms: None,
                body: Response::Trace(TraceResults {
                    results: vec![Colour { r: id as u32, g: 0, b: 0 }; 4],
                }),
            };
            write_frame(&mut a, &frame).await.unwrap();
        }

        for id in 0..3u64 {
            let got: Frame<Response> = read_frame(&mut b).await.unwrap();
            assert_eq!(got.id, id);
        }
    }

    #[tokio::test]
    async fn version_mismatch_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(1024);

        // A well-formed frame with a wrong version byte.
        let payload = bincode::serialize(&Frame {
            id: 0u64,
            deadline_ms: None::<u64>,
            body: Request::Heartbeat,
        })
        .unwrap();
        a.write_all(&(payload.len() as u32).to_be_bytes()).await.unwrap();
        a.write_all(&[PROTOCOL_VERSION + 1]).await.unwrap();
        a.write_all(&payload).await.unwrap();

        let err = read_frame::<Frame<Request>, _>(&mut b).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Version(v) if v == PROTOCOL_VERSION + 1));
    }

    #[tokio::test]
    async fn corrupt_length_prefix_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        a.write_all(&u32::MAX.to_be_bytes()).await.unwrap();

        let err = read_frame::<Frame<Request>, _>(&mut b).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Oversized(_)));
    }
}
