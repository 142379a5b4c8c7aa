use crate::codec::{read_frame, write_frame};
use crate::error::ProtocolError;
use crate::messages::{Frame, MasterState, Request, Response, TraceResults, WorkOrder, WorkerLink};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

/// A multiplexed RPC channel to one worker.
///
/// Concurrent calls interleave on a single TCP connection: each request
/// frame carries a call id, and a background reader routes response frames
/// back to their callers. Cloning the client shares the connection.
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    writer: Mutex<tokio::net::tcp::OwnedWriteHalf>,
    pending: Arc<DashMap<u64, oneshot::Sender<Response>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    reader: JoinHandle<()>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl RpcClient {
    pub async fn connect(addr: &str) -> Result<Self, ProtocolError> {
        let stream = TcpStream::connect(addr).await?;
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();

        let pending: Arc<DashMap<u64, oneshot::Sender<Response>>> = Arc::new(DashMap::new());
        let reader = tokio::spawn(read_loop(read_half, Arc::clone(&pending)));

        Ok(Self {
            inner: Arc::new(ClientInner {
                writer: Mutex::new(write_half),
                pending,
                next_id: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                reader,
            }),
        })
    }

    /// Issues one call and awaits its reply under `deadline`. A timed-out
    /// call abandons its pending slot; a reply arriving later is dropped by
    /// the reader.
    pub async fn call(&self, body: Request, deadline: Duration) -> Result<Response, ProtocolError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(ProtocolError::Closed);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(id, tx);

        let frame = Frame {
            id,
            deadline_ms: Some(deadline.as_millis() as u64),
            body,
        };
        let write_result = {
            let mut writer = self.inner.writer.lock().await;
            write_frame(&mut *writer, &frame).await
        };
        if let Err(e) = write_result {
            self.inner.pending.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(deadline, rx).await {
            Err(_) => {
                self.inner.pending.remove(&id);
                Err(ProtocolError::Timeout)
            }
            Ok(Err(_)) => Err(ProtocolError::Closed),
            Ok(Ok(Response::Cancelled)) => Err(ProtocolError::Cancelled),
            Ok(Ok(Response::Error(msg))) => Err(ProtocolError::Remote(msg)),
            Ok(Ok(response)) => Ok(response),
        }
    }

    pub async fn heartbeat(&self, deadline: Duration) -> Result<(), ProtocolError> {
        match self.call(Request::Heartbeat, deadline).await? {
            Response::HeartbeatAck => Ok(()),
            other => Err(ProtocolError::Decode(format!(
                "unexpected heartbeat reply: {other:?}"
            ))),
        }
    }

    pub async fn bulk_trace(
        &self,
        order: WorkOrder,
        deadline: Duration,
    ) -> Result<TraceResults, ProtocolError> {
        let expected = order.width as usize * order.height as usize;
        match self.call(Request::BulkTrace(order), deadline).await? {
            Response::Trace(results) if results.results.len() == expected => Ok(results),
            Response::Trace(results) => Err(ProtocolError::Decode(format!(
                "expected {expected} colours, worker returned {}",
                results.results.len()
            ))),
            other => Err(ProtocolError::Decode(format!(
                "unexpected trace reply: {other:?}"
            ))),
        }
    }

    /// Tears the channel down: the reader stops and every caller still
    /// waiting observes [`ProtocolError::Closed`].
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.reader.abort();
        self.inner.pending.clear();
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    pending: Arc<DashMap<u64, oneshot::Sender<Response>>>,
) {
    loop {
        match read_frame::<Frame<Response>, _>(&mut reader).await {
            Ok(frame) => match pending.remove(&frame.id) {
                Some((_, tx)) => {
                    let _ = tx.send(frame.body);
                }
                None => debug!(id = frame.id, "dropping reply with no waiter"),
            },
            Err(e) => {
                debug!("rpc reader stopped: {e}");
                break;
            }
        }
    }
    // Wake every caller still waiting on this connection.
    pending.clear();
}

/// One-shot registration with the master over a fresh connection.
pub async fn register(
    master_addr: &str,
    link: WorkerLink,
    deadline: Duration,
) -> Result<MasterState, ProtocolError> {
    tokio::time::timeout(deadline, async {
        let mut stream = TcpStream::connect(master_addr).await?;
        write_frame(
            &mut stream,
            &Frame {
                id: 0,
                deadline_ms: Some(deadline.as_millis() as u64),
                body: Request::Register(link),
            },
        )
        .await?;

        let reply: Frame<Response> = read_frame(&mut stream).await?;
        match reply.body {
            Response::Registered(state) => Ok(state),
            Response::Error(msg) => Err(ProtocolError::Remote(msg)),
            other => Err(ProtocolError::Decode(format!(
                "unexpected registration reply: {other:?}"
            ))),
        }
    })
    .await
    .map_err(|_| ProtocolError::Timeout)?
}
