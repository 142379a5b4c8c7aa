use crate::service::TraceService;
use crate::IDLE_TIMEOUT;
use protocol::{read_frame, write_frame, Frame, ProtocolError, Request, Response};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Serves `BulkTrace` and `Heartbeat` until no request arrives within the
/// idle window, then stops gracefully: new connections are refused while
/// in-flight calls drain.
///
/// Returns `Ok(())` on idle shutdown so the caller can loop back into
/// registration.
pub async fn serve(service: Arc<TraceService>, listener: TcpListener) -> Result<(), ProtocolError> {
    let (idle_tx, mut idle_rx) = mpsc::channel::<()>(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "master connected");
                        tokio::spawn(handle_connection(
                            Arc::clone(&service),
                            stream,
                            idle_tx.clone(),
                            shutdown_rx.clone(),
                        ));
                    }
                    Err(e) => {
                        warn!("accept failed: {e}");
                        let _ = shutdown_tx.send(true);
                        return Err(e.into());
                    }
                }
            }
            _ = idle_rx.recv() => {
                // A request arrived somewhere; the idle window restarts.
            }
            _ = tokio::time::sleep(IDLE_TIMEOUT) => {
                info!("no orders or heartbeats within the idle window, stopping");
                let _ = shutdown_tx.send(true);
                return Ok(());
            }
        }
    }
}

/// One master connection: requests are read in order but answered
/// concurrently, so a long trace never starves heartbeats.
async fn handle_connection(
    service: Arc<TraceService>,
    stream: TcpStream,
    idle: mpsc::Sender<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    let _ = stream.set_nodelay(true);
    let (mut read, mut write) = stream.into_split();

    let (resp_tx, mut resp_rx) = mpsc::channel::<Frame<Response>>(16);
    let writer = tokio::spawn(async move {
        while let Some(frame) = resp_rx.recv().await {
            if let Err(e) = write_frame(&mut write, &frame).await {
                debug!("response write failed: {e}");
                break;
            }
        }
    });

    let mut calls = JoinSet::new();
    loop {
        tokio::select! {
            frame = read_frame::<Frame<Request>, _>(&mut read) => {
                match frame {
                    Ok(frame) => {
                        let _ = idle.try_send(());
                        calls.spawn(handle_request(
                            Arc::clone(&service),
                            frame,
                            resp_tx.clone(),
                        ));
                    }
                    Err(e) => {
                        debug!("connection closed: {e}");
                        break;
                    }
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    // Let in-flight calls finish and flush before the connection drops.
    drop(resp_tx);
    while calls.join_next().await.is_some() {}
    let _ = writer.await;
}

async fn handle_request(
    service: Arc<TraceService>,
    frame: Frame<Request>,
    responses: mpsc::Sender<Frame<Response>>,
) {
    let deadline = frame
        .deadline_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));

    let body = match frame.body {
        Request::Heartbeat => Response::HeartbeatAck,
        Request::BulkTrace(order) => {
            let service = Arc::clone(&service);
            match tokio::task::spawn_blocking(move || service.bulk_trace(&order, deadline)).await {
                Ok(Ok(results)) => Response::Trace(results),
                Ok(Err(ProtocolError::Cancelled)) => Response::Cancelled,
                Ok(Err(e)) => Response::Error(e.to_string()),
                Err(e) => Response::Error(format!("trace task failed: {e}")),
            }
        }
        Request::Register(_) => Response::Error("workers do not serve registrations".into()),
    };

    let _ = responses
        .send(Frame {
            id: frame.id,
            deadline_ms: None,
            body,
        })
        .await;
}
