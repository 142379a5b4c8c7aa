use crate::partition::{partition, Region, SplitAxis, REDUNDANCY};
use crate::pool::{Pool, PoolError};
use futures::future::select_all;
use protocol::{TraceResults, WorkOrder};
use screen::{Surface, Tile};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Default deadline for one `BulkTrace` call; the CLI may override it.
pub const TRACE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Coordinates one frame: partition the screen, assign every partition to
/// `REDUNDANCY` workers, collect the first successful reply per partition,
/// then composite onto the surface.
///
/// `input` and `output` chain successive coordinators: the token received
/// on `input` is the permission to paint, and passing it on `output` hands
/// the surface to the next frame. Frames therefore composite strictly in
/// submission order no matter how their trace work interleaves. A frame
/// that cannot complete passes the token through untouched.
pub async fn run_frame(
    pool: Pool,
    surface: Arc<Surface>,
    diff: Vec<u8>,
    frame: u64,
    trace_timeout: Duration,
    input: oneshot::Receiver<()>,
    output: oneshot::Sender<()>,
) {
    // The pool may grow or shrink while we assign; this count is only the
    // partitioning heuristic.
    let workers = pool.size() as u32;
    if workers == 0 {
        return skip(frame, "no workers in pool", input, output).await;
    }

    let area = Region {
        x: 0,
        y: 0,
        width: surface.width(),
        height: surface.height(),
    };
    let (regions, _) = partition(area, workers, SplitAxis::Horizontal);

    let mut assignments: Vec<(Region, Vec<oneshot::Receiver<TraceResults>>)> =
        Vec::with_capacity(regions.len());
    for region in regions {
        let mut receivers = Vec::with_capacity(REDUNDANCY as usize);
        for _ in 0..REDUNDANCY {
            let order = WorkOrder {
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
                diff: diff.clone(),
            };
            match pool.assign(order, trace_timeout) {
                Ok(rx) => receivers.push(rx),
                Err(PoolError::NoWorkers) => break,
                Err(e) => {
                    warn!(frame, "assignment failed: {e}");
                    break;
                }
            }
        }
        if receivers.is_empty() {
            return skip(frame, "a partition could not be assigned", input, output).await;
        }
        assignments.push((region, receivers));
    }

    // Per partition, the first successful reply wins; later redundant
    // replies are discarded by their result channels going unread.
    let collected = futures::future::join_all(
        assignments
            .into_iter()
            .map(|(region, receivers)| async move {
                let mut pending = receivers;
                while !pending.is_empty() {
                    let (result, _, rest) = select_all(pending).await;
                    match result {
                        Ok(results) => return Some((region, results)),
                        Err(_) => pending = rest,
                    }
                }
                None
            }),
    )
    .await;

    let mut tiles = Vec::with_capacity(collected.len());
    for item in collected {
        match item {
            Some((region, results)) => tiles.push(Tile {
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
                results,
            }),
            None => {
                return skip(frame, "a partition returned no result", input, output).await;
            }
        }
    }

    let _ = input.await;
    surface.paint_frame(&tiles);
    let _ = output.send(());
}

/// Waits for the paint token, logs the skip, and passes the token on.
async fn skip(frame: u64, reason: &str, input: oneshot::Receiver<()>, output: oneshot::Sender<()>) {
    let _ = input.await;
    info!(frame, "frame skipped: {reason}");
    let _ = output.send(());
}
