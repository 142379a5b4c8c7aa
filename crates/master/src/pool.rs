use protocol::{ProtocolError, RpcClient, TraceResults, WorkOrder};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{oneshot, Notify};
use tracing::warn;

/// How often each worker is sent a heartbeat.
pub const HEARTBEAT_PERIOD: Duration = Duration::from_millis(500);

/// How long a heartbeat may take before its worker is assumed dead.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("no workers available for assignment")]
    NoWorkers,

    #[error(transparent)]
    Rpc(#[from] ProtocolError),
}

/// One pooled worker. The task counter, heap index, and closing flag are
/// only ever mutated under the pool's exclusive lock; they are atomics so
/// entries can be shared with in-flight assignment tasks through an `Arc`.
struct WorkerEntry {
    address: String,
    client: RpcClient,
    tasks: AtomicU32,
    index: AtomicUsize,
    closing: AtomicBool,
    stop_heartbeats: Notify,
}

impl WorkerEntry {
    fn tasks(&self) -> u32 {
        self.tasks.load(Ordering::Relaxed)
    }
}

struct PoolInner {
    /// Min-heap on outstanding task count; `heap[0]` is least loaded.
    heap: Vec<Arc<WorkerEntry>>,
    addresses: HashMap<String, Arc<WorkerEntry>>,
}

/// A thread-safe worker pool keyed on load.
///
/// Every mutation goes through one exclusive lock with bounded hold times;
/// `size` takes the shared side. Heartbeat tasks never hold the lock across
/// an RPC: they issue the call, then reacquire to post-process.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<RwLock<PoolInner>>,
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

impl Pool {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(PoolInner {
                heap: Vec::new(),
                addresses: HashMap::new(),
            })),
        }
    }

    /// The number of workers currently pooled.
    pub fn size(&self) -> usize {
        self.inner.read().expect("pool lock poisoned").heap.len()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.inner
            .read()
            .expect("pool lock poisoned")
            .addresses
            .contains_key(address)
    }

    /// Connects to a new worker and admits it with zero load. Adding an
    /// address that is already pooled is a no-op.
    pub async fn add(&self, address: &str) -> Result<(), PoolError> {
        if self.contains(address) {
            return Ok(());
        }

        let client = RpcClient::connect(address).await?;

        let entry = {
            let mut inner = self.inner.write().expect("pool lock poisoned");
            if inner.addresses.contains_key(address) {
                // Lost a registration race while connecting.
                client.close();
                return Ok(());
            }

            let entry = Arc::new(WorkerEntry {
                address: address.to_string(),
                client,
                tasks: AtomicU32::new(0),
                index: AtomicUsize::new(inner.heap.len()),
                closing: AtomicBool::new(false),
                stop_heartbeats: Notify::new(),
            });
            inner.addresses.insert(address.to_string(), Arc::clone(&entry));
            inner.heap.push(Arc::clone(&entry));
            inner.bubble_up(&entry);
            entry
        };

        tokio::spawn(heartbeat_loop(self.clone(), entry));
        Ok(())
    }

    /// Removes a worker by address, stopping its heartbeats. Its connection
    /// closes now if it is idle, otherwise when its last result returns.
    pub fn remove(&self, address: &str) {
        let mut inner = self.inner.write().expect("pool lock poisoned");
        if let Some(entry) = inner.addresses.get(address).map(Arc::clone) {
            entry.stop_heartbeats.notify_one();
            inner.remove_entry(address, &entry);
        }
    }

    /// Hands `order` to the least-loaded worker and returns a one-shot
    /// channel that yields the results on success and closes on failure or
    /// timeout. The worker's load is restored when the call finishes either
    /// way.
    pub fn assign(
        &self,
        order: WorkOrder,
        timeout: Duration,
    ) -> Result<oneshot::Receiver<TraceResults>, PoolError> {
        let assignee = {
            let mut inner = self.inner.write().expect("pool lock poisoned");
            let Some(assignee) = inner.heap.first().map(Arc::clone) else {
                return Err(PoolError::NoWorkers);
            };
            assignee.tasks.fetch_add(1, Ordering::Relaxed);
            inner.bubble_down(&assignee);
            assignee
        };

        let (tx, rx) = oneshot::channel();
        let pool = self.clone();
        tokio::spawn(async move {
            match assignee.client.bulk_trace(order, timeout).await {
                Ok(results) => {
                    let _ = tx.send(results);
                }
                Err(e) => {
                    warn!(worker = %assignee.address, "trace failed: {e}");
                    drop(tx);
                }
            }

            let mut inner = pool.inner.write().expect("pool lock poisoned");
            assignee.tasks.fetch_sub(1, Ordering::Relaxed);
            if inner.in_heap(&assignee) {
                inner.bubble_up(&assignee);
            }
            if assignee.closing.load(Ordering::Acquire) && assignee.tasks() == 0 {
                assignee.client.close();
            }
        });

        Ok(rx)
    }

    /// Closes every worker connection.
    pub fn destroy(&self) {
        let mut inner = self.inner.write().expect("pool lock poisoned");
        let entries: Vec<(String, Arc<WorkerEntry>)> = inner
            .addresses
            .iter()
            .map(|(a, w)| (a.clone(), Arc::clone(w)))
            .collect();
        for (address, entry) in entries {
            entry.stop_heartbeats.notify_one();
            inner.remove_entry(&address, &entry);
        }
    }

    #[cfg(test)]
    fn load_snapshot(&self) -> Vec<u32> {
        self.inner
            .read()
            .expect("pool lock poisoned")
            .heap
            .iter()
            .map(|w| w.tasks())
            .collect()
    }
}

impl PoolInner {
    fn swap(&mut self, i: usize, j: usize) {
        if i < self.heap.len() && j < self.heap.len() && i != j {
            self.heap.swap(i, j);
            self.heap[i].index.store(i, Ordering::Relaxed);
            self.heap[j].index.store(j, Ordering::Relaxed);
        }
    }

    fn in_heap(&self, entry: &Arc<WorkerEntry>) -> bool {
        let i = entry.index.load(Ordering::Relaxed);
        i < self.heap.len() && Arc::ptr_eq(&self.heap[i], entry)
    }

    /// Pushes a worker up while it has fewer tasks than its parent.
    fn bubble_up(&mut self, entry: &Arc<WorkerEntry>) {
        if !self.in_heap(entry) {
            return;
        }
        let mut i = entry.index.load(Ordering::Relaxed);
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.heap[i].tasks() < self.heap[parent].tasks() {
                self.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    /// Pushes a worker down while it has more tasks than its lighter child.
    fn bubble_down(&mut self, entry: &Arc<WorkerEntry>) {
        if !self.in_heap(entry) {
            return;
        }
        let mut i = entry.index.load(Ordering::Relaxed);
        loop {
            let left = 2 * i + 1;
            if left >= self.heap.len() {
                break;
            }
            let right = left + 1;
            let child = if right < self.heap.len()
                && self.heap[right].tasks() < self.heap[left].tasks()
            {
                right
            } else {
                left
            };
            if self.heap[i].tasks() > self.heap[child].tasks() {
                self.swap(i, child);
                i = child;
            } else {
                break;
            }
        }
    }

    /// Unlinks a worker from the heap and address map. Assumes the caller
    /// holds the write lock and that `address` refers to `entry`.
    fn remove_entry(&mut self, address: &str, entry: &Arc<WorkerEntry>) {
        self.addresses.remove(address);

        let idx = entry.index.load(Ordering::Relaxed);
        self.swap(idx, self.heap.len() - 1);
        self.heap.pop();

        if idx < self.heap.len() {
            let moved = Arc::clone(&self.heap[idx]);
            self.bubble_up(&moved);
            self.bubble_down(&moved);
        }

        entry.closing.store(true, Ordering::Release);
        if entry.tasks() == 0 {
            entry.client.close();
        }
    }
}

/// Periodically pings one worker, evicting it from the pool on the first
/// failed or timed-out heartbeat. The pool lock is never held across the
/// RPC itself.
async fn heartbeat_loop(pool: Pool, entry: Arc<WorkerEntry>) {
    loop {
        tokio::select! {
            _ = entry.stop_heartbeats.notified() => return,
            _ = tokio::time::sleep(HEARTBEAT_PERIOD) => {}
        }

        if let Err(e) = entry.client.heartbeat(HEARTBEAT_TIMEOUT).await {
            warn!(worker = %entry.address, "heartbeat failed: {e}");

            let mut inner = pool.inner.write().expect("pool lock poisoned");
            let address = inner
                .addresses
                .iter()
                .find(|(_, w)| Arc::ptr_eq(w, &entry))
                .map(|(a, _)| a.clone());
            if let Some(address) = address {
                inner.remove_entry(&address, &entry);
            }
            return;
        }
    }
}
