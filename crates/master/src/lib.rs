//! Master-side dispatch: the load-keyed worker pool, the screen
//! partitioner, the per-frame coordinator, and the registration server.

pub mod coordinator;
pub mod partition;
pub mod pool;
pub mod registrar;

use scene::Environment;
use std::sync::RwLock;

/// The whole distributed system as the master sees it.
///
/// The scene pair is guarded by one read/write lock: input handling takes
/// the write side for camera mutation and diff encoding, registration takes
/// the read side while encoding the immutable state.
pub struct System {
    pub scene: RwLock<Environment>,
    pub workers: pool::Pool,
}

impl System {
    pub fn new(scene: Environment) -> Self {
        Self {
            scene: RwLock::new(scene),
            workers: pool::Pool::new(),
        }
    }
}
