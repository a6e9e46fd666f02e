use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::builder::Core;

/// Storage cell shared between a builder handle and the registry. An empty
/// cell means the region was reclaimed while the handle was still alive.
pub(crate) type SharedCore = Arc<Mutex<Option<Core>>>;

#[derive(Default)]
struct Registry {
    live: HashMap<u64, SharedCore>,
    next_id: u64,
}

static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();

fn registry() -> MutexGuard<'static, Registry> {
    REGISTRY
        .get_or_init(|| Mutex::new(Registry::default()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn track(core: SharedCore) -> u64 {
    let mut reg = registry();
    let id = reg.next_id;
    reg.next_id += 1;
    reg.live.insert(id, core);
    id
}

pub(crate) fn untrack(id: u64) -> bool {
    registry().live.remove(&id).is_some()
}

/// Reclaims the storage of every builder still tracked, whether or not its
/// handle is reachable, and leaves the registry empty. Calling it on an empty
/// registry is a no-op. Handles that outlive it panic on their next use.
pub fn free_all() {
    // Invariant: storage cells are locked only after the registry lock is
    // released, so a handle sitting inside its own cell cannot block a drain
    // into a deadlock.
    let drained: Vec<SharedCore> = registry().live.drain().map(|(_, core)| core).collect();
    for core in drained {
        core.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

/// Number of builders currently tracked.
pub fn live_count() -> usize {
    registry().live.len()
}
