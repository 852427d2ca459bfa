//! Worker registry
//!
//! Process-wide map from worker identity to the host callback pair. The
//! reserved `$send`/`$sendSync` bindings run inside a worker's context and
//! have no direct reference to the owning `Worker`, so they route through
//! this table to find the host.
//!
//! Lookups clone the `Arc` holding the pair, so a concurrent `unregister`
//! can never free callbacks an in-flight script call still holds.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Host callback for script-initiated async messages (`$send`).
pub type RecvCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Host callback for script-initiated sync messages (`$sendSync`). The
/// returned string becomes the binding's return value inside the script.
pub type RecvSyncCallback = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// The host-side callback pair registered for one worker.
pub struct Callbacks {
    pub recv: RecvCallback,
    pub recv_sync: RecvSyncCallback,
}

lazy_static::lazy_static! {
    static ref CALLBACKS: RwLock<HashMap<u64, Arc<Callbacks>>> = RwLock::new(HashMap::new());
}

/// Register the callback pair for a worker identity. Called during worker
/// construction, before the worker's context can execute any script.
pub(crate) fn register(worker_id: u64, callbacks: Callbacks) {
    CALLBACKS.write().insert(worker_id, Arc::new(callbacks));
}

/// Look up the callback pair for a worker identity.
pub(crate) fn lookup(worker_id: u64) -> Option<Arc<Callbacks>> {
    CALLBACKS.read().get(&worker_id).cloned()
}

/// Remove a worker's entry. Idempotent; once this returns, no new lookup
/// can observe the entry.
pub(crate) fn unregister(worker_id: u64) {
    CALLBACKS.write().remove(&worker_id);
}
