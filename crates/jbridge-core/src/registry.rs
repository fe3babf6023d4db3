//! Foreign object lifetime manager.
//!
//! Every bound object's handle is registered here exactly once at
//! creation and released exactly once, either explicitly or through the
//! owning wrapper's drop. Release is idempotent: a handle that is
//! already released, never registered, or zero is a no-op, never an
//! error.

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use jbridge_sys::RawHandle;

use crate::abi::JvmAbi;

#[derive(Default)]
pub struct HandleRegistry {
    live: Mutex<FxHashSet<usize>>,
}

impl HandleRegistry {
    pub fn new() -> HandleRegistry {
        HandleRegistry::default()
    }

    /// Track a newly acquired foreign handle. Zero handles are ignored.
    pub fn register(&self, handle: RawHandle) {
        if handle.is_null() {
            return;
        }
        self.live.lock().insert(handle.addr());
    }

    /// Release a handle if it is still live. Double release and release
    /// of an unregistered handle are silent no-ops.
    pub fn release(&self, abi: &dyn JvmAbi, handle: RawHandle) {
        if handle.is_null() {
            return;
        }
        if self.live.lock().remove(&handle.addr()) {
            abi.release(handle);
        }
    }

    /// Drop a handle from tracking without releasing it; used when
    /// ownership moves out of the registry (e.g. exception translation
    /// releases the thrown object itself).
    pub fn forget(&self, handle: RawHandle) {
        if handle.is_null() {
            return;
        }
        self.live.lock().remove(&handle.addr());
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    /// Release everything still registered. Teardown only.
    pub fn release_all(&self, abi: &dyn JvmAbi) {
        let drained: Vec<usize> = self.live.lock().drain().collect();
        for addr in drained {
            abi.release(RawHandle::from_addr(addr));
        }
    }
}
