use decom_core::HostAffinity;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// One mutex per host. Checking whether a host bucket is empty and removing
/// it is not atomic on the cluster side, so reclaim attempts on the same
/// host must not overlap.
#[derive(Debug, Default)]
pub struct HostLocks {
    locks: Mutex<HashMap<HostAffinity, Arc<Mutex<()>>>>,
}

impl HostLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, host: &HostAffinity) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(host.clone()).or_default().clone()
    }

    /// Runs `f` while holding the host's lock.
    pub fn with_host<T>(&self, host: &HostAffinity, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(host);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }
}
