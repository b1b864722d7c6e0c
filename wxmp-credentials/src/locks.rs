//! Per-key refresh locks

use crate::key::CredentialKey;
use tokio::sync::{Mutex, MutexGuard};

/// One mutex per credential key, created up front and never replaced
///
/// Guards are held across the remote fetch, so these are async-aware mutexes.
#[derive(Debug)]
pub struct LockRegistry {
    locks: [Mutex<()>; CredentialKey::COUNT],
}

impl LockRegistry {
    pub fn new() -> Self {
        Self {
            locks: std::array::from_fn(|_| Mutex::new(())),
        }
    }

    pub fn lock_for(&self, key: CredentialKey) -> &Mutex<()> {
        &self.locks[key.index()]
    }

    /// Wait until the refresh lock for `key` is free and take it
    pub async fn acquire(&self, key: CredentialKey) -> MutexGuard<'_, ()> {
        self.lock_for(key).lock().await
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}
