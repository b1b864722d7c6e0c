//! Credential storage
//!
//! A store keeps one [`CredentialRecord`] per [`CredentialKey`]. Expiry is decided at
//! write time: the platform-declared TTL is shortened by [`EXPIRY_MARGIN_SECONDS`] so the
//! local copy goes stale before the remote one does. Records are replaced whole and never
//! removed; forcing expiry keeps the old value readable until the next refresh lands.

use crate::clock::Clock;
use crate::key::CredentialKey;
use parking_lot::RwLock;
use std::sync::Arc;

/// Seconds subtracted from every remote TTL at write time
pub const EXPIRY_MARGIN_SECONDS: i64 = 200;

/// Expiry timestamp written by [`CredentialStore::expire`]
const FORCED_EXPIRY_MILLIS: i64 = 0;

/// A stored credential value and the instant it stops being trusted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub value: String,
    pub expires_at_epoch_millis: i64,
}

impl CredentialRecord {
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        self.expires_at_epoch_millis <= now_millis
    }
}

/// Storage capability shared by every consumer of the credential manager
///
/// Implementations must publish records atomically: a reader sees either the old record
/// or the new one, never a mix. None of these operations fail.
pub trait CredentialStore: Send + Sync {
    /// Last written value, fresh or not
    fn get(&self, key: CredentialKey) -> Option<String>;

    /// Full record for inspection
    fn record(&self, key: CredentialKey) -> Option<CredentialRecord>;

    /// True when no record exists or its expiry has passed
    fn is_expired(&self, key: CredentialKey) -> bool;

    /// Make the record look expired without touching its value
    fn expire(&self, key: CredentialKey);

    /// Replace the record, expiring `ttl_seconds - EXPIRY_MARGIN_SECONDS` from now
    ///
    /// A TTL shorter than the margin produces a record that is already expired.
    fn update(&self, key: CredentialKey, value: String, ttl_seconds: i32);
}

/// Process-local store with one slot per key
#[derive(Debug)]
pub struct InMemoryCredentialStore {
    slots: [RwLock<Option<CredentialRecord>>; CredentialKey::COUNT],
    clock: Arc<dyn Clock>,
}

impl InMemoryCredentialStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: std::array::from_fn(|_| RwLock::new(None)),
            clock,
        }
    }

    fn slot(&self, key: CredentialKey) -> &RwLock<Option<CredentialRecord>> {
        &self.slots[key.index()]
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn get(&self, key: CredentialKey) -> Option<String> {
        self.slot(key)
            .read()
            .as_ref()
            .map(|record| record.value.clone())
    }

    fn record(&self, key: CredentialKey) -> Option<CredentialRecord> {
        self.slot(key).read().clone()
    }

    fn is_expired(&self, key: CredentialKey) -> bool {
        let now = self.clock.now_millis();
        match self.slot(key).read().as_ref() {
            Some(record) => record.is_expired_at(now),
            None => true,
        }
    }

    fn expire(&self, key: CredentialKey) {
        if let Some(record) = self.slot(key).write().as_mut() {
            record.expires_at_epoch_millis = FORCED_EXPIRY_MILLIS;
        }
    }

    fn update(&self, key: CredentialKey, value: String, ttl_seconds: i32) {
        let lifetime_millis = (i64::from(ttl_seconds) - EXPIRY_MARGIN_SECONDS).saturating_mul(1000);
        let record = CredentialRecord {
            value,
            expires_at_epoch_millis: self.clock.now_millis().saturating_add(lifetime_millis),
        };
        *self.slot(key).write() = Some(record);
    }
}
