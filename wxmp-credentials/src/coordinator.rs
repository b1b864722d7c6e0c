//! Lazy, stampede-safe credential refresh
//!
//! Every refresh of a key runs under that key's lock. Callers racing past an expired
//! record queue on the same lock; the first one fetches and the rest find a fresh record
//! when their turn comes. Keys never share a lock, so a slow refresh of one credential
//! does not hold up another.

use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::key::CredentialKey;
use crate::locks::LockRegistry;
use crate::store::CredentialStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Hands out current credentials, refreshing them through a [`Fetcher`] when stale
#[derive(Clone)]
pub struct RefreshCoordinator {
    store: Arc<dyn CredentialStore>,
    locks: Arc<LockRegistry>,
    fetcher: Arc<dyn Fetcher>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        locks: Arc<LockRegistry>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            store,
            locks,
            fetcher,
        }
    }

    /// A coordinator over the same store and locks that fetches through `fetcher`
    pub fn with_fetcher(&self, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            store: self.store.clone(),
            locks: self.locks.clone(),
            fetcher,
        }
    }

    /// Return the current value for `key`, fetching a new one if the stored record is
    /// expired or `force_refresh` is set
    ///
    /// A failed fetch leaves the store untouched and is returned as-is; nothing is retried.
    pub async fn obtain(
        &self,
        key: CredentialKey,
        force_refresh: bool,
    ) -> Result<String, FetchError> {
        let guard = self.locks.acquire(key).await;

        if force_refresh {
            debug!(%key, "forcing credential refresh");
            self.store.expire(key);
        }

        let mut refreshed = None;
        if self.store.is_expired(key) {
            let fetched = self.fetcher.fetch(key).await.map_err(|e| {
                warn!(%key, error = %e, "credential refresh failed");
                e
            })?;
            info!(%key, ttl_seconds = fetched.ttl_seconds, "credential refreshed");
            self.store
                .update(key, fetched.value.clone(), fetched.ttl_seconds);
            refreshed = Some(fetched.value);
        } else {
            debug!(%key, "using cached credential");
        }

        drop(guard);

        self.store
            .get(key)
            .or(refreshed)
            .ok_or_else(|| FetchError::MalformedResponse(format!("no value stored for {key}")))
    }

    /// Mark `key` stale so the next [`obtain`](Self::obtain) fetches
    pub fn expire(&self, key: CredentialKey) {
        self.store.expire(key);
    }

    /// Install a value directly, e.g. an operator-supplied token loaded from configuration
    pub fn update(&self, key: CredentialKey, value: String, ttl_seconds: i32) {
        self.store.update(key, value, ttl_seconds);
    }

    pub fn get(&self, key: CredentialKey) -> Option<String> {
        self.store.get(key)
    }

    pub fn is_expired(&self, key: CredentialKey) -> bool {
        self.store.is_expired(key)
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::fetcher::FetchedCredential;
    use crate::key::TicketType;
    use crate::store::InMemoryCredentialStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio_test::{assert_pending, assert_ready};

    const START: i64 = 1_700_000_000_000;

    /// Replays canned responses; the last one repeats forever
    struct ScriptedFetcher {
        responses: Mutex<VecDeque<Result<FetchedCredential, FetchError>>>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<Result<FetchedCredential, FetchError>>) -> Arc<Self> {
            Self::with_delay(responses, Duration::ZERO)
        }

        fn with_delay(
            responses: Vec<Result<FetchedCredential, FetchError>>,
            delay: Duration,
        ) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, _key: CredentialKey) -> Result<FetchedCredential, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.pop_front().unwrap()
            } else {
                responses.front().cloned().unwrap()
            }
        }
    }

    /// Blocks access-token fetches until released; tickets resolve immediately
    struct GatedFetcher {
        entered: Notify,
        release: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for GatedFetcher {
        async fn fetch(&self, key: CredentialKey) -> Result<FetchedCredential, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if key == CredentialKey::AccessToken {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(FetchedCredential::new(format!("{key}-value"), 7200))
        }
    }

    fn coordinator(fetcher: Arc<dyn Fetcher>) -> (Arc<ManualClock>, RefreshCoordinator) {
        let clock = Arc::new(ManualClock::new(START));
        let store = Arc::new(InMemoryCredentialStore::new(clock.clone()));
        let coordinator = RefreshCoordinator::new(store, Arc::new(LockRegistry::new()), fetcher);
        (clock, coordinator)
    }

    #[tokio::test]
    async fn test_fresh_record_skips_fetch() {
        let fetcher = ScriptedFetcher::new(vec![Ok(FetchedCredential::new("remote", 7200))]);
        let (_, coordinator) = coordinator(fetcher.clone());
        coordinator.update(CredentialKey::AccessToken, "seeded".to_string(), 7200);

        let value = coordinator
            .obtain(CredentialKey::AccessToken, false)
            .await
            .unwrap();

        assert_eq!(value, "seeded");
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_force_refresh_always_fetches_once() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(FetchedCredential::new("first", 7200)),
            Ok(FetchedCredential::new("second", 7200)),
        ]);
        let (_, coordinator) = coordinator(fetcher.clone());

        let first = coordinator
            .obtain(CredentialKey::AccessToken, true)
            .await
            .unwrap();
        assert_eq!(first, "first");
        assert_eq!(fetcher.calls(), 1);

        let second = coordinator
            .obtain(CredentialKey::AccessToken, true)
            .await
            .unwrap();
        assert_eq!(second, "second");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_obtain_fetches_once() {
        let fetcher = ScriptedFetcher::with_delay(
            vec![
                Ok(FetchedCredential::new("shared", 7200)),
                Ok(FetchedCredential::new("unexpected", 7200)),
            ],
            Duration::from_millis(50),
        );
        let (_, coordinator) = coordinator(fetcher.clone());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    coordinator
                        .obtain(CredentialKey::Ticket(TicketType::Jsapi), false)
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "shared");
        }
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_same_key_waits_for_in_flight_refresh() {
        let fetcher = Arc::new(GatedFetcher {
            entered: Notify::new(),
            release: Notify::new(),
            calls: AtomicUsize::new(0),
        });
        let (_, coordinator) = coordinator(fetcher.clone());

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.obtain(CredentialKey::AccessToken, false).await })
        };
        fetcher.entered.notified().await;

        let mut second =
            tokio_test::task::spawn(coordinator.obtain(CredentialKey::AccessToken, false));
        assert_pending!(second.poll());

        fetcher.release.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), "access_token-value");

        assert!(second.is_woken());
        let value = assert_ready!(second.poll()).unwrap();
        assert_eq!(value, "access_token-value");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_other_keys_not_blocked_by_in_flight_refresh() {
        let fetcher = Arc::new(GatedFetcher {
            entered: Notify::new(),
            release: Notify::new(),
            calls: AtomicUsize::new(0),
        });
        let (_, coordinator) = coordinator(fetcher.clone());

        let slow = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.obtain(CredentialKey::AccessToken, false).await })
        };
        fetcher.entered.notified().await;

        for ticket in TicketType::ALL {
            let key = CredentialKey::Ticket(ticket);
            let value = tokio::time::timeout(Duration::from_secs(1), coordinator.obtain(key, false))
                .await
                .expect("ticket refresh blocked by access token refresh")
                .unwrap();
            assert_eq!(value, format!("{key}-value"));
        }

        fetcher.release.notify_one();
        slow.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_failure_leaves_previous_value() {
        let fetcher = ScriptedFetcher::new(vec![Err(FetchError::RemoteRejected {
            code: 40013,
            message: "invalid appid".to_string(),
        })]);
        let (_, coordinator) = coordinator(fetcher.clone());
        coordinator.update(CredentialKey::AccessToken, "old".to_string(), 100);

        let err = coordinator
            .obtain(CredentialKey::AccessToken, false)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::RemoteRejected { code: 40013, .. }));
        assert_eq!(coordinator.get(CredentialKey::AccessToken).as_deref(), Some("old"));
        assert!(coordinator.is_expired(CredentialKey::AccessToken));
    }

    #[tokio::test]
    async fn test_failed_forced_refresh_is_an_error() {
        let fetcher = ScriptedFetcher::new(vec![Err(FetchError::Network("timed out".to_string()))]);
        let (_, coordinator) = coordinator(fetcher.clone());
        coordinator.update(CredentialKey::AccessToken, "still-valid".to_string(), 7200);

        let result = coordinator.obtain(CredentialKey::AccessToken, true).await;

        assert_eq!(result, Err(FetchError::Network("timed out".to_string())));
        assert_eq!(
            coordinator.get(CredentialKey::AccessToken).as_deref(),
            Some("still-valid")
        );
        assert!(coordinator.is_expired(CredentialKey::AccessToken));
    }

    #[tokio::test]
    async fn test_failure_on_empty_store_stays_absent() {
        let fetcher = ScriptedFetcher::new(vec![Err(FetchError::MalformedResponse(
            "missing ticket".to_string(),
        ))]);
        let (_, coordinator) = coordinator(fetcher.clone());
        let key = CredentialKey::Ticket(TicketType::WxCard);

        assert!(coordinator.obtain(key, false).await.is_err());
        assert_eq!(coordinator.get(key), None);
        assert!(coordinator.is_expired(key));
    }

    #[tokio::test]
    async fn test_expiry_drives_second_fetch() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(FetchedCredential::new("tok123", 300)),
            Ok(FetchedCredential::new("tok456", 300)),
        ]);
        let (clock, coordinator) = coordinator(fetcher.clone());
        let key = CredentialKey::AccessToken;

        assert_eq!(coordinator.obtain(key, false).await.unwrap(), "tok123");
        assert!(!coordinator.is_expired(key));
        assert_eq!(
            coordinator.store().record(key).unwrap().expires_at_epoch_millis,
            START + 100_000
        );

        clock.advance(Duration::from_secs(99));
        assert_eq!(coordinator.obtain(key, false).await.unwrap(), "tok123");
        assert_eq!(fetcher.calls(), 1);

        clock.advance(Duration::from_secs(2));
        assert!(coordinator.is_expired(key));
        assert_eq!(coordinator.obtain(key, false).await.unwrap(), "tok456");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_short_ttl_refetches_every_time() {
        let fetcher = ScriptedFetcher::new(vec![Ok(FetchedCredential::new("brief", 60))]);
        let (_, coordinator) = coordinator(fetcher.clone());

        coordinator
            .obtain(CredentialKey::AccessToken, false)
            .await
            .unwrap();
        coordinator
            .obtain(CredentialKey::AccessToken, false)
            .await
            .unwrap();

        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_with_fetcher_shares_store() {
        let first = ScriptedFetcher::new(vec![Ok(FetchedCredential::new("a", 7200))]);
        let second = ScriptedFetcher::new(vec![Ok(FetchedCredential::new("b", 7200))]);
        let (_, coordinator) = coordinator(first.clone());
        let other = coordinator.with_fetcher(second.clone());

        coordinator
            .obtain(CredentialKey::AccessToken, false)
            .await
            .unwrap();
        let value = other.obtain(CredentialKey::AccessToken, false).await.unwrap();

        assert_eq!(value, "a");
        assert_eq!(second.calls(), 0);
    }
}
