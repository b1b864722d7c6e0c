//! Official Account service facade
//!
//! Owns the credential store for one account and exposes the operations callers need:
//! current access token and tickets, JS-SDK page signatures, inbound signature checks and
//! access-token-authorized URLs.

use crate::fetcher::HttpFetcher;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;
use wxmp_credentials::{
    signature, Clock, CredentialKey, CredentialStore, InMemoryCredentialStore, LockRegistry,
    RefreshCoordinator, Result, SystemClock, TicketType, WxMpConfig,
};

const NONCE_LENGTH: usize = 16;

/// Parameters a web page passes to `wx.config`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsapiSignature {
    pub app_id: String,
    pub nonce_str: String,
    pub timestamp: i64,
    pub url: String,
    pub signature: String,
}

/// Client for one Official Account
pub struct WxMpService {
    config: WxMpConfig,
    coordinator: RefreshCoordinator,
}

impl WxMpService {
    /// Create a service with an in-memory store on the system clock
    pub fn new(config: WxMpConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: WxMpConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::with_store(config, Arc::new(InMemoryCredentialStore::new(clock)))
    }

    /// Create a service over an existing store
    ///
    /// A preseeded access token from the configuration is written before this returns.
    pub fn with_store(config: WxMpConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        config.validate()?;

        let locks = Arc::new(LockRegistry::new());
        let fetcher = HttpFetcher::new(&config, store.clone(), locks.clone())?;
        let coordinator = RefreshCoordinator::new(store, locks, Arc::new(fetcher));

        if let Some(token) = &config.access_token {
            info!(
                expires_in_seconds = token.expires_in_seconds,
                "installing preseeded access token"
            );
            coordinator.update(
                CredentialKey::AccessToken,
                token.value.clone(),
                token.expires_in_seconds,
            );
        }

        Ok(Self {
            config,
            coordinator,
        })
    }

    pub fn config(&self) -> &WxMpConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Current credential for any key
    pub async fn obtain(&self, key: CredentialKey, force_refresh: bool) -> Result<String> {
        Ok(self.coordinator.obtain(key, force_refresh).await?)
    }

    pub async fn access_token(&self, force_refresh: bool) -> Result<String> {
        self.obtain(CredentialKey::AccessToken, force_refresh).await
    }

    pub async fn ticket(&self, ticket: TicketType, force_refresh: bool) -> Result<String> {
        self.obtain(CredentialKey::Ticket(ticket), force_refresh).await
    }

    pub async fn jsapi_ticket(&self, force_refresh: bool) -> Result<String> {
        self.ticket(TicketType::Jsapi, force_refresh).await
    }

    pub fn expire_access_token(&self) {
        self.coordinator.expire(CredentialKey::AccessToken);
    }

    pub fn expire_ticket(&self, ticket: TicketType) {
        self.coordinator.expire(CredentialKey::Ticket(ticket));
    }

    /// Sign `url` for the JS-SDK using the current jsapi ticket
    pub async fn create_jsapi_signature(&self, url: &str) -> Result<JsapiSignature> {
        let jsapi_ticket = self.jsapi_ticket(false).await?;
        let timestamp = Utc::now().timestamp();
        let nonce_str = random_nonce();

        let signature = signature::sign_with_ampersand(&[
            format!("jsapi_ticket={jsapi_ticket}"),
            format!("noncestr={nonce_str}"),
            format!("timestamp={timestamp}"),
            format!("url={url}"),
        ]);

        Ok(JsapiSignature {
            app_id: self.config.app_id.clone(),
            nonce_str,
            timestamp,
            url: url.to_string(),
            signature,
        })
    }

    /// Check the signature the platform attaches to callback requests
    pub fn check_signature(&self, timestamp: &str, nonce: &str, signature: &str) -> bool {
        let Some(token) = self.config.token.as_deref() else {
            warn!("signature check requested but no callback token is configured");
            return false;
        };
        signature::verify(signature, &[token, timestamp, nonce])
    }

    /// Append the current access token to `url`
    pub async fn authorized_url(&self, url: &str) -> Result<String> {
        let mut url = Url::parse(url)?;
        let access_token = self.access_token(false).await?;
        url.query_pairs_mut()
            .append_pair("access_token", &access_token);
        Ok(url.into())
    }
}

fn random_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}
