//! HTTP fetcher for the platform's token and ticket endpoints

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use wxmp_credentials::{
    CredentialKey, CredentialStore, FetchError, FetchedCredential, Fetcher, LockRegistry,
    RefreshCoordinator, Result, TicketType, WxError, WxMpConfig,
};

/// Error codes meaning the access token we sent is no longer accepted
const INVALID_ACCESS_TOKEN_CODES: [i64; 3] = [40001, 40014, 42001];

/// Raw calls against the platform API
#[derive(Debug, Clone)]
pub(crate) struct PlatformApi {
    client: Client,
    api_host: String,
    app_id: String,
    secret: String,
}

/// Body shared by the token and ticket endpoints
#[derive(Debug, Deserialize)]
struct PlatformResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
    access_token: Option<String>,
    ticket: Option<String>,
    expires_in: Option<i32>,
}

impl PlatformResponse {
    fn into_credential(
        self,
        field: &str,
        pick: impl FnOnce(Self) -> Option<String>,
    ) -> std::result::Result<FetchedCredential, FetchError> {
        if self.errcode != 0 {
            return Err(FetchError::RemoteRejected {
                code: self.errcode,
                message: self.errmsg,
            });
        }
        let expires_in = self
            .expires_in
            .ok_or_else(|| FetchError::MalformedResponse("missing expires_in".to_string()))?;
        let value = pick(self)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| FetchError::MalformedResponse(format!("missing {field}")))?;

        Ok(FetchedCredential::new(value, expires_in))
    }
}

impl PlatformApi {
    pub(crate) fn new(config: &WxMpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_seconds))
            .build()
            .map_err(|e| WxError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_host: config.host.api_host.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            secret: config.secret.clone(),
        })
    }

    async fn fetch_access_token(&self) -> std::result::Result<FetchedCredential, FetchError> {
        let url = format!("{}/cgi-bin/token", self.api_host);
        let response: PlatformResponse = self
            .get_json(
                &url,
                &[
                    ("grant_type", "client_credential"),
                    ("appid", self.app_id.as_str()),
                    ("secret", self.secret.as_str()),
                ],
            )
            .await?;

        response.into_credential("access_token", |r| r.access_token)
    }

    async fn fetch_ticket(
        &self,
        ticket: TicketType,
        access_token: &str,
    ) -> std::result::Result<FetchedCredential, FetchError> {
        let url = format!("{}/cgi-bin/ticket/getticket", self.api_host);
        let response: PlatformResponse = self
            .get_json(&url, &[("type", ticket.code()), ("access_token", access_token)])
            .await?;

        response.into_credential("ticket", |r| r.ticket)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> std::result::Result<T, FetchError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| FetchError::Network(e.without_url().to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.without_url().to_string()))?;

        serde_json::from_str(&body).map_err(|e| FetchError::MalformedResponse(e.to_string()))
    }
}

/// Fetches only the access token; used for the coordinator tickets depend on
struct AccessTokenFetcher {
    api: Arc<PlatformApi>,
}

#[async_trait]
impl Fetcher for AccessTokenFetcher {
    async fn fetch(
        &self,
        key: CredentialKey,
    ) -> std::result::Result<FetchedCredential, FetchError> {
        match key {
            CredentialKey::AccessToken => self.api.fetch_access_token().await,
            CredentialKey::Ticket(ticket) => Err(FetchError::MalformedResponse(format!(
                "{ticket} ticket is not served by the access token endpoint"
            ))),
        }
    }
}

/// [`Fetcher`] backed by the platform's HTTP API
///
/// Ticket requests carry an access token, which is obtained through a coordinator sharing
/// the caller's store and locks. A ticket refresh therefore takes the access token lock
/// while holding its own; the access token refresh never takes a ticket lock.
pub struct HttpFetcher {
    api: Arc<PlatformApi>,
    access_token: RefreshCoordinator,
}

impl HttpFetcher {
    pub fn new(
        config: &WxMpConfig,
        store: Arc<dyn CredentialStore>,
        locks: Arc<LockRegistry>,
    ) -> Result<Self> {
        let api = Arc::new(PlatformApi::new(config)?);
        let access_token = RefreshCoordinator::new(
            store,
            locks,
            Arc::new(AccessTokenFetcher { api: api.clone() }),
        );
        Ok(Self { api, access_token })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        key: CredentialKey,
    ) -> std::result::Result<FetchedCredential, FetchError> {
        let ticket = match key {
            CredentialKey::AccessToken => return self.api.fetch_access_token().await,
            CredentialKey::Ticket(ticket) => ticket,
        };

        let access_token = self
            .access_token
            .obtain(CredentialKey::AccessToken, false)
            .await?;

        match self.api.fetch_ticket(ticket, &access_token).await {
            Err(FetchError::RemoteRejected { code, message })
                if INVALID_ACCESS_TOKEN_CODES.contains(&code) =>
            {
                warn!(code, %key, "access token rejected by platform, expiring it");
                self.access_token.expire(CredentialKey::AccessToken);
                Err(FetchError::RemoteRejected { code, message })
            }
            other => other,
        }
    }
}
