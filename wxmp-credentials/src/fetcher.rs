//! Remote credential retrieval capability

use crate::error::FetchError;
use crate::key::CredentialKey;
use async_trait::async_trait;

/// A freshly issued credential and its remote-declared lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedCredential {
    pub value: String,
    pub ttl_seconds: i32,
}

impl FetchedCredential {
    pub fn new(value: impl Into<String>, ttl_seconds: i32) -> Self {
        Self {
            value: value.into(),
            ttl_seconds,
        }
    }
}

/// Performs the network round trip for one credential key
///
/// Implementations own transport concerns such as timeouts. They must not write the
/// fetched key into the credential store; the coordinator does that.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, key: CredentialKey) -> Result<FetchedCredential, FetchError>;
}
