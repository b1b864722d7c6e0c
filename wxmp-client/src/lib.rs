//! WeChat Official Account client
//!
//! Pairs the credential manager from `wxmp-credentials` with an HTTP fetcher for the
//! platform's token and ticket endpoints.

pub mod fetcher;
pub mod service;

pub use fetcher::HttpFetcher;
pub use service::{JsapiSignature, WxMpService};
pub use wxmp_credentials::{CredentialKey, FetchError, Result, TicketType, WxError, WxMpConfig};
