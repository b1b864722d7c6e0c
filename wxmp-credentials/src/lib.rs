//! Credential lifecycle management for the WeChat Official Account platform API
//!
//! Holds the access token and tickets, and refreshes each one lazily under its own lock.

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod key;
pub mod locks;
pub mod signature;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{HostConfig, HttpConfig, LoggingConfig, PreseededToken, WxMpConfig};
pub use coordinator::RefreshCoordinator;
pub use error::{FetchError, Result, WxError};
pub use fetcher::{FetchedCredential, Fetcher};
pub use key::{CredentialKey, TicketType};
pub use locks::LockRegistry;
pub use store::{CredentialRecord, CredentialStore, InMemoryCredentialStore, EXPIRY_MARGIN_SECONDS};
