//! Credential keys
//!
//! The key space is closed: the access token plus one slot per ticket kind.
//! Every key maps to a dense index so stores and lock tables can be fixed-size arrays.

use crate::WxError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ticket kinds issued by the `cgi-bin/ticket/getticket` endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketType {
    /// JS-SDK page signing ticket
    Jsapi,
    /// Legacy SDK ticket
    Sdk,
    /// Card and coupon ticket
    WxCard,
}

/// Identifies one independently refreshed credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKey {
    AccessToken,
    Ticket(TicketType),
}

impl TicketType {
    pub const ALL: [TicketType; 3] = [TicketType::Jsapi, TicketType::Sdk, TicketType::WxCard];

    /// Value of the `type` query parameter the platform expects
    pub fn code(self) -> &'static str {
        match self {
            TicketType::Jsapi => "jsapi",
            TicketType::Sdk => "2",
            TicketType::WxCard => "wx_card",
        }
    }

    fn name(self) -> &'static str {
        match self {
            TicketType::Jsapi => "jsapi",
            TicketType::Sdk => "sdk",
            TicketType::WxCard => "wx_card",
        }
    }
}

impl CredentialKey {
    pub const COUNT: usize = 4;

    pub const ALL: [CredentialKey; Self::COUNT] = [
        CredentialKey::AccessToken,
        CredentialKey::Ticket(TicketType::Jsapi),
        CredentialKey::Ticket(TicketType::Sdk),
        CredentialKey::Ticket(TicketType::WxCard),
    ];

    /// Position of this key in [`CredentialKey::ALL`]
    pub fn index(self) -> usize {
        match self {
            CredentialKey::AccessToken => 0,
            CredentialKey::Ticket(TicketType::Jsapi) => 1,
            CredentialKey::Ticket(TicketType::Sdk) => 2,
            CredentialKey::Ticket(TicketType::WxCard) => 3,
        }
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialKey::AccessToken => f.write_str("access_token"),
            CredentialKey::Ticket(ticket) => write!(f, "ticket:{ticket}"),
        }
    }
}

impl FromStr for CredentialKey {
    type Err = WxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "access_token" | "token" => Ok(CredentialKey::AccessToken),
            "jsapi" | "ticket:jsapi" => Ok(CredentialKey::Ticket(TicketType::Jsapi)),
            "sdk" | "ticket:sdk" => Ok(CredentialKey::Ticket(TicketType::Sdk)),
            "wx_card" | "ticket:wx_card" => Ok(CredentialKey::Ticket(TicketType::WxCard)),
            _ => Err(WxError::InvalidKey(s.to_string())),
        }
    }
}
