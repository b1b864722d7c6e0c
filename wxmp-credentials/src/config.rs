//! Configuration for a WeChat Official Account client

use crate::{Result, WxError};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_HOST: &str = "https://api.weixin.qq.com";

/// Main configuration for one Official Account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WxMpConfig {
    /// Application ID issued by the platform
    pub app_id: String,

    /// Application secret used to request access tokens
    pub secret: String,

    /// Shared token for verifying inbound callback signatures
    #[serde(default)]
    pub token: Option<String>,

    /// Message encryption key
    #[serde(default)]
    pub aes_key: Option<String>,

    /// Operator-supplied access token installed before the first refresh
    #[serde(default)]
    pub access_token: Option<PreseededToken>,

    /// Platform endpoint settings
    #[serde(default)]
    pub host: HostConfig,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// A credential handed to us out of band
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreseededToken {
    pub value: String,

    /// Remaining validity in seconds
    #[serde(default = "PreseededToken::default_expires_in")]
    pub expires_in_seconds: i32,
}

/// Where the platform API lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Base URL, e.g. `https://api.weixin.qq.com`
    pub api_host: String,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout (seconds)
    pub timeout_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl PreseededToken {
    fn default_expires_in() -> i32 {
        7200
    }
}

impl Default for WxMpConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            secret: String::new(),
            token: None,
            aes_key: None,
            access_token: None,
            host: HostConfig::default(),
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            api_host: DEFAULT_API_HOST.to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl WxMpConfig {
    pub fn new(app_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            secret: secret.into(),
            ..Self::default()
        }
    }

    /// Load configuration from file or create default
    pub fn load_or_default(config_path: Option<&str>) -> Result<Self> {
        match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                let config: WxMpConfig = serde_json::from_str(&content)?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to file
    pub fn save(&self, config_path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Check the fields a client needs before it can talk to the platform
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(WxError::Config("app_id is required".to_string()));
        }
        if self.secret.trim().is_empty() && self.access_token.is_none() {
            return Err(WxError::Config(
                "secret is required unless an access_token is preseeded".to_string(),
            ));
        }
        if self.http.timeout_seconds == 0 {
            return Err(WxError::Config(
                "http.timeout_seconds must be greater than zero".to_string(),
            ));
        }
        url::Url::parse(&self.host.api_host)?;
        Ok(())
    }
}
