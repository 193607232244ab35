/// Config schema types (app, templates, channels).
use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DrayConfig {
    pub app: AppConfig,
    pub templates: TemplatesConfig,
    pub channels: ChannelsConfig,
}

/// Application-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the fleet web app, used for driver-facing route links.
    pub base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".into(),
        }
    }
}

impl AppConfig {
    /// Base URL without a trailing slash, for link concatenation.
    #[must_use]
    pub fn base_url_trimmed(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Message template settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Directory holding one template file per channel.
    pub dir: PathBuf,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("templates"),
        }
    }
}

/// Per-channel provider configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub telegram: TelegramChannelConfig,
    pub email: EmailChannelConfig,
}

/// Telegram Bot API settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramChannelConfig {
    /// Bot token from @BotFather. Empty means the channel is unconfigured.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// API origin. Overridden in tests to point at a mock server.
    pub api_base: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl TelegramChannelConfig {
    /// Whether a usable token is present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.token.expose_secret().trim().is_empty()
    }
}

impl Default for TelegramChannelConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            api_base: "https://api.telegram.org".into(),
            timeout_secs: 8,
        }
    }
}

impl std::fmt::Debug for TelegramChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannelConfig")
            .field("token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Which transactional email service backs the email channel.
///
/// Chosen once at startup; the adapter binds its endpoints and response
/// handling to this value at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    #[default]
    Sendgrid,
    Resend,
}

impl EmailProvider {
    /// Default API origin for this provider.
    #[must_use]
    pub fn default_api_base(&self) -> &'static str {
        match self {
            Self::Sendgrid => "https://api.sendgrid.com",
            Self::Resend => "https://api.resend.com",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sendgrid => "sendgrid",
            Self::Resend => "resend",
        }
    }
}

impl std::fmt::Display for EmailProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Email channel settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailChannelConfig {
    pub provider: EmailProvider,

    /// Provider API key. Empty means the channel is unconfigured.
    #[serde(serialize_with = "serialize_secret")]
    pub api_key: Secret<String>,

    /// Sender address drivers see.
    pub from_email: String,

    /// Sender display name.
    pub from_name: String,

    /// API origin override. Defaults per provider when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl EmailChannelConfig {
    /// Whether a usable API key is present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
    }

    /// Resolved API origin, falling back to the provider default.
    #[must_use]
    pub fn api_base(&self) -> &str {
        self.api_base
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_base())
    }
}

impl Default for EmailChannelConfig {
    fn default() -> Self {
        Self {
            provider: EmailProvider::default(),
            api_key: Secret::new(String::new()),
            from_email: String::new(),
            from_name: "Dispatch".into(),
            api_base: None,
            timeout_secs: 8,
        }
    }
}

impl std::fmt::Debug for EmailChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailChannelConfig")
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("from_email", &self.from_email)
            .finish_non_exhaustive()
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}
