//! Domain types shared across the dispatch pipeline.
//!
//! These mirror the wire shapes the rest of the fleet platform exchanges
//! (camelCase JSON), so fixtures exported from the routing service load
//! directly.

use std::{fmt, str::FromStr};

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    serde_json::Value,
    uuid::Uuid,
};

use crate::error::Error;

// ── ChannelType ─────────────────────────────────────────────────────────────

/// Closed set of delivery channels.
///
/// `Sms` and `Push` are declared identifiers without an adapter; routing
/// treats them as unavailable until one is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Telegram,
    Email,
    Sms,
    Push,
}

impl ChannelType {
    /// All variants, for iteration.
    pub const ALL: &'static [ChannelType] = &[Self::Telegram, Self::Email, Self::Sms, Self::Push];

    /// Lowercase wire name, matching the serde representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Push => "push",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(Self::Telegram),
            "email" => Ok(Self::Email),
            "sms" => Ok(Self::Sms),
            "push" => Ok(Self::Push),
            other => Err(Error::message(format!("unknown channel: {other}"))),
        }
    }
}

// ── Driver ──────────────────────────────────────────────────────────────────

/// The subset of a driver record the dispatch pipeline reads. Owned by the
/// driver-management service; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Opaque chat-bot identity (Telegram chat id for the current bot).
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub preferred_channel: Option<ChannelType>,
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
}

impl Driver {
    /// First and last name joined, trimmed of stray whitespace.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

fn default_true() -> bool {
    true
}

// ── Route / Vehicle / Stop ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    /// Service date as the routing service formats it (e.g. `2026-03-15`).
    pub date: String,
    #[serde(default)]
    pub planned_start_time: Option<String>,
    #[serde(default)]
    pub planned_end_time: Option<String>,
    #[serde(default)]
    pub total_stops: u32,
    #[serde(default)]
    pub total_distance_km: Option<f64>,
    #[serde(default)]
    pub total_duration_minutes: Option<u32>,
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub driver_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub license_plate: Option<String>,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// One stop on a route, in visit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub id: String,
    pub route_id: String,
    pub stop_number: u32,
    pub client_name: String,
    pub address: String,
    #[serde(default)]
    pub scheduled_time: Option<String>,
    /// Pre-summarized service description for this stop.
    #[serde(default)]
    pub services: Option<String>,
    #[serde(default)]
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub maps_url: Option<String>,
}

// ── Dispatch ────────────────────────────────────────────────────────────────

/// A request to notify one driver of one route assignment. Immutable once
/// created; one request produces one or more delivery attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub route_id: String,
    pub driver_id: String,
    /// Explicit channel override, highest-precedence resolution rule.
    #[serde(default)]
    pub channels: Option<Vec<ChannelType>>,
    /// Fan out to every available channel instead of picking one.
    #[serde(default)]
    pub multi_channel: Option<bool>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// A request plus its generated identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispatch {
    pub id: Uuid,
    #[serde(flatten)]
    pub request: DispatchRequest,
    pub created_at: DateTime<Utc>,
}

impl Dispatch {
    #[must_use]
    pub fn new(request: DispatchRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            created_at: Utc::now(),
        }
    }
}

/// Terminal status of a whole dispatch, derived from its attempt list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    /// Every attempted channel succeeded.
    Delivered,
    /// At least one attempt succeeded, at least one failed.
    Partial,
    /// No attempt succeeded (including the zero-attempt case).
    Failed,
}

impl DispatchStatus {
    /// Derive the overall status from per-attempt success flags.
    #[must_use]
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = bool>) -> Self {
        let (mut succeeded, mut failed) = (0usize, 0usize);
        for ok in outcomes {
            if ok {
                succeeded += 1;
            } else {
                failed += 1;
            }
        }
        match (succeeded, failed) {
            (0, _) => Self::Failed,
            (_, 0) => Self::Delivered,
            _ => Self::Partial,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
