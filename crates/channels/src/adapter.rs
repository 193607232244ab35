use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    serde::Serialize,
};

use dray_common::{ChannelType, Dispatch, Driver, Route, Stop, Vehicle};

// ── Dispatch context ────────────────────────────────────────────────────────

/// Payload for one delivery attempt. Built once per attempt and passed
/// unchanged into the adapter; the message body is already rendered for the
/// target channel.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    pub dispatch: &'a Dispatch,
    pub driver: &'a Driver,
    pub route: &'a Route,
    pub vehicle: Option<&'a Vehicle>,
    pub stops: &'a [Stop],
    /// Rendered message body for the target channel.
    pub message: &'a str,
}

// ── Attempt outcome ─────────────────────────────────────────────────────────

/// Outcome of one adapter invocation. The unit of record for a single
/// channel attempt; never mutated after creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResult {
    pub success: bool,
    pub channel: ChannelType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl ChannelResult {
    #[must_use]
    pub fn delivered(channel: ChannelType, provider_message_id: Option<String>) -> Self {
        Self {
            success: true,
            channel,
            provider_message_id,
            error: None,
            sent_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn failed(channel: ChannelType, error: impl Into<String>) -> Self {
        Self {
            success: false,
            channel,
            provider_message_id: None,
            error: Some(error.into()),
            sent_at: Utc::now(),
        }
    }
}

// ── Health ──────────────────────────────────────────────────────────────────

/// Result of an adapter connectivity probe. Produced on demand, never
/// persisted.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthStatus {
    #[must_use]
    pub fn up(message: impl Into<String>) -> Self {
        Self {
            healthy: true,
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn down(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: Some(message.into()),
        }
    }
}

// ── Adapter contract ────────────────────────────────────────────────────────

/// Provider-specific delivery implementation for one channel type.
///
/// Adapters are value-returning at the seam: `send` and `health_check`
/// convert every failure into a [`ChannelResult`] / [`HealthStatus`] rather
/// than erroring, so one misbehaving provider cannot abort a fan-out.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Constant identity of this adapter.
    fn channel_type(&self) -> ChannelType;

    /// Eligibility check over locally available driver fields. No I/O; the
    /// router calls this for every candidate channel on every resolution.
    fn can_send(&self, driver: &Driver) -> bool;

    /// Perform exactly one outbound attempt.
    ///
    /// Re-checks `can_send` and provider configuration before any I/O and
    /// fails fast with a descriptive error in the result.
    async fn send(&self, ctx: DispatchContext<'_>) -> ChannelResult;

    /// Out-of-band connectivity probe, distinct from `send`: hits a
    /// lightweight provider endpoint to confirm credentials are valid.
    async fn health_check(&self) -> HealthStatus;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn delivered_result_shape() {
        let result = ChannelResult::delivered(ChannelType::Telegram, Some("42".into()));
        assert!(result.success);
        assert_eq!(result.provider_message_id.as_deref(), Some("42"));
        assert!(result.error.is_none());
    }

    #[test]
    fn failed_result_serializes_without_message_id() {
        let result = ChannelResult::failed(ChannelType::Email, "boom");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["channel"], "email");
        assert_eq!(json["error"], "boom");
        assert!(json.get("providerMessageId").is_none());
    }
}
