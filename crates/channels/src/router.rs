//! Channel resolution and fallback selection.
//!
//! Pure decision logic: no I/O, no persisted state. Given a dispatch request
//! and a driver, pick the ordered set of channels to attempt; given a failed
//! channel, pick the next fallback.

use std::sync::Arc;

use tracing::{debug, warn};

use {
    crate::registry::AdapterRegistry,
    dray_common::{ChannelType, DispatchRequest, Driver},
};

/// Fixed channel priority. This is both the availability filter order and
/// the fallback search order.
pub const CHANNEL_PRIORITY: &[ChannelType] = &[ChannelType::Telegram, ChannelType::Email];

/// Channel used when the driver has no valid preference and the request has
/// no override.
pub const DEFAULT_CHANNEL: ChannelType = ChannelType::Telegram;

pub struct ChannelRouter {
    registry: Arc<AdapterRegistry>,
}

impl ChannelRouter {
    #[must_use]
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self { registry }
    }

    /// Whether `channel` is usable for `driver`.
    ///
    /// Prefers the registered adapter's own eligibility check; falls back to
    /// a direct field check when no adapter is registered for the type, so
    /// routing decisions stay correct before adapters are wired up.
    #[must_use]
    pub fn has_valid_configuration(&self, driver: &Driver, channel: ChannelType) -> bool {
        if let Some(adapter) = self.registry.get(channel) {
            return adapter.can_send(driver);
        }
        match channel {
            ChannelType::Telegram => non_empty(driver.chat_id.as_deref()),
            ChannelType::Email => non_empty(driver.email.as_deref()),
            // Declared identifiers without an adapter implementation.
            ChannelType::Sms | ChannelType::Push => false,
        }
    }

    /// The priority list filtered down to channels usable for this driver.
    /// Empty means "cannot deliver", which is an outcome, not an error.
    #[must_use]
    pub fn available_channels(&self, driver: &Driver) -> Vec<ChannelType> {
        CHANNEL_PRIORITY
            .iter()
            .copied()
            .filter(|channel| self.has_valid_configuration(driver, *channel))
            .collect()
    }

    /// Decide the ordered set of channels to attempt. First rule that
    /// produces a channel wins:
    ///
    /// 1. explicit request override, filtered to channels valid for the
    ///    driver (request order preserved; an all-invalid override falls
    ///    through rather than erroring)
    /// 2. multi-channel fan-out over every available channel
    /// 3. the driver's preferred channel, when valid
    /// 4. the system default channel, when valid
    /// 5. the first available channel
    /// 6. nothing — empty resolution
    #[must_use]
    pub fn resolve_channels(&self, request: &DispatchRequest, driver: &Driver) -> Vec<ChannelType> {
        if let Some(requested) = request.channels.as_deref()
            && !requested.is_empty()
        {
            let valid: Vec<ChannelType> = requested
                .iter()
                .copied()
                .filter(|channel| self.has_valid_configuration(driver, *channel))
                .collect();
            if valid.is_empty() {
                warn!(
                    driver_id = %driver.id,
                    requested = ?requested,
                    "requested channels not configured for driver, falling through"
                );
            } else {
                debug!(driver_id = %driver.id, channels = ?valid, "resolved via request override");
                return valid;
            }
        }

        if request.multi_channel == Some(true) {
            let available = self.available_channels(driver);
            debug!(driver_id = %driver.id, channels = ?available, "resolved via multi-channel fan-out");
            return available;
        }

        if let Some(preferred) = driver.preferred_channel
            && self.has_valid_configuration(driver, preferred)
        {
            debug!(driver_id = %driver.id, channel = %preferred, "resolved via driver preference");
            return vec![preferred];
        }

        if self.has_valid_configuration(driver, DEFAULT_CHANNEL) {
            debug!(driver_id = %driver.id, channel = %DEFAULT_CHANNEL, "resolved via system default");
            return vec![DEFAULT_CHANNEL];
        }

        let available = self.available_channels(driver);
        if let Some(first) = available.first() {
            debug!(driver_id = %driver.id, channel = %first, "resolved via first available channel");
            return vec![*first];
        }

        debug!(driver_id = %driver.id, "no deliverable channel for driver");
        Vec::new()
    }

    /// The next channel to try after `failed`, or `None`.
    ///
    /// Suggests one alternate at a time; the caller chains further fallbacks
    /// by calling again with the newly failed channel, and bounds the chain
    /// by tracking channels it has already attempted.
    #[must_use]
    pub fn fallback_channel(&self, driver: &Driver, failed: ChannelType) -> Option<ChannelType> {
        if !driver.fallback_enabled {
            debug!(driver_id = %driver.id, "fallback disabled for driver");
            return None;
        }
        self.available_channels(driver)
            .into_iter()
            .find(|channel| *channel != failed)
    }
}

fn non_empty(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}
