//! Channel adapter system.
//!
//! Each delivery channel (Telegram, email, future SMS/push) implements the
//! [`ChannelAdapter`] trait and registers into an [`AdapterRegistry`]. The
//! [`ChannelRouter`] decides which channels to attempt for a dispatch and
//! which fallback to try after a failure; [`health`] exposes per-channel
//! probes for the service health boundary.

pub mod adapter;
pub mod health;
pub mod registry;
pub mod router;

pub use {
    adapter::{ChannelAdapter, ChannelResult, DispatchContext, HealthStatus},
    health::{ComponentHealth, ComponentStatus},
    registry::AdapterRegistry,
    router::{CHANNEL_PRIORITY, ChannelRouter, DEFAULT_CHANNEL},
};
