//! Channel health probes for the service health boundary.
//!
//! Each supported channel maps to a tri-state component status. An
//! unconfigured channel is degraded, never unhealthy; only a configured
//! adapter whose provider probe fails is unhealthy.

use serde::Serialize;

use {
    crate::{registry::AdapterRegistry, router::CHANNEL_PRIORITY},
    dray_common::ChannelType,
};

/// Marker substring adapters put in a failing health message when the
/// problem is missing configuration rather than a provider fault.
const UNCONFIGURED_MARKER: &str = "not configured";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Probe one channel through its registered adapter.
pub async fn probe(registry: &AdapterRegistry, channel: ChannelType) -> ComponentHealth {
    let Some(adapter) = registry.get(channel) else {
        return ComponentHealth {
            status: ComponentStatus::Degraded,
            message: Some(format!("{channel} adapter not configured")),
        };
    };

    let status = adapter.health_check().await;
    if status.healthy {
        return ComponentHealth {
            status: ComponentStatus::Healthy,
            message: status.message,
        };
    }

    let unconfigured = status
        .message
        .as_deref()
        .is_some_and(|m| m.contains(UNCONFIGURED_MARKER));
    ComponentHealth {
        status: if unconfigured {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Unhealthy
        },
        message: status.message,
    }
}

/// Probe every supported channel concurrently, in priority order.
pub async fn probe_all(registry: &AdapterRegistry) -> Vec<(ChannelType, ComponentHealth)> {
    let probes = CHANNEL_PRIORITY
        .iter()
        .map(|channel| async move { (*channel, probe(registry, *channel).await) });
    futures::future::join_all(probes).await
}

/// Aggregate component statuses into one overall service status.
#[must_use]
pub fn overall<'a>(components: impl IntoIterator<Item = &'a ComponentHealth>) -> ComponentStatus {
    let mut aggregate = ComponentStatus::Healthy;
    for component in components {
        aggregate = aggregate.max(component.status);
    }
    aggregate
}
