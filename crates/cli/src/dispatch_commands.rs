//! `dray health`, `dray render`, and `dray send`.

use std::{path::Path, sync::Arc};

use {
    anyhow::{Context, Result},
    serde::Deserialize,
};

use {
    dray_channels::{AdapterRegistry, ComponentStatus, health},
    dray_common::{ChannelType, DispatchRequest, DispatchStatus, Driver, Route, Stop, Vehicle},
    dray_config::DrayConfig,
    dray_dispatch::{DispatchJob, DispatchOrchestrator},
    dray_email::EmailAdapter,
    dray_telegram::TelegramAdapter,
    dray_templates::{TemplateEngine, build_context},
};

/// Entities for one dispatch, in the shape the routing service exports them.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchFixture {
    pub route: Route,
    pub driver: Driver,
    #[serde(default)]
    pub vehicle: Option<Vehicle>,
    #[serde(default)]
    pub stops: Vec<Stop>,
}

fn load_fixture(path: &Path) -> Result<DispatchFixture> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read fixture {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid fixture {}", path.display()))
}

/// Registry holding every adapter the config can construct. Unconfigured
/// providers still get an adapter; they report themselves as such.
fn build_registry(config: &DrayConfig) -> Arc<AdapterRegistry> {
    let mut registry = AdapterRegistry::new();
    registry.register(Box::new(TelegramAdapter::new(
        config.channels.telegram.clone(),
    )));
    registry.register(Box::new(EmailAdapter::new(config.channels.email.clone())));
    Arc::new(registry)
}

pub async fn handle_health(config: &DrayConfig) -> Result<()> {
    let registry = build_registry(config);
    let components = health::probe_all(&registry).await;

    for (channel, component) in &components {
        println!(
            "{:<10} {:<10} {}",
            channel.as_str(),
            component.status.to_string(),
            component.message.as_deref().unwrap_or("")
        );
    }

    let overall = health::overall(components.iter().map(|(_, component)| component));
    println!("{:<10} {overall}", "overall");

    if overall == ComponentStatus::Unhealthy {
        std::process::exit(1);
    }
    Ok(())
}

pub fn handle_render(config: &DrayConfig, channel: ChannelType, fixture_path: &Path) -> Result<()> {
    let fixture = load_fixture(fixture_path)?;
    let engine = TemplateEngine::new(&config.templates.dir);
    let context = build_context(
        &fixture.route,
        &fixture.driver,
        fixture.vehicle.as_ref(),
        &fixture.stops,
        config.app.base_url_trimmed(),
        chrono::Utc::now(),
    );
    let message = engine.render_for_channel(channel, &context)?;
    println!("{message}");
    Ok(())
}

pub async fn handle_send(
    config: &DrayConfig,
    fixture_path: &Path,
    channels: Vec<ChannelType>,
    multi_channel: bool,
) -> Result<()> {
    let fixture = load_fixture(fixture_path)?;
    let orchestrator = DispatchOrchestrator::new(
        build_registry(config),
        TemplateEngine::new(&config.templates.dir),
        config.app.base_url_trimmed(),
    );

    let request = DispatchRequest {
        route_id: fixture.route.id.clone(),
        driver_id: fixture.driver.id.clone(),
        channels: (!channels.is_empty()).then_some(channels),
        multi_channel: multi_channel.then_some(true),
        metadata: None,
    };
    let job = DispatchJob {
        request,
        route: fixture.route,
        driver: fixture.driver,
        vehicle: fixture.vehicle,
        stops: fixture.stops,
    };

    let outcome = orchestrator.dispatch(&job).await;

    println!("dispatch {} {}", outcome.dispatch.id, outcome.status);
    for attempt in &outcome.attempts {
        let mark = if attempt.success { "ok " } else { "err" };
        let detail = attempt
            .provider_message_id
            .as_deref()
            .or(attempt.error.as_deref())
            .unwrap_or("");
        println!("  [{mark}] {:<10} {detail}", attempt.channel.as_str());
    }

    if outcome.status == DispatchStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}
