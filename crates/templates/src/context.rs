//! Render-context construction.

use {
    chrono::{DateTime, SecondsFormat, Utc},
    serde_json::{Value, json},
};

use dray_common::{Driver, Route, Stop, Vehicle};

/// Build the JSON context a dispatch message renders from.
///
/// Every scalar is populated up front: optional strings become `""`,
/// optional numbers become `0`. A missing vehicle stays `null` so templates
/// can branch on it. The route link points at the app's own route page; the
/// per-stop `mapsUrl` comes precomputed from the routing service because
/// third-party map links cap waypoints well below a full route.
#[must_use]
pub fn build_context(
    route: &Route,
    driver: &Driver,
    vehicle: Option<&Vehicle>,
    stops: &[Stop],
    base_url: &str,
    dispatched_at: DateTime<Utc>,
) -> Value {
    let base = base_url.trim_end_matches('/');
    let stops: Vec<Value> = stops
        .iter()
        .map(|stop| {
            json!({
                "stopNumber": stop.stop_number,
                "clientName": stop.client_name,
                "address": stop.address,
                "scheduledTime": stop.scheduled_time.clone().unwrap_or_default(),
                "services": stop.services.clone().unwrap_or_default(),
                "specialInstructions": stop.special_instructions.clone().unwrap_or_default(),
                "mapsUrl": stop.maps_url.clone().unwrap_or_default(),
            })
        })
        .collect();

    json!({
        "route": {
            "name": route.name,
            "code": route.code.clone().unwrap_or_default(),
            "date": route.date,
            "plannedStartTime": route.planned_start_time.clone().unwrap_or_default(),
            "plannedEndTime": route.planned_end_time.clone().unwrap_or_default(),
            "totalStops": route.total_stops,
            "totalDistanceKm": route.total_distance_km.unwrap_or(0.0),
            "totalDurationMinutes": route.total_duration_minutes.unwrap_or(0),
        },
        "driver": {
            "firstName": driver.first_name,
            "lastName": driver.last_name,
            "fullName": driver.full_name(),
        },
        "vehicle": vehicle.map_or(Value::Null, |vehicle| {
            json!({
                "name": vehicle.name,
                "licensePlate": vehicle.license_plate.clone().unwrap_or_default(),
                "make": vehicle.make.clone().unwrap_or_default(),
                "model": vehicle.model.clone().unwrap_or_default(),
            })
        }),
        "stops": stops,
        "routeMapsUrl": format!("{base}/routes.html?routeId={}", route.id),
        "dispatchedAt": dispatched_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
