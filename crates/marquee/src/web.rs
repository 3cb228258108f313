//! Web endpoints for Marquee.
//!
//! Thin HTTP surface over the router: activate/deactivate/status plus
//! catalog and driver introspection for UI generation. All failures are
//! structured JSON (kind plus the relevant identifiers), never opaque
//! strings, so clients can render precise messages.

use crate::catalog::{Catalog, SceneId, Zone, ZoneId};
use crate::drivers::DriverRegistry;
use crate::error::ActivateError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Shared state for web handlers
#[derive(Clone)]
pub struct WebState {
    pub router: Arc<crate::router::Router>,
    pub catalog: Arc<Catalog>,
    pub registry: Arc<DriverRegistry>,
    pub start_time: Instant,
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/zone/{zone}/activate/{scene}", post(activate))
        .route("/zone/{zone}/deactivate", post(deactivate))
        .route("/zone/{zone}", get(zone_status))
        .route("/zones", get(list_zones))
        .route("/scenes", get(list_scenes))
        .route("/drivers", get(list_drivers))
        .route("/health", get(health))
        .route("/", get(serve_root))
        .with_state(state)
}

#[derive(Debug, Deserialize, Default)]
struct ActivateQuery {
    #[serde(default, rename = "override")]
    override_conflict: bool,
}

async fn activate(
    State(state): State<WebState>,
    Path((zone, scene)): Path<(String, String)>,
    Query(query): Query<ActivateQuery>,
    extras: Option<Json<BTreeMap<String, String>>>,
) -> Response {
    let result = state
        .router
        .activate(
            &ZoneId::new(zone),
            &SceneId::new(scene),
            extras.map(|Json(extras)| extras),
            query.override_conflict,
        )
        .await;

    match result {
        Ok(activation) => Json(json!({
            "status": "ok",
            "activation": activation,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn deactivate(State(state): State<WebState>, Path(zone): Path<String>) -> Response {
    state.router.deactivate(&ZoneId::new(zone)).await;
    Json(json!({ "status": "ok" })).into_response()
}

async fn zone_status(State(state): State<WebState>, Path(zone): Path<String>) -> Response {
    match state.router.status(&ZoneId::new(zone)) {
        Some(status) => Json(json!({
            "active": true,
            "status": status,
        }))
        .into_response(),
        None => Json(json!({ "active": false })).into_response(),
    }
}

async fn list_zones(State(state): State<WebState>) -> Json<serde_json::Value> {
    let zones: Vec<_> = state
        .catalog
        .zones()
        .map(|zone| match zone {
            Zone::Simple(simple) => json!({
                "id": simple.id,
                "name": simple.name,
                "capabilities": simple.capabilities(),
                "ux-hint": simple.ux_hint,
            }),
            Zone::Virtual {
                id,
                name,
                default,
                subzones,
                ux_hint,
            } => json!({
                "id": id,
                "name": name,
                "capabilities": zone.capabilities(),
                "subzone-default": default,
                "subzones": subzones.keys().collect::<Vec<_>>(),
                "ux-hint": ux_hint,
            }),
        })
        .collect();
    Json(json!({ "zones": zones }))
}

async fn list_scenes(State(state): State<WebState>) -> Json<serde_json::Value> {
    let scenes: Vec<_> = state
        .catalog
        .scenes()
        .map(|scene| {
            json!({
                "id": scene.id,
                "name": scene.name,
                "description": scene.description,
                "driver": scene.driver,
                "audio": scene.provides_audio,
                "video": scene.provides_video,
                "ux-hint": scene.ux_hint,
            })
        })
        .collect();
    Json(json!({ "scenes": scenes }))
}

async fn list_drivers(State(state): State<WebState>) -> Json<serde_json::Value> {
    let drivers: Vec<_> = state
        .registry
        .iter()
        .map(|(id, driver)| {
            json!({
                "id": id,
                "powered": driver.power_state(),
                "extras": driver.supports_extras(),
                "commands": driver.commands(),
            })
        })
        .collect();
    Json(json!({ "drivers": drivers }))
}

async fn health(State(state): State<WebState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "drivers": state.registry.len(),
        "zones": state.catalog.zones().count(),
        "scenes": state.catalog.scenes().count(),
    }))
}

/// Serve root discovery endpoint
async fn serve_root() -> Json<serde_json::Value> {
    Json(json!({
        "name": "Marquee",
        "version": env!("CARGO_PKG_VERSION"),
        "links": {
            "zones": "/zones",
            "scenes": "/scenes",
            "drivers": "/drivers",
            "health": "/health",
        }
    }))
}

/// Map the failure taxonomy to HTTP statuses and structured bodies.
fn error_response(error: ActivateError) -> Response {
    let status = match &error {
        ActivateError::UnknownScene(_)
        | ActivateError::UnknownZone(_)
        | ActivateError::UnknownDriver(_) => StatusCode::NOT_FOUND,
        ActivateError::NoDefaultSubzone(_)
        | ActivateError::CapabilityMismatch { .. }
        | ActivateError::NoRouteDefined { .. }
        | ActivateError::NoMatchingRoute { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ActivateError::DriverConflict { .. } => StatusCode::CONFLICT,
        ActivateError::CommandFailed { .. } => StatusCode::BAD_GATEWAY,
    };

    let mut body = match &error {
        ActivateError::UnknownScene(scene) => json!({ "scene": scene }),
        ActivateError::UnknownZone(zone) => json!({ "zone": zone }),
        ActivateError::UnknownDriver(driver) => json!({ "driver": driver }),
        ActivateError::NoDefaultSubzone(zone) => json!({ "zone": zone }),
        ActivateError::CapabilityMismatch { scene, zone } => {
            json!({ "scene": scene, "zone": zone })
        }
        ActivateError::NoRouteDefined { scene, class } => {
            json!({ "scene": scene, "class": class })
        }
        ActivateError::NoMatchingRoute { scene, zone, class } => {
            json!({ "scene": scene, "zone": zone, "class": class })
        }
        ActivateError::DriverConflict {
            driver,
            owning_zone,
        } => json!({ "driver": driver, "owning-zone": owning_zone }),
        ActivateError::CommandFailed {
            driver, commanded, ..
        } => json!({ "driver": driver, "commanded": commanded }),
    };
    body["error"] = json!(error.kind());
    body["message"] = json!(error.to_string());

    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DriverId;
    use crate::drivers::DriverError;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                error_response(ActivateError::UnknownScene(SceneId::new("x"))),
                StatusCode::NOT_FOUND,
            ),
            (
                error_response(ActivateError::DriverConflict {
                    driver: DriverId::new("receiver"),
                    owning_zone: ZoneId::new("kitchen"),
                }),
                StatusCode::CONFLICT,
            ),
            (
                error_response(ActivateError::CommandFailed {
                    driver: DriverId::new("tv"),
                    commanded: vec![],
                    source: DriverError::Unreachable {
                        driver: DriverId::new("tv"),
                        reason: "timeout".to_string(),
                    },
                }),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (response, expected) in cases {
            assert_eq!(response.status(), expected);
        }
    }
}
