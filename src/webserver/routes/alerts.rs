/// Alert routes - ingest, listing, status updates, deletion
///
/// POST bodies arrive from dispatch gateways as a nested payload whose
/// interesting fields live under `alert.normalized_message`; extraction
/// is deliberately lenient because upstream CAD systems disagree about
/// types (numbers arrive as strings and vice versa).
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Extension, Router,
};
use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::Read;
use std::sync::Arc;

use crate::logger::{self, LogTag};
use crate::models::{
    Agency, Alert, AlertDetails, DEFAULT_ALERT_STATUS, VALID_ALERT_STATUSES,
};
use crate::redaction;
use crate::webserver::auth::AuthInfo;
use crate::webserver::state::AppState;
use crate::webserver::utils::{
    error_from, error_response, success_response, success_with_meta, success_with_status,
};
use crate::webserver::ws::EventContent;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/alerts", get(get_alerts).post(create_alert))
        .route(
            "/alerts/:id",
            get(get_alert).put(update_alert).delete(delete_alert),
        )
}

#[derive(Debug, Deserialize)]
struct AlertListQuery {
    status: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

/// GET /alerts - paginated list, redacted for unauthenticated callers
async fn get_alerts(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthInfo>,
    Query(query): Query<AlertListQuery>,
) -> Response {
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(10);
    let offset = query.offset.filter(|o| *o >= 0).unwrap_or(0);
    let status = query.status.as_deref().filter(|s| !s.is_empty());

    let alerts = match state.db.get_alerts(status, limit, offset) {
        Ok(alerts) => alerts,
        Err(e) => {
            logger::error(LogTag::Alerts, &format!("Failed to retrieve alerts: {}", e));
            return error_from(&e);
        }
    };
    let total = state.db.count_alerts(status).unwrap_or(alerts.len() as i64);

    let alerts: Vec<Alert> = if auth.authenticated {
        alerts
    } else {
        alerts.iter().map(redaction::redact_alert).collect()
    };

    success_with_meta(
        &alerts,
        json!({
            "count": alerts.len(),
            "total": total,
            "limit": limit,
            "offset": offset,
        }),
    )
}

/// POST /alerts - ingest one alert and broadcast it
async fn create_alert(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthInfo>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !auth.authenticated {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized: Invalid API password");
    }

    let raw = match decode_body(&headers, &body) {
        Ok(raw) => raw,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, &message),
    };

    let data: Value = match serde_json::from_slice(&raw) {
        Ok(value) => value,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid request body: {}", e))
        }
    };

    let agency_data = match data.get("agency").and_then(Value::as_object) {
        Some(obj) => obj,
        None => return error_response(StatusCode::BAD_REQUEST, "Invalid agency data format"),
    };
    let agency = Agency {
        name: get_string(agency_data, "name"),
        id: get_i64(agency_data, "id"),
        timezone: get_string(agency_data, "timezone"),
    };

    if agency.name.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Missing required field: agency.name");
    }

    let alert_data = match data.get("alert").and_then(Value::as_object) {
        Some(obj) => obj,
        None => return error_response(StatusCode::BAD_REQUEST, "Invalid alert data format"),
    };

    let mut alert = Alert {
        agency,
        alert: build_details(alert_data),
    };

    let id = match state.db.create_alert(&alert) {
        Ok(id) => id,
        Err(e) => {
            logger::error(LogTag::Alerts, &format!("Failed to create alert: {}", e));
            state.notifier.notify_error("create alert", &e.to_string());
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create alert");
        }
    };
    alert.alert.id = id.clone();

    state
        .dashboard_hub
        .broadcast_event("new_alert", EventContent::Alert(alert.clone()))
        .await;
    logger::info(
        LogTag::Alerts,
        &format!("Alert {} created and broadcast to dashboard clients", id),
    );

    success_with_status(StatusCode::CREATED, &alert)
}

/// GET /alerts/:id - single alert, redacted for unauthenticated callers
async fn get_alert(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthInfo>,
    Path(id): Path<String>,
) -> Response {
    match state.db.get_alert_by_id(&id) {
        Ok(alert) if auth.authenticated => success_response(&alert),
        Ok(alert) => success_response(redaction::redact_alert(&alert)),
        Err(e) => error_from(&e),
    }
}

#[derive(Debug, Deserialize)]
struct StatusUpdate {
    #[serde(default)]
    status: String,
}

/// PUT /alerts/:id - status update, broadcast as alert_updated
async fn update_alert(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthInfo>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    if !auth.authenticated {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized: Invalid API password");
    }

    let update: StatusUpdate = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid request body"),
    };

    if update.status.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Status is required");
    }
    if !VALID_ALERT_STATUSES.contains(&update.status.as_str()) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid status value. Must be one of: new, acknowledged, resolved, closed",
        );
    }

    if let Err(e) = state.db.update_alert_status(&id, &update.status) {
        return error_from(&e);
    }

    let alert = match state.db.get_alert_by_id(&id) {
        Ok(alert) => alert,
        Err(e) => {
            logger::error(
                LogTag::Alerts,
                &format!("Alert {} updated but failed to re-fetch: {}", id, e),
            );
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Alert updated but failed to retrieve",
            );
        }
    };

    state
        .dashboard_hub
        .broadcast_event("alert_updated", EventContent::Alert(alert.clone()))
        .await;

    success_response(&alert)
}

/// DELETE /alerts/:id - broadcast as alert_deleted
async fn delete_alert(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthInfo>,
    Path(id): Path<String>,
) -> Response {
    if !auth.authenticated {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized: Invalid API password");
    }

    if let Err(e) = state.db.delete_alert(&id) {
        return error_from(&e);
    }

    state
        .dashboard_hub
        .broadcast_event("alert_deleted", EventContent::Json(json!({"id": id})))
        .await;

    success_response(json!({"message": "Alert deleted successfully"}))
}

/// Transparently inflate gzip-encoded request bodies
fn decode_body(headers: &HeaderMap, body: &Bytes) -> Result<Vec<u8>, String> {
    let encoding = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if encoding.eq_ignore_ascii_case("gzip") {
        let mut decoder = GzDecoder::new(&body[..]);
        let mut decoded = Vec::new();
        decoder
            .read_to_end(&mut decoded)
            .map_err(|e| format!("Failed to read gzipped data: {}", e))?;
        Ok(decoded)
    } else {
        Ok(body.to_vec())
    }
}

/// Build alert details from the nested ingest payload
fn build_details(alert_data: &serde_json::Map<String, Value>) -> AlertDetails {
    let empty = serde_json::Map::new();
    let normalized = alert_data
        .get("normalized_message")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let pagegroups = alert_data
        .get("pagegroups")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    AlertDetails {
        // Empty ids are assigned by the repository on insert
        id: get_string(alert_data, "id"),
        city: get_opt_string(normalized, "city"),
        coordinate_source: get_opt_string(normalized, "coordinate_source"),
        cross_street: get_opt_string(normalized, "cross_street"),
        custom_identifiers: get_opt_string(normalized, "custom_identifiers"),
        description: get_opt_string(normalized, "description"),
        details: get_opt_string(normalized, "details"),
        dispatch_coords: get_opt_string(normalized, "dispatch_coords"),
        lat: get_coordinate(normalized, "lat"),
        lon: get_coordinate(normalized, "lon"),
        map_address: get_opt_string(normalized, "map_address"),
        map_code: get_opt_string(normalized, "map_code"),
        place: get_opt_string(normalized, "place"),
        priority: get_opt_string(normalized, "priority"),
        received: get_opt_string(normalized, "received"),
        source: get_opt_string(normalized, "source"),
        state: get_opt_string(normalized, "state"),
        unit: get_opt_string(normalized, "unit"),
        units: get_opt_string(normalized, "units"),
        pagegroups,
        stamp: get_f64(alert_data, "stamp"),
        status: DEFAULT_ALERT_STATUS.to_string(),
    }
}

// Lenient field extraction over the raw payload

fn get_string(data: &serde_json::Map<String, Value>, key: &str) -> String {
    match data.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn get_opt_string(data: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match data.get(key) {
        Some(Value::Null) | None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn get_i64(data: &serde_json::Map<String, Value>, key: &str) -> i64 {
    match data.get(key) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or_else(|| n.as_f64().unwrap_or(0.0) as i64),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

fn get_f64(data: &serde_json::Map<String, Value>, key: &str) -> f64 {
    match data.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Coordinates may arrive as strings or numbers; blank or malformed
/// values become 0 with a logged warning
fn get_coordinate(data: &serde_json::Map<String, Value>, key: &str) -> f64 {
    match data.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) if s.trim().is_empty() => 0.0,
        Some(Value::String(s)) => s.trim().parse().unwrap_or_else(|_| {
            logger::warning(
                LogTag::Alerts,
                &format!("Malformed {} value {:?}, defaulting to 0", key, s),
            );
            0.0
        }),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::hydrants::HydrantBatcher;
    use crate::notification::NotificationService;
    use crate::weather::WeatherService;
    use crate::webserver::ws::{Hub, HubType};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn test_state() -> Arc<AppState> {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let dashboard_hub = Hub::new(HubType::Dashboard);
        Arc::new(AppState {
            db: db.clone(),
            dashboard_hub: dashboard_hub.clone(),
            client_hub: Hub::new(HubType::ClientControl),
            logs_hub: Hub::new(HubType::Logs),
            weather: WeatherService::new(dashboard_hub, db.clone()),
            batcher: HydrantBatcher::new(db),
            notifier: NotificationService::new(),
        })
    }

    fn unauthenticated() -> Extension<AuthInfo> {
        Extension(AuthInfo {
            authenticated: false,
        })
    }

    #[tokio::test]
    async fn test_mutating_endpoints_require_auth() {
        let state = test_state();

        let response = create_alert(
            State(state.clone()),
            unauthenticated(),
            HeaderMap::new(),
            Bytes::from_static(b"{}"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = update_alert(
            State(state.clone()),
            unauthenticated(),
            Path("A1".to_string()),
            Bytes::from_static(b"{\"status\":\"closed\"}"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = delete_alert(
            State(state),
            unauthenticated(),
            Path("A1".to_string()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unauthenticated_list_is_redacted() {
        use crate::models::Agency;
        use crate::redaction::REDACTED;

        let state = test_state();
        state
            .db
            .create_alert(&Alert {
                agency: Agency {
                    name: "APD".to_string(),
                    id: 1,
                    timezone: "UTC".to_string(),
                },
                alert: AlertDetails {
                    id: "A1".to_string(),
                    description: Some("Fire - Structure".to_string()),
                    details: Some("two story residential".to_string()),
                    status: "new".to_string(),
                    ..Default::default()
                },
            })
            .unwrap();

        let response = get_alerts(
            State(state),
            unauthenticated(),
            Query(AlertListQuery {
                status: None,
                limit: None,
                offset: None,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["data"][0]["alert"]["details"], REDACTED);
        assert_eq!(json["data"][0]["alert"]["description"], "Fire - Structure");
    }

    #[tokio::test]
    async fn test_invalid_status_value_is_rejected() {
        let state = test_state();
        let response = update_alert(
            State(state),
            Extension(AuthInfo {
                authenticated: true,
            }),
            Path("A1".to_string()),
            Bytes::from_static(b"{\"status\":\"archived\"}"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    fn obj(raw: &str) -> serde_json::Map<String, Value> {
        serde_json::from_str::<Value>(raw)
            .unwrap()
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_build_details_from_nested_payload() {
        let alert_data = obj(
            r#"{
                "stamp": 1.5,
                "pagegroups": ["STATION1", "STATION2"],
                "normalized_message": {
                    "description": "Medical - Chest Pain",
                    "details": "patient 72M",
                    "lat": "39.19",
                    "lon": -96.6,
                    "city": "Manhattan"
                }
            }"#,
        );

        let details = build_details(&alert_data);
        assert!(details.id.is_empty());
        assert_eq!(details.description.as_deref(), Some("Medical - Chest Pain"));
        assert_eq!(details.details.as_deref(), Some("patient 72M"));
        assert_eq!(details.lat, 39.19);
        assert_eq!(details.lon, -96.6);
        assert_eq!(details.city.as_deref(), Some("Manhattan"));
        assert_eq!(details.pagegroups, vec!["STATION1", "STATION2"]);
        assert_eq!(details.stamp, 1.5);
        assert_eq!(details.status, "new");
    }

    #[test]
    fn test_malformed_coordinates_default_to_zero() {
        let normalized = obj(r#"{"lat": "not a number", "lon": ""}"#);
        assert_eq!(get_coordinate(&normalized, "lat"), 0.0);
        assert_eq!(get_coordinate(&normalized, "lon"), 0.0);
        assert_eq!(get_coordinate(&normalized, "missing"), 0.0);
    }

    #[test]
    fn test_lenient_extraction() {
        let data = obj(r#"{"id": 42, "name": "APD", "stamp": "2.25"}"#);
        assert_eq!(get_string(&data, "id"), "42");
        assert_eq!(get_string(&data, "name"), "APD");
        assert_eq!(get_f64(&data, "stamp"), 2.25);
        assert_eq!(get_i64(&data, "id"), 42);
        assert!(get_opt_string(&data, "missing").is_none());
    }

    #[test]
    fn test_gzip_body_decoding() {
        let payload = br#"{"agency":{"name":"APD"}}"#;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_ENCODING, "gzip".parse().unwrap());

        let decoded = decode_body(&headers, &Bytes::from(compressed)).unwrap();
        assert_eq!(decoded, payload);

        // Plain bodies pass through untouched
        let decoded = decode_body(&HeaderMap::new(), &Bytes::from_static(payload)).unwrap();
        assert_eq!(decoded, payload);

        // Claimed-gzip garbage is a client error
        let garbage = decode_body(&headers, &Bytes::from_static(b"nope"));
        assert!(garbage.is_err());
    }
}
