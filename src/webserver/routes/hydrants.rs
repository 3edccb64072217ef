/// Hydrant routes - spatial queries and batch upload admission
///
/// Batch upload follows an admit-then-parse order: the admission slot is
/// claimed before the body is decoded, and released again when the body
/// turns out to be unusable. Processing is detached; the caller polls
/// GET /hydrants/status.
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{delete, get, post},
    Extension, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::logger::{self, LogTag};
use crate::models::{Hydrant, HydrantBoundsQuery};
use crate::webserver::auth::AuthInfo;
use crate::webserver::state::AppState;
use crate::webserver::utils::{
    error_from, error_response, success_response, success_with_meta, success_with_status,
};
use crate::webserver::ws::EventContent;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/hydrants", get(get_hydrants).post(upload_hydrants))
        .route("/hydrants/single", post(create_hydrant))
        .route("/hydrants/status", get(get_upload_status))
        .route("/hydrants/all", delete(delete_all_hydrants))
        .route("/hydrants/:id", get(get_hydrant))
}

#[derive(Debug, Deserialize)]
struct BoundsParams {
    north_lat: Option<String>,
    south_lat: Option<String>,
    east_lng: Option<String>,
    west_lng: Option<String>,
}

/// GET /hydrants - all hydrants within the required bounds
async fn get_hydrants(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BoundsParams>,
) -> Response {
    if params.north_lat.is_none()
        || params.south_lat.is_none()
        || params.east_lng.is_none()
        || params.west_lng.is_none()
    {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing required bounds parameters (north_lat, south_lat, east_lng, west_lng)",
        );
    }

    let north_lat = match parse_bound(&params.north_lat) {
        Some(v) => v,
        None => return error_response(StatusCode::BAD_REQUEST, "Invalid north_lat parameter"),
    };
    let south_lat = match parse_bound(&params.south_lat) {
        Some(v) => v,
        None => return error_response(StatusCode::BAD_REQUEST, "Invalid south_lat parameter"),
    };
    let east_lng = match parse_bound(&params.east_lng) {
        Some(v) => v,
        None => return error_response(StatusCode::BAD_REQUEST, "Invalid east_lng parameter"),
    };
    let west_lng = match parse_bound(&params.west_lng) {
        Some(v) => v,
        None => return error_response(StatusCode::BAD_REQUEST, "Invalid west_lng parameter"),
    };

    let bounds = HydrantBoundsQuery {
        north_lat,
        south_lat,
        east_lng,
        west_lng,
    };

    match state.db.get_hydrants_by_bounds(&bounds) {
        Ok(hydrants) => success_with_meta(
            &hydrants,
            json!({"count": hydrants.len(), "bounds": bounds}),
        ),
        Err(e) => {
            logger::error(LogTag::Hydrants, &format!("Failed to retrieve hydrants: {}", e));
            error_from(&e)
        }
    }
}

/// GET /hydrants/:id
async fn get_hydrant(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.db.get_hydrant_by_id(&id) {
        Ok(hydrant) => success_response(&hydrant),
        Err(e) => error_from(&e),
    }
}

/// POST /hydrants/single - upsert one hydrant
async fn create_hydrant(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthInfo>,
    body: Bytes,
) -> Response {
    if !auth.authenticated {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized: Invalid API password");
    }

    let mut hydrant: Hydrant = match serde_json::from_slice(&body) {
        Ok(hydrant) => hydrant,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid request body: {}", e))
        }
    };

    if hydrant.lat == 0.0 && hydrant.lng == 0.0 {
        return error_response(StatusCode::BAD_REQUEST, "Missing required fields: lat and lng");
    }

    match state.db.save_hydrant(&hydrant) {
        Ok(id) => {
            hydrant.id = id;
            success_with_status(StatusCode::CREATED, &hydrant)
        }
        Err(e) => {
            logger::error(LogTag::Hydrants, &format!("Failed to save hydrant: {}", e));
            error_from(&e)
        }
    }
}

/// POST /hydrants - admit and detach a batch upload
async fn upload_hydrants(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthInfo>,
    body: Bytes,
) -> Response {
    if !auth.authenticated {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized: Invalid API password");
    }

    // Claim the singleton upload slot before touching the body
    let batch_id = match state.batcher.begin() {
        Ok(batch_id) => batch_id,
        Err(e) => return error_from(&e),
    };

    let hydrants: Vec<Hydrant> = match serde_json::from_slice(&body) {
        Ok(hydrants) => hydrants,
        Err(e) => {
            state.batcher.abort_admission();
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid request body: {}", e));
        }
    };

    if hydrants.is_empty() {
        state.batcher.abort_admission();
        return error_response(StatusCode::BAD_REQUEST, "No hydrants provided");
    }

    logger::info(
        LogTag::Hydrants,
        &format!("Starting batch upload of {} hydrants", hydrants.len()),
    );
    state.batcher.spawn_processing(hydrants);

    success_with_status(
        StatusCode::ACCEPTED,
        json!({"batch_id": batch_id, "message": "Batch upload started"}),
    )
}

/// GET /hydrants/status - snapshot of the active upload
async fn get_upload_status(State(state): State<Arc<AppState>>) -> Response {
    match state.batcher.status() {
        Some(progress) => success_response(&progress),
        None => success_response(json!({"in_progress": false})),
    }
}

/// DELETE /hydrants/all - refused while an upload is running
async fn delete_all_hydrants(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthInfo>,
) -> Response {
    if !auth.authenticated {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized: Invalid API password");
    }

    if state.batcher.upload_in_progress() {
        return error_response(
            StatusCode::CONFLICT,
            "Cannot delete hydrants while a batch upload is in progress",
        );
    }

    let count = match state.db.delete_all_hydrants() {
        Ok(count) => count,
        Err(e) => {
            logger::error(LogTag::Hydrants, &format!("Failed to delete all hydrants: {}", e));
            return error_from(&e);
        }
    };

    state
        .dashboard_hub
        .broadcast_event(
            "hydrants_deleted",
            EventContent::Json(json!({
                "count": count,
                "timestamp": Utc::now().timestamp(),
            })),
        )
        .await;

    success_response(json!({
        "count": count,
        "message": format!("Successfully deleted {} hydrants", count),
    }))
}

fn parse_bound(value: &Option<String>) -> Option<f64> {
    value.as_deref().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bound() {
        assert_eq!(parse_bound(&Some("39.5".to_string())), Some(39.5));
        assert_eq!(parse_bound(&Some(" -96.6 ".to_string())), Some(-96.6));
        assert_eq!(parse_bound(&Some("north".to_string())), None);
        assert_eq!(parse_bound(&None), None);
    }
}
