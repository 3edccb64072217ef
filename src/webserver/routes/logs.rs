/// Log routes - audit trail queries
///
/// All log endpoints require authentication; the list endpoint serves
/// summaries (no body/headers) with filters, sorting, and offsets.
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Extension, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::database::LogFilter;
use crate::logger::{self, LogTag};
use crate::webserver::auth::AuthInfo;
use crate::webserver::state::AppState;
use crate::webserver::utils::{error_from, error_response, success_response, success_with_meta};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/logs", get(get_logs))
        .route("/logs/:id", get(get_log))
}

#[derive(Debug, Deserialize)]
struct LogListQuery {
    #[serde(rename = "type")]
    entry_type: Option<String>,
    method: Option<String>,
    path: Option<String>,
    event_type: Option<String>,
    client_id: Option<String>,
    direction: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    sort: Option<String>,
    order: Option<String>,
}

/// GET /logs - paginated summaries with filtering and sorting
async fn get_logs(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthInfo>,
    Query(query): Query<LogListQuery>,
) -> Response {
    if !auth.authenticated {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized: Invalid API password");
    }

    let start_time = match parse_time_param(&query.start_time) {
        Ok(value) => value,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid start_time parameter"),
    };
    let end_time = match parse_time_param(&query.end_time) {
        Ok(value) => value,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid end_time parameter"),
    };

    let filter = LogFilter {
        entry_type: non_empty(query.entry_type),
        method: non_empty(query.method),
        path: non_empty(query.path),
        event_type: non_empty(query.event_type),
        client_id: non_empty(query.client_id),
        direction: non_empty(query.direction),
        start_time,
        end_time,
        limit: query.limit.filter(|l| *l > 0).unwrap_or(10),
        offset: query.offset.filter(|o| *o >= 0).unwrap_or(0),
        sort_field: query.sort.unwrap_or_else(|| "timestamp".to_string()),
        sort_order: query.order.unwrap_or_else(|| "desc".to_string()),
    };

    let (entries, total) = match state.db.get_logs_summary(&filter) {
        Ok(result) => result,
        Err(e) => {
            logger::error(LogTag::Logs, &format!("Failed to retrieve logs: {}", e));
            return error_from(&e);
        }
    };

    success_with_meta(
        &entries,
        json!({
            "count": entries.len(),
            "total": total,
            "limit": filter.limit,
            "offset": filter.offset,
            "sort": filter.sort_field,
            "order": filter.sort_order,
        }),
    )
}

/// GET /logs/:id - full entry including body and headers
async fn get_log(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthInfo>,
    Path(id): Path<String>,
) -> Response {
    if !auth.authenticated {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized: Invalid API password");
    }

    match state.db.get_log_by_id(&id) {
        Ok(entry) => success_response(&entry),
        Err(e) => error_from(&e),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// RFC3339 time filter; absent and empty are "no filter"
fn parse_time_param(value: &Option<String>) -> Result<Option<DateTime<Utc>>, ()> {
    match value.as_deref() {
        None | Some("") => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| ()),
    }
}
