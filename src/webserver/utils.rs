/// Webserver utility functions
///
/// Response helpers shared by every route module. All payloads use the
/// `{success, data, error, meta}` envelope.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::errors::AlertHubError;
use crate::models::ApiResponse;

/// Success response with data
pub fn success_response<T: serde::Serialize>(data: T) -> Response {
    success_with_status(StatusCode::OK, data)
}

/// Success response with data and an explicit status code
pub fn success_with_status<T: serde::Serialize>(status: StatusCode, data: T) -> Response {
    let body = ApiResponse {
        success: true,
        data: Some(serde_json::to_value(data).unwrap_or(Value::Null)),
        error: None,
        meta: None,
    };
    (status, Json(body)).into_response()
}

/// Success response with data and meta
pub fn success_with_meta<T: serde::Serialize>(data: T, meta: Value) -> Response {
    let body = ApiResponse {
        success: true,
        data: Some(serde_json::to_value(data).unwrap_or(Value::Null)),
        error: None,
        meta: Some(meta),
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// Error response with a message
pub fn error_response(status: StatusCode, message: &str) -> Response {
    let body = ApiResponse {
        success: false,
        data: None,
        error: Some(message.to_string()),
        meta: None,
    };
    (status, Json(body)).into_response()
}

/// Map a domain error onto the HTTP boundary
pub fn error_from(err: &AlertHubError) -> Response {
    error_response(err.status_code(), &err.public_message())
}

/// Null-data success used when a cache has nothing yet
pub fn empty_success(message: &str) -> Response {
    let body = ApiResponse {
        success: true,
        data: Some(Value::Null),
        error: None,
        meta: Some(json!({"message": message})),
    };
    (StatusCode::OK, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let resp = error_response(StatusCode::CONFLICT, "busy");
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_error_from_maps_status() {
        let resp = error_from(&AlertHubError::NotFound("Alert not found".to_string()));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = error_from(&AlertHubError::unauthorized());
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_success_with_status() {
        let resp = success_with_status(StatusCode::CREATED, serde_json::json!({"id": "A1"}));
        assert_eq!(resp.status(), StatusCode::CREATED);
    }
}
