/// Webserver middleware
///
/// Request interceptors for authentication context and the audit log
/// pipeline. Every request is tagged with a UUID request id, buffered so
/// its body can be replayed to the handler, and - once the handler
/// completes - recorded to the repository, the request log file, and the
/// logs hub as a `new_log` event. Requests under /logs are never audited
/// to prevent recursion.
use axum::{
  body::{Body, Bytes},
  extract::{ConnectInfo, Request, State},
  http::HeaderValue,
  middleware::Next,
  response::Response,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::with_config;
use crate::logger::{self, LogTag};
use crate::models::{LogEntry, LogEntrySummary, WebSocketMessage};
use crate::webserver::state::AppState;
use crate::webserver::utils;
use crate::webserver::ws::{EventContent, Hub};
use crate::webserver::auth;

/// Request id attached to the request extensions and the X-Request-ID
/// response header
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Attach authentication info to the request extensions
pub async fn auth_context(mut request: Request, next: Next) -> Response {
  let info = auth::auth_info_from_request(&request);
  request.extensions_mut().insert(info);
  next.run(request).await
}

/// Audit every request/response pair
pub async fn audit(
  State(state): State<Arc<AppState>>,
  request: Request,
  next: Next,
) -> Response {
  let start = Instant::now();
  let request_id = Uuid::new_v4().to_string();

  let method = request.method().to_string();
  let path = request.uri().path().to_string();
  let source_ip = request
    .extensions()
    .get::<ConnectInfo<SocketAddr>>()
    .map(|info| info.0.to_string())
    .unwrap_or_default();
  let headers = headers_to_json(request.headers());

  // /logs traffic is not itself audited
  let audited = !path.starts_with("/logs");

  logger::info(
    LogTag::Webserver,
    &format!("Request received: {} {} from {}", method, path, source_ip),
  );

  // Buffer the body so it can be logged and replayed to the handler
  let (parts, body) = request.into_parts();
  let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
    Ok(bytes) => bytes,
    Err(_) => {
      return utils::error_response(
        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to read request body",
      );
    }
  };
  let body_json = body_to_json(&body_bytes);

  let mut request = Request::from_parts(parts, Body::from(body_bytes));
  request.extensions_mut().insert(RequestId(request_id.clone()));

  let mut response = next.run(request).await;

  if let Ok(value) = HeaderValue::from_str(&request_id) {
    response.headers_mut().insert("X-Request-ID", value);
  }

  let duration_ms = start.elapsed().as_millis() as i64;
  let status_code = response.status().as_u16() as i64;

  if audited {
    let entry = LogEntry {
      id: request_id.clone(),
      entry_type: "api_request".to_string(),
      method: method.clone(),
      path: path.clone(),
      body: body_json,
      headers,
      timestamp: Utc::now(),
      source_ip,
      client_id: String::new(),
      event_type: String::new(),
      direction: "incoming".to_string(),
      duration_ms: Some(duration_ms),
      status_code: Some(status_code),
    };

    if with_config(|cfg| cfg.logging.request_logging) {
      logger::append_request_log(&entry);
    }
    persist_and_announce(state.clone(), entry);
  }

  logger::info(
    LogTag::Webserver,
    &format!(
      "Request completed: {} {} in {}ms with status {}",
      method, path, duration_ms, status_code
    ),
  );

  response
}

/// Persist a log entry best-effort and announce it on the logs hub
fn persist_and_announce(state: Arc<AppState>, entry: LogEntry) {
  tokio::spawn(async move {
    if let Err(e) = state.db.save_log(&entry) {
      logger::warning(
        LogTag::Logs,
        &format!("Failed to save request log {}: {}", entry.id, e),
      );
      state.notifier.notify_error("save request log", &e.to_string());
    }

    let summary = summary_of(&entry);
    state
      .logs_hub
      .broadcast_event(
        "new_log",
        EventContent::Json(serde_json::to_value(summary).unwrap_or(Value::Null)),
      )
      .await;
  });
}

/// Build the audit callback installed on every hub
///
/// WebSocket messages are logged at reception and send time, excluding
/// ping/pong/heartbeat. The log id is the message id plus a
/// nanosecond-resolution timestamp, since a fan-out logs the same
/// message once per recipient.
pub fn make_ws_log_callback(
  state: Arc<AppState>,
  logs_hub: Arc<Hub>,
  endpoint: &'static str,
) -> Arc<dyn Fn(&WebSocketMessage, &str, &str) + Send + Sync> {
  Arc::new(move |message, source, client_id| {
    if message.is_unlogged_type() {
      return;
    }

    let entry = LogEntry {
      id: format!(
        "{}-{}",
        message.id,
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
      ),
      entry_type: "ws_message".to_string(),
      method: "WEBSOCKET".to_string(),
      path: endpoint.to_string(),
      body: serde_json::to_value(message).unwrap_or(Value::Null),
      headers: json!({"X-Websocket-Message-Type": [message.message_type.clone()]}),
      timestamp: Utc::now(),
      source_ip: client_id.to_string(),
      client_id: client_id.to_string(),
      event_type: message.message_type.clone(),
      direction: source.to_string(),
      duration_ms: None,
      status_code: None,
    };

    let state = state.clone();
    let logs_hub = logs_hub.clone();
    tokio::spawn(async move {
      if let Err(e) = state.db.save_log(&entry) {
        logger::warning(
          LogTag::Logs,
          &format!("Failed to save ws message log {}: {}", entry.id, e),
        );
      }

      let summary = summary_of(&entry);
      logs_hub
        .broadcast_event(
          "new_log",
          EventContent::Json(serde_json::to_value(summary).unwrap_or(Value::Null)),
        )
        .await;
    });
  })
}

fn summary_of(entry: &LogEntry) -> LogEntrySummary {
  LogEntrySummary {
    id: entry.id.clone(),
    entry_type: entry.entry_type.clone(),
    method: entry.method.clone(),
    path: entry.path.clone(),
    timestamp: entry.timestamp,
    source_ip: entry.source_ip.clone(),
    client_id: entry.client_id.clone(),
    event_type: entry.event_type.clone(),
    direction: entry.direction.clone(),
    duration_ms: entry.duration_ms,
    status_code: entry.status_code,
  }
}

/// Headers as `name -> [values]`, mirroring the stored wire shape
fn headers_to_json(headers: &axum::http::HeaderMap) -> Value {
  let mut map = serde_json::Map::new();
  for key in headers.keys() {
    let values: Vec<Value> = headers
      .get_all(key)
      .iter()
      .filter_map(|v| v.to_str().ok())
      .map(|v| Value::String(v.to_string()))
      .collect();
    map.insert(key.to_string(), Value::Array(values));
  }
  Value::Object(map)
}

/// The raw body as JSON when valid, a JSON string otherwise, null when
/// empty
fn body_to_json(bytes: &Bytes) -> Value {
  if bytes.is_empty() {
    return Value::Null;
  }
  match serde_json::from_slice::<Value>(bytes) {
    Ok(value) => value,
    Err(_) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_body_to_json() {
    assert_eq!(body_to_json(&Bytes::new()), Value::Null);
    assert_eq!(
      body_to_json(&Bytes::from_static(b"{\"a\":1}")),
      json!({"a": 1})
    );
    assert_eq!(
      body_to_json(&Bytes::from_static(b"plain text")),
      Value::String("plain text".to_string())
    );
  }

  #[test]
  fn test_headers_to_json() {
    let mut headers = axum::http::HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers.append("x-multi", HeaderValue::from_static("one"));
    headers.append("x-multi", HeaderValue::from_static("two"));

    let json = headers_to_json(&headers);
    assert_eq!(json["content-type"], json!(["application/json"]));
    assert_eq!(json["x-multi"], json!(["one", "two"]));
  }
}
