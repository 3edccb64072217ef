/// WebSocket routes - upgrade handlers for the three hubs
///
/// - /ws/dashboard: accepted regardless of auth; the auth flag governs
///   per-message redaction. Optional ?station= metadata scopes
///   station-filtered broadcasts.
/// - /ws/client: accepted regardless of auth; auth gates control
///   commands per message.
/// - /ws/logs: rejected with 401 when unauthenticated.
use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Extension, Router,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::logger::{self, LogTag};
use crate::webserver::auth::AuthInfo;
use crate::webserver::state::AppState;
use crate::webserver::utils::error_response;
use crate::webserver::ws::{client, connection, Hub};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/dashboard", get(dashboard_ws))
        .route("/ws/client", get(client_ws))
        .route("/ws/logs", get(logs_ws))
}

/// GET /ws/dashboard
async fn dashboard_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthInfo>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    let mut metadata = HashMap::new();
    if let Some(station) = params.get("station").filter(|s| !s.is_empty()) {
        metadata.insert("station".to_string(), station.clone());
    }

    upgrade(ws, state.dashboard_hub.clone(), auth, metadata, headers, addr)
}

/// GET /ws/client
async fn client_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthInfo>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    upgrade(ws, state.client_hub.clone(), auth, HashMap::new(), headers, addr)
}

/// GET /ws/logs - requires authentication at upgrade time
async fn logs_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthInfo>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    if !auth.authenticated {
        logger::warning(
            LogTag::Websocket,
            "Unauthorized attempt to connect to logs WebSocket",
        );
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized: Invalid API password");
    }

    upgrade(ws, state.logs_hub.clone(), auth, HashMap::new(), headers, addr)
}

fn upgrade(
    ws: WebSocketUpgrade,
    hub: Arc<Hub>,
    auth: AuthInfo,
    metadata: HashMap<String, String>,
    headers: HeaderMap,
    addr: SocketAddr,
) -> Response {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    ws.max_message_size(client::MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| {
            connection::handle_connection(
                socket,
                hub,
                auth.authenticated,
                metadata,
                addr.to_string(),
                user_agent,
            )
        })
}
