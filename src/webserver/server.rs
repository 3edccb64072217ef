/// Axum webserver implementation
///
/// Main server lifecycle management including startup, shutdown, and
/// graceful termination. Port resolution precedence: CLI --port flag,
/// then SERVER_PORT, then the built-in default.
use axum::http::{HeaderValue, Method};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::arguments::get_arg_value;
use crate::config::with_config;
use crate::logger::{self, LogTag};
use crate::webserver::{middleware, routes, state::AppState};

pub(crate) const DEFAULT_HOST: &str = "0.0.0.0";
pub(crate) const DEFAULT_PORT: u16 = 8080;

/// Global shutdown notifier
static SHUTDOWN_NOTIFY: once_cell::sync::Lazy<Arc<Notify>> =
  once_cell::sync::Lazy::new(|| Arc::new(Notify::new()));

/// Signal the server to begin graceful shutdown
pub fn trigger_shutdown() {
  SHUTDOWN_NOTIFY.notify_waiters();
}

/// Resolve the port with precedence CLI > env > default
fn resolve_port() -> (u16, &'static str) {
  let cli_port = get_arg_value("--port").and_then(|p| p.parse().ok());
  let config_port = with_config(|cfg| cfg.server.port);
  resolve_port_from(cli_port, config_port)
}

fn resolve_port_from(cli_port: Option<u16>, config_port: u16) -> (u16, &'static str) {
  if let Some(port) = cli_port {
    return (port, "CLI");
  }
  if config_port > 0 {
    return (config_port, "config");
  }
  (DEFAULT_PORT, "default")
}

/// Build the CORS layer from the configured origin list
fn cors_layer() -> CorsLayer {
  let origins = with_config(|cfg| cfg.server.cors_allowed_origins.clone());

  let layer = CorsLayer::new()
    .allow_methods([
      Method::GET,
      Method::POST,
      Method::PUT,
      Method::DELETE,
      Method::OPTIONS,
    ])
    .allow_headers(Any);

  if origins.iter().any(|o| o == "*") {
    layer.allow_origin(Any)
  } else {
    let parsed: Vec<HeaderValue> = origins
      .iter()
      .filter_map(|o| o.parse().ok())
      .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
  }
}

/// Assemble the full application router
pub fn build_router(state: Arc<AppState>) -> Router {
  let write_timeout = with_config(|cfg| cfg.server.write_timeout);

  Router::new()
    .merge(routes::alerts::routes())
    .merge(routes::logs::routes())
    .merge(routes::hydrants::routes())
    .merge(routes::weather::routes())
    .merge(routes::websocket::routes())
    .layer(axum::middleware::from_fn(middleware::auth_context))
    .layer(axum::middleware::from_fn_with_state(
      state.clone(),
      middleware::audit,
    ))
    .layer(TimeoutLayer::new(write_timeout))
    .layer(cors_layer())
    .with_state(state)
}

/// Start the webserver and serve until shutdown is triggered
pub async fn start_server(state: Arc<AppState>) -> Result<(), String> {
  let (port, port_source) = resolve_port();
  let addr: SocketAddr = format!("{}:{}", DEFAULT_HOST, port)
    .parse()
    .map_err(|e| format!("Invalid address: {}", e))?;

  let app = build_router(state);

  let listener = TcpListener::bind(&addr)
    .await
    .map_err(|e| format!("Failed to bind {}: {}", addr, e))?;

  logger::info(
    LogTag::Webserver,
    &format!("Server listening on {} (port source: {})", addr, port_source),
  );

  let shutdown = SHUTDOWN_NOTIFY.clone();
  axum::serve(
    listener,
    app.into_make_service_with_connect_info::<SocketAddr>(),
  )
  .with_graceful_shutdown(async move {
    shutdown.notified().await;
    logger::info(LogTag::Webserver, "Shutting down server...");
  })
  .await
  .map_err(|e| format!("Server error: {}", e))
}
