/// Weather route - serves the in-memory cache
use axum::{extract::State, response::Response, routing::get, Router};
use std::sync::Arc;

use crate::webserver::state::AppState;
use crate::webserver::utils::{empty_success, success_response};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/weather", get(get_weather))
}

/// GET /weather - latest cached snapshot, null data before the first
/// successful fetch
async fn get_weather(State(state): State<Arc<AppState>>) -> Response {
    match state.weather.current_weather().await {
        Some(weather) => success_response(&weather),
        None => empty_success("No weather data available"),
    }
}
