/// HTTP and WebSocket serving surface
pub mod auth;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod utils;
pub mod ws;

pub use server::{start_server, trigger_shutdown};
pub use state::AppState;
