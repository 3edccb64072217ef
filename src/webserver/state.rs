/// Shared application state for the webserver
///
/// References to core systems that route handlers and middleware need.
use std::sync::Arc;

use crate::database::Database;
use crate::hydrants::HydrantBatcher;
use crate::notification::NotificationService;
use crate::weather::WeatherService;
use crate::webserver::ws::Hub;

/// Shared application state passed to all route handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,

    /// Alerts, weather, and aggregate events
    pub dashboard_hub: Arc<Hub>,
    /// Refresh/redirect control channel
    pub client_hub: Arc<Hub>,
    /// Audit log stream
    pub logs_hub: Arc<Hub>,

    pub weather: Arc<WeatherService>,
    pub batcher: Arc<HydrantBatcher>,
    pub notifier: Arc<NotificationService>,
}
