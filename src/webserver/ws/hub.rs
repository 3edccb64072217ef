/// Typed WebSocket hubs - multiplexer and broadcaster
///
/// Each hub owns the set of live clients on one logical channel and is
/// the only place that mutates it. Membership changes and broadcasts all
/// go through the client map; per-client send queues are bounded and
/// enqueues never block. A client whose queue is full at broadcast time
/// is evicted - closing its queue and removing it from the set is the
/// system's sole backpressure policy for slow consumers.
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::logger::{self, LogTag};
use crate::models::{Alert, WebSocketMessage};
use crate::redaction;

use super::client::SEND_QUEUE_CAPACITY;

// ============================================================================
// HUB TYPES
// ============================================================================

/// Unique per-connection client id
pub type ClientId = String;

/// Callback invoked for every loggable message that passes through a hub
pub type LogMessageCallback = dyn Fn(&WebSocketMessage, &str, &str) + Send + Sync;

/// The three hub identities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubType {
    /// Alerts, weather, and aggregate events
    Dashboard,
    /// Refresh/redirect commands for control clients
    ClientControl,
    /// Audit log stream
    Logs,
}

impl HubType {
    pub fn code(&self) -> &'static str {
        match self {
            HubType::Dashboard => "dashboard",
            HubType::ClientControl => "client",
            HubType::Logs => "logs",
        }
    }
}

impl std::fmt::Display for HubType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Broadcast payload
///
/// Alerts keep their type so the `new_alert` path can apply per-recipient
/// redaction; everything else is opaque JSON.
#[derive(Debug, Clone)]
pub enum EventContent {
    Alert(Alert),
    Json(Value),
}

impl EventContent {
    fn into_value(self) -> Value {
        match self {
            EventContent::Alert(alert) => serde_json::to_value(alert).unwrap_or(Value::Null),
            EventContent::Json(value) => value,
        }
    }
}

// ============================================================================
// CLIENT RECORDS
// ============================================================================

/// Shared per-connection counters and identity
///
/// Updated by the read/write pumps, read by the hub.
#[derive(Debug)]
pub struct ClientStats {
    pub connected_at: DateTime<Utc>,
    pub remote_addr: String,
    pub user_agent: String,
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    /// Epoch seconds of the last inbound activity
    pub last_activity: AtomicI64,
    /// Epoch seconds of the last heartbeat written
    pub last_heartbeat: AtomicI64,
}

impl ClientStats {
    pub fn new(remote_addr: String, user_agent: String) -> Arc<ClientStats> {
        let now = Utc::now().timestamp();
        Arc::new(ClientStats {
            connected_at: Utc::now(),
            remote_addr,
            user_agent,
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            last_activity: AtomicI64::new(now),
            last_heartbeat: AtomicI64::new(0),
        })
    }

    pub fn record_activity(&self) {
        self.last_activity.store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.record_activity();
    }
}

/// Hub-side handle for one registered client
///
/// Holds the only sender for the client's bounded queue; dropping the
/// handle is what closes the queue, so removal from the map closes it
/// exactly once.
struct ClientHandle {
    sender: mpsc::Sender<WebSocketMessage>,
    authenticated: bool,
    metadata: HashMap<String, String>,
    stats: Arc<ClientStats>,
}

// ============================================================================
// HUB
// ============================================================================

/// A typed broadcaster owning the client set of one channel
pub struct Hub {
    hub_type: HubType,
    clients: RwLock<HashMap<ClientId, ClientHandle>>,
    log_callback: RwLock<Option<Arc<LogMessageCallback>>>,
}

impl Hub {
    pub fn new(hub_type: HubType) -> Arc<Hub> {
        Arc::new(Hub {
            hub_type,
            clients: RwLock::new(HashMap::new()),
            log_callback: RwLock::new(None),
        })
    }

    pub fn hub_type(&self) -> HubType {
        self.hub_type
    }

    /// Install the message audit callback
    pub async fn set_log_message_callback(&self, callback: Arc<LogMessageCallback>) {
        *self.log_callback.write().await = Some(callback);
    }

    /// Register a new client and return its id plus the queue receiver
    pub async fn register_client(
        &self,
        authenticated: bool,
        metadata: HashMap<String, String>,
        stats: Arc<ClientStats>,
    ) -> (ClientId, mpsc::Receiver<WebSocketMessage>) {
        let client_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(SEND_QUEUE_CAPACITY);

        let handle = ClientHandle {
            sender: tx,
            authenticated,
            metadata,
            stats,
        };

        let mut clients = self.clients.write().await;
        clients.insert(client_id.clone(), handle);
        logger::info(
            LogTag::Websocket,
            &format!(
                "Client {} registered with {} hub (active={})",
                client_id,
                self.hub_type,
                clients.len()
            ),
        );

        (client_id, rx)
    }

    /// Remove a client, closing its send queue
    pub async fn unregister_client(&self, client_id: &str) {
        let mut clients = self.clients.write().await;
        if let Some(handle) = clients.remove(client_id) {
            logger::info(
                LogTag::Websocket,
                &format!(
                    "Client {} unregistered from {} hub (sent={}, received={}, active={})",
                    client_id,
                    self.hub_type,
                    handle.stats.messages_sent.load(Ordering::Relaxed),
                    handle.stats.messages_received.load(Ordering::Relaxed),
                    clients.len()
                ),
            );
        }
    }

    /// Number of connected clients
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Broadcast a structured event to all clients
    ///
    /// `new_alert` events carrying an alert take the per-recipient path
    /// so unauthenticated recipients receive a redacted copy; every other
    /// event is fanned out uniformly.
    pub async fn broadcast_event(&self, event_type: &str, content: EventContent) {
        self.broadcast_event_filtered(event_type, content, None).await;
    }

    /// Like broadcast_event, but filtered to clients whose `station`
    /// metadata matches. An empty station matches all clients. Only
    /// meaningful on the dashboard hub.
    pub async fn broadcast_event_to_station(
        &self,
        event_type: &str,
        content: EventContent,
        station: &str,
    ) {
        if self.hub_type != HubType::Dashboard {
            logger::warning(
                LogTag::Websocket,
                "Attempted to broadcast station-specific event on non-dashboard hub",
            );
            return;
        }
        self.broadcast_event_filtered(event_type, content, Some(station)).await;
    }

    async fn broadcast_event_filtered(
        &self,
        event_type: &str,
        content: EventContent,
        station: Option<&str>,
    ) {
        match content {
            EventContent::Alert(alert) if event_type == "new_alert" => {
                self.fan_out_alert(event_type, &alert, station).await;
            }
            content => {
                let msg = WebSocketMessage::event(event_type, content.into_value());
                self.log_message(&msg, "server-broadcast", "all").await;
                self.broadcast(msg, station).await;
            }
        }
    }

    /// Per-recipient fan-out for sensitive alert events
    ///
    /// Authenticated recipients receive the original alert; everyone else
    /// receives a redacted deep copy. Each recipient gets its own message
    /// id. Enqueue is non-blocking; a full queue evicts the recipient.
    async fn fan_out_alert(&self, event_type: &str, alert: &Alert, station: Option<&str>) {
        let mut clients = self.clients.write().await;
        let mut evicted = Vec::new();

        for (client_id, handle) in clients.iter() {
            if skip_for_station(station, handle.metadata.get("station")) {
                continue;
            }

            let payload = if handle.authenticated {
                alert.clone()
            } else {
                redaction::redact_alert(alert)
            };

            let msg = WebSocketMessage::event(
                event_type,
                serde_json::to_value(&payload).unwrap_or(Value::Null),
            );
            self.log_message(&msg, "server-direct", client_id).await;

            if handle.sender.try_send(msg).is_err() {
                evicted.push(client_id.clone());
            }
        }

        for client_id in evicted {
            clients.remove(&client_id);
            logger::info(
                LogTag::Websocket,
                &format!("Client {} removed due to send buffer full", client_id),
            );
        }
    }

    /// Uniform fan-out of one message to every (station-matching) client
    async fn broadcast(&self, message: WebSocketMessage, station: Option<&str>) {
        let mut clients = self.clients.write().await;
        let mut evicted = Vec::new();

        for (client_id, handle) in clients.iter() {
            if skip_for_station(station, handle.metadata.get("station")) {
                continue;
            }

            match handle.sender.try_send(message.clone()) {
                Ok(_) => {}
                Err(mpsc::error::TrySendError::Full(_)) => evicted.push(client_id.clone()),
                Err(mpsc::error::TrySendError::Closed(_)) => evicted.push(client_id.clone()),
            }
        }

        for client_id in evicted {
            clients.remove(&client_id);
            logger::info(
                LogTag::Websocket,
                &format!("Client {} removed due to send buffer full", client_id),
            );
        }
    }

    /// Send one message to one client
    ///
    /// Used for read-pump replies (pong, echo, error). Overflow evicts
    /// exactly like the broadcast path.
    pub async fn send_to_client(&self, client_id: &str, message_type: &str, content: Value) {
        let msg = WebSocketMessage::event(message_type, content);

        let mut clients = self.clients.write().await;
        let overflowed = match clients.get(client_id) {
            Some(handle) => {
                self.log_message(&msg, "server-direct", client_id).await;
                handle.sender.try_send(msg).is_err()
            }
            None => false,
        };

        if overflowed {
            clients.remove(client_id);
            logger::info(
                LogTag::Websocket,
                &format!("Client {} removed due to send buffer full", client_id),
            );
        }
    }

    /// Report an inbound client message to the audit callback
    pub async fn log_inbound(&self, message: &WebSocketMessage, client_id: &str) {
        self.log_message(message, "client", client_id).await;
    }

    /// Invoke the audit callback, skipping `new_log` to prevent recursion
    async fn log_message(&self, message: &WebSocketMessage, source: &str, client_id: &str) {
        if message.message_type == "new_log" {
            return;
        }
        if let Some(callback) = self.log_callback.read().await.as_ref() {
            callback(message, source, client_id);
        }
    }
}

/// Station filtering: clients without a station always match
fn skip_for_station(wanted: Option<&str>, client_station: Option<&String>) -> bool {
    match (wanted, client_station) {
        (Some(wanted), Some(station)) => {
            !wanted.is_empty() && !station.is_empty() && station != wanted
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Agency, AlertDetails};
    use crate::redaction::REDACTED;
    use serde_json::json;

    fn test_stats() -> Arc<ClientStats> {
        ClientStats::new("127.0.0.1:9999".to_string(), "test-agent".to_string())
    }

    fn sample_alert() -> Alert {
        Alert {
            agency: Agency {
                name: "APD".to_string(),
                id: 1,
                timezone: "UTC".to_string(),
            },
            alert: AlertDetails {
                id: "A1".to_string(),
                description: Some("Medical - Chest Pain".to_string()),
                details: Some("patient 72M".to_string()),
                city: Some("Manhattan".to_string()),
                lat: 39.1,
                lon: -96.6,
                stamp: 1.0,
                status: "new".to_string(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_registration_lifecycle() {
        let hub = Hub::new(HubType::Dashboard);

        let (id1, _rx1) = hub.register_client(true, HashMap::new(), test_stats()).await;
        let (id2, _rx2) = hub.register_client(false, HashMap::new(), test_stats()).await;
        assert_ne!(id1, id2);
        assert_eq!(hub.client_count().await, 2);

        hub.unregister_client(&id1).await;
        assert_eq!(hub.client_count().await, 1);

        // Double unregister is a no-op
        hub.unregister_client(&id1).await;
        assert_eq!(hub.client_count().await, 1);
    }

    #[tokio::test]
    async fn test_uniform_broadcast() {
        let hub = Hub::new(HubType::Dashboard);
        let (_id, mut rx) = hub.register_client(true, HashMap::new(), test_stats()).await;

        hub.broadcast_event("weather_update", EventContent::Json(json!({"temp": 71.0})))
            .await;

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.message_type, "weather_update");
        assert_eq!(msg.content, json!({"temp": 71.0}));
    }

    #[tokio::test]
    async fn test_new_alert_fan_out_cardinality_and_redaction() {
        let hub = Hub::new(HubType::Dashboard);
        let (_a, mut rx_auth) = hub.register_client(true, HashMap::new(), test_stats()).await;
        let (_b, mut rx_anon) = hub.register_client(false, HashMap::new(), test_stats()).await;

        let alert = sample_alert();
        hub.broadcast_event("new_alert", EventContent::Alert(alert.clone()))
            .await;

        let got_auth = rx_auth.recv().await.unwrap();
        let got_anon = rx_anon.recv().await.unwrap();

        // Exactly one message each
        assert!(rx_auth.try_recv().is_err());
        assert!(rx_anon.try_recv().is_err());

        // Distinct per-recipient message ids
        assert_ne!(got_auth.id, got_anon.id);

        let auth_details = got_auth.content["alert"]["details"].as_str().unwrap();
        assert_eq!(auth_details, "patient 72M");

        // Partial redaction via the "med" secondary rule
        let anon_alert = &got_anon.content["alert"];
        assert_eq!(anon_alert["details"], REDACTED);
        assert_eq!(anon_alert["city"], REDACTED);
        assert_eq!(anon_alert["lat"], 0.0);
        assert_eq!(anon_alert["lon"], 0.0);
    }

    #[tokio::test]
    async fn test_alert_updated_is_uniform_and_unredacted() {
        let hub = Hub::new(HubType::Dashboard);
        let (_b, mut rx_anon) = hub.register_client(false, HashMap::new(), test_stats()).await;

        hub.broadcast_event("alert_updated", EventContent::Alert(sample_alert()))
            .await;

        let got = rx_anon.recv().await.unwrap();
        assert_eq!(got.message_type, "alert_updated");
        assert_eq!(got.content["alert"]["details"], "patient 72M");
    }

    #[tokio::test]
    async fn test_backpressure_eviction() {
        let hub = Hub::new(HubType::Dashboard);
        // A client that never drains its queue, and one that does
        let (_stuck, mut stuck_rx) =
            hub.register_client(true, HashMap::new(), test_stats()).await;
        let (_healthy, mut healthy_rx) =
            hub.register_client(true, HashMap::new(), test_stats()).await;

        let total = SEND_QUEUE_CAPACITY + 1;
        let mut healthy_count = 0;
        for _ in 0..total {
            hub.broadcast_event("new_alert", EventContent::Alert(sample_alert()))
                .await;
            while healthy_rx.try_recv().is_ok() {
                healthy_count += 1;
            }
        }

        // The stuck client was evicted on the overflowing broadcast; the
        // draining client received all of them
        assert_eq!(hub.client_count().await, 1);
        assert_eq!(healthy_count, total);

        // The evicted client's queue is closed: it drains what was
        // buffered, then ends
        let mut drained = 0;
        while stuck_rx.recv().await.is_some() {
            drained += 1;
        }
        assert_eq!(drained, SEND_QUEUE_CAPACITY);
    }

    #[tokio::test]
    async fn test_evicted_client_receives_no_later_messages() {
        let hub = Hub::new(HubType::Dashboard);
        let (_id, rx) = hub.register_client(true, HashMap::new(), test_stats()).await;

        // Fill the queue and trigger eviction
        for _ in 0..=SEND_QUEUE_CAPACITY {
            hub.broadcast_event("refresh", EventContent::Json(json!({}))).await;
        }
        assert_eq!(hub.client_count().await, 0);

        hub.broadcast_event("redirect", EventContent::Json(json!({"after": true})))
            .await;

        // Drain everything that was buffered before eviction; nothing
        // broadcast after eviction may appear
        let mut rx = rx;
        let mut seen_after = false;
        while let Some(msg) = rx.recv().await {
            if msg.message_type == "redirect" {
                seen_after = true;
            }
        }
        assert!(!seen_after);
    }

    #[tokio::test]
    async fn test_station_filtering() {
        let hub = Hub::new(HubType::Dashboard);

        let mut station1 = HashMap::new();
        station1.insert("station".to_string(), "st1".to_string());
        let (_a, mut rx1) = hub.register_client(true, station1, test_stats()).await;

        let mut station2 = HashMap::new();
        station2.insert("station".to_string(), "st2".to_string());
        let (_b, mut rx2) = hub.register_client(true, station2, test_stats()).await;

        // No station metadata: receives everything
        let (_c, mut rx3) = hub.register_client(true, HashMap::new(), test_stats()).await;

        hub.broadcast_event_to_station("refresh", EventContent::Json(json!({})), "st1")
            .await;

        assert_eq!(rx1.recv().await.unwrap().message_type, "refresh");
        assert!(rx2.try_recv().is_err());
        assert_eq!(rx3.recv().await.unwrap().message_type, "refresh");

        // Empty station broadcasts to everyone
        hub.broadcast_event_to_station("redirect", EventContent::Json(json!({})), "")
            .await;
        assert_eq!(rx1.recv().await.unwrap().message_type, "redirect");
        assert_eq!(rx2.recv().await.unwrap().message_type, "redirect");
        assert_eq!(rx3.recv().await.unwrap().message_type, "redirect");
    }

    #[tokio::test]
    async fn test_station_broadcast_rejected_on_other_hubs() {
        let hub = Hub::new(HubType::Logs);
        let (_a, mut rx) = hub.register_client(true, HashMap::new(), test_stats()).await;

        hub.broadcast_event_to_station("refresh", EventContent::Json(json!({})), "st1")
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_log_callback_sources_and_filtering() {
        use std::sync::Mutex;

        let hub = Hub::new(HubType::Dashboard);
        let seen: Arc<Mutex<Vec<(String, String, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        hub.set_log_message_callback(Arc::new(move |msg, source, client_id| {
            seen_cb.lock().unwrap().push((
                msg.message_type.clone(),
                source.to_string(),
                client_id.to_string(),
            ));
        }))
        .await;

        let (id, _rx) = hub.register_client(false, HashMap::new(), test_stats()).await;

        hub.broadcast_event("weather_update", EventContent::Json(json!({})))
            .await;
        hub.broadcast_event("new_alert", EventContent::Alert(sample_alert()))
            .await;
        hub.broadcast_event("new_log", EventContent::Json(json!({}))).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], ("weather_update".to_string(), "server-broadcast".to_string(), "all".to_string()));
        assert_eq!(seen[1].0, "new_alert");
        assert_eq!(seen[1].1, "server-direct");
        assert_eq!(seen[1].2, id);
    }
}
