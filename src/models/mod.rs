/// Core domain models and wire contracts
///
/// Field names follow the JSON wire format consumed by the dashboards;
/// optional string fields serialize only when present.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod hydrant;
mod weather;

pub use hydrant::{BatchUploadProgress, FailedItem, Hydrant, HydrantBoundsQuery};
pub use weather::{Weather, WeatherAlert, WeatherDay, WeatherHour};

/// A complete alert with agency information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub agency: Agency,
    pub alert: AlertDetails,
}

/// Agency information attached to every alert
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Agency {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub timezone: String,
}

/// Detailed alert information
///
/// Leaf strings are owned values, so `clone()` yields a fully independent
/// copy with no aliasing through the pagegroups list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertDetails {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_identifiers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_coords: Option<String>,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pagegroups: Vec<String>,
    #[serde(default)]
    pub stamp: f64,
    #[serde(default)]
    pub status: String,
}

/// Valid alert status values
pub const VALID_ALERT_STATUSES: [&str; 4] = ["new", "acknowledged", "resolved", "closed"];

/// Default status assigned to freshly ingested alerts
pub const DEFAULT_ALERT_STATUS: &str = "new";

/// A log entry in the audit pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique identifier (request id, or message id + timestamp disambiguator)
    pub id: String,
    /// Log type: api_request, ws_message, ...
    #[serde(rename = "type")]
    pub entry_type: String,
    /// HTTP method or WEBSOCKET
    pub method: String,
    /// API path or websocket endpoint
    pub path: String,
    /// Request/message body
    pub body: Value,
    /// HTTP headers or message metadata
    pub headers: Value,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// Client IP or WebSocket client ID
    pub source_ip: String,
    /// For WebSocket messages
    pub client_id: String,
    /// For WebSocket events: new_alert, heartbeat, ...
    pub event_type: String,
    /// incoming, outgoing, client, server, server-broadcast, server-direct
    pub direction: String,
    /// Request duration in milliseconds (API requests only)
    #[serde(rename = "duration_ms")]
    pub duration_ms: Option<i64>,
    /// HTTP status code (API requests only)
    pub status_code: Option<i64>,
}

/// A lightweight log entry projection without body and headers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntrySummary {
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub method: String,
    pub path: String,
    pub timestamp: DateTime<Utc>,
    pub source_ip: String,
    pub client_id: String,
    pub event_type: String,
    pub direction: String,
    #[serde(rename = "duration_ms", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i64>,
}

/// A structured message for WebSocket communication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketMessage {
    /// Message type (e.g. new_alert, ping, pong, heartbeat)
    #[serde(rename = "type", default)]
    pub message_type: String,
    /// Message payload
    #[serde(default)]
    pub content: Value,
    /// Unique message ID
    #[serde(default)]
    pub id: String,
    /// Message timestamp
    #[serde(default = "Utc::now")]
    pub time: DateTime<Utc>,
}

/// Standard API response envelope
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_deserializes_wire_format() {
        let raw = r#"{
            "agency": {"name": "APD", "id": 1, "timezone": "UTC"},
            "alert": {
                "id": "A100",
                "description": "Medical - Chest Pain",
                "details": "patient 72M",
                "lat": 39.1,
                "lon": -96.6,
                "pagegroups": ["STATION1"],
                "stamp": 1.0,
                "status": "new"
            }
        }"#;

        let alert: Alert = serde_json::from_str(raw).unwrap();
        assert_eq!(alert.agency.name, "APD");
        assert_eq!(alert.alert.id, "A100");
        assert_eq!(alert.alert.details.as_deref(), Some("patient 72M"));
        assert_eq!(alert.alert.pagegroups, vec!["STATION1"]);
        assert!(alert.alert.city.is_none());
    }

    #[test]
    fn test_alert_absent_optionals_stay_absent_on_wire() {
        let alert = Alert {
            agency: Agency::default(),
            alert: AlertDetails {
                id: "A1".to_string(),
                status: "new".to_string(),
                ..Default::default()
            },
        };

        let json = serde_json::to_value(&alert).unwrap();
        let details = json.get("alert").unwrap();
        assert!(details.get("city").is_none());
        assert!(details.get("details").is_none());
        assert!(details.get("pagegroups").is_none());
        assert_eq!(details.get("id").unwrap(), "A1");
    }

    #[test]
    fn test_websocket_message_parses_with_missing_fields() {
        let msg: WebSocketMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg.message_type, "ping");
        assert_eq!(msg.content, Value::Null);
        assert!(msg.id.is_empty());
    }
}
