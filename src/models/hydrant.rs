use serde::{Deserialize, Serialize};

/// A fire hydrant on the map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hydrant {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub hydrant_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nozzles: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_rate: Option<f64>,
    /// red, orange, green, blue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_status: Option<String>,
    /// Epoch seconds, set on first insert
    #[serde(default)]
    pub created_at: f64,
    /// Epoch seconds, set on every write
    #[serde(default)]
    pub updated_at: f64,
}

/// One failed item in a batch upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedItem {
    pub index: usize,
    pub error: String,
}

/// Progress of the singleton batch upload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchUploadProgress {
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    /// Percentage 0-100
    pub progress: f64,
    pub in_progress: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_items: Vec<FailedItem>,
}

/// Geographic bounds for querying hydrants
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HydrantBoundsQuery {
    pub north_lat: f64,
    pub south_lat: f64,
    pub east_lng: f64,
    pub west_lng: f64,
}
