use serde::{Deserialize, Serialize};

/// Weather alert issued by the upstream provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeatherAlert {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub ends: String,
    #[serde(default, rename = "endsEpoch")]
    pub ends_epoch: i64,
    #[serde(default)]
    pub onset: String,
    #[serde(default, rename = "onsetEpoch")]
    pub onset_epoch: i64,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub description: String,
}

/// One hour of conditions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeatherHour {
    #[serde(default)]
    pub conditions: String,
    #[serde(default)]
    pub datetime: String,
    #[serde(default)]
    pub humidity: f64,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub precipprob: f64,
    #[serde(default)]
    pub temp: f64,
    #[serde(default)]
    pub winddir: f64,
    #[serde(default)]
    pub windspeed: f64,
}

/// One forecast day
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeatherDay {
    #[serde(default)]
    pub datetime: String,
    #[serde(default)]
    pub conditions: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub hours: Vec<WeatherHour>,
    #[serde(default)]
    pub humidity: f64,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub precipprob: f64,
    #[serde(default)]
    pub temp: f64,
    #[serde(default)]
    pub tempmax: f64,
    #[serde(default)]
    pub tempmin: f64,
    #[serde(default)]
    pub winddir: f64,
    #[serde(default)]
    pub windspeed: f64,
}

/// Weather snapshot as distributed to dashboards
///
/// Field names mirror the upstream timeline payload so the decoded body
/// can be cached and broadcast without reshaping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Weather {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, rename = "resolvedAddress")]
    pub resolved_address: String,
    #[serde(default, rename = "currentConditions")]
    pub current_conditions: WeatherHour,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub tzoffset: f64,
    #[serde(default)]
    pub days: Vec<WeatherDay>,
    #[serde(default)]
    pub alerts: Vec<WeatherAlert>,
    #[serde(default, rename = "lastUpdated")]
    pub last_updated: i64,
}
