/// Weather poller
///
/// Fetches the upstream timeline forecast for the configured station
/// coordinates - once at startup, then every 30 minutes - caches the
/// latest snapshot in memory, persists it best-effort, and broadcasts a
/// `weather_update` on the dashboard hub. Fetch failures only affect
/// cache freshness; they are never surfaced at the API.
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use uuid::Uuid;

use crate::config::with_config;
use crate::database::Database;
use crate::logger::{self, LogTag};
use crate::models::Weather;
use crate::webserver::ws::{EventContent, Hub};

/// Time between fetch cycles
pub const FETCH_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Upstream request timeout
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Periodic weather fetch, cache, and broadcast
pub struct WeatherService {
    hub: Arc<Hub>,
    db: Arc<Database>,
    client: reqwest::Client,
    current: RwLock<Option<Weather>>,
    shutdown: Notify,
    handle: StdMutex<Option<JoinHandle<()>>>,
}

impl WeatherService {
    pub fn new(hub: Arc<Hub>, db: Arc<Database>) -> Arc<WeatherService> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();

        Arc::new(WeatherService {
            hub,
            db,
            client,
            current: RwLock::new(None),
            shutdown: Notify::new(),
            handle: StdMutex::new(None),
        })
    }

    /// Start the poller: one immediate cycle, then every 30 minutes
    pub fn start(self: &Arc<Self>) {
        logger::info(LogTag::Weather, "Starting weather service");

        let service = self.clone();
        let handle = tokio::spawn(async move {
            service.fetch_and_broadcast().await;

            let mut ticker = interval_at(Instant::now() + FETCH_INTERVAL, FETCH_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        service.fetch_and_broadcast().await;
                    }
                    _ = service.shutdown.notified() => {
                        logger::info(LogTag::Weather, "Weather service shutting down");
                        return;
                    }
                }
            }
        });

        if let Ok(mut slot) = self.handle.lock() {
            *slot = Some(handle);
        }
    }

    /// Stop the poller
    ///
    /// Returns only after the polling task observed the shutdown signal
    /// and exited.
    pub async fn stop(&self) {
        logger::info(LogTag::Weather, "Stopping weather service");
        self.shutdown.notify_waiters();

        let handle = match self.handle.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Latest cached snapshot
    pub async fn current_weather(&self) -> Option<Weather> {
        self.current.read().await.clone()
    }

    /// Build the upstream timeline URL for the station coordinates
    ///
    /// None when no API key is configured, which leaves the poller idle.
    pub fn api_url(&self, lat: f64, lng: f64) -> Option<String> {
        let api_key = with_config(|cfg| cfg.weather.api_key.clone());
        if api_key.is_empty() {
            return None;
        }

        let today = Utc::now();
        let end_date = today + ChronoDuration::days(3);

        Some(format!(
            "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline/{},{}/{}/{}?unitGroup=us&elements=datetime,tempmax,tempmin,temp,humidity,precipprob,windspeed,winddir,conditions,description,icon&key={}&contentType=json",
            lat,
            lng,
            today.format("%Y-%m-%d"),
            end_date.format("%Y-%m-%d"),
            api_key,
        ))
    }

    /// One fetch cycle: fetch, cache, persist, broadcast
    async fn fetch_and_broadcast(&self) {
        let (lat, lng) = with_config(|cfg| (cfg.weather.station_lat, cfg.weather.station_lon));

        let url = match self.api_url(lat, lng) {
            Some(url) => url,
            None => {
                logger::warning(
                    LogTag::Weather,
                    "WEATHER_API_KEY not set - skipping weather fetch",
                );
                return;
            }
        };

        logger::info(LogTag::Weather, "Fetching weather data");

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                logger::error(LogTag::Weather, &format!("Failed to fetch weather data: {}", e));
                return;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            logger::error(
                LogTag::Weather,
                &format!("Weather API returned non-OK status: {}", response.status()),
            );
            return;
        }

        let mut weather: Weather = match response.json().await {
            Ok(weather) => weather,
            Err(e) => {
                logger::error(LogTag::Weather, &format!("Failed to decode weather data: {}", e));
                return;
            }
        };

        weather.id = Uuid::new_v4().to_string();
        weather.last_updated = Utc::now().timestamp();

        {
            let mut current = self.current.write().await;
            *current = Some(weather.clone());
        }

        // Persist off the fetch path; failures are logged, not fatal
        let db = self.db.clone();
        let to_store = weather.clone();
        tokio::spawn(async move {
            match db.save_weather(&to_store) {
                Ok(()) => logger::debug(
                    LogTag::Weather,
                    &format!("Weather data saved with id {}", to_store.id),
                ),
                Err(e) => logger::error(
                    LogTag::Weather,
                    &format!("Failed to save weather data: {}", e),
                ),
            }
        });

        self.hub
            .broadcast_event(
                "weather_update",
                EventContent::Json(serde_json::to_value(&weather).unwrap_or_default()),
            )
            .await;
        logger::info(LogTag::Weather, "Weather data updated and broadcast to clients");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webserver::ws::HubType;

    fn service() -> Arc<WeatherService> {
        let hub = Hub::new(HubType::Dashboard);
        let db = Arc::new(Database::open_in_memory().unwrap());
        WeatherService::new(hub, db)
    }

    #[test]
    fn test_poll_cadence_constants() {
        assert_eq!(FETCH_INTERVAL, Duration::from_secs(30 * 60));
        assert_eq!(FETCH_TIMEOUT, Duration::from_secs(10));
    }

    #[test]
    fn test_api_url_requires_key() {
        // API key comes from the environment; the test env leaves it
        // unset, so the poller stays idle
        let service = service();
        if std::env::var("WEATHER_API_KEY").is_err() {
            assert!(service.api_url(39.19, -96.6).is_none());
        }
    }

    #[tokio::test]
    async fn test_start_stop_contract() {
        let service = service();
        assert!(service.current_weather().await.is_none());

        service.start();
        // Stop must return even while a cycle may be in flight
        service.stop().await;

        // Stopping twice is harmless
        service.stop().await;
    }

    #[tokio::test]
    async fn test_cache_round_trip() {
        let service = service();
        {
            let mut current = service.current.write().await;
            *current = Some(Weather {
                id: "w1".to_string(),
                ..Default::default()
            });
        }
        assert_eq!(service.current_weather().await.unwrap().id, "w1");
    }
}
