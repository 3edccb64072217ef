use rusqlite::params;

use super::connection::{lock, Database};
use crate::errors::AlertHubError;
use crate::models::Weather;

impl Database {
    /// Store a weather record, replacing any previous snapshot with the
    /// same id
    pub fn save_weather(&self, weather: &Weather) -> Result<(), AlertHubError> {
        let data = serde_json::to_string(weather)
            .map_err(|e| AlertHubError::Database(e.to_string()))?;

        let conn = lock(&self.conn);
        conn.execute(
            "INSERT INTO weather (id, lat, lon, data, last_updated)
             VALUES (?1, ?2, ?3, ?4, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
             ON CONFLICT(id) DO UPDATE SET
                 data = ?4,
                 lat = ?2,
                 lon = ?3,
                 last_updated = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![weather.id, weather.latitude, weather.longitude, data],
        )?;
        Ok(())
    }

    /// Retrieve the most recent weather snapshot, if any
    pub fn latest_weather(&self) -> Result<Option<Weather>, AlertHubError> {
        let conn = lock(&self.conn);
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM weather ORDER BY last_updated DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        match data {
            Some(json) => {
                let weather = serde_json::from_str(&json)
                    .map_err(|e| AlertHubError::Database(e.to_string()))?;
                Ok(Some(weather))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_fetch_latest() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.latest_weather().unwrap().is_none());

        let weather = Weather {
            id: "w1".to_string(),
            latitude: 39.19,
            longitude: -96.6,
            timezone: "America/Chicago".to_string(),
            last_updated: 1_700_000_000,
            ..Default::default()
        };
        db.save_weather(&weather).unwrap();

        let latest = db.latest_weather().unwrap().unwrap();
        assert_eq!(latest.id, "w1");
        assert_eq!(latest.timezone, "America/Chicago");
    }

    #[test]
    fn test_same_id_replaces_data() {
        let db = Database::open_in_memory().unwrap();
        let mut weather = Weather {
            id: "w1".to_string(),
            last_updated: 1,
            ..Default::default()
        };
        db.save_weather(&weather).unwrap();

        weather.last_updated = 2;
        db.save_weather(&weather).unwrap();

        let latest = db.latest_weather().unwrap().unwrap();
        assert_eq!(latest.last_updated, 2);
    }
}
