use chrono::Utc;
use rusqlite::{params, Row};

use super::connection::{lock, Database};
use crate::errors::AlertHubError;
use crate::logger::{self, LogTag};
use crate::models::Alert;

const ALERT_COLUMNS: &str = "id, agency_name, agency_id, agency_timezone, \
     alert_city, alert_coordinate_source, alert_cross_street, alert_custom_identifiers, \
     alert_description, alert_details, alert_dispatch_coords, alert_lat, alert_lon, \
     alert_map_address, alert_map_code, alert_place, alert_priority, alert_received, \
     alert_source, alert_state, alert_unit, alert_units, alert_pagegroups, alert_stamp, status";

impl Database {
    /// Create a new alert and return its id
    ///
    /// Generates an `A{epoch_nanos}` id when the alert carries none.
    pub fn create_alert(&self, alert: &Alert) -> Result<String, AlertHubError> {
        let mut alert_id = alert.alert.id.clone();
        if alert_id.is_empty() {
            alert_id = format!("A{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());
        }

        let pagegroups = serde_json::to_string(&alert.alert.pagegroups)
            .map_err(|e| AlertHubError::Database(format!("failed to marshal pagegroups: {}", e)))?;

        let conn = lock(&self.conn);
        conn.execute(
            "INSERT INTO alerts (
                id, agency_name, agency_id, agency_timezone,
                alert_city, alert_coordinate_source, alert_cross_street, alert_custom_identifiers,
                alert_description, alert_details, alert_dispatch_coords, alert_lat, alert_lon,
                alert_map_address, alert_map_code, alert_place, alert_priority, alert_received,
                alert_source, alert_state, alert_unit, alert_units, alert_pagegroups, alert_stamp,
                status
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25
            )",
            params![
                alert_id,
                alert.agency.name,
                alert.agency.id,
                alert.agency.timezone,
                alert.alert.city,
                alert.alert.coordinate_source,
                alert.alert.cross_street,
                alert.alert.custom_identifiers,
                alert.alert.description,
                alert.alert.details,
                alert.alert.dispatch_coords,
                alert.alert.lat,
                alert.alert.lon,
                alert.alert.map_address,
                alert.alert.map_code,
                alert.alert.place,
                alert.alert.priority,
                alert.alert.received,
                alert.alert.source,
                alert.alert.state,
                alert.alert.unit,
                alert.alert.units,
                pagegroups,
                alert.alert.stamp,
                alert.alert.status,
            ],
        )?;

        Ok(alert_id)
    }

    /// Retrieve alerts with optional status filtering, newest first
    pub fn get_alerts(
        &self,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Alert>, AlertHubError> {
        let conn = lock(&self.conn);

        let mut alerts = Vec::new();
        match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM alerts WHERE status = ?1 \
                     ORDER BY updated_at DESC LIMIT ?2 OFFSET ?3",
                    ALERT_COLUMNS
                ))?;
                let rows = stmt.query_map(params![status, limit, offset], row_to_alert)?;
                for row in rows {
                    alerts.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM alerts ORDER BY updated_at DESC LIMIT ?1 OFFSET ?2",
                    ALERT_COLUMNS
                ))?;
                let rows = stmt.query_map(params![limit, offset], row_to_alert)?;
                for row in rows {
                    alerts.push(row?);
                }
            }
        }

        Ok(alerts)
    }

    /// Retrieve a single alert by id
    pub fn get_alert_by_id(&self, id: &str) -> Result<Alert, AlertHubError> {
        let conn = lock(&self.conn);
        let alert = conn.query_row(
            &format!("SELECT {} FROM alerts WHERE id = ?1", ALERT_COLUMNS),
            params![id],
            row_to_alert,
        )?;
        Ok(alert)
    }

    /// Update the status of an alert
    pub fn update_alert_status(&self, id: &str, status: &str) -> Result<(), AlertHubError> {
        let conn = lock(&self.conn);
        let affected = conn.execute(
            "UPDATE alerts SET status = ?1 WHERE id = ?2",
            params![status, id],
        )?;

        if affected == 0 {
            return Err(AlertHubError::NotFound("Alert not found".to_string()));
        }
        Ok(())
    }

    /// Delete an alert by id
    pub fn delete_alert(&self, id: &str) -> Result<(), AlertHubError> {
        let conn = lock(&self.conn);
        let affected = conn.execute("DELETE FROM alerts WHERE id = ?1", params![id])?;

        if affected == 0 {
            return Err(AlertHubError::NotFound("Alert not found".to_string()));
        }
        Ok(())
    }

    /// Count alerts with optional status filtering
    pub fn count_alerts(&self, status: Option<&str>) -> Result<i64, AlertHubError> {
        let conn = lock(&self.conn);
        let count = match status {
            Some(status) => conn.query_row(
                "SELECT COUNT(*) FROM alerts WHERE status = ?1",
                params![status],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM alerts", [], |row| row.get(0))?,
        };
        Ok(count)
    }
}

/// Map one alerts row into the domain model
fn row_to_alert(row: &Row<'_>) -> rusqlite::Result<Alert> {
    use crate::models::{Agency, AlertDetails};

    let pagegroups_json: String = row.get(22)?;
    let pagegroups = serde_json::from_str::<Vec<String>>(&pagegroups_json).unwrap_or_else(|e| {
        logger::warning(
            LogTag::Database,
            &format!("Failed to unmarshal pagegroups: {}", e),
        );
        Vec::new()
    });

    Ok(Alert {
        agency: Agency {
            name: row.get(1)?,
            id: row.get(2)?,
            timezone: row.get(3)?,
        },
        alert: AlertDetails {
            id: row.get(0)?,
            city: row.get(4)?,
            coordinate_source: row.get(5)?,
            cross_street: row.get(6)?,
            custom_identifiers: row.get(7)?,
            description: row.get(8)?,
            details: row.get(9)?,
            dispatch_coords: row.get(10)?,
            lat: row.get::<_, Option<f64>>(11)?.unwrap_or_default(),
            lon: row.get::<_, Option<f64>>(12)?.unwrap_or_default(),
            map_address: row.get(13)?,
            map_code: row.get(14)?,
            place: row.get(15)?,
            priority: row.get(16)?,
            received: row.get(17)?,
            source: row.get(18)?,
            state: row.get(19)?,
            unit: row.get(20)?,
            units: row.get(21)?,
            pagegroups,
            stamp: row.get::<_, Option<f64>>(23)?.unwrap_or_default(),
            status: row.get(24)?,
        },
    })
}
