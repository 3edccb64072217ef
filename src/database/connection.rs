use anyhow::{Context, Result};
use rusqlite::Connection;
use std::sync::Mutex;
use std::time::Duration;

use crate::logger::{self, LogTag};

/// Main database connection wrapper
///
/// All repository methods serialize on the connection mutex; sqlite calls
/// are local and short, so the mutex is the layer's only synchronization.
pub struct Database {
    pub(crate) conn: Mutex<Connection>,
    pub(crate) spatial_index: bool,
}

/// Connection attempts before giving up at startup
const OPEN_RETRIES: u32 = 5;
/// Pause between connection attempts
const OPEN_RETRY_DELAY: Duration = Duration::from_secs(2);

impl Database {
    /// Open a database and ensure the schema exists
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path))?;

        let mut db = Self {
            conn: Mutex::new(conn),
            spatial_index: false,
        };

        db.initialize_tables()?;
        Ok(db)
    }

    /// Open an in-memory database (tests)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;

        let mut db = Self {
            conn: Mutex::new(conn),
            spatial_index: false,
        };

        db.initialize_tables()?;
        Ok(db)
    }

    /// Open a database with retries, for startup against slow disks
    pub fn open_with_retries(db_path: &str) -> Result<Self> {
        let mut last_err = None;
        for attempt in 1..=OPEN_RETRIES {
            match Self::new(db_path) {
                Ok(db) => {
                    logger::info(
                        LogTag::Database,
                        &format!(
                            "Database connection established on attempt {}/{}",
                            attempt, OPEN_RETRIES
                        ),
                    );
                    return Ok(db);
                }
                Err(e) => {
                    logger::warning(
                        LogTag::Database,
                        &format!(
                            "Failed to open database (attempt {}/{}): {}",
                            attempt, OPEN_RETRIES, e
                        ),
                    );
                    last_err = Some(e);
                    std::thread::sleep(OPEN_RETRY_DELAY);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("database open failed")))
    }

    /// Initialize all required database tables
    fn initialize_tables(&mut self) -> Result<()> {
        logger::info(LogTag::Database, "Checking database schema...");

        {
            let conn = lock(&self.conn);
            self.create_alerts_table(&conn)?;
            self.create_logs_table(&conn)?;
            self.create_hydrants_table(&conn)?;
            self.create_weather_table(&conn)?;
        }

        // The spatial index needs the rtree module, which not every sqlite
        // build ships. Plain lat/lng indexes remain the fallback.
        self.spatial_index = self.try_create_spatial_index();
        if self.spatial_index {
            logger::info(LogTag::Database, "Hydrant spatial index enabled");
        } else {
            logger::warning(
                LogTag::Database,
                "Spatial index unavailable - using plain lat/lng indexes",
            );
        }

        logger::info(LogTag::Database, "Database schema is ready");
        Ok(())
    }

    /// Create the alerts table
    fn create_alerts_table(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS alerts (
                id TEXT PRIMARY KEY,
                agency_name TEXT NOT NULL,
                agency_id INTEGER NOT NULL,
                agency_timezone TEXT NOT NULL,
                alert_city TEXT,
                alert_coordinate_source TEXT,
                alert_cross_street TEXT,
                alert_custom_identifiers TEXT,
                alert_description TEXT,
                alert_details TEXT,
                alert_dispatch_coords TEXT,
                alert_lat REAL,
                alert_lon REAL,
                alert_map_address TEXT,
                alert_map_code TEXT,
                alert_place TEXT,
                alert_priority TEXT,
                alert_received TEXT,
                alert_source TEXT,
                alert_state TEXT,
                alert_unit TEXT,
                alert_units TEXT,
                alert_pagegroups TEXT NOT NULL DEFAULT '[]',
                alert_stamp REAL,
                status TEXT NOT NULL DEFAULT 'new',
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX IF NOT EXISTS alerts_status_idx ON alerts (status);
            CREATE INDEX IF NOT EXISTS alerts_agency_id_idx ON alerts (agency_id);
            CREATE INDEX IF NOT EXISTS alerts_received_idx ON alerts (alert_received);
            CREATE INDEX IF NOT EXISTS alerts_state_city_idx ON alerts (alert_state, alert_city);

            CREATE TRIGGER IF NOT EXISTS alerts_touch_updated_at
            AFTER UPDATE ON alerts
            BEGIN
                UPDATE alerts
                SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                WHERE id = new.id;
            END;",
        )?;
        Ok(())
    }

    /// Create the logs table
    fn create_logs_table(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS logs (
                id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                method TEXT NOT NULL,
                path TEXT NOT NULL,
                body TEXT,
                headers TEXT,
                timestamp TEXT NOT NULL,
                source_ip TEXT,
                client_id TEXT,
                event_type TEXT,
                direction TEXT,
                duration INTEGER,
                status_code INTEGER,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX IF NOT EXISTS logs_timestamp_idx ON logs (timestamp DESC);
            CREATE INDEX IF NOT EXISTS logs_type_idx ON logs (type);
            CREATE INDEX IF NOT EXISTS logs_method_idx ON logs (method);
            CREATE INDEX IF NOT EXISTS logs_event_type_idx ON logs (event_type);
            CREATE INDEX IF NOT EXISTS logs_client_id_idx ON logs (client_id);",
        )?;
        Ok(())
    }

    /// Create the hydrants table
    fn create_hydrants_table(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS hydrants (
                id TEXT PRIMARY KEY,
                type TEXT,
                nozzles INTEGER,
                flow_rate REAL,
                color TEXT,
                status TEXT,
                lat REAL NOT NULL,
                lng REAL NOT NULL,
                flow_status TEXT,
                created_at REAL NOT NULL,
                updated_at REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS hydrants_lat_idx ON hydrants (lat);
            CREATE INDEX IF NOT EXISTS hydrants_lng_idx ON hydrants (lng);",
        )?;
        Ok(())
    }

    /// Create the weather table
    fn create_weather_table(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS weather (
                id TEXT PRIMARY KEY,
                lat REAL NOT NULL,
                lon REAL NOT NULL,
                data TEXT NOT NULL,
                last_updated TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX IF NOT EXISTS weather_last_updated_idx ON weather (last_updated);",
        )?;
        Ok(())
    }

    /// Attempt to create the R*Tree shadow index plus sync triggers
    fn try_create_spatial_index(&self) -> bool {
        let conn = lock(&self.conn);
        conn.execute_batch(
            "CREATE VIRTUAL TABLE IF NOT EXISTS hydrants_rtree USING rtree(
                id,
                min_lat, max_lat,
                min_lng, max_lng
            );

            CREATE TRIGGER IF NOT EXISTS hydrants_rtree_insert
            AFTER INSERT ON hydrants
            BEGIN
                INSERT OR REPLACE INTO hydrants_rtree(id, min_lat, max_lat, min_lng, max_lng)
                VALUES (new.rowid, new.lat, new.lat, new.lng, new.lng);
            END;

            CREATE TRIGGER IF NOT EXISTS hydrants_rtree_update
            AFTER UPDATE ON hydrants
            BEGIN
                INSERT OR REPLACE INTO hydrants_rtree(id, min_lat, max_lat, min_lng, max_lng)
                VALUES (new.rowid, new.lat, new.lat, new.lng, new.lng);
            END;

            CREATE TRIGGER IF NOT EXISTS hydrants_rtree_delete
            AFTER DELETE ON hydrants
            BEGIN
                DELETE FROM hydrants_rtree WHERE id = old.rowid;
            END;",
        )
        .is_ok()
    }
}

/// Lock the connection, recovering from a poisoned mutex
///
/// A panic inside a query must not brick the repository; the connection
/// itself stays valid.
pub(crate) fn lock(conn: &Mutex<Connection>) -> std::sync::MutexGuard<'_, Connection> {
    match conn.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_bootstrap_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        // Re-running the full bootstrap must not fail
        {
            let conn = lock(&db.conn);
            db.create_alerts_table(&conn).unwrap();
            db.create_logs_table(&conn).unwrap();
            db.create_hydrants_table(&conn).unwrap();
            db.create_weather_table(&conn).unwrap();
        }
        db.try_create_spatial_index();
    }

    #[test]
    fn test_tables_exist_after_bootstrap() {
        let db = Database::open_in_memory().unwrap();
        let conn = lock(&db.conn);
        for table in ["alerts", "logs", "hydrants", "weather"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }
}
