use chrono::Utc;
use rusqlite::{params, Row};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use super::connection::{lock, Database};
use crate::errors::AlertHubError;
use crate::logger::{self, LogTag};
use crate::models::{BatchUploadProgress, FailedItem, Hydrant, HydrantBoundsQuery};

const UPSERT_SQL: &str = "INSERT INTO hydrants (
        id, type, nozzles, flow_rate, color, status, lat, lng, flow_status, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
    ON CONFLICT(id) DO UPDATE SET
        type = ?2,
        nozzles = ?3,
        flow_rate = ?4,
        color = ?5,
        status = ?6,
        lat = ?7,
        lng = ?8,
        flow_status = ?9,
        updated_at = ?11";

const HYDRANT_COLUMNS: &str =
    "id, type, nozzles, flow_rate, color, status, lat, lng, flow_status, created_at, updated_at";

impl Database {
    /// Upsert a single hydrant and return its id
    ///
    /// Assigns a fresh UUID when the hydrant carries none; `created_at`
    /// is set on first insert, `updated_at` on every write.
    pub fn save_hydrant(&self, hydrant: &Hydrant) -> Result<String, AlertHubError> {
        let mut hydrant = hydrant.clone();
        stamp_hydrant(&mut hydrant, Utc::now().timestamp() as f64);

        let conn = lock(&self.conn);
        conn.execute(UPSERT_SQL, &hydrant_params(&hydrant)[..])?;
        Ok(hydrant.id)
    }

    /// Upsert many hydrants in one transaction, reporting progress
    ///
    /// The cancellation flag is polled between items; cancellation rolls
    /// the transaction back and emits a final snapshot. Per-item failures
    /// are collected without stopping the batch. The transaction commits
    /// only when every item was attempted.
    pub fn save_many_hydrants(
        &self,
        hydrants: &[Hydrant],
        cancel: &AtomicBool,
        progress: &dyn Fn(BatchUploadProgress),
    ) -> Result<Vec<String>, AlertHubError> {
        let total = hydrants.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let mut conn = lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(|e| AlertHubError::Database(format!("failed to begin transaction: {}", e)))?;

        let now = Utc::now().timestamp() as f64;
        let mut ids = Vec::with_capacity(total);
        let mut failed_items: Vec<FailedItem> = Vec::new();
        let mut cancelled_at = None;

        {
            let mut stmt = tx.prepare(UPSERT_SQL).map_err(|e| {
                AlertHubError::Database(format!("failed to prepare statement: {}", e))
            })?;

            for (i, hydrant) in hydrants.iter().enumerate() {
                if cancel.load(Ordering::Relaxed) {
                    cancelled_at = Some(i);
                    break;
                }

                let mut hydrant = hydrant.clone();
                stamp_hydrant(&mut hydrant, now);

                match stmt.execute(&hydrant_params(&hydrant)[..]) {
                    Ok(_) => ids.push(hydrant.id),
                    Err(e) => {
                        logger::warning(
                            LogTag::Hydrants,
                            &format!("Failed to save hydrant {}: {}", i, e),
                        );
                        failed_items.push(FailedItem {
                            index: i,
                            error: e.to_string(),
                        });
                    }
                }

                progress(BatchUploadProgress {
                    total,
                    processed: i + 1,
                    successful: ids.len(),
                    failed: failed_items.len(),
                    progress: percentage(i + 1, total),
                    in_progress: true,
                    failed_items: failed_items.clone(),
                });
            }
        }

        if let Some(i) = cancelled_at {
            let _ = tx.rollback();
            progress(BatchUploadProgress {
                total,
                processed: i,
                successful: ids.len(),
                failed: failed_items.len(),
                progress: percentage(i, total),
                in_progress: false,
                failed_items,
            });
            return Err(AlertHubError::Database(format!(
                "batch upload cancelled at hydrant {}",
                i
            )));
        }

        tx.commit()
            .map_err(|e| AlertHubError::Database(format!("failed to commit transaction: {}", e)))?;

        progress(BatchUploadProgress {
            total,
            processed: total,
            successful: ids.len(),
            failed: failed_items.len(),
            progress: 100.0,
            in_progress: false,
            failed_items,
        });

        Ok(ids)
    }

    /// Retrieve hydrants within geographic bounds
    pub fn get_hydrants_by_bounds(
        &self,
        bounds: &HydrantBoundsQuery,
    ) -> Result<Vec<Hydrant>, AlertHubError> {
        let conn = lock(&self.conn);

        let query = if self.spatial_index {
            format!(
                "SELECT {} FROM hydrants WHERE rowid IN (
                    SELECT id FROM hydrants_rtree
                    WHERE min_lat <= ?1 AND max_lat >= ?2 AND min_lng <= ?3 AND max_lng >= ?4
                )",
                HYDRANT_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM hydrants \
                 WHERE lat <= ?1 AND lat >= ?2 AND lng <= ?3 AND lng >= ?4",
                HYDRANT_COLUMNS
            )
        };

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(
            params![
                bounds.north_lat,
                bounds.south_lat,
                bounds.east_lng,
                bounds.west_lng
            ],
            row_to_hydrant,
        )?;

        let mut hydrants = Vec::new();
        for row in rows {
            hydrants.push(row?);
        }
        Ok(hydrants)
    }

    /// Retrieve a single hydrant by id
    pub fn get_hydrant_by_id(&self, id: &str) -> Result<Hydrant, AlertHubError> {
        let conn = lock(&self.conn);
        let hydrant = conn.query_row(
            &format!("SELECT {} FROM hydrants WHERE id = ?1", HYDRANT_COLUMNS),
            params![id],
            row_to_hydrant,
        )?;
        Ok(hydrant)
    }

    /// Delete all hydrants, returning the number removed
    pub fn delete_all_hydrants(&self) -> Result<i64, AlertHubError> {
        let conn = lock(&self.conn);
        let count = conn.execute("DELETE FROM hydrants", [])?;
        Ok(count as i64)
    }

    /// Total number of stored hydrants
    pub fn count_hydrants(&self) -> Result<i64, AlertHubError> {
        let conn = lock(&self.conn);
        let count = conn.query_row("SELECT COUNT(*) FROM hydrants", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn percentage(processed: usize, total: usize) -> f64 {
    (processed as f64 / total as f64) * 100.0
}

/// Assign an id when missing and refresh the write timestamps
fn stamp_hydrant(hydrant: &mut Hydrant, now: f64) {
    if hydrant.id.is_empty() {
        hydrant.id = Uuid::new_v4().to_string();
    }
    if hydrant.created_at == 0.0 {
        hydrant.created_at = now;
    }
    hydrant.updated_at = now;
}

fn hydrant_params(h: &Hydrant) -> [&dyn rusqlite::ToSql; 11] {
    [
        &h.id,
        &h.hydrant_type,
        &h.nozzles,
        &h.flow_rate,
        &h.color,
        &h.status,
        &h.lat,
        &h.lng,
        &h.flow_status,
        &h.created_at,
        &h.updated_at,
    ]
}

fn row_to_hydrant(row: &Row<'_>) -> rusqlite::Result<Hydrant> {
    Ok(Hydrant {
        id: row.get(0)?,
        hydrant_type: row.get(1)?,
        nozzles: row.get(2)?,
        flow_rate: row.get(3)?,
        color: row.get(4)?,
        status: row.get(5)?,
        lat: row.get(6)?,
        lng: row.get(7)?,
        flow_status: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn sample_hydrant(id: &str, lat: f64, lng: f64) -> Hydrant {
        Hydrant {
            id: id.to_string(),
            hydrant_type: Some("dry barrel".to_string()),
            nozzles: Some(2),
            flow_rate: Some(1250.0),
            color: Some("green".to_string()),
            lat,
            lng,
            ..Default::default()
        }
    }

    #[test]
    fn test_upsert_assigns_id_and_timestamps() {
        let db = Database::open_in_memory().unwrap();
        let id = db.save_hydrant(&sample_hydrant("", 39.0, -96.0)).unwrap();
        assert!(!id.is_empty());

        let stored = db.get_hydrant_by_id(&id).unwrap();
        assert!(stored.created_at > 0.0);
        assert_eq!(stored.created_at, stored.updated_at);
    }

    #[test]
    fn test_upsert_updates_existing() {
        let db = Database::open_in_memory().unwrap();
        db.save_hydrant(&sample_hydrant("H1", 39.0, -96.0)).unwrap();

        let mut updated = sample_hydrant("H1", 40.0, -95.0);
        updated.color = Some("red".to_string());
        db.save_hydrant(&updated).unwrap();

        assert_eq!(db.count_hydrants().unwrap(), 1);
        let stored = db.get_hydrant_by_id("H1").unwrap();
        assert_eq!(stored.color.as_deref(), Some("red"));
        assert_eq!(stored.lat, 40.0);
    }

    #[test]
    fn test_bounds_query() {
        let db = Database::open_in_memory().unwrap();
        db.save_hydrant(&sample_hydrant("in1", 39.5, -96.5)).unwrap();
        db.save_hydrant(&sample_hydrant("in2", 39.1, -96.9)).unwrap();
        db.save_hydrant(&sample_hydrant("out-north", 41.0, -96.5)).unwrap();
        db.save_hydrant(&sample_hydrant("out-east", 39.5, -90.0)).unwrap();

        let bounds = HydrantBoundsQuery {
            north_lat: 40.0,
            south_lat: 39.0,
            east_lng: -96.0,
            west_lng: -97.0,
        };
        let mut found: Vec<String> = db
            .get_hydrants_by_bounds(&bounds)
            .unwrap()
            .into_iter()
            .map(|h| h.id)
            .collect();
        found.sort();
        assert_eq!(found, vec!["in1", "in2"]);
    }

    #[test]
    fn test_batch_progress_monotonicity() {
        let db = Database::open_in_memory().unwrap();
        let hydrants: Vec<Hydrant> = (0..20)
            .map(|i| sample_hydrant(&format!("H{}", i), 39.0 + i as f64 * 0.01, -96.0))
            .collect();

        let snapshots: Mutex<Vec<BatchUploadProgress>> = Mutex::new(Vec::new());
        let cancel = AtomicBool::new(false);
        let ids = db
            .save_many_hydrants(&hydrants, &cancel, &|p| {
                snapshots.lock().unwrap().push(p);
            })
            .unwrap();

        assert_eq!(ids.len(), 20);
        let snapshots = snapshots.into_inner().unwrap();
        assert!(!snapshots.is_empty());

        let mut last_processed = 0;
        for snap in &snapshots {
            assert!(snap.processed >= last_processed, "processed went backwards");
            assert!(snap.successful + snap.failed <= snap.processed);
            assert!(snap.processed <= snap.total);
            assert!((0.0..=100.0).contains(&snap.progress));
            last_processed = snap.processed;
        }

        let last = snapshots.last().unwrap();
        assert_eq!(last.processed, 20);
        assert_eq!(last.progress, 100.0);
        assert!(!last.in_progress);
    }

    #[test]
    fn test_batch_cancellation_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        let hydrants: Vec<Hydrant> = (0..10)
            .map(|i| sample_hydrant(&format!("H{}", i), 39.0, -96.0))
            .collect();

        let cancel = AtomicBool::new(true);
        let snapshots: Mutex<Vec<BatchUploadProgress>> = Mutex::new(Vec::new());
        let result = db.save_many_hydrants(&hydrants, &cancel, &|p| {
            snapshots.lock().unwrap().push(p);
        });

        assert!(result.is_err());
        assert_eq!(db.count_hydrants().unwrap(), 0);

        let snapshots = snapshots.into_inner().unwrap();
        let last = snapshots.last().unwrap();
        assert!(!last.in_progress);
    }

    #[test]
    fn test_batch_absorbs_duplicate_ids_as_upserts() {
        let db = Database::open_in_memory().unwrap();
        let mut hydrants: Vec<Hydrant> = (0..3)
            .map(|i| sample_hydrant(&format!("H{}", i), 39.0, -96.0))
            .collect();
        hydrants.push(sample_hydrant("H0", 39.0, -96.0));

        let cancel = AtomicBool::new(false);
        let ids = db
            .save_many_hydrants(&hydrants, &cancel, &|_| {})
            .unwrap();
        assert_eq!(ids.len(), 4);
        assert_eq!(db.count_hydrants().unwrap(), 3);
    }

    #[test]
    fn test_delete_all() {
        let db = Database::open_in_memory().unwrap();
        db.save_hydrant(&sample_hydrant("H1", 39.0, -96.0)).unwrap();
        db.save_hydrant(&sample_hydrant("H2", 39.1, -96.1)).unwrap();

        assert_eq!(db.delete_all_hydrants().unwrap(), 2);
        assert_eq!(db.count_hydrants().unwrap(), 0);

        let bounds = HydrantBoundsQuery {
            north_lat: 90.0,
            south_lat: -90.0,
            east_lng: 180.0,
            west_lng: -180.0,
        };
        assert!(db.get_hydrants_by_bounds(&bounds).unwrap().is_empty());
    }

    #[test]
    fn test_empty_batch_is_a_noop() {
        let db = Database::open_in_memory().unwrap();
        let cancel = AtomicBool::new(false);
        let ids = db.save_many_hydrants(&[], &cancel, &|_| {}).unwrap();
        assert!(ids.is_empty());
    }
}
