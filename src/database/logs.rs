use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Row};

use super::connection::{lock, Database};
use crate::errors::AlertHubError;
use crate::models::{LogEntry, LogEntrySummary};

/// Filtering, sorting, and pagination parameters for log queries
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub entry_type: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub event_type: Option<String>,
    pub client_id: Option<String>,
    pub direction: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
    pub sort_field: String,
    pub sort_order: String,
}

/// Fixed-width UTC timestamp text, lexicographically sortable
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl Database {
    /// Save a log entry
    pub fn save_log(&self, entry: &LogEntry) -> Result<(), AlertHubError> {
        let body = serde_json::to_string(&entry.body)
            .map_err(|e| AlertHubError::Database(e.to_string()))?;
        let headers = serde_json::to_string(&entry.headers)
            .map_err(|e| AlertHubError::Database(e.to_string()))?;

        let conn = lock(&self.conn);
        conn.execute(
            "INSERT INTO logs (
                id, type, method, path, body, headers, timestamp,
                source_ip, client_id, event_type, direction, duration, status_code
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                entry.id,
                entry.entry_type,
                entry.method,
                entry.path,
                body,
                headers,
                format_timestamp(&entry.timestamp),
                entry.source_ip,
                entry.client_id,
                entry.event_type,
                entry.direction,
                entry.duration_ms,
                entry.status_code,
            ],
        )?;
        Ok(())
    }

    /// Retrieve log summaries with filtering, sorting, and pagination
    ///
    /// Returns the page of summaries plus the total number of matching
    /// entries.
    pub fn get_logs_summary(
        &self,
        filter: &LogFilter,
    ) -> Result<(Vec<LogEntrySummary>, i64), AlertHubError> {
        let (where_clause, args) = build_where_clause(filter);

        let base = format!(
            "SELECT id, type, method, path, timestamp, source_ip, client_id, \
             event_type, direction, duration, status_code FROM logs{}{} LIMIT ? OFFSET ?",
            where_clause,
            build_order_by_clause(&filter.sort_field, &filter.sort_order),
        );
        let count_query = format!("SELECT COUNT(*) FROM logs{}", where_clause);

        let conn = lock(&self.conn);

        let mut query_args = args.clone();
        query_args.push(SqlValue::Integer(filter.limit));
        query_args.push(SqlValue::Integer(filter.offset));

        let mut stmt = conn.prepare(&base)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(query_args), row_to_summary)?;

        let mut logs = Vec::new();
        for row in rows {
            logs.push(row?);
        }

        let total: i64 = conn.query_row(
            &count_query,
            rusqlite::params_from_iter(args),
            |row| row.get(0),
        )?;

        Ok((logs, total))
    }

    /// Retrieve a single log entry by id, including body and headers
    pub fn get_log_by_id(&self, id: &str) -> Result<LogEntry, AlertHubError> {
        let conn = lock(&self.conn);
        let entry = conn.query_row(
            "SELECT id, type, method, path, body, headers, timestamp, source_ip, \
             client_id, event_type, direction, duration, status_code \
             FROM logs WHERE id = ?1",
            params![id],
            row_to_entry,
        )?;
        Ok(entry)
    }
}

fn build_where_clause(filter: &LogFilter) -> (String, Vec<SqlValue>) {
    let mut conditions: Vec<&'static str> = Vec::new();
    let mut args: Vec<SqlValue> = Vec::new();

    if let Some(v) = &filter.entry_type {
        conditions.push("type = ?");
        args.push(SqlValue::Text(v.clone()));
    }
    if let Some(v) = &filter.method {
        conditions.push("method = ?");
        args.push(SqlValue::Text(v.clone()));
    }
    if let Some(v) = &filter.path {
        conditions.push("path LIKE ?");
        args.push(SqlValue::Text(format!("%{}%", v)));
    }
    if let Some(v) = &filter.event_type {
        conditions.push("event_type = ?");
        args.push(SqlValue::Text(v.clone()));
    }
    if let Some(v) = &filter.client_id {
        conditions.push("client_id = ?");
        args.push(SqlValue::Text(v.clone()));
    }
    if let Some(v) = &filter.direction {
        conditions.push("direction = ?");
        args.push(SqlValue::Text(v.clone()));
    }
    if let Some(v) = &filter.start_time {
        conditions.push("timestamp >= ?");
        args.push(SqlValue::Text(format_timestamp(v)));
    }
    if let Some(v) = &filter.end_time {
        conditions.push("timestamp <= ?");
        args.push(SqlValue::Text(format_timestamp(v)));
    }

    if conditions.is_empty() {
        (String::new(), args)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), args)
    }
}

/// Build an ORDER BY clause against the sortable-column whitelist
///
/// The field name is interpolated into SQL, so anything outside the
/// whitelist falls back to the default sort.
fn build_order_by_clause(field: &str, order: &str) -> String {
    const VALID_FIELDS: [&str; 9] = [
        "id",
        "type",
        "method",
        "path",
        "timestamp",
        "source_ip",
        "client_id",
        "event_type",
        "direction",
    ];

    let field = if VALID_FIELDS.contains(&field) {
        field
    } else {
        "timestamp"
    };

    let order = match order.to_lowercase().as_str() {
        "asc" => "ASC",
        _ => "DESC",
    };

    format!(" ORDER BY {} {}", field, order)
}

fn row_to_summary(row: &Row<'_>) -> rusqlite::Result<LogEntrySummary> {
    let raw_ts: String = row.get(4)?;
    Ok(LogEntrySummary {
        id: row.get(0)?,
        entry_type: row.get(1)?,
        method: row.get(2)?,
        path: row.get(3)?,
        timestamp: parse_timestamp(&raw_ts),
        source_ip: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        client_id: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        event_type: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        direction: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        duration_ms: row.get(9)?,
        status_code: row.get(10)?,
    })
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<LogEntry> {
    let body: Option<String> = row.get(4)?;
    let headers: Option<String> = row.get(5)?;
    let raw_ts: String = row.get(6)?;

    Ok(LogEntry {
        id: row.get(0)?,
        entry_type: row.get(1)?,
        method: row.get(2)?,
        path: row.get(3)?,
        body: body
            .and_then(|b| serde_json::from_str(&b).ok())
            .unwrap_or(serde_json::Value::Null),
        headers: headers
            .and_then(|h| serde_json::from_str(&h).ok())
            .unwrap_or(serde_json::Value::Null),
        timestamp: parse_timestamp(&raw_ts),
        source_ip: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        client_id: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        event_type: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        direction: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
        duration_ms: row.get(11)?,
        status_code: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn sample_entry(id: &str, method: &str, path: &str, ts: DateTime<Utc>) -> LogEntry {
        LogEntry {
            id: id.to_string(),
            entry_type: "api_request".to_string(),
            method: method.to_string(),
            path: path.to_string(),
            body: json!({"k": "v"}),
            headers: json!({"Content-Type": ["application/json"]}),
            timestamp: ts,
            source_ip: "127.0.0.1:1234".to_string(),
            client_id: String::new(),
            event_type: String::new(),
            direction: "incoming".to_string(),
            duration_ms: Some(12),
            status_code: Some(200),
        }
    }

    fn default_filter() -> LogFilter {
        LogFilter {
            limit: 10,
            offset: 0,
            sort_field: "timestamp".to_string(),
            sort_order: "desc".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_save_and_fetch_detail() {
        let db = Database::open_in_memory().unwrap();
        let ts = Utc::now();
        db.save_log(&sample_entry("r1", "POST", "/alerts", ts)).unwrap();

        let entry = db.get_log_by_id("r1").unwrap();
        assert_eq!(entry.method, "POST");
        assert_eq!(entry.body, json!({"k": "v"}));
        assert_eq!(entry.duration_ms, Some(12));

        assert!(matches!(
            db.get_log_by_id("missing"),
            Err(AlertHubError::NotFound(_))
        ));
    }

    #[test]
    fn test_summary_excludes_body_and_paginates() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        for i in 0..5 {
            db.save_log(&sample_entry(
                &format!("r{}", i),
                "GET",
                "/alerts",
                now + Duration::seconds(i),
            ))
            .unwrap();
        }

        let mut filter = default_filter();
        filter.limit = 2;
        let (page, total) = db.get_logs_summary(&filter).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(total, 5);
        // Default sort is timestamp descending
        assert_eq!(page[0].id, "r4");
        assert_eq!(page[1].id, "r3");
    }

    #[test]
    fn test_filters() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.save_log(&sample_entry("r1", "GET", "/alerts", now)).unwrap();
        db.save_log(&sample_entry("r2", "POST", "/hydrants", now)).unwrap();
        db.save_log(&sample_entry("r3", "POST", "/alerts", now)).unwrap();

        let mut filter = default_filter();
        filter.method = Some("POST".to_string());
        let (rows, total) = db.get_logs_summary(&filter).unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows.len(), 2);

        filter.path = Some("alert".to_string());
        let (rows, total) = db.get_logs_summary(&filter).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, "r3");
    }

    #[test]
    fn test_time_range_filter() {
        let db = Database::open_in_memory().unwrap();
        let base = Utc::now();
        for i in 0..4 {
            db.save_log(&sample_entry(
                &format!("r{}", i),
                "GET",
                "/logs-src",
                base + Duration::seconds(i * 10),
            ))
            .unwrap();
        }

        let mut filter = default_filter();
        filter.start_time = Some(base + Duration::seconds(5));
        filter.end_time = Some(base + Duration::seconds(25));
        let (rows, total) = db.get_logs_summary(&filter).unwrap();
        assert_eq!(total, 2);
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&"r1") && ids.contains(&"r2"));
    }

    #[test]
    fn test_sort_whitelist_rejects_unknown_fields() {
        assert_eq!(
            build_order_by_clause("method", "asc"),
            " ORDER BY method ASC"
        );
        assert_eq!(
            build_order_by_clause("timestamp; DROP TABLE logs", "desc"),
            " ORDER BY timestamp DESC"
        );
        assert_eq!(
            build_order_by_clause("id", "sideways"),
            " ORDER BY id DESC"
        );
    }

    #[test]
    fn test_sort_ascending() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.save_log(&sample_entry("b", "GET", "/x", now)).unwrap();
        db.save_log(&sample_entry("a", "GET", "/x", now)).unwrap();

        let mut filter = default_filter();
        filter.sort_field = "id".to_string();
        filter.sort_order = "asc".to_string();
        let (rows, _) = db.get_logs_summary(&filter).unwrap();
        assert_eq!(rows[0].id, "a");
        assert_eq!(rows[1].id, "b");
    }
}
