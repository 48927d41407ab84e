use anyhow::{Context, Result};
use rusqlite::params;
use serde::Serialize;

use crate::db::Database;
use crate::models::EventRecord;

/// Cheap table statistics reported by the 30 s stats snapshot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EventTableCounts {
    pub total: i64,
    pub pending: i64,
}

impl Database {
    /// Inserts a batch of records in one transaction, preserving order.
    ///
    /// Screenshot bytes never reach this table; only the in-memory marker is
    /// stored in `screenshot_path`. Any failure rolls the whole batch back
    /// and surfaces the error to the caller.
    pub async fn insert_events(&self, records: Vec<EventRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        self.execute(move |conn| {
            let tx = conn.transaction().context("failed to begin transaction")?;
            {
                let mut stmt = tx
                    .prepare(
                        "INSERT INTO raw_events
                         (session_uuid, timestamp_utc, unix_time, process_name, window_title,
                          window_hwnd, input_idle_ms, input_intensity, screenshot_path)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    )
                    .context("failed to prepare insert statement")?;

                for record in &records {
                    stmt.execute(params![
                        record.session_id,
                        record.wall_time.to_rfc3339(),
                        record.unix_time_ms(),
                        record.process_name,
                        record.window_title,
                        record.window_handle,
                        record.idle_ms as i64,
                        f64::from(record.input_intensity),
                        record.screenshot_path,
                    ])
                    .context("failed to insert event")?;
                }
            }
            tx.commit().context("failed to commit event batch")?;
            Ok(())
        })
        .await
    }

    /// Total and unprocessed event counts.
    pub async fn count_events(&self) -> Result<EventTableCounts> {
        self.execute(|conn| {
            let total = conn
                .query_row("SELECT COUNT(*) FROM raw_events", [], |row| row.get(0))
                .context("failed to count events")?;
            let pending = conn
                .query_row(
                    "SELECT COUNT(*) FROM raw_events WHERE is_processed = 0",
                    [],
                    |row| row.get(0),
                )
                .context("failed to count pending events")?;
            Ok(EventTableCounts { total, pending })
        })
        .await
    }
}
