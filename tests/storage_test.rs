//! Embedded sink contract: pragma configuration, schema verification, and
//! transactional batch inserts with the documented column mapping.

use std::path::Path;

use chrono::Utc;
use mnemosyne_watcher::db::Database;
use mnemosyne_watcher::models::{EventRecord, SCREENSHOT_IN_MEMORY};
use rusqlite::Connection;
use tempfile::TempDir;

/// Stands in for the external schema initializer: applies the shipped DDL
/// artifact to a file before the watcher opens it, the way the init script
/// does in production.
fn seed_schema(db_path: &Path) {
    let conn = Connection::open(db_path).expect("open for seeding");
    conn.execute_batch(include_str!("../db/schema.sql"))
        .expect("apply schema artifact");
}

fn record(handle: i64, idle_ms: u64, intensity: f32) -> EventRecord {
    EventRecord {
        session_id: "test-session".to_string(),
        wall_time: Utc::now(),
        process_name: "test.exe".to_string(),
        window_title: "Test Window".to_string(),
        window_handle: handle,
        idle_ms,
        input_intensity: intensity,
        screenshot: None,
        screenshot_path: SCREENSHOT_IN_MEMORY.to_string(),
    }
}

async fn open_temp_db() -> (TempDir, Database) {
    let dir = TempDir::new().expect("tempdir");
    let db_path = dir.path().join("test_activity.db");
    seed_schema(&db_path);
    let db = Database::new(db_path).expect("open database");
    (dir, db)
}

#[tokio::test]
async fn refuses_files_the_initializer_has_not_prepared() {
    let dir = TempDir::new().expect("tempdir");

    let err = Database::new(dir.path().join("unseeded.db")).unwrap_err();
    assert!(
        err.to_string().contains("schema initializer"),
        "unexpected error: {err:#}"
    );
}

#[tokio::test]
async fn opens_a_seeded_file() {
    let dir = TempDir::new().expect("tempdir");
    let db_path = dir.path().join("activity.db");
    seed_schema(&db_path);

    let db = Database::new(db_path.clone()).expect("open database");
    assert!(db_path.exists());
    assert_eq!(db.path(), db_path);
}

#[tokio::test]
async fn configures_write_path_pragmas() {
    let (_dir, db) = open_temp_db().await;

    let (journal, synchronous, busy_timeout, foreign_keys) = db
        .execute(|conn| {
            let journal: String =
                conn.pragma_query_value(None, "journal_mode", |row| row.get(0))?;
            let synchronous: i64 =
                conn.pragma_query_value(None, "synchronous", |row| row.get(0))?;
            let busy_timeout: i64 =
                conn.pragma_query_value(None, "busy_timeout", |row| row.get(0))?;
            let foreign_keys: i64 =
                conn.pragma_query_value(None, "foreign_keys", |row| row.get(0))?;
            Ok((journal, synchronous, busy_timeout, foreign_keys))
        })
        .await
        .expect("pragma queries");

    assert_eq!(journal.to_lowercase(), "delete", "rollback journal expected");
    assert_eq!(synchronous, 1, "synchronous should be NORMAL");
    assert_eq!(busy_timeout, 5000);
    assert_eq!(foreign_keys, 1);
}

#[tokio::test]
async fn batch_insert_preserves_order_and_field_mapping() {
    let (_dir, db) = open_temp_db().await;

    let records: Vec<EventRecord> = (0..5)
        .map(|i| record(i, (i as u64) * 1000, i as f32 * 0.1))
        .collect();
    db.insert_events(records).await.expect("insert batch");

    let counts = db.count_events().await.expect("count");
    assert_eq!(counts.total, 5);
    assert_eq!(counts.pending, 5, "fresh events start unprocessed");

    let rows = db
        .execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT session_uuid, process_name, window_title, window_hwnd,
                        input_idle_ms, input_intensity, screenshot_path
                 FROM raw_events ORDER BY id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, f64>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .expect("select rows");

    assert_eq!(rows.len(), 5);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.0, "test-session");
        assert_eq!(row.1, "test.exe");
        assert_eq!(row.2, "Test Window");
        assert_eq!(row.3, i as i64, "insertion order was not preserved");
        assert_eq!(row.4, (i as i64) * 1000);
        assert!((row.5 - f64::from(i as f32 * 0.1)).abs() < 1e-6);
        assert_eq!(row.6, SCREENSHOT_IN_MEMORY);
    }
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    let (_dir, db) = open_temp_db().await;

    db.insert_events(Vec::new()).await.expect("empty insert");
    let counts = db.count_events().await.expect("count");
    assert_eq!(counts.total, 0);
}

#[tokio::test]
async fn screenshot_bytes_never_reach_the_table() {
    let (_dir, db) = open_temp_db().await;

    let mut with_screenshot = record(42, 0, 1.0);
    with_screenshot.screenshot = Some(vec![0xFF, 0xD8, 0xFF]);
    db.insert_events(vec![with_screenshot]).await.expect("insert");

    let marker = db
        .execute(|conn| {
            let marker: String = conn.query_row(
                "SELECT screenshot_path FROM raw_events WHERE window_hwnd = 42",
                [],
                |row| row.get(0),
            )?;
            Ok(marker)
        })
        .await
        .expect("select marker");

    assert_eq!(marker, SCREENSHOT_IN_MEMORY);
}

#[tokio::test]
async fn existing_files_are_reused_without_data_loss() {
    let dir = TempDir::new().expect("tempdir");
    let db_path = dir.path().join("activity.db");
    seed_schema(&db_path);

    {
        let db = Database::new(db_path.clone()).expect("first open");
        db.insert_events(vec![record(1, 0, 0.5)]).await.expect("insert");
    }

    let db = Database::new(db_path).expect("second open");
    let counts = db.count_events().await.expect("count");
    assert_eq!(counts.total, 1, "reopening must not clobber existing rows");
}

#[tokio::test]
async fn insert_failure_surfaces_an_error() {
    let (_dir, db) = open_temp_db().await;

    db.execute(|conn| {
        conn.execute_batch("DROP TABLE raw_events")?;
        Ok(())
    })
    .await
    .expect("drop table");

    let err = db.insert_events(vec![record(1, 0, 0.5)]).await.unwrap_err();
    assert!(err.to_string().contains("insert"), "unexpected error: {err:#}");
}
