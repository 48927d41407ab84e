//! Persistence sinks behind one drain contract.
//!
//! Exactly one sink is selected at startup and captured by the sampler; the
//! two realizations differ in batch atomicity (the embedded file commits a
//! drain as one transaction, the stream publishes record-by-record) and in
//! the screenshot carrier (only the stream carries pixel data).

mod redis_stream;

pub use redis_stream::RedisStreamSink;

use anyhow::Result;

use crate::db::Database;
use crate::models::EventRecord;

/// The persistence backend for drained event batches.
#[derive(Clone)]
pub enum EventSink {
    /// Transactional batch insert into the embedded SQLite file.
    Sqlite(Database),
    /// Best-effort per-record append to a capped Redis stream.
    RedisStream(RedisStreamSink),
}

impl EventSink {
    /// Moves a drained batch into the sink, preserving record order.
    /// Returns the number of records actually persisted.
    ///
    /// On the embedded path an error means the whole batch rolled back; on
    /// the stream path individual failures are logged and skipped, so the
    /// returned count may be smaller than the batch.
    pub async fn drain_to(&self, records: Vec<EventRecord>) -> Result<usize> {
        match self {
            EventSink::Sqlite(db) => {
                let count = records.len();
                db.insert_events(records).await?;
                Ok(count)
            }
            EventSink::RedisStream(stream) => Ok(stream.publish_batch(&records).await),
        }
    }

    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            EventSink::Sqlite(_) => "sqlite",
            EventSink::RedisStream(_) => "redis",
        }
    }
}
