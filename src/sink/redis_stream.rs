//! Remote append-log sink backed by a Redis stream.
//!
//! Events land in `<namespace>:events` via `XADD` with an approximate
//! 5000-entry cap, letting the server trim old entries to bound memory.
//! Delivery is best effort: a failed record is logged and skipped, the rest
//! of the batch still publishes.

use std::time::Duration;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use redis::aio::MultiplexedConnection;
use redis::streams::StreamMaxlen;
use redis::AsyncCommands;

use crate::models::EventRecord;

const ENABLE_LOGS: bool = true;

use crate::log_error;

/// Server-side cap on the event stream, approximate by design.
const STREAM_MAX_LEN: usize = 5000;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Publisher handle for the capped event stream. Cheap to clone; clones
/// share the multiplexed connection.
#[derive(Clone)]
pub struct RedisStreamSink {
    conn: MultiplexedConnection,
    stream: String,
}

impl RedisStreamSink {
    /// Connects to `addr` (host:port) and verifies reachability with a
    /// short-deadline ping.
    pub async fn connect(addr: &str, namespace: &str) -> Result<Self> {
        let client = redis::Client::open(format!("redis://{addr}"))
            .with_context(|| format!("invalid redis address {addr}"))?;

        let mut conn = tokio::time::timeout(
            CONNECT_TIMEOUT,
            client.get_multiplexed_async_connection(),
        )
        .await
        .with_context(|| format!("timed out connecting to redis at {addr}"))?
        .with_context(|| format!("failed to connect to redis at {addr}"))?;

        let pong: String = tokio::time::timeout(
            CONNECT_TIMEOUT,
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .context("redis ping timed out")?
        .context("redis ping failed")?;
        if pong != "PONG" {
            anyhow::bail!("unexpected redis ping reply: {pong}");
        }

        Ok(Self {
            conn,
            stream: format!("{namespace}:events"),
        })
    }

    /// Publishes each record individually, in order. Returns how many made
    /// it; failures are logged and do not abort the batch.
    pub async fn publish_batch(&self, records: &[EventRecord]) -> usize {
        let mut pushed = 0;
        for record in records {
            match self.publish(record).await {
                Ok(()) => pushed += 1,
                Err(err) => log_error!("Error publishing to redis stream: {err:#}"),
            }
        }
        pushed
    }

    async fn publish(&self, record: &EventRecord) -> Result<()> {
        let mut fields: Vec<(&str, String)> = vec![
            ("session_uuid", record.session_id.clone()),
            ("unix_time", record.unix_time_ms().to_string()),
            ("process_name", record.process_name.clone()),
            ("window_title", record.window_title.clone()),
            ("window_hwnd", record.window_handle.to_string()),
            ("input_idle", record.idle_ms.to_string()),
            ("intensity", record.input_intensity.to_string()),
            ("screenshot_path", record.screenshot_path.clone()),
        ];

        if let Some(jpeg) = &record.screenshot {
            fields.push(("image_data", BASE64_STANDARD.encode(jpeg)));
        }

        let mut conn = self.conn.clone();
        let _id: String = conn
            .xadd_maxlen(
                &self.stream,
                StreamMaxlen::Approx(STREAM_MAX_LEN),
                "*",
                &fields,
            )
            .await
            .context("XADD failed")?;
        Ok(())
    }

    pub fn stream_name(&self) -> &str {
        &self.stream
    }
}
