//! Activity event record.
//!
//! One record per admitted sampler tick. Immutable after construction: the
//! sampler builds it, hands it to the buffer, and the sink consumes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel stored in `screenshot_path` to mark that the screenshot payload
/// travels in-band with the record rather than as a file on disk.
pub const SCREENSHOT_IN_MEMORY: &str = "RAM";

/// A single foreground-activity observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Identifies the daemon run; identical across all records of a session.
    pub session_id: String,
    /// Wall-clock time at tick entry.
    pub wall_time: DateTime<Utc>,
    /// Best-effort executable name of the foreground window's owner.
    pub process_name: String,
    /// Foreground window title, truncated by the probe's title buffer.
    pub window_title: String,
    /// Opaque OS window handle, kept only for change detection.
    pub window_handle: i64,
    /// Milliseconds since the last input event at tick time.
    pub idle_ms: u64,
    /// Derived input-activity score in [0.0, 1.0].
    pub input_intensity: f32,
    /// In-memory JPEG, present only when the screenshot gate fired.
    pub screenshot: Option<Vec<u8>>,
    /// Marker telling downstream consumers where the screenshot lives.
    pub screenshot_path: String,
}

impl EventRecord {
    /// Wall time as Unix milliseconds, the form both sinks persist.
    pub fn unix_time_ms(&self) -> i64 {
        self.wall_time.timestamp_millis()
    }

    /// Conservative memory footprint estimate: fixed overhead plus the
    /// variable-length payloads.
    pub fn approx_bytes(&self) -> usize {
        32 + self.session_id.len()
            + self.process_name.len()
            + self.window_title.len()
            + self.screenshot_path.len()
            + self.screenshot.as_ref().map_or(0, |s| s.len())
    }
}
