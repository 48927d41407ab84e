//! Periodic stats snapshot, logged every 30 seconds.

use std::sync::Arc;
use std::time::Duration;

use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::buffer::EventBuffer;
use crate::sampler::SamplerCounters;
use crate::sink::EventSink;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const STATS_INTERVAL: Duration = Duration::from_secs(30);

pub(super) async fn stats_loop(
    counters: Arc<SamplerCounters>,
    buffer: Arc<EventBuffer>,
    sink: EventSink,
    started_at: Instant,
    cancel: CancellationToken,
) {
    // Baseline refresh so the first snapshot has something to diff against.
    let mut system = System::new();
    let pid = Pid::from_u32(std::process::id());
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

    let mut ticker = tokio::time::interval_at(Instant::now() + STATS_INTERVAL, STATS_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                log_stats(&counters, &buffer, &sink, started_at, &mut system, pid).await;
            }
        }
    }
}

async fn log_stats(
    counters: &SamplerCounters,
    buffer: &EventBuffer,
    sink: &EventSink,
    started_at: Instant,
    system: &mut System,
    pid: Pid,
) {
    let snapshot = counters.snapshot();
    let uptime = format_uptime(started_at.elapsed());

    system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
    let (resident_mb, virtual_mb) = match system.process(pid) {
        Some(process) => (
            process.memory() as f64 / 1024.0 / 1024.0,
            process.virtual_memory() as f64 / 1024.0 / 1024.0,
        ),
        None => (0.0, 0.0),
    };

    log_info!("WATCHER STATS | uptime {uptime}");
    log_info!(
        "Ticks: {} total | {} idle | {} skipped (games)",
        snapshot.ticks_total,
        snapshot.ticks_idle,
        snapshot.ticks_skipped
    );
    log_info!(
        "Buffer: {} entries | {} bytes",
        buffer.len(),
        buffer.approx_bytes()
    );

    match sink {
        EventSink::Sqlite(db) => match db.count_events().await {
            Ok(counts) => log_info!(
                "Database: {} events | {} pending | {} flushes",
                counts.total,
                counts.pending,
                snapshot.flush_count
            ),
            Err(err) => log_warn!("Database stats query failed: {err:#}"),
        },
        EventSink::RedisStream(stream) => log_info!(
            "Stream {}: {} events pushed | {} flushes",
            stream.stream_name(),
            snapshot.events_pushed,
            snapshot.flush_count
        ),
    }

    log_info!("RAM: {resident_mb:.1} MB resident | {virtual_mb:.1} MB virtual");
}

fn format_uptime(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}h{minutes:02}m{seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(Duration::from_secs(42)), "42s");
        assert_eq!(format_uptime(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_uptime(Duration::from_secs(3_725)), "1h02m05s");
    }
}
