//! The sampler task: tick loop, flush dispatch, and graceful drain.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::buffer::EventBuffer;
use crate::capture;
use crate::models::{EventRecord, SCREENSHOT_IN_MEMORY};
use crate::probe::{idle_ms_between, Probe, WindowHandle};
use crate::sampler::{
    input_intensity, screenshot_due, should_admit, stats, SamplerConfig, SamplerCounters,
    SamplerState, TickObservation,
};
use crate::sink::EventSink;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Probe and capture failures repeat fast at one per tick; log the first of
/// each class and then every Nth.
const FAILURE_LOG_EVERY: u64 = 50;

/// The observation loop and everything it owns exclusively: the platform
/// probe, the mutable tick state, and the PID-to-name memo.
pub struct Sampler {
    config: SamplerConfig,
    session_id: String,
    probe: Probe,
    buffer: Arc<EventBuffer>,
    sink: EventSink,
    counters: Arc<SamplerCounters>,
    state: SamplerState,
    process_names: ProcessNameCache,
    started_at: Instant,
    probe_failures: u64,
    capture_failures: u64,
}

impl Sampler {
    pub fn new(
        config: SamplerConfig,
        session_id: String,
        buffer: Arc<EventBuffer>,
        sink: EventSink,
    ) -> Self {
        Self {
            config,
            session_id,
            probe: Probe::new(),
            buffer,
            sink,
            counters: Arc::new(SamplerCounters::default()),
            state: SamplerState::new(),
            process_names: ProcessNameCache::new(),
            started_at: Instant::now(),
            probe_failures: 0,
            capture_failures: 0,
        }
    }

    pub fn counters(&self) -> Arc<SamplerCounters> {
        Arc::clone(&self.counters)
    }

    /// Runs until cancelled, then performs the final drain. The flush-signal
    /// handler and the stats logger run as companion tasks and are joined
    /// before the final drain so no drain can race the shutdown.
    pub async fn run(
        mut self,
        flush_rx: mpsc::Receiver<()>,
        cancel: CancellationToken,
    ) -> Result<()> {
        log_info!(
            "Starting sampler: session {} | tick {:?} | idle threshold {:?} | sink {}",
            self.session_id,
            self.config.tick_interval,
            self.config.idle_threshold,
            self.sink.label()
        );

        let flush_task = tokio::spawn(flush_handler(
            Arc::clone(&self.buffer),
            self.sink.clone(),
            Arc::clone(&self.counters),
            flush_rx,
            cancel.clone(),
        ));
        let stats_task = tokio::spawn(stats::stats_loop(
            Arc::clone(&self.counters),
            Arc::clone(&self.buffer),
            self.sink.clone(),
            self.started_at,
            cancel.clone(),
        ));

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log_info!("Cancellation requested, stopping sampler loop");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        // The ticker is stopped; wait out any in-flight timer drain before
        // the final one so the sink only ever sees one drain at a time.
        if let Err(err) = flush_task.await {
            log_error!("Flush handler task failed to join: {err}");
        }
        if let Err(err) = stats_task.await {
            log_error!("Stats task failed to join: {err}");
        }

        self.shutdown().await
    }

    /// One observation cycle. Never fails: every error degrades the tick
    /// and is logged at a sparse cadence.
    async fn tick(&mut self) {
        self.counters.ticks_total.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();

        // Full stop while a full-screen game owns the display: no probing,
        // no recording, no screenshots.
        if self.probe.is_full_screen_game() {
            self.counters.ticks_skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let (idle_ms, input_tick) = self.read_input_state();
        let is_idle = idle_ms >= self.config.idle_threshold.as_millis() as u64;
        if is_idle {
            self.counters.ticks_idle.fetch_add(1, Ordering::Relaxed);
        }

        // No foreground window means a locked workstation or a desktop
        // transition; nothing to record.
        let Some(handle) = self.probe.foreground_window() else {
            return;
        };

        let window_title = self.probe.window_title(handle);
        let (_thread_id, pid) = self.probe.thread_and_process_id(handle);
        let process_name = self.process_names.resolve(pid);

        let input_tick_changed = input_tick != self.state.last_input_tick;
        let intensity = input_intensity(is_idle, input_tick_changed, idle_ms);

        let screenshot = if screenshot_due(
            is_idle,
            self.state.last_screenshot_time,
            self.config.screenshot_interval,
        ) {
            match self.capture_window(handle).await {
                Ok(bytes) => {
                    self.state.last_screenshot_time = Some(Instant::now());
                    Some(bytes)
                }
                Err(err) => {
                    self.capture_failures += 1;
                    if self.capture_failures % FAILURE_LOG_EVERY == 1 {
                        log_warn!(
                            "Screenshot failed ({} so far): {err:#}",
                            self.capture_failures
                        );
                    }
                    None
                }
            }
        } else {
            None
        };

        let observation = TickObservation {
            window_handle: handle,
            window_title: &window_title,
            process_name: &process_name,
            is_idle,
            intensity,
            screenshot_taken: screenshot.is_some(),
        };

        if should_admit(&self.state, &observation) {
            let record = EventRecord {
                session_id: self.session_id.clone(),
                wall_time: now,
                process_name: process_name.clone(),
                window_title: window_title.clone(),
                window_handle: handle,
                idle_ms,
                input_intensity: intensity,
                screenshot,
                screenshot_path: SCREENSHOT_IN_MEMORY.to_string(),
            };

            let flush_suggested = self.buffer.add(record);

            // The heartbeat clock and change detection track the last
            // admission, not the last tick.
            self.state.last_window_handle = handle;
            self.state.last_window_title = window_title;
            self.state.last_process_name = process_name;
            self.state.last_tick_time = Instant::now();

            if flush_suggested {
                drain_and_store(&self.buffer, &self.sink, &self.counters).await;
            }
        }

        self.state.last_input_tick = input_tick;
    }

    /// Reads the idle clock. A failed syscall degrades to "no new input"
    /// rather than failing the tick.
    fn read_input_state(&mut self) -> (u64, u32) {
        match self.probe.last_input_tick() {
            Ok(tick) => (idle_ms_between(tick, self.probe.system_tick()), tick),
            Err(err) => {
                self.probe_failures += 1;
                if self.probe_failures % FAILURE_LOG_EVERY == 1 {
                    log_warn!(
                        "Input probe failed ({} so far): {err:#}",
                        self.probe_failures
                    );
                }
                (0, self.state.last_input_tick)
            }
        }
    }

    /// Grabs the window's rectangle and encodes it off the tick's thread.
    async fn capture_window(&mut self, handle: WindowHandle) -> Result<Vec<u8>> {
        let rect = self.probe.window_rect(handle)?;
        tokio::task::spawn_blocking(move || capture::capture_region(&rect))
            .await
            .context("capture worker join failed")?
    }

    /// Final drain after the loop has stopped.
    async fn shutdown(&mut self) -> Result<()> {
        log_info!("Performing graceful shutdown drain...");

        let records = self.buffer.drain_final();
        if !records.is_empty() {
            let batch = records.len();
            let pushed = self
                .sink
                .drain_to(records)
                .await
                .context("final drain failed")?;
            self.counters.flush_count.fetch_add(1, Ordering::Relaxed);
            self.counters
                .events_pushed
                .fetch_add(pushed as u64, Ordering::Relaxed);
            log_info!("Final drain persisted {pushed}/{batch} records");
        }

        let snapshot = self.counters.snapshot();
        log_info!(
            "Shutdown statistics: {} ticks | {} idle | {} skipped (games) | {} flushes | {} records",
            snapshot.ticks_total,
            snapshot.ticks_idle,
            snapshot.ticks_skipped,
            snapshot.flush_count,
            snapshot.events_pushed
        );

        Ok(())
    }
}

/// Drains the buffer into the sink and bumps the flush counters. Shared by
/// the capacity-triggered path (sampler task) and the timer-triggered path
/// (flush handler task); each drain takes a disjoint batch.
async fn drain_and_store(
    buffer: &EventBuffer,
    sink: &EventSink,
    counters: &SamplerCounters,
) {
    let records = buffer.drain();
    if records.is_empty() {
        return;
    }
    let batch = records.len();

    match sink.drain_to(records).await {
        Ok(pushed) => {
            counters.flush_count.fetch_add(1, Ordering::Relaxed);
            counters
                .events_pushed
                .fetch_add(pushed as u64, Ordering::Relaxed);
            if pushed < batch {
                log_warn!("Flushed {pushed}/{batch} records to {} sink", sink.label());
            }
        }
        Err(err) => {
            // The batch is gone: at-most-once on this path. The next flush
            // carries fresh records.
            log_error!("Error flushing {batch} records to {} sink: {err:#}", sink.label());
        }
    }
}

/// Waits on the buffer's coalesced flush channel and drains on each signal.
async fn flush_handler(
    buffer: Arc<EventBuffer>,
    sink: EventSink,
    counters: Arc<SamplerCounters>,
    mut flush_rx: mpsc::Receiver<()>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            signal = flush_rx.recv() => match signal {
                Some(()) => drain_and_store(&buffer, &sink, &counters).await,
                None => return,
            },
        }
    }
}

/// Best-effort PID → executable-name memo. Lookups go through sysinfo once
/// per PID; processes that have already exited get the numeric placeholder.
struct ProcessNameCache {
    names: HashMap<u32, String>,
    system: System,
}

impl ProcessNameCache {
    fn new() -> Self {
        Self {
            names: HashMap::new(),
            system: System::new(),
        }
    }

    fn resolve(&mut self, pid: u32) -> String {
        if pid == 0 {
            return "PID_0".to_string();
        }
        if let Some(name) = self.names.get(&pid) {
            return name.clone();
        }

        let sys_pid = Pid::from_u32(pid);
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[sys_pid]));
        let name = self
            .system
            .process(sys_pid)
            .map(|process| process.name().to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("PID_{pid}"));

        self.names.insert(pid, name.clone());
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_process_name_resolves_without_placeholder() {
        let mut cache = ProcessNameCache::new();
        let own_pid = std::process::id();
        let name = cache.resolve(own_pid);
        assert!(!name.is_empty());
        assert_ne!(name, format!("PID_{own_pid}"));
        // Second lookup hits the memo.
        assert_eq!(cache.resolve(own_pid), name);
    }

    #[test]
    fn pid_zero_gets_placeholder() {
        let mut cache = ProcessNameCache::new();
        assert_eq!(cache.resolve(0), "PID_0");
    }
}
