//! In-memory event buffering with write-behind flush policies.
//!
//! Records accumulate here between sink drains so the embedded database sees
//! a handful of transactional batches instead of one write per tick. The
//! buffer signals "flush suggested" in two ways: `add` returns true once the
//! high-water mark is reached (the caller drains synchronously), and an
//! internal timer fires into the coalesced flush channel when records have
//! been sitting for too long.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::models::EventRecord;

/// Flush tuning for the event buffer.
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Number of buffered records at which `add` suggests a flush.
    pub high_water_mark: usize,
    /// Period of the automatic background flush.
    pub flush_timeout: Duration,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            high_water_mark: 100,
            flush_timeout: Duration::from_secs(5 * 60),
        }
    }
}

enum TimerCommand {
    Reset,
    Stop,
}

struct BufferState {
    entries: Vec<EventRecord>,
    last_drain: Instant,
}

/// Bounded ordered queue of event records shared between the sampler task
/// (producer) and the flush paths (drainers). All mutation happens under a
/// short critical section.
pub struct EventBuffer {
    config: BufferConfig,
    state: Mutex<BufferState>,
    timer_tx: mpsc::Sender<TimerCommand>,
}

impl EventBuffer {
    /// Creates the buffer and starts its auto-flush timer task. The returned
    /// receiver carries coalesced flush suggestions; it holds at most one
    /// pending notification at a time.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: BufferConfig) -> (Arc<Self>, mpsc::Receiver<()>) {
        let (flush_tx, flush_rx) = mpsc::channel(1);
        let (timer_tx, timer_rx) = mpsc::channel(4);

        tokio::spawn(run_flush_timer(config.flush_timeout, flush_tx, timer_rx));

        let buffer = Arc::new(Self {
            state: Mutex::new(BufferState {
                entries: Vec::with_capacity(config.high_water_mark),
                last_drain: Instant::now(),
            }),
            config,
            timer_tx,
        });

        (buffer, flush_rx)
    }

    /// Appends a record. Returns true exactly when the stored count has
    /// reached the high-water mark; the caller is expected to drain.
    pub fn add(&self, record: EventRecord) -> bool {
        let mut state = self.lock_state();
        state.entries.push(record);
        state.entries.len() >= self.config.high_water_mark
    }

    /// Current number of buffered records.
    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Conservative estimate of the memory held by buffered records.
    pub fn approx_bytes(&self) -> usize {
        self.lock_state()
            .entries
            .iter()
            .map(EventRecord::approx_bytes)
            .sum()
    }

    /// Instant of the last completed drain; the auto-flush wait restarts
    /// from this point.
    pub fn last_drain(&self) -> Instant {
        self.lock_state().last_drain
    }

    /// Atomically takes all buffered records, leaving an empty buffer, and
    /// resets the auto-flush timer.
    pub fn drain(&self) -> Vec<EventRecord> {
        let entries = self.take_entries();
        let _ = self.timer_tx.try_send(TimerCommand::Reset);
        entries
    }

    /// As [`drain`](Self::drain), but stops the auto-flush timer for good.
    /// Called exactly once, during shutdown.
    pub fn drain_final(&self) -> Vec<EventRecord> {
        let entries = self.take_entries();
        let _ = self.timer_tx.try_send(TimerCommand::Stop);
        entries
    }

    fn take_entries(&self) -> Vec<EventRecord> {
        let mut state = self.lock_state();
        state.last_drain = Instant::now();
        std::mem::replace(
            &mut state.entries,
            Vec::with_capacity(self.config.high_water_mark),
        )
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, BufferState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Background timer that suggests a flush whenever `period` elapses without
/// a drain. Suggestions are coalesced: `try_send` on the single-slot channel
/// drops the trigger if one is already pending.
async fn run_flush_timer(
    period: Duration,
    flush_tx: mpsc::Sender<()>,
    mut timer_rx: mpsc::Receiver<TimerCommand>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(period) => {
                let _ = flush_tx.try_send(());
            }
            cmd = timer_rx.recv() => match cmd {
                Some(TimerCommand::Reset) => continue,
                Some(TimerCommand::Stop) | None => break,
            },
        }
    }
}
