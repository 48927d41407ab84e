//! The fixed-cadence observation loop.
//!
//! Each tick runs the gate → probe → score → screenshot → admission pipeline
//! against the platform probe and pushes admitted records into the event
//! buffer. The decision logic lives here as pure functions over the sampler
//! state; the loop itself is in [`loop_worker`].

mod controller;
mod loop_worker;
mod stats;

pub use controller::SamplerController;
pub use loop_worker::Sampler;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use crate::probe::WindowHandle;

/// Idle time at which the intensity score has fully decayed.
const INTENSITY_DECAY_MS: u64 = 5000;

/// Score above which input activity alone admits a record.
const INTENSITY_ADMIT_THRESHOLD: f32 = 0.1;

/// A record is admitted as a heartbeat once this much time has passed since
/// the last admission, even with nothing else changing.
const SIGNIFICANT_GAP: Duration = Duration::from_secs(5);

/// Sampler tuning.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Tick period.
    pub tick_interval: Duration,
    /// Inactivity span after which the user counts as idle.
    pub idle_threshold: Duration,
    /// Minimum spacing between screenshots.
    pub screenshot_interval: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1000),
            idle_threshold: Duration::from_secs(60),
            screenshot_interval: Duration::from_secs(1),
        }
    }
}

/// Monotonic run counters, shared read-only with the stats task.
#[derive(Default)]
pub struct SamplerCounters {
    pub ticks_total: AtomicU64,
    pub ticks_skipped: AtomicU64,
    pub ticks_idle: AtomicU64,
    pub flush_count: AtomicU64,
    pub events_pushed: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy)]
pub struct CounterSnapshot {
    pub ticks_total: u64,
    pub ticks_skipped: u64,
    pub ticks_idle: u64,
    pub flush_count: u64,
    pub events_pushed: u64,
}

impl SamplerCounters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            ticks_total: self.ticks_total.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            ticks_idle: self.ticks_idle.load(Ordering::Relaxed),
            flush_count: self.flush_count.load(Ordering::Relaxed),
            events_pushed: self.events_pushed.load(Ordering::Relaxed),
        }
    }
}

/// Mutable per-run sampler state. Touched only by the sampler task.
pub(crate) struct SamplerState {
    pub last_window_handle: WindowHandle,
    pub last_window_title: String,
    pub last_process_name: String,
    pub last_input_tick: u32,
    /// Time of the last *admitted* record; drives the heartbeat admission.
    pub last_tick_time: Instant,
    pub last_screenshot_time: Option<Instant>,
}

impl SamplerState {
    pub fn new() -> Self {
        Self {
            last_window_handle: 0,
            last_window_title: String::new(),
            last_process_name: String::new(),
            last_input_tick: 0,
            last_tick_time: Instant::now(),
            last_screenshot_time: None,
        }
    }
}

/// What one tick observed, before the admission decision.
pub(crate) struct TickObservation<'a> {
    pub window_handle: WindowHandle,
    pub window_title: &'a str,
    pub process_name: &'a str,
    pub is_idle: bool,
    pub intensity: f32,
    pub screenshot_taken: bool,
}

/// Input-activity score in [0, 1]. Zero while idle or when the input tick
/// has not moved since the previous observation; otherwise decays linearly
/// from 1.0 at zero idle to 0.0 at five seconds.
pub(crate) fn input_intensity(is_idle: bool, input_tick_changed: bool, idle_ms: u64) -> f32 {
    if is_idle || !input_tick_changed {
        return 0.0;
    }
    if idle_ms >= INTENSITY_DECAY_MS {
        return 0.0;
    }
    1.0 - idle_ms as f32 / INTENSITY_DECAY_MS as f32
}

/// Screenshot gate: never while idle, and no more often than `interval`.
/// (The game gate has already returned before this point.)
pub(crate) fn screenshot_due(
    is_idle: bool,
    last_screenshot: Option<Instant>,
    interval: Duration,
) -> bool {
    if is_idle {
        return false;
    }
    match last_screenshot {
        Some(at) => at.elapsed() >= interval,
        None => true,
    }
}

/// Admission predicate: record iff something about the focus changed, input
/// activity is significant, a screenshot was produced, or enough time has
/// passed that a heartbeat entry is due.
pub(crate) fn should_admit(state: &SamplerState, obs: &TickObservation<'_>) -> bool {
    let window_changed = obs.window_handle != state.last_window_handle;
    let title_changed = obs.window_title != state.last_window_title;
    let process_changed = obs.process_name != state.last_process_name;
    let heartbeat_due = state.last_tick_time.elapsed() > SIGNIFICANT_GAP;
    let active_input = !obs.is_idle && obs.intensity > INTENSITY_ADMIT_THRESHOLD;

    window_changed
        || title_changed
        || process_changed
        || heartbeat_due
        || active_input
        || obs.screenshot_taken
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation<'a>(
        state: &SamplerState,
        title: &'a str,
        process: &'a str,
    ) -> TickObservation<'a> {
        TickObservation {
            window_handle: state.last_window_handle,
            window_title: title,
            process_name: process,
            is_idle: false,
            intensity: 0.0,
            screenshot_taken: false,
        }
    }

    #[test]
    fn intensity_is_zero_while_idle() {
        assert_eq!(input_intensity(true, true, 0), 0.0);
        assert_eq!(input_intensity(true, true, 120_000), 0.0);
    }

    #[test]
    fn intensity_is_zero_without_new_input() {
        assert_eq!(input_intensity(false, false, 100), 0.0);
    }

    #[test]
    fn intensity_decays_over_five_seconds() {
        assert_eq!(input_intensity(false, true, 0), 1.0);
        let mid = input_intensity(false, true, 2500);
        assert!((mid - 0.5).abs() < 1e-6);
        assert_eq!(input_intensity(false, true, 5000), 0.0);
        assert_eq!(input_intensity(false, true, 60_000), 0.0);
    }

    #[test]
    fn intensity_stays_in_unit_range() {
        for idle_ms in [0u64, 1, 499, 4999, 5000, 100_000] {
            let score = input_intensity(false, true, idle_ms);
            assert!((0.0..=1.0).contains(&score), "score {score} out of range");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_idle_window_is_not_admitted() {
        // Mirrors a user walking away: same window, no input, no screenshot.
        let mut state = SamplerState::new();
        state.last_window_handle = 1;
        state.last_window_title = "A".to_string();
        state.last_process_name = "p.exe".to_string();
        state.last_tick_time = Instant::now();

        // Five one-second ticks: the heartbeat gap never exceeds five
        // seconds, so nothing else can admit.
        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(1)).await;
            let mut obs = observation(&state, "A", "p.exe");
            obs.is_idle = true;
            assert!(!should_admit(&state, &obs));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returning_input_is_admitted() {
        let mut state = SamplerState::new();
        state.last_window_handle = 1;
        state.last_window_title = "A".to_string();
        state.last_process_name = "p.exe".to_string();
        state.last_tick_time = Instant::now();

        let mut obs = observation(&state, "A", "p.exe");
        obs.intensity = input_intensity(false, true, 0);
        assert!(should_admit(&state, &obs));
    }

    #[tokio::test(start_paused = true)]
    async fn window_change_is_admitted_exactly_once() {
        let mut state = SamplerState::new();
        state.last_window_handle = 1;
        state.last_window_title = "A".to_string();
        state.last_process_name = "p.exe".to_string();
        state.last_tick_time = Instant::now();

        let mut obs = observation(&state, "B", "p.exe");
        obs.window_handle = 2;
        assert!(should_admit(&state, &obs));

        // After the admission the state catches up and the next identical
        // tick stays quiet.
        state.last_window_handle = 2;
        state.last_window_title = "B".to_string();
        state.last_tick_time = Instant::now();
        let obs = observation(&state, "B", "p.exe");
        assert!(!should_admit(&state, &obs));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_fires_after_significant_gap() {
        let mut state = SamplerState::new();
        state.last_window_handle = 1;
        state.last_window_title = "A".to_string();
        state.last_process_name = "p.exe".to_string();
        state.last_tick_time = Instant::now();

        tokio::time::advance(Duration::from_secs(4)).await;
        let mut obs = observation(&state, "A", "p.exe");
        obs.is_idle = true;
        assert!(!should_admit(&state, &obs));

        tokio::time::advance(Duration::from_secs(2)).await;
        let mut obs = observation(&state, "A", "p.exe");
        obs.is_idle = true;
        assert!(should_admit(&state, &obs));
    }

    #[tokio::test(start_paused = true)]
    async fn screenshot_rate_is_limited_by_interval() {
        let interval = Duration::from_secs(1);

        assert!(screenshot_due(false, None, interval));
        let taken_at = Instant::now();

        tokio::time::advance(Duration::from_millis(400)).await;
        assert!(!screenshot_due(false, Some(taken_at), interval));

        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(screenshot_due(false, Some(taken_at), interval));
    }

    #[test]
    fn no_screenshots_while_idle() {
        assert!(!screenshot_due(true, None, Duration::from_secs(1)));
    }
}
