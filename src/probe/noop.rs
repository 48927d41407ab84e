//! Non-Windows (noop) implementation of the window/input probe.
//!
//! Exists so the crate builds and the daemon runs on other hosts: it reports
//! no foreground window, so every tick skips recording and the process still
//! exercises buffering, flushing, and shutdown.

use anyhow::{bail, Result};

use crate::probe::types::{NotificationState, WindowHandle, WindowRect};

/// Placeholder title when the OS refuses to hand one over.
pub const TITLE_FALLBACK: &str = "Unknown";

/// A probe that never observes a window.
pub struct NoopProbe;

impl NoopProbe {
    pub fn new() -> Self {
        Self
    }

    pub fn foreground_window(&mut self) -> Option<WindowHandle> {
        None
    }

    pub fn window_title(&mut self, _handle: WindowHandle) -> String {
        TITLE_FALLBACK.to_string()
    }

    pub fn thread_and_process_id(&mut self, _handle: WindowHandle) -> (u32, u32) {
        (0, 0)
    }

    pub fn window_rect(&mut self, _handle: WindowHandle) -> Result<WindowRect> {
        bail!("no windowing system on this platform")
    }

    pub fn last_input_tick(&mut self) -> Result<u32> {
        Ok(0)
    }

    pub fn system_tick(&self) -> u32 {
        0
    }

    pub fn idle_ms(&mut self) -> Result<u64> {
        Ok(0)
    }

    pub fn notification_state(&self) -> Result<NotificationState> {
        Ok(NotificationState::NotPresent)
    }

    pub fn is_full_screen_game(&self) -> bool {
        false
    }
}

impl Default for NoopProbe {
    fn default() -> Self {
        Self::new()
    }
}
