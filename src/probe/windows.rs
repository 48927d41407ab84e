//! Win32 implementation of the window/input probe.
//!
//! Read-only syscalls against user32/kernel32/shell32. Every call is
//! individually non-fatal: failures collapse to sentinels so a broken
//! syscall can never take down a tick. This is the only module in the crate
//! that touches `unsafe`.

use anyhow::{bail, Context, Result};
use windows::Win32::Foundation::{HWND, RECT};
use windows::Win32::System::SystemInformation::GetTickCount;
use windows::Win32::UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO};
use windows::Win32::UI::Shell::{
    SHQueryUserNotificationState, QUNS_ACCEPTS_NOTIFICATIONS, QUNS_APP, QUNS_BUSY,
    QUNS_NOT_PRESENT, QUNS_PRESENTATION_MODE, QUNS_QUIET_TIME, QUNS_RUNNING_D3D_FULL_SCREEN,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetForegroundWindow, GetWindowRect, GetWindowTextW, GetWindowThreadProcessId,
};

use crate::probe::types::{idle_ms_between, NotificationState, WindowHandle, WindowRect};

/// Placeholder title when the OS refuses to hand one over.
pub const TITLE_FALLBACK: &str = "Unknown";

/// UTF-16 capacity of the pooled title buffer; titles beyond this are
/// truncated.
const TITLE_BUF_CHARS: usize = 512;

/// Stateful probe handle. The sampler owns exactly one; the UTF-16 title
/// buffer is reused across ticks so the hot path allocates nothing beyond
/// the decoded string.
pub struct WindowsProbe {
    title_buf: Vec<u16>,
}

impl WindowsProbe {
    pub fn new() -> Self {
        Self {
            title_buf: vec![0u16; TITLE_BUF_CHARS],
        }
    }

    /// Handle of the foreground window, or `None` when nothing has focus
    /// (workstation locked, secure desktop, session teardown).
    pub fn foreground_window(&mut self) -> Option<WindowHandle> {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.is_invalid() {
            None
        } else {
            Some(hwnd.0 as i64)
        }
    }

    /// Title-bar text, decoded from UTF-16 via the pooled buffer. Falls back
    /// to a placeholder instead of failing.
    pub fn window_title(&mut self, handle: WindowHandle) -> String {
        let len = unsafe { GetWindowTextW(hwnd_from(handle), &mut self.title_buf) };
        if len <= 0 {
            return TITLE_FALLBACK.to_string();
        }
        let len = (len as usize).min(self.title_buf.len());
        String::from_utf16_lossy(&self.title_buf[..len])
    }

    /// Thread and process ids owning the window. Failure collapses to zero
    /// ids rather than an error.
    pub fn thread_and_process_id(&mut self, handle: WindowHandle) -> (u32, u32) {
        let mut pid: u32 = 0;
        let tid = unsafe { GetWindowThreadProcessId(hwnd_from(handle), Some(&mut pid)) };
        if tid == 0 {
            (0, 0)
        } else {
            (tid, pid)
        }
    }

    /// Bounding rectangle of the window. May have non-positive dimensions;
    /// callers check before capturing.
    pub fn window_rect(&mut self, handle: WindowHandle) -> Result<WindowRect> {
        let mut rect = RECT::default();
        unsafe { GetWindowRect(hwnd_from(handle), &mut rect) }
            .context("GetWindowRect failed")?;
        Ok(WindowRect {
            left: rect.left,
            top: rect.top,
            right: rect.right,
            bottom: rect.bottom,
        })
    }

    /// Tick value of the most recent input event. Wraps with the 32-bit
    /// system tick counter.
    pub fn last_input_tick(&mut self) -> Result<u32> {
        let mut info = LASTINPUTINFO {
            cbSize: std::mem::size_of::<LASTINPUTINFO>() as u32,
            dwTime: 0,
        };
        if !unsafe { GetLastInputInfo(&mut info) }.as_bool() {
            bail!("GetLastInputInfo failed");
        }
        Ok(info.dwTime)
    }

    /// Milliseconds since system start, wrapping every ~49.7 days.
    pub fn system_tick(&self) -> u32 {
        unsafe { GetTickCount() }
    }

    /// Milliseconds since the last input event, wrap-safe.
    pub fn idle_ms(&mut self) -> Result<u64> {
        let last_input = self.last_input_tick()?;
        Ok(idle_ms_between(last_input, self.system_tick()))
    }

    /// Shell notification state; distinguishes full-screen exclusive
    /// graphics from busy/presentation and ordinary desktop states.
    pub fn notification_state(&self) -> Result<NotificationState> {
        let state = unsafe { SHQueryUserNotificationState() }
            .context("SHQueryUserNotificationState failed")?;
        Ok(if state == QUNS_NOT_PRESENT {
            NotificationState::NotPresent
        } else if state == QUNS_BUSY {
            NotificationState::Busy
        } else if state == QUNS_RUNNING_D3D_FULL_SCREEN {
            NotificationState::RunningD3dFullScreen
        } else if state == QUNS_PRESENTATION_MODE {
            NotificationState::PresentationMode
        } else if state == QUNS_ACCEPTS_NOTIFICATIONS {
            NotificationState::AcceptsNotifications
        } else if state == QUNS_QUIET_TIME {
            NotificationState::QuietTime
        } else if state == QUNS_APP {
            NotificationState::App
        } else {
            NotificationState::Unknown(state.0 as u32)
        })
    }

    /// True iff a full-screen Direct3D application owns the display. Query
    /// errors read as "not a game" so the sampler keeps observing.
    pub fn is_full_screen_game(&self) -> bool {
        self.notification_state()
            .map(|state| state.is_full_screen_game())
            .unwrap_or(false)
    }
}

impl Default for WindowsProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn hwnd_from(handle: WindowHandle) -> HWND {
    HWND(handle as isize as *mut core::ffi::c_void)
}
