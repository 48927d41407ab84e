//! Platform probe: read-only observation of windowing and input state.
//!
//! The real implementation speaks Win32; other targets get a noop probe so
//! the daemon still builds and drains cleanly without ever recording.

pub mod types;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(target_os = "windows"))]
pub mod noop;

pub use types::{idle_ms_between, NotificationState, WindowHandle, WindowRect};

#[cfg(target_os = "windows")]
pub use windows::TITLE_FALLBACK;

/// Platform-agnostic probe type alias
#[cfg(target_os = "windows")]
pub type Probe = windows::WindowsProbe;

#[cfg(not(target_os = "windows"))]
pub use noop::TITLE_FALLBACK;

/// Platform-agnostic probe type alias
#[cfg(not(target_os = "windows"))]
pub type Probe = noop::NoopProbe;
