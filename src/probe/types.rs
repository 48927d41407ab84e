//! Probe data types shared by the platform implementations.

/// Opaque OS window handle, widened to a stable 64-bit key.
pub type WindowHandle = i64;

/// Window bounding rectangle in virtual-screen coordinates.
///
/// The OS may report non-positive dimensions (minimized or off-screen
/// windows); callers must check [`is_degenerate`](Self::is_degenerate)
/// before using the rectangle for capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl WindowRect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

/// User-notification state as reported by the shell.
///
/// Only the full-screen Direct3D state gates the sampler; the others are
/// surfaced for completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationState {
    NotPresent,
    Busy,
    RunningD3dFullScreen,
    PresentationMode,
    AcceptsNotifications,
    QuietTime,
    App,
    Unknown(u32),
}

impl NotificationState {
    /// True iff a full-screen exclusive graphics application has the
    /// display.
    pub fn is_full_screen_game(&self) -> bool {
        matches!(self, NotificationState::RunningD3dFullScreen)
    }

    /// True iff the user is in a busy/presentation state.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            NotificationState::Busy | NotificationState::PresentationMode
        )
    }
}

/// Wrap-safe milliseconds between the last-input tick and the current
/// system tick. The 32-bit tick counter wraps roughly every 49.7 days;
/// wrapping subtraction keeps the difference non-negative and below 2^32.
pub fn idle_ms_between(last_input_tick: u32, system_tick: u32) -> u64 {
    u64::from(system_tick.wrapping_sub(last_input_tick))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_ms_plain_difference() {
        assert_eq!(idle_ms_between(1_000, 61_000), 60_000);
    }

    #[test]
    fn idle_ms_zero_when_ticks_equal() {
        assert_eq!(idle_ms_between(5_000, 5_000), 0);
    }

    #[test]
    fn idle_ms_survives_counter_wrap() {
        // Last input just before the 32-bit wrap, observed just after.
        let idle = idle_ms_between(u32::MAX - 500, 1_500);
        assert_eq!(idle, 2_001);
        assert!(idle < u64::from(u32::MAX));
    }

    #[test]
    fn degenerate_rect_detection() {
        let flat = WindowRect {
            left: 100,
            top: 100,
            right: 100,
            bottom: 300,
        };
        assert!(flat.is_degenerate());

        let inverted = WindowRect {
            left: 300,
            top: 0,
            right: 100,
            bottom: 200,
        };
        assert!(inverted.is_degenerate());

        let normal = WindowRect {
            left: 0,
            top: 0,
            right: 1280,
            bottom: 720,
        };
        assert!(!normal.is_degenerate());
        assert_eq!(normal.width(), 1280);
        assert_eq!(normal.height(), 720);
    }
}
