mod event;

pub use event::{EventRecord, SCREENSHOT_IN_MEMORY};
