pub mod buffer;
pub mod capture;
pub mod cli;
pub mod db;
pub mod models;
pub mod probe;
pub mod sampler;
pub mod sink;
pub mod utils;

pub use buffer::{BufferConfig, EventBuffer};
pub use db::Database;
pub use models::{EventRecord, SCREENSHOT_IN_MEMORY};
pub use sampler::{Sampler, SamplerConfig, SamplerController};
pub use sink::{EventSink, RedisStreamSink};

/// Application version, stamped into the startup log line.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
