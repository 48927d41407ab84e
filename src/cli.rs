//! Command-line surface of the watcher daemon.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Tier-1 activity watcher: samples foreground-window focus and persists
/// buffered event batches to SQLite or a Redis stream.
#[derive(Parser, Debug)]
#[command(name = "mnemosyne-watcher", version)]
pub struct Cli {
    /// Path to the SQLite database file (embedded sink)
    #[arg(long, default_value = ".mnemosyne/activity.db")]
    pub db: PathBuf,

    /// Redis address (e.g. localhost:6379); when set, events go to the
    /// remote stream instead of the database
    #[arg(long)]
    pub redis: Option<String>,

    /// Sampling period (e.g. 1000ms for 1 Hz, 200ms for 5 Hz)
    #[arg(long, default_value = "1000ms", value_parser = parse_duration)]
    pub tick: Duration,

    /// Inactivity span before ticks count as idle
    #[arg(long, default_value = "60s", value_parser = parse_duration)]
    pub idle: Duration,

    /// Buffer high-water mark before a forced flush
    #[arg(long, default_value_t = 100)]
    pub buffer: usize,

    /// Period of the automatic buffer flush
    #[arg(long, default_value = "5m", value_parser = parse_duration)]
    pub flush: Duration,
}

/// Parses duration literals of the form `500ms`, `2s`, `5m`, `1h`.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("missing unit in duration {raw:?} (try e.g. \"500ms\")"))?;
    let (digits, unit) = raw.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid numeric value in duration {raw:?}"))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        other => Err(format!("unknown duration unit {other:?} in {raw:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn rejects_bare_numbers_and_junk() {
        assert!(parse_duration("1000").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn defaults_match_the_documented_surface() {
        let cli = Cli::parse_from(["mnemosyne-watcher"]);
        assert_eq!(cli.db, PathBuf::from(".mnemosyne/activity.db"));
        assert!(cli.redis.is_none());
        assert_eq!(cli.tick, Duration::from_millis(1000));
        assert_eq!(cli.idle, Duration::from_secs(60));
        assert_eq!(cli.buffer, 100);
        assert_eq!(cli.flush, Duration::from_secs(300));
    }
}
