//! Pipeline configuration loaded from environment variables.

use std::time::Duration;

/// Scheduling and retry configuration for all pollers.
///
/// All fields have defaults suitable for local development; override via
/// environment variables in production.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Fast event-outbox poll interval (default: 1s).
    pub fast_poll_interval: Duration,
    /// Delay before the fast poller's first cycle (default: none).
    pub fast_poll_initial_delay: Duration,
    /// Age boundary between the fast and slow pollers' selections
    /// (default: 60s). The fast poller only looks at rows younger than
    /// this.
    pub freshness_window_secs: i64,
    /// Whether the slow safety-net poller runs at all (default: false).
    pub slow_poll_enabled: bool,
    /// Slow event-outbox poll interval (default: 30s).
    pub slow_poll_interval: Duration,
    /// Minimum age of a PENDING row before the slow poller considers it
    /// stuck (default: the freshness window, so the two selections
    /// partition PENDING rows without overlap).
    pub slow_poll_stuck_threshold_secs: i64,
    /// Notification-outbox poll interval (default: 5s).
    pub notification_poll_interval: Duration,
    /// Channel poll interval (default: 10s).
    pub channel_poll_interval: Duration,
    /// Publish/send attempts before a row becomes terminally failed
    /// (default: 3).
    pub max_retries: i32,
    /// Maximum rows selected per poll cycle (default: 100).
    pub batch_size: i64,
    /// Retention sweep settings.
    pub retention: RetentionConfig,
}

/// Retention sweep configuration.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Whether the sweep runs at all (default: true).
    pub enabled: bool,
    /// Terminal/read rows older than this are deleted (default: 30 days).
    pub max_age_days: i64,
    /// How often the sweep runs (default: hourly).
    pub interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fast_poll_interval: Duration::from_millis(1000),
            fast_poll_initial_delay: Duration::from_millis(0),
            freshness_window_secs: 60,
            slow_poll_enabled: false,
            slow_poll_interval: Duration::from_millis(30_000),
            slow_poll_stuck_threshold_secs: 60,
            notification_poll_interval: Duration::from_millis(5_000),
            channel_poll_interval: Duration::from_millis(10_000),
            max_retries: 3,
            batch_size: 100,
            retention: RetentionConfig {
                enabled: true,
                max_age_days: 30,
                interval: Duration::from_secs(3600),
            },
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                 |
    /// |----------------------------------|-------------------------|
    /// | `FAST_POLL_INTERVAL_MS`          | `1000`                  |
    /// | `FAST_POLL_INITIAL_DELAY_MS`     | `0`                     |
    /// | `FRESHNESS_WINDOW_SECS`          | `60`                    |
    /// | `SLOW_POLL_ENABLED`              | `false`                 |
    /// | `SLOW_POLL_INTERVAL_MS`          | `30000`                 |
    /// | `SLOW_POLL_STUCK_THRESHOLD_SECS` | `FRESHNESS_WINDOW_SECS` |
    /// | `NOTIFICATION_POLL_INTERVAL_MS`  | `5000`                  |
    /// | `CHANNEL_POLL_INTERVAL_MS`       | `10000`                 |
    /// | `MAX_RETRIES`                    | `3`                     |
    /// | `OUTBOX_BATCH_SIZE`              | `100`                   |
    /// | `RETENTION_ENABLED`              | `true`                  |
    /// | `RETENTION_MAX_AGE_DAYS`         | `30`                    |
    /// | `RETENTION_INTERVAL_SECS`        | `3600`                  |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let freshness_window_secs =
            env_parse("FRESHNESS_WINDOW_SECS", defaults.freshness_window_secs);

        Self {
            fast_poll_interval: Duration::from_millis(env_parse(
                "FAST_POLL_INTERVAL_MS",
                defaults.fast_poll_interval.as_millis() as u64,
            )),
            fast_poll_initial_delay: Duration::from_millis(env_parse(
                "FAST_POLL_INITIAL_DELAY_MS",
                0,
            )),
            freshness_window_secs,
            slow_poll_enabled: env_parse("SLOW_POLL_ENABLED", false),
            slow_poll_interval: Duration::from_millis(env_parse(
                "SLOW_POLL_INTERVAL_MS",
                defaults.slow_poll_interval.as_millis() as u64,
            )),
            slow_poll_stuck_threshold_secs: env_parse(
                "SLOW_POLL_STUCK_THRESHOLD_SECS",
                freshness_window_secs,
            ),
            notification_poll_interval: Duration::from_millis(env_parse(
                "NOTIFICATION_POLL_INTERVAL_MS",
                defaults.notification_poll_interval.as_millis() as u64,
            )),
            channel_poll_interval: Duration::from_millis(env_parse(
                "CHANNEL_POLL_INTERVAL_MS",
                defaults.channel_poll_interval.as_millis() as u64,
            )),
            max_retries: env_parse("MAX_RETRIES", defaults.max_retries),
            batch_size: env_parse("OUTBOX_BATCH_SIZE", defaults.batch_size),
            retention: RetentionConfig {
                enabled: env_parse("RETENTION_ENABLED", defaults.retention.enabled),
                max_age_days: env_parse("RETENTION_MAX_AGE_DAYS", defaults.retention.max_age_days),
                interval: Duration::from_secs(env_parse(
                    "RETENTION_INTERVAL_SECS",
                    defaults.retention.interval.as_secs(),
                )),
            },
        }
    }
}

/// Read and parse an environment variable, falling back to `default` when
/// the variable is unset or unparsable.
fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.fast_poll_interval, Duration::from_millis(1000));
        assert_eq!(config.freshness_window_secs, 60);
        assert!(!config.slow_poll_enabled);
        assert_eq!(config.slow_poll_interval, Duration::from_millis(30_000));
        assert_eq!(config.slow_poll_stuck_threshold_secs, 60);
        assert_eq!(config.notification_poll_interval, Duration::from_millis(5_000));
        assert_eq!(config.channel_poll_interval, Duration::from_millis(10_000));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.batch_size, 100);
        assert!(config.retention.enabled);
        assert_eq!(config.retention.max_age_days, 30);
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        std::env::set_var("TEST_ENV_PARSE_GARBAGE", "not-a-number");
        assert_eq!(env_parse("TEST_ENV_PARSE_GARBAGE", 7_i32), 7);
        std::env::remove_var("TEST_ENV_PARSE_GARBAGE");
    }
}
