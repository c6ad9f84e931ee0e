use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_ERROR_LIMIT: u32 = 5;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REFRESH_CONCURRENCY: usize = 4;
pub const DEFAULT_SCHEDULER_TICK_SECS: u64 = 60;

/// Tunables for feed ingestion and scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Failed checks tolerated before a feed is deactivated.
    pub error_limit: u32,
    /// Delay between two checks of the same feed.
    pub check_interval: Duration,
    /// Upper bound on a single feed fetch.
    pub fetch_timeout: Duration,
    /// Feeds refreshed in parallel within one batch.
    pub refresh_concurrency: usize,
    /// How often the scheduler looks for due feeds.
    pub scheduler_tick: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            error_limit: DEFAULT_ERROR_LIMIT,
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            refresh_concurrency: DEFAULT_REFRESH_CONCURRENCY,
            scheduler_tick: Duration::from_secs(DEFAULT_SCHEDULER_TICK_SECS),
        }
    }
}

impl IngestConfig {
    /// Read configuration from environment variables.
    ///
    /// - `HERALD_ERROR_LIMIT` (defaults to 5)
    /// - `HERALD_CHECK_INTERVAL_SECS` (defaults to 3600)
    /// - `HERALD_FETCH_TIMEOUT_SECS` (defaults to 10)
    /// - `HERALD_REFRESH_CONCURRENCY` (defaults to 4)
    /// - `HERALD_SCHEDULER_TICK_SECS` (defaults to 60)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, AppError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let error_limit = match lookup("HERALD_ERROR_LIMIT") {
            None => defaults.error_limit,
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                AppError::ConfigError(format!(
                    "Invalid HERALD_ERROR_LIMIT '{raw}': must be a non-negative integer"
                ))
            })?,
        };

        let check_interval = positive_secs(&lookup, "HERALD_CHECK_INTERVAL_SECS")?
            .unwrap_or(defaults.check_interval);
        let fetch_timeout = positive_secs(&lookup, "HERALD_FETCH_TIMEOUT_SECS")?
            .unwrap_or(defaults.fetch_timeout);
        let scheduler_tick = positive_secs(&lookup, "HERALD_SCHEDULER_TICK_SECS")?
            .unwrap_or(defaults.scheduler_tick);

        let refresh_concurrency = match lookup("HERALD_REFRESH_CONCURRENCY") {
            None => defaults.refresh_concurrency,
            Some(raw) => {
                let parsed: usize = raw.trim().parse().map_err(|_| {
                    AppError::ConfigError(format!(
                        "Invalid HERALD_REFRESH_CONCURRENCY '{raw}': must be a positive integer"
                    ))
                })?;
                if parsed == 0 {
                    return Err(AppError::ConfigError(
                        "HERALD_REFRESH_CONCURRENCY must be at least 1".into(),
                    ));
                }
                parsed
            }
        };

        Ok(Self {
            error_limit,
            check_interval,
            fetch_timeout,
            refresh_concurrency,
            scheduler_tick,
        })
    }

    pub fn with_error_limit(mut self, limit: u32) -> Self {
        self.error_limit = limit;
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_refresh_concurrency(mut self, concurrency: usize) -> Self {
        self.refresh_concurrency = concurrency.max(1);
        self
    }

    pub fn with_scheduler_tick(mut self, tick: Duration) -> Self {
        self.scheduler_tick = tick;
        self
    }
}

fn positive_secs<L>(lookup: &L, key: &str) -> Result<Option<Duration>, AppError>
where
    L: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let secs: u64 = raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!(
            "Invalid {key} '{raw}': must be a positive number of seconds"
        ))
    })?;
    if secs == 0 {
        return Err(AppError::ConfigError(format!("{key} must be at least 1")));
    }
    Ok(Some(Duration::from_secs(secs)))
}
