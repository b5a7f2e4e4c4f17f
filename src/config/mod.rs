use std::time::Duration;

use crate::errors::{PithyError, PithyResult};
use crate::services::SchedulerConfig;

const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;
const DEFAULT_STALENESS_SECS: u64 = 600;
const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 10;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Upper bound for every duration setting (one year).
const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub refresh_interval: Duration,
    pub staleness: Duration,
    pub max_concurrent_fetches: usize,
    pub fetch_timeout: Duration,
    pub log_level: String,
}

impl Config {
    /// Get the directory where the executable is located
    fn exe_dir() -> Option<std::path::PathBuf> {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    pub fn from_env() -> PithyResult<Self> {
        let exe_dir = Self::exe_dir();

        // Try to load .env from executable's directory first
        if let Some(ref dir) = exe_dir {
            let env_path = dir.join(".env");
            if env_path.exists() {
                dotenvy::from_path(&env_path).ok();
            }
        }
        // Fall back to current directory
        dotenvy::dotenv().ok();

        // Default db_path is relative to executable directory
        let db_path = std::env::var("PITHY_DB_PATH").unwrap_or_else(|_| {
            exe_dir
                .map(|d| d.join("pithy.db").to_string_lossy().into_owned())
                .unwrap_or_else(|| "./pithy.db".to_string())
        });

        let config = Self {
            db_path,
            refresh_interval: Duration::from_secs(env_or(
                "PITHY_REFRESH_INTERVAL_SECS",
                DEFAULT_REFRESH_INTERVAL_SECS,
            )?),
            staleness: Duration::from_secs(env_or("PITHY_STALENESS_SECS", DEFAULT_STALENESS_SECS)?),
            max_concurrent_fetches: env_or(
                "PITHY_MAX_CONCURRENT_FETCHES",
                DEFAULT_MAX_CONCURRENT_FETCHES,
            )?,
            fetch_timeout: Duration::from_secs(env_or(
                "PITHY_FETCH_TIMEOUT_SECS",
                DEFAULT_FETCH_TIMEOUT_SECS,
            )?),
            log_level: std::env::var("PITHY_LOG").unwrap_or_else(|_| "info".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// The staleness window must cover at least one tick, otherwise a feed
    /// fetched during one tick could be selected again by the next.
    pub fn validate(&self) -> PithyResult<()> {
        for (name, value) in [
            ("refresh interval", self.refresh_interval),
            ("staleness threshold", self.staleness),
            ("fetch timeout", self.fetch_timeout),
        ] {
            if value.as_secs() > MAX_DURATION_SECS {
                return Err(PithyError::Config(format!(
                    "{} ({}s) exceeds the maximum of {}s",
                    name,
                    value.as_secs(),
                    MAX_DURATION_SECS
                )));
            }
        }
        if self.refresh_interval.is_zero() {
            return Err(PithyError::Config(
                "refresh interval must be at least one second".to_string(),
            ));
        }
        if self.staleness < self.refresh_interval {
            return Err(PithyError::Config(format!(
                "staleness threshold ({}s) must not be shorter than the refresh interval ({}s)",
                self.staleness.as_secs(),
                self.refresh_interval.as_secs()
            )));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(PithyError::Config(
                "max concurrent fetches must be at least 1".to_string(),
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(PithyError::Config(
                "fetch timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            refresh_interval: self.refresh_interval,
            staleness: self.staleness,
            max_concurrent_fetches: self.max_concurrent_fetches,
            fetch_timeout: self.fetch_timeout,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> PithyResult<T> {
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| PithyError::InvalidEnvVar {
            name: name.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            db_path: ":memory:".to_string(),
            refresh_interval: Duration::from_secs(60),
            staleness: Duration::from_secs(600),
            max_concurrent_fetches: 4,
            fetch_timeout: Duration::from_secs(30),
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_staleness_shorter_than_interval_rejected() {
        let cfg = Config {
            staleness: Duration::from_secs(30),
            ..config()
        };
        assert!(matches!(cfg.validate(), Err(PithyError::Config(_))));
    }

    #[test]
    fn test_oversized_durations_rejected() {
        let staleness = Config {
            staleness: Duration::from_secs(10_000_000_000_000),
            ..config()
        };
        assert!(matches!(staleness.validate(), Err(PithyError::Config(_))));

        let interval = Config {
            refresh_interval: Duration::from_secs(u64::MAX),
            staleness: Duration::from_secs(u64::MAX),
            ..config()
        };
        assert!(matches!(interval.validate(), Err(PithyError::Config(_))));

        let timeout = Config {
            fetch_timeout: Duration::from_secs(MAX_DURATION_SECS + 1),
            ..config()
        };
        assert!(matches!(timeout.validate(), Err(PithyError::Config(_))));

        let at_limit = Config {
            refresh_interval: Duration::from_secs(MAX_DURATION_SECS),
            staleness: Duration::from_secs(MAX_DURATION_SECS),
            ..config()
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let cfg = Config {
            max_concurrent_fetches: 0,
            ..config()
        };
        assert!(matches!(cfg.validate(), Err(PithyError::Config(_))));
    }

    #[test]
    fn test_env_or_parses_and_defaults() {
        std::env::set_var("PITHY_TEST_ENV_OR_SET", "42");
        assert_eq!(env_or("PITHY_TEST_ENV_OR_SET", 7u64).unwrap(), 42);
        assert_eq!(env_or("PITHY_TEST_ENV_OR_UNSET", 7u64).unwrap(), 7);

        std::env::set_var("PITHY_TEST_ENV_OR_BAD", "soon");
        assert!(matches!(
            env_or("PITHY_TEST_ENV_OR_BAD", 7u64),
            Err(PithyError::InvalidEnvVar { .. })
        ));
    }

    #[test]
    fn test_scheduler_config_projection() {
        let sc = config().scheduler_config();
        assert_eq!(sc.refresh_interval, Duration::from_secs(60));
        assert_eq!(sc.staleness, Duration::from_secs(600));
        assert_eq!(sc.max_concurrent_fetches, 4);
    }
}
