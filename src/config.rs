use crate::domain::UseDate;
use chrono::{FixedOffset, Utc};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub batch_max_params: usize,
    pub calendar_window_days: u32,
    pub calendar_fetch_timeout: Option<Duration>,
    pub calendar_failure_policy: FetchFailurePolicy,
    pub stock_horizon_days: u32,
    pub business_utc_offset: FixedOffset,
}

/// What the calendar does when one of its concurrent fetches fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchFailurePolicy {
    /// Treat the failed source as empty and report a warning.
    #[default]
    Degrade,
    /// Fail the whole calendar.
    Fail,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn parse_or<T: std::str::FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
    expected: &str,
) -> Result<T, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), format!("must be {}", expected)))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or::<u16>(&env_map, "PORT", "8080", "a valid u16")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let batch_max_params =
            parse_or::<usize>(&env_map, "BATCH_MAX_PARAMS", "999", "a positive integer")?;
        if batch_max_params == 0 {
            return Err(ConfigError::InvalidValue(
                "BATCH_MAX_PARAMS".to_string(),
                "must be a positive integer".to_string(),
            ));
        }

        let calendar_window_days =
            parse_or::<u32>(&env_map, "CALENDAR_WINDOW_DAYS", "15", "a positive integer")?;
        if calendar_window_days == 0 {
            return Err(ConfigError::InvalidValue(
                "CALENDAR_WINDOW_DAYS".to_string(),
                "must be a positive integer".to_string(),
            ));
        }

        let calendar_fetch_timeout = match env_map.get("CALENDAR_FETCH_TIMEOUT_MS") {
            Some(raw) if !raw.trim().is_empty() => {
                let ms = raw.trim().parse::<u64>().map_err(|_| {
                    ConfigError::InvalidValue(
                        "CALENDAR_FETCH_TIMEOUT_MS".to_string(),
                        "must be a valid u64".to_string(),
                    )
                })?;
                Some(Duration::from_millis(ms))
            }
            _ => None,
        };

        let calendar_failure_policy = match env_map
            .get("CALENDAR_FAILURE_POLICY")
            .map(|s| s.as_str())
            .unwrap_or("degrade")
        {
            "degrade" => FetchFailurePolicy::Degrade,
            "fail" => FetchFailurePolicy::Fail,
            other => {
                return Err(ConfigError::InvalidValue(
                    "CALENDAR_FAILURE_POLICY".to_string(),
                    format!("must be degrade or fail, got {}", other),
                ))
            }
        };

        let stock_horizon_days =
            parse_or::<u32>(&env_map, "STOCK_HORIZON_DAYS", "365", "a valid u32")?;

        let offset_minutes = parse_or::<i32>(
            &env_map,
            "BUSINESS_UTC_OFFSET_MINUTES",
            "540",
            "a whole number of minutes",
        )?;
        let business_utc_offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| {
            ConfigError::InvalidValue(
                "BUSINESS_UTC_OFFSET_MINUTES".to_string(),
                "must be within +/- 24 hours".to_string(),
            )
        })?;

        Ok(Config {
            port,
            database_path,
            batch_max_params,
            calendar_window_days,
            calendar_fetch_timeout,
            calendar_failure_policy,
            stock_horizon_days,
            business_utc_offset,
        })
    }

    /// The current business date at the property.
    pub fn today(&self) -> UseDate {
        UseDate::new(Utc::now().with_timezone(&self.business_utc_offset).date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.batch_max_params, 999);
        assert_eq!(config.calendar_window_days, 15);
        assert_eq!(config.calendar_fetch_timeout, None);
        assert_eq!(config.calendar_failure_policy, FetchFailurePolicy::Degrade);
        assert_eq!(config.stock_horizon_days, 365);
        assert_eq!(config.business_utc_offset.local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_zero_batch_max_params() {
        let mut env_map = setup_required_env();
        env_map.insert("BATCH_MAX_PARAMS".to_string(), "0".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "BATCH_MAX_PARAMS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_failure_policy() {
        let mut env_map = setup_required_env();
        env_map.insert("CALENDAR_FAILURE_POLICY".to_string(), "retry".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "CALENDAR_FAILURE_POLICY"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_fetch_timeout_and_fail_policy() {
        let mut env_map = setup_required_env();
        env_map.insert("CALENDAR_FETCH_TIMEOUT_MS".to_string(), "250".to_string());
        env_map.insert("CALENDAR_FAILURE_POLICY".to_string(), "fail".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.calendar_fetch_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.calendar_failure_policy, FetchFailurePolicy::Fail);
    }

    #[test]
    fn test_offset_out_of_range() {
        let mut env_map = setup_required_env();
        env_map.insert("BUSINESS_UTC_OFFSET_MINUTES".to_string(), "10000".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "BUSINESS_UTC_OFFSET_MINUTES"),
            _ => panic!("Expected InvalidValue error"),
        }
    }
}
