use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::Duration;

const DEFAULT_DB_PATH: &str = "kiosk.db";
const DEFAULT_CODE_TTL_SECS: i64 = 600;
const DEFAULT_CODE_LENGTH: usize = 6;
const DEFAULT_RATE_LIMIT: u32 = 5;
const DEFAULT_RATE_WINDOW_SECS: i64 = 900;

/// Verification code settings.
#[derive(Debug, Clone)]
pub struct CodeConfig {
    /// How long an issued code stays valid.
    pub ttl: Duration,
    /// Number of digits, 4..=8.
    pub length: usize,
    /// Codes a user may be issued per `rate_window`; 0 disables the limit.
    pub max_per_window: u32,
    pub rate_window: Duration,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(DEFAULT_CODE_TTL_SECS),
            length: DEFAULT_CODE_LENGTH,
            max_per_window: DEFAULT_RATE_LIMIT,
            rate_window: Duration::seconds(DEFAULT_RATE_WINDOW_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub codes: CodeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            codes: CodeConfig::default(),
        }
    }
}

impl Config {
    /// Read configuration from the environment, loading `.env` first if present.
    ///
    /// | Variable                      | Default    |
    /// |-------------------------------|------------|
    /// | `KIOSK_DB_PATH`               | `kiosk.db` |
    /// | `KIOSK_CODE_TTL_SECS`         | `600`      |
    /// | `KIOSK_CODE_LENGTH`           | `6`        |
    /// | `KIOSK_CODE_RATE_LIMIT`       | `5`        |
    /// | `KIOSK_CODE_RATE_WINDOW_SECS` | `900`      |
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unset keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("KIOSK_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let ttl_secs: i64 = parse_var(&lookup, "KIOSK_CODE_TTL_SECS", DEFAULT_CODE_TTL_SECS)?;
        let length: usize = parse_var(&lookup, "KIOSK_CODE_LENGTH", DEFAULT_CODE_LENGTH)?;
        let max_per_window: u32 = parse_var(&lookup, "KIOSK_CODE_RATE_LIMIT", DEFAULT_RATE_LIMIT)?;
        let window_secs: i64 =
            parse_var(&lookup, "KIOSK_CODE_RATE_WINDOW_SECS", DEFAULT_RATE_WINDOW_SECS)?;

        let config = Self {
            db_path,
            codes: CodeConfig {
                ttl: Duration::seconds(ttl_secs),
                length,
                max_per_window,
                rate_window: Duration::seconds(window_secs),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.codes.ttl <= Duration::zero() {
            bail!("KIOSK_CODE_TTL_SECS must be positive");
        }
        if !(4..=8).contains(&self.codes.length) {
            bail!("KIOSK_CODE_LENGTH must be between 4 and 8, got {}", self.codes.length);
        }
        if self.codes.max_per_window > 0 && self.codes.rate_window <= Duration::zero() {
            bail!("KIOSK_CODE_RATE_WINDOW_SECS must be positive when rate limiting is enabled");
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("kiosk.db"));
        assert_eq!(config.codes.ttl, Duration::minutes(10));
        assert_eq!(config.codes.length, 6);
        assert_eq!(config.codes.max_per_window, 5);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("KIOSK_DB_PATH", "/var/lib/kiosk/shop.db"),
            ("KIOSK_CODE_TTL_SECS", "120"),
            ("KIOSK_CODE_LENGTH", "8"),
            ("KIOSK_CODE_RATE_LIMIT", "0"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/kiosk/shop.db"));
        assert_eq!(config.codes.ttl, Duration::seconds(120));
        assert_eq!(config.codes.length, 8);
        assert_eq!(config.codes.max_per_window, 0);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::from_lookup(lookup(&[("KIOSK_CODE_TTL_SECS", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("KIOSK_CODE_TTL_SECS", "ten")])).is_err());
        assert!(Config::from_lookup(lookup(&[("KIOSK_CODE_LENGTH", "3")])).is_err());
        assert!(Config::from_lookup(lookup(&[("KIOSK_CODE_LENGTH", "9")])).is_err());
    }
}
