use crate::errors::ConfigError;
use crate::stats::TimePolicy;
use chrono::{FixedOffset, Weekday};
use std::env;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATA_PATH: &str = "data/lams.json";
const DEFAULT_ADMIN_PASSWORD: &str = "lams-admin";

/// Connection settings for the hosted record store. Always passed
/// explicitly to [`crate::store::RestStore::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub endpoint: String,
    pub access_key: String,
}

impl StoreConfig {
    pub fn new(endpoint: &str, access_key: &str) -> Result<Self, ConfigError> {
        let endpoint = endpoint.trim().trim_end_matches('/').to_string();
        let access_key = access_key.trim().to_string();
        reqwest::Url::parse(&endpoint)
            .map_err(|_| ConfigError::InvalidEndpoint(endpoint.clone()))?;
        if access_key.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "access_key",
                value: String::new(),
            });
        }
        Ok(Self {
            endpoint,
            access_key,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub data_path: PathBuf,
    pub store: Option<StoreConfig>,
    pub admin_password: String,
    pub time_policy: TimePolicy,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup so it can be tested without
    /// touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue { key: "PORT", value })?,
            None => DEFAULT_PORT,
        };

        let data_path = lookup("APP_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));

        let endpoint = lookup("LAMS_STORE_ENDPOINT").filter(|value| !value.trim().is_empty());
        let key = lookup("LAMS_STORE_KEY").filter(|value| !value.trim().is_empty());
        let store = match (endpoint, key) {
            (Some(endpoint), Some(key)) => Some(StoreConfig::new(&endpoint, &key)?),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete("LAMS_STORE_ENDPOINT", "LAMS_STORE_KEY"));
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete("LAMS_STORE_KEY", "LAMS_STORE_ENDPOINT"));
            }
            (None, None) => None,
        };

        let admin_password = lookup("LAMS_ADMIN_PASSWORD")
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string());

        let mut time_policy = TimePolicy::default();
        if let Some(value) = lookup("LAMS_UTC_OFFSET") {
            time_policy.offset = parse_offset(&value).ok_or(ConfigError::InvalidValue {
                key: "LAMS_UTC_OFFSET",
                value,
            })?;
        }
        if let Some(value) = lookup("LAMS_WEEK_START") {
            time_policy.week_start = parse_week_start(&value).ok_or(ConfigError::InvalidValue {
                key: "LAMS_WEEK_START",
                value,
            })?;
        }

        Ok(Self {
            port,
            data_path,
            store,
            admin_password,
            time_policy,
        })
    }
}

/// Accepts `+09:00`, `-05:30`, `+9` or `Z`.
fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => (1, raw),
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((hours, minutes)) => (hours.parse::<i32>().ok()?, minutes.parse::<i32>().ok()?),
        None => (rest.parse::<i32>().ok()?, 0),
    };
    if !(0..=23).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn parse_week_start(raw: &str) -> Option<Weekday> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "mon" | "monday" => Some(Weekday::Mon),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.data_path, PathBuf::from("data/lams.json"));
        assert!(config.store.is_none());
        assert_eq!(config.admin_password, "lams-admin");
        assert_eq!(config.time_policy, TimePolicy::default());
    }

    #[test]
    fn store_settings_need_both_values() {
        let err = config_from(&[("LAMS_STORE_ENDPOINT", "https://db.example.com")]).unwrap_err();
        assert!(matches!(err, ConfigError::Incomplete("LAMS_STORE_ENDPOINT", _)));

        let config = config_from(&[
            ("LAMS_STORE_ENDPOINT", "https://db.example.com/"),
            ("LAMS_STORE_KEY", "anon-key"),
        ])
        .unwrap();
        let store = config.store.unwrap();
        assert_eq!(store.endpoint, "https://db.example.com");
        assert_eq!(store.access_key, "anon-key");
    }

    #[test]
    fn bad_endpoint_is_rejected() {
        let err = StoreConfig::new("not a url", "key").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint(_)));
    }

    #[test]
    fn offsets_and_week_start_parse() {
        assert_eq!(parse_offset("+09:00"), FixedOffset::east_opt(9 * 3600));
        assert_eq!(parse_offset("-05:30"), FixedOffset::east_opt(-(5 * 3600 + 30 * 60)));
        assert_eq!(parse_offset("9"), FixedOffset::east_opt(9 * 3600));
        assert_eq!(parse_offset("Z"), FixedOffset::east_opt(0));
        assert_eq!(parse_offset("+25:00"), None);
        assert_eq!(parse_offset(""), None);

        let config = config_from(&[("LAMS_WEEK_START", "Sunday"), ("LAMS_UTC_OFFSET", "+00:00")])
            .unwrap();
        assert_eq!(config.time_policy.week_start, Weekday::Sun);
        assert_eq!(config.time_policy.offset.local_minus_utc(), 0);

        assert!(config_from(&[("LAMS_WEEK_START", "friday")]).is_err());
        assert!(config_from(&[("PORT", "eighty")]).is_err());
    }
}
