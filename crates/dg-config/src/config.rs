use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dg_types::{DocGateError, Result, WindowUnit};
use serde::Serialize;
use tracing::debug;

/// Document creation endpoint used when `API_URL` is not set.
pub const DEFAULT_API_URL: &str = "https://ismp.crpt.ru/api/v3/lk/documents/create";

/// Application configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    // Rate limiting
    pub window_unit: WindowUnit,
    pub rate_limit: usize,

    // Remote API
    pub api_url: String,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,

    // Logging
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub log_structured: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_unit: WindowUnit::Second,
            rate_limit: 10,
            api_url: DEFAULT_API_URL.to_string(),
            connect_timeout_ms: 10_000,
            read_timeout_ms: 30_000,
            log_level: "info".to_string(),
            log_file: None,
            log_structured: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables (with dotenvy).
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors: the file may not exist)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an env-style file. Keys missing from the file
    /// fall back to the process environment.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let iter = dotenvy::from_path_iter(path).map_err(|e| {
            DocGateError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;

        let mut vars = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|e| {
                DocGateError::Config(format!("Failed to parse {}: {e}", path.display()))
            })?;
            vars.insert(key, value);
        }
        debug!(path = %path.display(), keys = vars.len(), "Loaded config file");

        Self::from_lookup(|key| vars.get(key).cloned().or_else(|| std::env::var(key).ok()))
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let window_unit = match get("RATE_WINDOW_UNIT") {
            Some(raw) => raw.parse::<WindowUnit>()?,
            None => defaults.window_unit,
        };

        let rate_limit = parse_or("RATE_LIMIT", get("RATE_LIMIT"), defaults.rate_limit)?;
        if rate_limit == 0 {
            return Err(DocGateError::Config(
                "RATE_LIMIT must be at least 1".to_string(),
            ));
        }

        let config = Config {
            window_unit,
            rate_limit,
            api_url: get("API_URL").unwrap_or(defaults.api_url),
            connect_timeout_ms: parse_or(
                "API_CONNECT_TIMEOUT_MS",
                get("API_CONNECT_TIMEOUT_MS"),
                defaults.connect_timeout_ms,
            )?,
            read_timeout_ms: parse_or(
                "API_READ_TIMEOUT_MS",
                get("API_READ_TIMEOUT_MS"),
                defaults.read_timeout_ms,
            )?,
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_file: get("LOG_FILE").map(PathBuf::from),
            log_structured: get("LOG_STRUCTURED")
                .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(defaults.log_structured),
        };

        Ok(config)
    }

    pub fn window(&self) -> Duration {
        self.window_unit.duration()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Env helpers
// ---------------------------------------------------------------------------

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|e| DocGateError::Config(format!("Invalid value for {key} ({v:?}): {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn config_defaults() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.window_unit, WindowUnit::Second);
        assert_eq!(cfg.rate_limit, 10);
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.read_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.log_file.is_none());
        assert!(!cfg.log_structured);
    }

    #[test]
    fn config_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("RATE_WINDOW_UNIT", "minute"),
            ("RATE_LIMIT", "25"),
            ("API_URL", "http://localhost:9000/create"),
            ("API_READ_TIMEOUT_MS", "500"),
            ("LOG_FILE", "/var/log/docgate.log"),
            ("LOG_STRUCTURED", "yes"),
        ]))
        .unwrap();

        assert_eq!(cfg.window_unit, WindowUnit::Minute);
        assert_eq!(cfg.window(), Duration::from_secs(60));
        assert_eq!(cfg.rate_limit, 25);
        assert_eq!(cfg.api_url, "http://localhost:9000/create");
        assert_eq!(cfg.read_timeout(), Duration::from_millis(500));
        assert_eq!(cfg.log_file.as_deref(), Some(Path::new("/var/log/docgate.log")));
        assert!(cfg.log_structured);
    }

    #[test]
    fn config_blank_values_use_defaults() {
        let cfg = Config::from_lookup(lookup(&[("RATE_LIMIT", "  "), ("API_URL", "")])).unwrap();
        assert_eq!(cfg.rate_limit, 10);
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn config_rejects_zero_limit() {
        let err = Config::from_lookup(lookup(&[("RATE_LIMIT", "0")])).unwrap_err();
        assert!(matches!(err, DocGateError::Config(_)));
    }

    #[test]
    fn config_rejects_negative_limit() {
        let err = Config::from_lookup(lookup(&[("RATE_LIMIT", "-3")])).unwrap_err();
        assert!(err.to_string().contains("RATE_LIMIT"));
    }

    #[test]
    fn config_rejects_unknown_unit() {
        let err = Config::from_lookup(lookup(&[("RATE_WINDOW_UNIT", "fortnight")])).unwrap_err();
        assert!(matches!(err, DocGateError::Config(_)));
    }

    #[test]
    fn config_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("docgate.env");
        std::fs::write(
            &path,
            "RATE_WINDOW_UNIT=hour\nRATE_LIMIT=3\nAPI_CONNECT_TIMEOUT_MS=250\n",
        )
        .unwrap();

        let cfg = Config::load_from_file(&path).unwrap();
        assert_eq!(cfg.window_unit, WindowUnit::Hour);
        assert_eq!(cfg.rate_limit, 3);
        assert_eq!(cfg.connect_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn config_load_from_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Config::load_from_file(&tmp.path().join("absent.env")).unwrap_err();
        assert!(matches!(err, DocGateError::Config(_)));
    }

    #[test]
    fn config_serializes_for_display() {
        let cfg = Config::default();
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["window_unit"], "second");
        assert_eq!(json["rate_limit"], 10);
    }
}
