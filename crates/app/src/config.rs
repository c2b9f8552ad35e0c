//! Application configuration loaded from environment variables.

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Where events and read models are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

/// Runtime configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `COMMAND_MAX_ATTEMPTS`: attempts per command on concurrency conflicts (default: `3`)
/// - `STORAGE_BACKEND`: `memory` or `postgres` (default: `memory`)
/// - `DATABASE_URL`: connection string, required for `postgres`
/// - `LEDGER_BUFFER`: capacity of the ledger notification channel (default: `256`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_level: String,
    pub log_format: LogFormat,
    pub command_max_attempts: u32,
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub ledger_buffer: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => defaults.log_format,
            },
            command_max_attempts: lookup("COMMAND_MAX_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.command_max_attempts),
            storage: match lookup("STORAGE_BACKEND").as_deref() {
                Some(v) if v.eq_ignore_ascii_case("postgres") => StorageBackend::Postgres,
                _ => defaults.storage,
            },
            database_url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            ledger_buffer: lookup("LEDGER_BUFFER")
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.ledger_buffer),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            command_max_attempts: 3,
            storage: StorageBackend::Memory,
            database_url: None,
            ledger_buffer: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.command_max_attempts, 3);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.database_url, None);
        assert_eq!(config.ledger_buffer, 256);
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        assert_eq!(Config::from_lookup(lookup(&[])), Config::default());
    }

    #[test]
    fn test_reads_every_key() {
        let config = Config::from_lookup(lookup(&[
            ("RUST_LOG", "debug,sqlx=warn"),
            ("LOG_FORMAT", "JSON"),
            ("COMMAND_MAX_ATTEMPTS", "5"),
            ("STORAGE_BACKEND", "postgres"),
            ("DATABASE_URL", "postgres://localhost/produce"),
            ("LEDGER_BUFFER", "16"),
        ]));

        assert_eq!(config.log_level, "debug,sqlx=warn");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.command_max_attempts, 5);
        assert_eq!(config.storage, StorageBackend::Postgres);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/produce")
        );
        assert_eq!(config.ledger_buffer, 16);
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("COMMAND_MAX_ATTEMPTS", "0"),
            ("LEDGER_BUFFER", "lots"),
        ]));
        assert_eq!(config.command_max_attempts, 3);
        assert_eq!(config.ledger_buffer, 256);
    }
}
