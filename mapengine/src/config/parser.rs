//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::time::Duration;

use super::defaults::timeout_from_millis;
use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::backend::ConnectionPolicy;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [pool] section
    if let Some(section) = ini.section(Some("pool")) {
        if let Some(v) = section.get("default_policy") {
            config.pool.default_policy =
                v.parse::<ConnectionPolicy>()
                    .map_err(|_| ConfigFileError::InvalidValue {
                        section: "pool".to_string(),
                        key: "default_policy".to_string(),
                        value: v.to_string(),
                        reason: "must be one of: normal, defer, always".to_string(),
                    })?;
        }
        if let Some(v) = section.get("reclaim_every") {
            config.pool.reclaim_every = parse_positive(v, "pool", "reclaim_every")?;
        }
    }

    // [query] section
    if let Some(section) = ini.section(Some("query")) {
        if let Some(v) = section.get("timeout_ms") {
            let ms: u64 = v.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "query".to_string(),
                key: "timeout_ms".to_string(),
                value: v.to_string(),
                reason: "must be a non-negative integer (milliseconds, 0 = no timeout)"
                    .to_string(),
            })?;
            config.query.timeout = timeout_from_millis(ms);
        }
    }

    // [context] section
    if let Some(section) = ini.section(Some("context")) {
        if let Some(v) = section.get("leak_grace_ms") {
            let ms: u64 = v.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "context".to_string(),
                key: "leak_grace_ms".to_string(),
                value: v.to_string(),
                reason: "must be a non-negative integer (milliseconds)".to_string(),
            })?;
            config.context.leak_grace = Duration::from_millis(ms);
        }
    }

    // [workers] section
    if let Some(section) = ini.section(Some("workers")) {
        if let Some(v) = section.get("threads") {
            config.workers.threads = parse_positive(v, "workers", "threads")?;
        }
        if let Some(v) = section.get("cycles") {
            config.workers.cycles = parse_positive(v, "workers", "cycles")?;
        }
        if let Some(v) = section.get("buffer_distance") {
            config.workers.buffer_distance = v
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite() && *d >= 0.0)
                .ok_or_else(|| ConfigFileError::InvalidValue {
                    section: "workers".to_string(),
                    key: "buffer_distance".to_string(),
                    value: v.to_string(),
                    reason: "must be a finite, non-negative number".to_string(),
                })?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if v.is_empty() || v.contains('/') {
                return Err(ConfigFileError::InvalidValue {
                    section: "logging".to_string(),
                    key: "file".to_string(),
                    value: v.to_string(),
                    reason: "must be a plain file name".to_string(),
                });
            }
            config.logging.file = v.to_string();
        }
    }

    Ok(config)
}

fn parse_positive(v: &str, section: &str, key: &str) -> Result<usize, ConfigFileError> {
    match v.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: v.to_string(),
            reason: "must be a positive integer".to_string(),
        }),
    }
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;

    fn parse(source: &str) -> Result<ConfigFile, ConfigFileError> {
        parse_ini(&Ini::load_from_str(source).unwrap())
    }

    #[test]
    fn test_empty_ini_yields_defaults() {
        assert_eq!(parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            "[pool]\n\
             default_policy = DEFER\n\
             reclaim_every = 3\n\
             [query]\n\
             timeout_ms = 500\n\
             [context]\n\
             leak_grace_ms = 20\n\
             [workers]\n\
             threads = 50\n\
             cycles = 1000\n\
             buffer_distance = 2.5\n\
             [logging]\n\
             directory = /var/log/mapengine\n\
             file = stress.log\n",
        )
        .unwrap();

        assert_eq!(config.pool.default_policy, ConnectionPolicy::Defer);
        assert_eq!(config.pool.reclaim_every, 3);
        assert_eq!(config.query.timeout, Some(Duration::from_millis(500)));
        assert_eq!(config.context.leak_grace, Duration::from_millis(20));
        assert_eq!(config.workers.threads, 50);
        assert_eq!(config.workers.cycles, 1000);
        assert_eq!(config.workers.buffer_distance, 2.5);
        assert_eq!(config.logging.directory, PathBuf::from("/var/log/mapengine"));
        assert_eq!(config.logging.file, "stress.log");
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config = parse("[query]\ntimeout_ms = 0\n").unwrap();
        assert!(config.query.timeout.is_none());
    }

    #[test]
    fn test_invalid_policy() {
        let err = parse("[pool]\ndefault_policy = sometimes\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::InvalidValue { ref key, .. } if key == "default_policy"
        ));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let err = parse("[workers]\nthreads = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::InvalidValue { ref section, ref key, .. }
                if section == "workers" && key == "threads"
        ));
    }

    #[test]
    fn test_negative_buffer_distance_rejected() {
        assert!(parse("[workers]\nbuffer_distance = -1\n").is_err());
        assert!(parse("[workers]\nbuffer_distance = NaN\n").is_err());
    }

    #[test]
    fn test_log_file_must_be_plain_name() {
        assert!(parse("[logging]\nfile = logs/engine.log\n").is_err());
        assert_eq!(
            parse("[logging]\nfile = engine.log\n").unwrap().logging.file,
            "engine.log"
        );
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/maps");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("maps"));
        }
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }

    #[test]
    fn test_default_reclaim_interval() {
        let config = parse("[pool]\ndefault_policy = normal\n").unwrap();
        assert_eq!(config.pool.reclaim_every, DEFAULT_RECLAIM_EVERY);
    }
}
