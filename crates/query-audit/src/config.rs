use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// Comma-separated table allow-list. Empty audits nothing.
    #[serde(default)]
    pub log_tables: String,
    /// Comma-separated database allow-list. Empty audits nothing.
    #[serde(default)]
    pub log_databases: String,
    #[serde(default = "default_true")]
    pub always_fflush: bool,
    /// Byte capacity of each allow-list; longer lists are truncated.
    #[serde(default = "default_filter_capacity")]
    pub filter_capacity: usize,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            log_tables: String::new(),
            log_databases: String::new(),
            always_fflush: default_true(),
            filter_capacity: default_filter_capacity(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default-value functions used by serde
// ---------------------------------------------------------------------------

fn default_log_file() -> PathBuf {
    PathBuf::from("/var/log/query_audit.log")
}

fn default_true() -> bool {
    true
}

fn default_filter_capacity() -> usize {
    access_filter::DEFAULT_CAPACITY
}

fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Runtime changes
// ---------------------------------------------------------------------------

/// A configuration change applied without restart.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigChange {
    LogFile(PathBuf),
    LogTables(String),
    LogDatabases(String),
    #[serde(rename = "always_fflush")]
    AlwaysFlush(bool),
}

impl ConfigChange {
    /// Name of the system variable this change corresponds to.
    pub fn variable(&self) -> &'static str {
        match self {
            ConfigChange::LogFile(_) => "query_audit_log_file",
            ConfigChange::LogTables(_) => "query_audit_log_tables",
            ConfigChange::LogDatabases(_) => "query_audit_log_databases",
            ConfigChange::AlwaysFlush(_) => "query_audit_always_fflush",
        }
    }
}

impl fmt::Display for ConfigChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigChange::LogFile(path) => write!(f, "{}", path.display()),
            ConfigChange::LogTables(csv) | ConfigChange::LogDatabases(csv) => f.write_str(csv),
            ConfigChange::AlwaysFlush(true) => f.write_str("ON"),
            ConfigChange::AlwaysFlush(false) => f.write_str("OFF"),
        }
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load configuration from a YAML file.
///
/// If the file does not exist a default configuration is returned and a
/// warning is emitted. The defaults audit nothing until both allow-lists
/// are set.
pub fn load(path: &Path) -> anyhow::Result<AuditConfig> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "configuration file not found; using defaults"
        );
        return Ok(AuditConfig::default());
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

    load_from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))
}

pub fn load_from_str(yaml: &str) -> anyhow::Result<AuditConfig> {
    let config: AuditConfig = serde_yml::from_str(yaml)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_deny_everything_and_flush() {
        let config = AuditConfig::default();
        assert_eq!(config.log_file, PathBuf::from("/var/log/query_audit.log"));
        assert!(config.log_tables.is_empty());
        assert!(config.log_databases.is_empty());
        assert!(config.always_fflush);
        assert_eq!(config.filter_capacity, access_filter::DEFAULT_CAPACITY);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn load_partial_yaml_fills_defaults() {
        let config = load_from_str(
            r#"
log_tables: "orders,users"
log_databases: "shop"
"#,
        )
        .unwrap();
        assert_eq!(config.log_tables, "orders,users");
        assert_eq!(config.log_databases, "shop");
        assert!(config.always_fflush);
        assert_eq!(config.log_file, PathBuf::from("/var/log/query_audit.log"));
    }

    #[test]
    fn load_full_yaml() {
        let config = load_from_str(
            r#"
log_file: /tmp/audit.log
log_tables: orders
log_databases: shop
always_fflush: false
filter_capacity: 64
logging:
  level: debug
"#,
        )
        .unwrap();
        assert_eq!(config.log_file, PathBuf::from("/tmp/audit.log"));
        assert!(!config.always_fflush);
        assert_eq!(config.filter_capacity, 64);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let config = load(Path::new("/does/not/exist.yaml")).unwrap();
        assert!(config.log_tables.is_empty());
    }

    #[test]
    fn load_rejects_bad_types() {
        let err = load_from_str("always_fflush: sometimes").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn change_from_json() {
        let change: ConfigChange = serde_json::from_str(r#"{"log_tables":"orders"}"#).unwrap();
        assert_eq!(change, ConfigChange::LogTables("orders".to_string()));

        let change: ConfigChange = serde_json::from_str(r#"{"always_fflush":false}"#).unwrap();
        assert_eq!(change, ConfigChange::AlwaysFlush(false));
    }

    #[test]
    fn change_variable_names_and_display() {
        let change = ConfigChange::AlwaysFlush(true);
        assert_eq!(change.variable(), "query_audit_always_fflush");
        assert_eq!(change.to_string(), "ON");

        let change = ConfigChange::LogFile(PathBuf::from("/var/log/a.log"));
        assert_eq!(change.variable(), "query_audit_log_file");
        assert_eq!(change.to_string(), "/var/log/a.log");
    }
}
