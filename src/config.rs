use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::DEFAULT_EXCLUDED_SHEETS;
use crate::error::{PipelineError, Result};

pub const ENV_DATA_PATH: &str = "CS_DATA_PATH";
pub const ENV_SOURCE_FILE: &str = "CS_SOURCE_FILE";
pub const ENV_SCHEMA: &str = "CS_SCHEMA";
pub const ENV_DB_PATH: &str = "CS_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "CS_LOG_LEVEL";
pub const ENV_EXCLUDE_SHEETS: &str = "CS_EXCLUDE_SHEETS";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Run configuration, built once at startup and passed to the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the source file
    pub path: PathBuf,
    pub source_file: String,
    /// Namespace the customers and complaints tables are written to
    pub schema_name: String,
    pub db_credentials: DbCredentials,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_excluded_sheets")]
    pub excluded_sheets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbCredentials {
    /// SQLite database file
    pub database: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_excluded_sheets() -> Vec<String> {
    DEFAULT_EXCLUDED_SHEETS.iter().map(|s| s.to_string()).collect()
}

fn parse_sheet_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Load `.env` if present, then read the configuration from the environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through a variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| PipelineError::Config(format!("missing required environment variable {key}")))
        };

        let config = Config {
            path: PathBuf::from(required(ENV_DATA_PATH)?),
            source_file: required(ENV_SOURCE_FILE)?,
            schema_name: required(ENV_SCHEMA)?,
            db_credentials: DbCredentials {
                database: PathBuf::from(required(ENV_DB_PATH)?),
            },
            log_level: lookup(ENV_LOG_LEVEL)
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(default_log_level),
            excluded_sheets: lookup(ENV_EXCLUDE_SHEETS)
                .map(|v| parse_sheet_list(&v))
                .unwrap_or_else(default_excluded_sheets),
        };
        config.validate()?;
        Ok(config)
    }

    /// Read the configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", config_path.display(), e))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_log_level(mut self, level: &str) -> Result<Self> {
        self.log_level = level.trim().to_lowercase();
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_file.trim().is_empty() {
            return Err(PipelineError::Config("source_file must not be empty".to_string()));
        }
        let mut chars = self.schema_name.chars();
        let valid_schema = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_schema {
            return Err(PipelineError::Config(format!(
                "schema name '{}' must be a plain identifier",
                self.schema_name
            )));
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(PipelineError::Config(format!(
                "log level '{}' must be one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }

    /// Full path of the source file
    pub fn source_path(&self) -> PathBuf {
        self.path.join(&self.source_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn base_vars() -> HashMap<String, String> {
        vars(&[
            (ENV_DATA_PATH, "data"),
            (ENV_SOURCE_FILE, "cs2025.xlsx"),
            (ENV_SCHEMA, "cs2025"),
            (ENV_DB_PATH, "db/support.db"),
        ])
    }

    #[test]
    fn test_from_lookup_defaults() {
        let env = base_vars();
        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();

        assert_eq!(config.source_path(), PathBuf::from("data/cs2025.xlsx"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.excluded_sheets, vec!["Unresolved".to_string()]);
    }

    #[test]
    fn test_from_lookup_names_missing_variable() {
        let mut env = base_vars();
        env.remove(ENV_SCHEMA);

        let err = Config::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains(ENV_SCHEMA));
    }

    #[test]
    fn test_from_lookup_parses_sheet_list_and_level() {
        let mut env = base_vars();
        env.insert(ENV_EXCLUDE_SHEETS.to_string(), "Unresolved, Archive ,".to_string());
        env.insert(ENV_LOG_LEVEL.to_string(), "DEBUG".to_string());

        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.excluded_sheets, vec!["Unresolved".to_string(), "Archive".to_string()]);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_rejects_unsafe_schema_name() {
        let mut env = base_vars();
        env.insert(ENV_SCHEMA.to_string(), "cs; drop".to_string());

        assert!(matches!(
            Config::from_lookup(|k| env.get(k).cloned()),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_load_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
path = "data"
source_file = "cs2025.csv"
schema_name = "cs2025"

[db_credentials]
database = "support.db"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.db_credentials.database, PathBuf::from("support.db"));
        assert_eq!(config.log_level, "info");
        assert!(config.clone().with_log_level("loud").is_err());
    }
}
