use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io { path: String, source: std::io::Error },

    #[error("failed to parse config file '{path}': {source}")]
    Parse { path: String, source: serde_json::Error },

    #[error("invalid configuration: {0}")]
    Invalid(String)
}

/// Connection parameters of one PostgreSQL server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String
}

impl DatabaseConfig {
    pub fn connection_string(&self) -> String {
        let mut s = format!(
            "host={} port={} user={} dbname={}",
            self.host, self.port, self.username, self.database
        );
        if !self.password.is_empty() {
            s.push_str(&format!(" password={}", self.password));
        }
        s
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: String::new(),
            database: "osu".to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseSettings {
    pub primary: DatabaseConfig,
    /// Read replica. The primary is used when absent.
    pub replica: Option<DatabaseConfig>,
    /// Set from `CONNECTION_STRING`
    #[serde(skip)]
    pub primary_override: Option<String>,
    /// Set from `REPLICA_CONNECTION_STRING`
    #[serde(skip)]
    pub replica_override: Option<String>
}

impl DatabaseSettings {
    pub fn primary_connection_string(&self) -> String {
        self.primary_override
            .clone()
            .unwrap_or_else(|| self.primary.connection_string())
    }

    pub fn replica_connection_string(&self) -> String {
        if let Some(s) = &self.replica_override {
            return s.clone();
        }

        match &self.replica {
            Some(replica) => replica.connection_string(),
            None => self.primary_connection_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// How often newly approved maps are looked up
    pub map_interval_ms: u64,
    /// Minimum gap between two score polls that found nothing
    pub score_interval_ms: u64,
    /// The process exits when the map poll has not run for this long
    pub stall_threshold_ms: u64
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            map_interval_ms: 10_000,
            score_interval_ms: 50,
            stall_threshold_ms: 600_000
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub user_pp_column_name: String,
    pub user_metadata_table_name: String
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            user_pp_column_name: "rank_score".to_string(),
            user_metadata_table_name: "sample_users".to_string()
        }
    }
}

/// Backpressure of background writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    pub max_pending: usize,
    pub backoff_ms: u64
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_pending: 1000,
            backoff_ms: 1
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SlackConfig {
    pub host: String,
    pub key: String,
    pub channel: String,
    pub username: String,
    pub icon_url: String
}

/// Credentials for an external alerting hook. Only carried and reported here,
/// nothing in this crate sends notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NotificationConfig {
    pub slack: SlackConfig
}

impl NotificationConfig {
    pub fn is_configured(&self) -> bool {
        !self.slack.host.is_empty() && !self.slack.key.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProcessorConfig {
    pub database: DatabaseSettings,
    pub poll: PollConfig,
    pub schema: SchemaConfig,
    pub writer: WriterConfig,
    pub notifications: NotificationConfig
}

impl ProcessorConfig {
    /// Reads the JSON file at `path`, then applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source
        })?;

        let mut config: ProcessorConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source
        })?;

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Ok(s) = env::var("CONNECTION_STRING") {
            self.database.primary_override = Some(s);
        }
        if let Ok(s) = env::var("REPLICA_CONNECTION_STRING") {
            self.database.replica_override = Some(s);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.stall_threshold_ms <= self.poll.map_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "poll.stall_threshold_ms ({}) must exceed poll.map_interval_ms ({})",
                self.poll.stall_threshold_ms, self.poll.map_interval_ms
            )));
        }
        if self.writer.max_pending == 0 {
            return Err(ConfigError::Invalid("writer.max_pending must be positive".to_string()));
        }
        for (key, value) in [
            ("schema.user_pp_column_name", &self.schema.user_pp_column_name),
            ("schema.user_metadata_table_name", &self.schema.user_metadata_table_name)
        ] {
            if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(ConfigError::Invalid(format!("{key} must be a plain identifier, got '{value}'")));
            }
        }
        Ok(())
    }

    pub fn map_interval(&self) -> Duration {
        Duration::from_millis(self.poll.map_interval_ms)
    }

    pub fn score_interval(&self) -> Duration {
        Duration::from_millis(self.poll.score_interval_ms)
    }

    pub fn stall_threshold(&self) -> Duration {
        Duration::from_millis(self.poll.stall_threshold_ms)
    }

    pub fn writer_backoff(&self) -> Duration {
        Duration::from_millis(self.writer.backoff_ms)
    }
}
