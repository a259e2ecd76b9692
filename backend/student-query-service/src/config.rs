/// Configuration management for Student Query Service
///
/// Loads configuration from environment variables.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Storage backend configuration
    pub storage: StorageConfig,
    /// Kafka consumer configuration
    pub kafka: KafkaConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// HTTP port for the read API and health checks
    pub http_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" | "in_memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow!("unknown storage backend '{}'", other)),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database configuration, present when backend is postgres
    pub database: Option<DatabaseConfig>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    pub max_connections: u32,
    /// Min connections in pool
    pub min_connections: u32,
}

/// What to do with a message whose processing failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log and move on
    Drop,
    /// Retry retryable failures, then drop
    Retry,
    /// Publish to the dead-letter topic
    DeadLetter,
}

impl FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" | "skip" => Ok(FailurePolicy::Drop),
            "retry" => Ok(FailurePolicy::Retry),
            "dead_letter" | "dead-letter" | "dlq" => Ok(FailurePolicy::DeadLetter),
            other => Err(anyhow!("unknown failure policy '{}'", other)),
        }
    }
}

/// Kafka consumer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Run the student events consumer at all
    pub enabled: bool,
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    pub auto_offset_reset: String,
    pub failure_policy: FailurePolicy,
    /// Retries after the first attempt when policy is `retry`
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub dlq_topic: String,
    pub dlq_timeout_ms: u64,
    /// Publish attempts per dead letter before the consumer stops
    pub dlq_publish_attempts: u32,
}

// Default values
fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

pub const DEFAULT_TOPIC: &str = "student-event-topic";
pub const DEFAULT_GROUP_ID: &str = "student-event-group";

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid value for {}: '{}' ({})", key, raw, e)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let app = AppConfig {
            env: env_or("APP_ENV", "development"),
            host: env_or("APP_HOST", "0.0.0.0"),
            http_port: env_parse("PORT", 8080)?,
        };

        let backend: StorageBackend = env_or("STORAGE_BACKEND", "postgres").parse()?;
        let database = match backend {
            StorageBackend::Postgres => Some(DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .context("DATABASE_URL environment variable not set")?,
                max_connections: env_parse("DB_MAX_CONNECTIONS", default_max_connections())?,
                min_connections: env_parse("DB_MIN_CONNECTIONS", default_min_connections())?,
            }),
            StorageBackend::Memory => None,
        };

        let topic = env_or("KAFKA_STUDENT_EVENTS_TOPIC", DEFAULT_TOPIC);
        let kafka = KafkaConfig {
            enabled: env_or("KAFKA_ENABLED", "true").eq_ignore_ascii_case("true"),
            brokers: env_or("KAFKA_BROKERS", "localhost:9092"),
            group_id: env_or("KAFKA_STUDENT_EVENTS_GROUP_ID", DEFAULT_GROUP_ID),
            auto_offset_reset: env_or("KAFKA_AUTO_OFFSET_RESET", "earliest"),
            failure_policy: env_or("STUDENT_EVENTS_FAILURE_POLICY", "dead_letter").parse()?,
            max_retries: env_parse("STUDENT_EVENTS_MAX_RETRIES", 3)?,
            retry_backoff_ms: env_parse("STUDENT_EVENTS_RETRY_BACKOFF_MS", 500)?,
            dlq_topic: env_or("KAFKA_STUDENT_EVENTS_DLQ_TOPIC", &format!("{}.dlq", topic)),
            dlq_timeout_ms: env_parse("KAFKA_DLQ_TIMEOUT_MS", 5000)?,
            dlq_publish_attempts: env_parse("KAFKA_DLQ_PUBLISH_ATTEMPTS", 3)?,
            topic,
        };

        if kafka.enabled && kafka.brokers.trim().is_empty() {
            return Err(anyhow!("KAFKA_BROKERS is empty while KAFKA_ENABLED=true"));
        }

        Ok(Config {
            app,
            storage: StorageConfig { backend, database },
            kafka,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "APP_ENV",
        "PORT",
        "STORAGE_BACKEND",
        "DATABASE_URL",
        "KAFKA_ENABLED",
        "KAFKA_BROKERS",
        "KAFKA_STUDENT_EVENTS_TOPIC",
        "KAFKA_STUDENT_EVENTS_DLQ_TOPIC",
        "STUDENT_EVENTS_FAILURE_POLICY",
        "STUDENT_EVENTS_MAX_RETRIES",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_default_values() {
        clear_env();
        std::env::set_var("DATABASE_URL", "postgres://test");

        let config = Config::from_env().unwrap();

        assert_eq!(config.app.env, "development");
        assert_eq!(config.app.host, "0.0.0.0");
        assert_eq!(config.app.http_port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        let database = config.storage.database.unwrap();
        assert_eq!(database.max_connections, 10);
        assert_eq!(database.min_connections, 1);
        assert_eq!(config.kafka.topic, "student-event-topic");
        assert_eq!(config.kafka.group_id, "student-event-group");
        assert_eq!(config.kafka.dlq_topic, "student-event-topic.dlq");
        assert_eq!(config.kafka.failure_policy, FailurePolicy::DeadLetter);
        assert_eq!(config.kafka.max_retries, 3);
        assert_eq!(config.kafka.dlq_publish_attempts, 3);
        assert!(config.kafka.enabled);
    }

    #[test]
    #[serial]
    fn test_memory_backend_needs_no_database_url() {
        clear_env();
        std::env::set_var("STORAGE_BACKEND", "memory");

        let config = Config::from_env().unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.storage.database.is_none());
    }

    #[test]
    #[serial]
    fn test_postgres_backend_requires_database_url() {
        clear_env();
        assert!(Config::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_dlq_topic_follows_custom_topic() {
        clear_env();
        std::env::set_var("STORAGE_BACKEND", "memory");
        std::env::set_var("KAFKA_STUDENT_EVENTS_TOPIC", "school.students");
        std::env::set_var("STUDENT_EVENTS_FAILURE_POLICY", "retry");

        let config = Config::from_env().unwrap();

        assert_eq!(config.kafka.dlq_topic, "school.students.dlq");
        assert_eq!(config.kafka.failure_policy, FailurePolicy::Retry);
    }

    #[test]
    #[serial]
    fn test_invalid_values_are_rejected() {
        clear_env();
        std::env::set_var("STORAGE_BACKEND", "memory");
        std::env::set_var("PORT", "not-a-port");
        assert!(Config::from_env().is_err());

        std::env::remove_var("PORT");
        std::env::set_var("STUDENT_EVENTS_FAILURE_POLICY", "shrug");
        assert!(Config::from_env().is_err());
    }

    #[test]
    fn test_failure_policy_aliases() {
        assert_eq!("DLQ".parse::<FailurePolicy>().unwrap(), FailurePolicy::DeadLetter);
        assert_eq!("skip".parse::<FailurePolicy>().unwrap(), FailurePolicy::Drop);
    }
}
