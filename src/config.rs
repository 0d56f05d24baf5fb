use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Legacy environment variable carrying the destination topic.
pub const TOPIC_NAME_ENV: &str = "topic_name";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub kafka: KafkaConfig,
    pub forwarder: ForwarderConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_acks")]
    pub acks: String,
    #[serde(default)]
    pub linger_ms: u32,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForwarderConfig {
    pub topic_name: String,
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    #[serde(default = "default_unwrap_error_envelopes")]
    pub unwrap_error_envelopes: bool,
}

impl Config {
    /// Loads configuration from a TOML file layered with `SHADOW_FORWARDER__*`
    /// environment variables. The file may be absent when the environment
    /// supplies every required key.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(Some(path.as_ref()))
    }

    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("SHADOW_FORWARDER")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("kafka.brokers")
                    .try_parsing(true),
            )
            .set_override_option("forwarder.topic_name", std::env::var(TOPIC_NAME_ENV).ok())
            .map_err(|e| Error::Config(e.to_string()))?
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.kafka.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(Error::Config("kafka.brokers must not be empty".to_string()));
        }
        if self.forwarder.topic_name.trim().is_empty() {
            return Err(Error::Config(
                "forwarder.topic_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl KafkaConfig {
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }
}

impl ForwarderConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

fn default_client_id() -> String {
    "shadow-forwarder".to_string()
}

fn default_compression() -> String {
    "none".to_string()
}

fn default_acks() -> String {
    "all".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_flush_timeout_ms() -> u64 {
    1000
}

fn default_send_timeout_ms() -> u64 {
    1000
}

fn default_unwrap_error_envelopes() -> bool {
    true
}
