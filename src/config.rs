use crate::engine::EngineConfig;
use crate::handlers::{DecoderRoute, LoaderConfig};
use crate::retry::RetrySettings;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_FILE: &str = "config/local";
const ENV_PREFIX: &str = "ORCHESTRATE";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrchestrateConfig {
    #[serde(default)]
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub topic: TopicConfig,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub producer: ProducerSettings,
    #[serde(default)]
    pub consumer: ConsumerSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    pub group_id: String,
    pub client_id: String,
    pub session_timeout_ms: u64,
    pub send_timeout_ms: u64,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            group_id: "group-decoder".to_string(),
            client_id: "orchestrate".to_string(),
            session_timeout_ms: 10_000,
            send_timeout_ms: 5_000,
        }
    }
}

impl KafkaConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicConfig {
    #[serde(default)]
    pub tx: TxTopics,
    #[serde(default)]
    pub account: AccountTopics,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TxTopics {
    pub crafter: String,
    pub nonce: String,
    pub signer: String,
    pub sender: String,
    pub decoder: String,
    pub decoded: String,
    pub recover: String,
}

impl Default for TxTopics {
    fn default() -> Self {
        Self {
            crafter: "topic-tx-crafter".to_string(),
            nonce: "topic-tx-nonce".to_string(),
            signer: "topic-tx-signer".to_string(),
            sender: "topic-tx-sender".to_string(),
            decoder: "topic-tx-decoder".to_string(),
            decoded: "topic-tx-decoded".to_string(),
            recover: "topic-tx-recover".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccountTopics {
    pub generator: String,
    pub generated: String,
}

impl Default for AccountTopics {
    fn default() -> Self {
        Self {
            generator: "topic-account-generator".to_string(),
            generated: "topic-account-generated".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// 0 disables the concurrency limit.
    pub slots: usize,
    /// Soft budget per message; 0 disables it.
    pub timeout_ms: u64,
}

impl EngineSettings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProducerSettings {
    pub external_tx_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsumerSettings {
    /// Empty means the sender topic.
    pub topics: Vec<String>,
    pub retry_initial_ms: u64,
    pub retry_max_ms: u64,
    pub retry_multiplier: f64,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            topics: Vec::new(),
            retry_initial_ms: 200,
            retry_max_ms: 5_000,
            retry_multiplier: 2.0,
        }
    }
}

impl OrchestrateConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(File::with_name(DEFAULT_FILE).required(false))
    }

    /// Loads `path` (which must exist) layered under the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::build(File::from(path.as_ref()).required(true))
    }

    fn build<S>(file: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("kafka.brokers")
                    .with_list_parse_key("consumer.topics")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn consumed_topics(&self) -> Vec<String> {
        if self.consumer.topics.is_empty() {
            vec![self.topic.tx.sender.clone()]
        } else {
            self.consumer.topics.clone()
        }
    }

    pub fn decoder_route(&self) -> DecoderRoute {
        DecoderRoute {
            decoder_topic: self.topic.tx.decoder.clone(),
            recover_topic: self.topic.tx.recover.clone(),
            external_tx_enabled: self.producer.external_tx_enabled,
        }
    }

    /// Stages downstream of the decoder carry responses.
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig::with_response_topics([
            self.topic.tx.decoded.clone(),
            self.topic.tx.recover.clone(),
        ])
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            slots: self.engine.slots,
        }
    }

    pub fn retry_settings(&self) -> RetrySettings {
        RetrySettings::new(
            Duration::from_millis(self.consumer.retry_initial_ms),
            Duration::from_millis(self.consumer.retry_max_ms),
            self.consumer.retry_multiplier,
        )
    }
}
