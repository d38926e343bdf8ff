use orchestrate::config::OrchestrateConfig;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

// Environment overrides are process wide; every test here holds this lock.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("temp config file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_apply_when_sections_are_missing() {
    let _guard = env_lock();
    let file = write_yaml("producer:\n  external_tx_enabled: true\n");

    let config = OrchestrateConfig::load_from(file.path()).expect("load config");

    assert!(config.producer.external_tx_enabled);
    assert_eq!(config.kafka.brokers, vec!["localhost:9092"]);
    assert_eq!(config.kafka.group_id, "group-decoder");
    assert_eq!(config.kafka.send_timeout(), Duration::from_secs(5));
    assert_eq!(config.topic.tx.decoder, "topic-tx-decoder");
    assert_eq!(config.topic.account.generated, "topic-account-generated");
    assert_eq!(config.consumed_topics(), vec!["topic-tx-sender"]);
    assert_eq!(config.engine.timeout(), None);
    assert_eq!(config.engine_config().slots, 0);
}

#[test]
fn partial_sections_keep_remaining_defaults() {
    let _guard = env_lock();
    let file = write_yaml(
        "kafka:\n  group_id: group-sender\ntopic:\n  tx:\n    decoder: stage-decoder\nengine:\n  slots: 8\n  timeout_ms: 250\n",
    );

    let config = OrchestrateConfig::load_from(file.path()).expect("load config");

    assert_eq!(config.kafka.group_id, "group-sender");
    assert_eq!(config.kafka.client_id, "orchestrate");
    assert_eq!(config.topic.tx.decoder, "stage-decoder");
    assert_eq!(config.topic.tx.recover, "topic-tx-recover");
    assert_eq!(config.engine_config().slots, 8);
    assert_eq!(config.engine.timeout(), Some(Duration::from_millis(250)));

    let route = config.decoder_route();
    assert_eq!(route.decoder_topic, "stage-decoder");
    assert_eq!(route.recover_topic, "topic-tx-recover");
    assert!(!route.external_tx_enabled);

    let loader = config.loader_config();
    assert!(loader.response_topics.contains("topic-tx-decoded"));
    assert!(loader.response_topics.contains("topic-tx-recover"));
    assert!(!loader.response_topics.contains("topic-tx-sender"));
}

#[test]
fn environment_overrides_the_file() {
    let _guard = env_lock();
    let file = write_yaml("kafka:\n  group_id: from-file\n  client_id: from-file\n");
    std::env::set_var("ORCHESTRATE__KAFKA__GROUP_ID", "from-env");
    std::env::set_var("ORCHESTRATE__KAFKA__BROKERS", "kafka-a:9092,kafka-b:9092");
    std::env::set_var("ORCHESTRATE__CONSUMER__TOPICS", "topic-tx-crafter,topic-tx-signer");
    std::env::set_var("ORCHESTRATE__ENGINE__SLOTS", "3");

    let loaded = OrchestrateConfig::load_from(file.path());

    for key in [
        "ORCHESTRATE__KAFKA__GROUP_ID",
        "ORCHESTRATE__KAFKA__BROKERS",
        "ORCHESTRATE__CONSUMER__TOPICS",
        "ORCHESTRATE__ENGINE__SLOTS",
    ] {
        std::env::remove_var(key);
    }
    let config = loaded.expect("load config");

    assert_eq!(config.kafka.group_id, "from-env");
    assert_eq!(config.kafka.client_id, "from-file");
    assert_eq!(config.kafka.brokers, vec!["kafka-a:9092", "kafka-b:9092"]);
    assert_eq!(
        config.consumed_topics(),
        vec!["topic-tx-crafter", "topic-tx-signer"]
    );
    assert_eq!(config.engine.slots, 3);
}

#[test]
fn retry_settings_are_clamped() {
    let _guard = env_lock();
    let file = write_yaml(
        "consumer:\n  retry_initial_ms: 1000\n  retry_max_ms: 10\n  retry_multiplier: 0.5\n",
    );

    let settings = OrchestrateConfig::load_from(file.path())
        .expect("load config")
        .retry_settings();

    assert_eq!(settings.initial(), Duration::from_secs(1));
    assert_eq!(settings.max(), Duration::from_secs(1));
    assert_eq!(settings.multiplier(), 1.1);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let _guard = env_lock();
    let missing = std::env::temp_dir().join("orchestrate-missing-config.yaml");
    assert!(OrchestrateConfig::load_from(missing).is_err());
}

#[test]
fn example_configuration_loads() {
    let _guard = env_lock();
    let path: PathBuf = [env!("CARGO_MANIFEST_DIR"), "config", "example.yaml"]
        .iter()
        .collect();

    let config = OrchestrateConfig::load_from(path).expect("example config");

    assert_eq!(config.consumed_topics(), vec!["topic-tx-sender"]);
    assert_eq!(config.topic.tx.nonce, "topic-tx-nonce");
    assert_eq!(config.retry_settings().multiplier(), 2.0);
}
