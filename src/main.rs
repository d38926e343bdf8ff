#![allow(clippy::result_large_err)]

use anyhow::Context;
use orchestrate::config::OrchestrateConfig;
use orchestrate::engine::{Engine, Handler};
use orchestrate::handlers;
use orchestrate::telemetry;
use std::sync::Arc;

enum CliCommand {
    Run { config_path: Option<String> },
    Help,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise telemetry")?;

    match parse_cli_args()? {
        CliCommand::Run { config_path } => {
            let config = match config_path {
                Some(path) => OrchestrateConfig::load_from(&path)
                    .with_context(|| format!("failed to load configuration from {path}"))?,
                None => OrchestrateConfig::load().context("failed to load configuration")?,
            };
            run(config).await
        }
        CliCommand::Help => {
            print_help();
            Ok(())
        }
    }
}

fn parse_cli_args() -> anyhow::Result<CliCommand> {
    let mut args = std::env::args().skip(1);
    let mut config_path = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                if config_path.is_some() {
                    anyhow::bail!("config path specified multiple times");
                }
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("expected path after {arg}"))?;
                config_path = Some(value);
            }
            "-h" | "--help" => return Ok(CliCommand::Help),
            other => anyhow::bail!("unrecognised argument `{other}`"),
        }
    }

    Ok(CliCommand::Run { config_path })
}

fn print_help() {
    println!(
        "\
Usage: orchestrate [OPTIONS]

Consumes transaction envelopes, publishes them to the chain scoped decoder
topic and marks offsets once each envelope went through the chain.

Options:
  -c, --config <PATH>    Configuration file layered under ORCHESTRATE__* variables
  -h, --help             Print this help message
"
    );
}

/// Chain order: offsets are marked and metrics reported after everything
/// else ran, then the envelope is loaded and finally published.
#[cfg_attr(not(feature = "kafka"), allow(dead_code))]
fn build_engine(
    config: &OrchestrateConfig,
    producer: Arc<dyn orchestrate::broker::SyncProducer>,
) -> Engine {
    let publish = handlers::decoder_producer(producer, config.decoder_route());
    let publish: Handler = match config.engine.timeout() {
        Some(budget) => handlers::timeout(publish, budget, "envelope processing timed out"),
        None => publish,
    };

    let mut engine = Engine::new(config.engine_config());
    engine
        .register(handlers::marker())
        .register(handlers::metrics())
        .register(handlers::loader(config.loader_config()))
        .register(publish);
    engine
}

#[cfg(feature = "kafka")]
async fn run(config: OrchestrateConfig) -> anyhow::Result<()> {
    use orchestrate::broker::daemon::run_consumer_group;
    use orchestrate::broker::kafka::{KafkaConsumerGroup, KafkaProducer};
    use tokio_util::sync::CancellationToken;

    let producer =
        Arc::new(KafkaProducer::new(&config.kafka).context("failed to create Kafka producer")?);
    let engine = Arc::new(build_engine(&config, producer));
    let group = KafkaConsumerGroup::new(&config.kafka);
    let topics = config.consumed_topics();

    tracing::info!(
        target: "orchestrate::main",
        event = "pipeline_starting",
        brokers = %config.kafka.brokers.join(","),
        group = %config.kafka.group_id,
        topics = ?topics,
        handlers = engine.handler_count(),
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(target: "orchestrate::main", event = "shutdown_requested");
        }
        signal.cancel();
    });

    run_consumer_group(&group, &topics, engine, config.retry_settings(), shutdown).await;
    Ok(())
}

#[cfg(not(feature = "kafka"))]
async fn run(config: OrchestrateConfig) -> anyhow::Result<()> {
    let _ = config;
    anyhow::bail!("Kafka support requested but the binary was built without the `kafka` feature")
}
