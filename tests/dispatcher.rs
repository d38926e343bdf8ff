#[path = "common/mod.rs"]
mod common;

use common::sample_envelope;
use orchestrate::engine::{Engine, EngineConfig, Handler};
use orchestrate::errors;
use orchestrate::handlers::dispatcher::{DispatchError, COMPONENT, SCENARIO_LABEL};
use orchestrate::handlers::Dispatcher;
use orchestrate::types::Envelope;
use std::collections::HashMap;

fn scenario_envelope(scenario: &str) -> Envelope {
    let mut envelope = sample_envelope();
    envelope.set_context_label(SCENARIO_LABEL, scenario);
    envelope
}

#[test]
fn routes_by_short_topic_and_scenario() {
    let dispatcher = Dispatcher::new();
    let mut crafter = dispatcher.register("tx.crafter", "scenario-1");
    let mut other = dispatcher.register("tx.crafter", "scenario-2");

    dispatcher
        .dispatch("tx.crafter", scenario_envelope("scenario-1"))
        .expect("registered channel");

    let received = crafter.try_recv().expect("dispatched envelope");
    assert_eq!(received.context_label(SCENARIO_LABEL), Some("scenario-1"));
    assert!(other.try_recv().is_err());
}

#[test]
fn dispatch_failures_are_explicit() {
    let dispatcher = Dispatcher::new();

    assert_eq!(
        dispatcher.dispatch("tx.crafter", sample_envelope()),
        Err(DispatchError::MissingScenario)
    );
    assert_eq!(
        dispatcher.dispatch("tx.crafter", scenario_envelope("unknown")),
        Err(DispatchError::Unregistered("tx.crafter/unknown".to_string()))
    );

    let receiver = dispatcher.register("tx.signer", "closed");
    drop(receiver);
    assert_eq!(
        dispatcher.dispatch("tx.signer", scenario_envelope("closed")),
        Err(DispatchError::Closed("tx.signer/closed".to_string()))
    );

    dispatcher.register("tx.signer", "gone");
    dispatcher.unregister("tx.signer", "gone");
    assert!(matches!(
        dispatcher.dispatch("tx.signer", scenario_envelope("gone")),
        Err(DispatchError::Unregistered(_))
    ));
}

#[test]
fn handler_maps_consumed_topics_to_short_names() {
    let dispatcher = Dispatcher::new();
    let mut decoded = dispatcher.register("tx.decoded", "scenario-1");

    let mut engine = Engine::new(EngineConfig::default());
    engine
        .register(Handler::new(|ctx| {
            ctx.envelope = scenario_envelope("scenario-1");
        }))
        .register(dispatcher.handler(HashMap::from([(
            "topic-tx-decoded".to_string(),
            "tx.decoded".to_string(),
        )])));

    let ctx = engine.run(common::message("topic-tx-decoded", Vec::new()), None);

    assert!(ctx.envelope.errors.is_empty());
    let received = decoded.try_recv().expect("dispatched envelope");
    assert_eq!(received.id, common::ENVELOPE_ID);
}

#[test]
fn handler_records_undeliverable_envelopes() {
    let dispatcher = Dispatcher::new();
    let mut engine = Engine::new(EngineConfig::default());
    engine
        .register(Handler::new(|ctx| {
            ctx.envelope = scenario_envelope("nobody");
        }))
        .register(dispatcher.handler(HashMap::new()));

    let ctx = engine.run(common::message("topic-tx-signer", Vec::new()), None);

    assert_eq!(ctx.envelope.errors.len(), 1);
    let err = &ctx.envelope.errors[0];
    assert!(errors::is_data_error(err));
    assert_eq!(err.component, COMPONENT);
    assert_eq!(err.message, "no channel registered for `topic-tx-signer/nobody`");
    assert!(!ctx.is_aborted());
}
