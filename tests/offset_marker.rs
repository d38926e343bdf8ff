#[path = "common/mod.rs"]
mod common;

use common::{pipeline, trace, trace_of, RecordingSession};
use orchestrate::broker::memory::MemoryBroker;
use orchestrate::broker::{ConsumerGroupSession, ConsumerMessage, Message};
use orchestrate::engine::{Engine, EngineConfig, Handler};
use orchestrate::handlers;
use std::sync::Arc;

const GROUP: &str = "group-decoder";
const TOPIC: &str = "topic-tx-sender";

fn positioned(partition: i32, offset: i64) -> Box<dyn Message> {
    Box::new(ConsumerMessage::new(TOPIC, Vec::new()).with_position(partition, offset))
}

#[test]
fn marks_after_the_rest_of_the_chain() {
    let session = RecordingSession::default();
    let observed = session.clone();

    let mut engine = Engine::new(EngineConfig::default());
    engine
        .register(handlers::marker())
        .register(Handler::new(move |ctx| {
            let marked = observed.marks().len();
            trace(ctx, format!("marks-before-downstream={marked}"));
        }))
        .register(pipeline("downstream"));

    let ctx = engine.run(positioned(2, 41), Some(Arc::new(session.clone())));

    assert_eq!(
        trace_of(&ctx),
        vec!["marks-before-downstream=0", "downstream"]
    );
    assert_eq!(session.marks(), vec![(TOPIC.to_string(), 2, 41)]);
}

#[test]
fn aborted_chains_still_mark() {
    let session = RecordingSession::default();
    let mut engine = Engine::new(EngineConfig::default());
    engine
        .register(handlers::marker())
        .register(common::aborter())
        .register(pipeline("never"));

    let ctx = engine.run(positioned(0, 7), Some(Arc::new(session.clone())));

    assert!(ctx.is_aborted());
    assert_eq!(trace_of(&ctx), vec!["abort"]);
    assert_eq!(session.marks(), vec![(TOPIC.to_string(), 0, 7)]);
}

#[test]
fn without_a_session_marking_is_a_no_op() {
    let mut engine = Engine::new(EngineConfig::default());
    engine.register(handlers::marker()).register(pipeline("downstream"));

    let ctx = engine.run(positioned(0, 3), None);

    assert_eq!(trace_of(&ctx), vec!["downstream"]);
    assert!(ctx.envelope.errors.is_empty());
}

#[test]
fn committed_offsets_only_move_forward() {
    let broker = MemoryBroker::new(2);
    let session = broker.session(GROUP);
    let mut engine = Engine::new(EngineConfig::default());
    engine.register(handlers::marker());

    assert_eq!(broker.committed_offset(GROUP, TOPIC, 1), None);

    engine.run(positioned(1, 5), Some(session.clone()));
    assert_eq!(broker.committed_offset(GROUP, TOPIC, 1), Some(6));

    // remarking the same or an older offset leaves the commit untouched
    engine.run(positioned(1, 5), Some(session.clone()));
    engine.run(positioned(1, 2), Some(session.clone()));
    assert_eq!(broker.committed_offset(GROUP, TOPIC, 1), Some(6));

    engine.run(positioned(1, 9), Some(session.clone()));
    assert_eq!(broker.committed_offset(GROUP, TOPIC, 1), Some(10));

    // partitions and groups are tracked independently
    assert_eq!(broker.committed_offset(GROUP, TOPIC, 0), None);
    assert_eq!(broker.committed_offset("other-group", TOPIC, 1), None);
    assert_eq!(session.member_id(), "group-decoder-manual");
}
