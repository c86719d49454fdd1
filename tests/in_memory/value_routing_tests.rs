//! In-memory integration tests for value events through the dispatcher.

use super::helpers::{Stack, agent, device, reference};
use agentlink::linking::{
    domain::{AttributeValueEvent, ConnectionStatus, EventSource},
    ports::AssetStore,
    services::{DispatchSettings, EventDispatcher},
};
use chrono::Utc;
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;

fn settings() -> DispatchSettings {
    DispatchSettings {
        value_workers: 3,
        queue_capacity: 16,
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn writes_reach_the_driver_and_readings_reach_the_pipeline() {
    let mut stack = Stack::start(vec![
        agent("agent-1", &["cfg1"]),
        device("plc-1", "agent-1", &[("setpoint", "cfg1"), ("temp", "cfg1")]),
    ])
    .await
    .expect("stack should start");
    let dispatcher = EventDispatcher::spawn(Arc::clone(&stack.service), settings());
    let setpoint = reference("plc-1", "setpoint");
    let temp = reference("plc-1", "temp");

    dispatcher
        .submit_value(AttributeValueEvent::new(setpoint.clone(), json!(30), Utc::now()))
        .await
        .expect("write should be queued");
    dispatcher
        .submit_value(
            AttributeValueEvent::new(temp.clone(), json!(21.5), Utc::now())
                .with_source(EventSource::Sensor),
        )
        .await
        .expect("reading should be queued");
    dispatcher.shutdown().await;

    assert_eq!(stack.simulator.value(&setpoint), Some(json!(30)));
    let forwarded = stack.pipeline.events();
    assert_eq!(forwarded.len(), 1);
    assert!(
        forwarded
            .iter()
            .all(|event| event.attribute_ref() == &temp && event.value() == &json!(21.5))
    );

    let echoed = stack
        .pump_readings()
        .await
        .expect("echo should be published");
    assert_eq!(echoed, 1);
    assert!(
        stack
            .pipeline
            .events()
            .iter()
            .any(|event| event.attribute_ref() == &setpoint && event.is_sensor())
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn change_events_through_the_dispatcher_link_new_agents() {
    let mut stack = Stack::start(Vec::new()).await.expect("stack should start");
    let dispatcher = EventDispatcher::spawn(Arc::clone(&stack.service), settings());

    stack
        .store
        .merge(agent("agent-7", &["cfg1"]), None)
        .await
        .expect("merge should succeed");
    let event = stack.changes.try_recv().expect("merge should be announced");
    dispatcher
        .submit_change(event)
        .await
        .expect("change should be queued");
    dispatcher.shutdown().await;

    assert_eq!(
        stack
            .service
            .connection_status(&reference("agent-7", "cfg1")),
        Some(ConnectionStatus::Connected)
    );
    assert!(stack.simulator.is_linked(&reference("agent-7", "cfg1")));
}
