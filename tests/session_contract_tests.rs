// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end contract tests for the session composition: request change,
//! confirm via the snapshot stream, verify parameter readback.

mod common;

use common::*;
use decide_agent::{AgentClient, AgentConfig, AgentError, JsonCodec};
use serde_json::{json, Map};
use std::sync::Arc;
use std::time::Duration;

fn assemble_client() -> (AgentClient, ControllerStub, SnapshotPublisher) {
    let (request_channel, controller) = memory_request_channel();
    let (snapshot_channel, publisher) = memory_snapshot_channel();
    let config = AgentConfig::new()
        .with_request_timeout(Duration::from_millis(500))
        .with_confirm_timeout(Duration::from_secs(2));
    let client = AgentClient::assemble(
        config,
        Box::new(request_channel),
        Box::new(snapshot_channel),
        Arc::new(JsonCodec),
    );
    (client, controller, publisher)
}

fn body(fields: serde_json::Value) -> Map<String, serde_json::Value> {
    fields.as_object().unwrap().clone()
}

#[tokio::test]
async fn change_state_is_confirmed_by_snapshot() {
    let (client, mut controller, publisher) = assemble_client();
    let motor = client.session("stepper-motor");

    // Controller: ack the state change and publish the resulting state. The
    // snapshot goes out before the reply, exercising the window between
    // request and reply that the early watch registration must cover.
    let server = tokio::spawn(async move {
        let request = controller.requests.recv().await.unwrap();
        let (id, envelope) = split_request(&request);
        assert_eq!(envelope["kind"], "ChangeState");
        assert_eq!(envelope["component"], "stepper-motor");
        assert_eq!(envelope["body"]["running"], json!(true));
        publisher.publish("stepper-motor", json!({"running": true}));
        controller.replies.send(reply_bytes(id, json!({}))).unwrap();
        publisher
    });

    let outcome = motor
        .change_state_confirmed(body(json!({"running": true, "direction": true})), |pub_state| {
            pub_state.bool_field("running").unwrap_or(false)
        })
        .await
        .unwrap();

    assert!(outcome.matched);
    assert_eq!(outcome.snapshot.unwrap().bool_field("running"), Some(true));

    // Motor stop: an independent later watch on the same stream.
    let publisher = server.await.unwrap();
    let stop = motor
        .confirm(
            |pub_state| !pub_state.bool_field("running").unwrap_or(true),
            Duration::from_secs(2),
        )
        .await
        .unwrap();
    publisher.publish("stepper-motor", json!({"running": false}));
    let outcome = stop.resolve().await.unwrap();
    assert!(outcome.matched);
    assert_eq!(outcome.snapshot.unwrap().bool_field("running"), Some(false));
}

#[tokio::test]
async fn readback_mismatch_is_non_fatal() {
    let (client, mut controller, _publisher) = assemble_client();
    let light = client.session("house-light");

    let server = tokio::spawn(async move {
        let set = controller.requests.recv().await.unwrap();
        let (set_id, envelope) = split_request(&set);
        assert_eq!(envelope["kind"], "SetParameters");
        assert_eq!(envelope["body"]["clock_interval"], json!(60));
        controller
            .replies
            .send(reply_bytes(set_id, json!({})))
            .unwrap();

        // The controller holds a different value than requested.
        let get = controller.requests.recv().await.unwrap();
        let (get_id, envelope) = split_request(&get);
        assert_eq!(envelope["kind"], "GetParameters");
        controller
            .replies
            .send(reply_bytes(get_id, json!({"clock_interval": 55})))
            .unwrap();
    });

    // Decode succeeded, so the request succeeded; the 60 != 55 mismatch is
    // logged by the session, not raised.
    let reply = light.set_and_verify("clock_interval", json!(60)).await.unwrap();
    assert_eq!(reply.i64_field("clock_interval"), Some(55));
    server.await.unwrap();
}

#[tokio::test]
async fn failed_request_cancels_the_watch() {
    let (client, mut controller, publisher) = assemble_client();
    let motor = client.session("stepper-motor");

    let err = motor
        .change_state_confirmed(body(json!({"running": true})), |pub_state| {
            pub_state.bool_field("running").unwrap_or(false)
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::RequestTimeout { .. }));

    // The request did reach the wire exactly once.
    let request = controller.requests.recv().await.unwrap();
    let (_, envelope) = split_request(&request);
    assert_eq!(envelope["kind"], "ChangeState");

    // The cancelled watch no longer consumes the stream; publishing a
    // matching snapshot now must not panic or resolve anything.
    publisher.publish("stepper-motor", json!({"running": true}));
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn shutdown_fails_pending_confirmations() {
    let (client, _controller, _publisher) = assemble_client();
    let motor = client.session("stepper-motor");

    let watch = motor
        .confirm(
            |pub_state| pub_state.bool_field("running").unwrap_or(false),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

    client.shutdown().await;

    assert!(matches!(
        watch.resolve().await,
        Err(AgentError::Subscription(_))
    ));
}

#[tokio::test]
async fn slow_controller_operations_use_caller_deadline() {
    let (client, mut controller, _publisher) = assemble_client();
    let audio = client.session("audio-playback");

    // Stimulus import blocks the controller well past the default deadline.
    let server = tokio::spawn(async move {
        let request = controller.requests.recv().await.unwrap();
        let (id, _) = split_request(&request);
        tokio::time::sleep(Duration::from_millis(700)).await;
        controller
            .replies
            .send(reply_bytes(id, json!({"audio_dir": "/stimuli", "sample_rate": 44100})))
            .unwrap();
    });

    let reply = audio
        .get_parameters_with_timeout(Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(reply.str_field("audio_dir"), Some("/stimuli"));
    assert_eq!(reply.i64_field("sample_rate"), Some(44100));
    server.await.unwrap();
}
