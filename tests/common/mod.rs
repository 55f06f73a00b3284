// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-memory transport doubles standing in for the controller's sockets,
//! so contract tests run without a live controller.

#![allow(dead_code)]

use async_trait::async_trait;
use decide_agent::transport::{RequestChannel, SnapshotChannel};
use decide_agent::{AgentError, Result};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Client side of an in-memory request channel.
pub struct MemoryRequestChannel {
    requests: mpsc::UnboundedSender<Vec<u8>>,
    replies: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Controller side: receives request payloads, sends reply payloads.
pub struct ControllerStub {
    pub requests: mpsc::UnboundedReceiver<Vec<u8>>,
    pub replies: mpsc::UnboundedSender<Vec<u8>>,
}

pub fn memory_request_channel() -> (MemoryRequestChannel, ControllerStub) {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();
    (
        MemoryRequestChannel {
            requests: request_tx,
            replies: reply_rx,
        },
        ControllerStub {
            requests: request_rx,
            replies: reply_tx,
        },
    )
}

#[async_trait]
impl RequestChannel for MemoryRequestChannel {
    async fn send(&mut self, payload: Vec<u8>) -> Result<()> {
        self.requests
            .send(payload)
            .map_err(|_| AgentError::ChannelClosed)
    }

    async fn recv(&mut self) -> Result<Vec<u8>> {
        self.replies.recv().await.ok_or(AgentError::ChannelClosed)
    }
}

/// Client side of an in-memory publish channel.
pub struct MemorySnapshotChannel {
    deliveries: mpsc::UnboundedReceiver<(String, Vec<u8>)>,
    topics: Arc<Mutex<Vec<String>>>,
}

/// Controller side: publishes `(topic, payload)` deliveries and records
/// which topics the client subscribed to.
#[derive(Clone)]
pub struct SnapshotPublisher {
    deliveries: mpsc::UnboundedSender<(String, Vec<u8>)>,
    topics: Arc<Mutex<Vec<String>>>,
}

pub fn memory_snapshot_channel() -> (MemorySnapshotChannel, SnapshotPublisher) {
    let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();
    let topics = Arc::new(Mutex::new(Vec::new()));
    (
        MemorySnapshotChannel {
            deliveries: delivery_rx,
            topics: Arc::clone(&topics),
        },
        SnapshotPublisher {
            deliveries: delivery_tx,
            topics,
        },
    )
}

impl SnapshotPublisher {
    pub fn publish(&self, topic: &str, fields: Value) {
        self.publish_raw(topic, fields.to_string().into_bytes());
    }

    pub fn publish_raw(&self, topic: &str, payload: Vec<u8>) {
        self.deliveries
            .send((topic.to_string(), payload))
            .expect("snapshot bus is gone");
    }

    pub fn subscribed_topics(&self) -> Vec<String> {
        self.topics.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotChannel for MemorySnapshotChannel {
    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        self.topics.lock().unwrap().push(topic.to_string());
        Ok(())
    }

    async fn next(&mut self) -> Result<(String, Vec<u8>)> {
        self.deliveries
            .recv()
            .await
            .ok_or_else(|| AgentError::Subscription("publisher went away".to_string()))
    }
}

/// Snapshot channel whose `subscribe` parks until the test releases it,
/// for exercising registrations that race an in-flight subscribe.
pub struct GatedSnapshotChannel {
    inner: MemorySnapshotChannel,
    releases: mpsc::UnboundedReceiver<std::result::Result<(), String>>,
}

/// Test-side control of a [`GatedSnapshotChannel`]: each `allow`/`deny`
/// releases one pending subscribe with the chosen outcome.
pub struct SubscribeGate {
    releases: mpsc::UnboundedSender<std::result::Result<(), String>>,
}

impl SubscribeGate {
    pub fn allow(&self) {
        let _ = self.releases.send(Ok(()));
    }

    pub fn deny(&self, reason: &str) {
        let _ = self.releases.send(Err(reason.to_string()));
    }
}

pub fn gated_snapshot_channel() -> (GatedSnapshotChannel, SnapshotPublisher, SubscribeGate) {
    let (inner, publisher) = memory_snapshot_channel();
    let (release_tx, release_rx) = mpsc::unbounded_channel();
    (
        GatedSnapshotChannel {
            inner,
            releases: release_rx,
        },
        publisher,
        SubscribeGate {
            releases: release_tx,
        },
    )
}

#[async_trait]
impl SnapshotChannel for GatedSnapshotChannel {
    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        match self.releases.recv().await {
            Some(Ok(())) => self.inner.subscribe(topic).await,
            Some(Err(reason)) => Err(AgentError::Subscription(reason)),
            None => Err(AgentError::Subscription("subscribe gate dropped".to_string())),
        }
    }

    async fn next(&mut self) -> Result<(String, Vec<u8>)> {
        self.inner.next().await
    }
}

/// Split a request payload into its correlation id and decoded JSON body.
pub fn split_request(payload: &[u8]) -> (u64, Value) {
    assert!(payload.len() >= 8, "request shorter than correlation header");
    let (header, body) = payload.split_at(8);
    let mut id = [0u8; 8];
    id.copy_from_slice(header);
    (
        u64::from_be_bytes(id),
        serde_json::from_slice(body).expect("request payload is JSON"),
    )
}

/// Build a reply payload for a given correlation id.
pub fn reply_bytes(id: u64, fields: Value) -> Vec<u8> {
    let mut payload = id.to_be_bytes().to_vec();
    payload.extend_from_slice(fields.to_string().as_bytes());
    payload
}
