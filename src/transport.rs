// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Transport abstraction over the two channel kinds the controller exposes:
//! a point-to-point request channel (one reply per request) and a fan-out
//! publish channel (many snapshots per topic).
//!
//! The core depends on these traits only; the ZMQ implementations below talk
//! DEALER and SUB against the controller's ROUTER and PUB sockets. Tests
//! inject in-memory doubles instead.

use crate::error::{AgentError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, trace};
use zeromq::{DealerSocket, Socket, SocketRecv, SocketSend, SubSocket, ZmqMessage};

/// Point-to-point request channel: one payload out, one payload back.
///
/// Implementations are not required to support pipelining; the correlator
/// serializes exchanges so concurrent callers never interleave bytes.
#[async_trait]
pub trait RequestChannel: Send {
    async fn send(&mut self, payload: Vec<u8>) -> Result<()>;

    async fn recv(&mut self) -> Result<Vec<u8>>;
}

/// Fan-out publication channel: subscribe to topics, then pull
/// `(topic, payload)` deliveries as published.
#[async_trait]
pub trait SnapshotChannel: Send {
    async fn subscribe(&mut self, topic: &str) -> Result<()>;

    async fn next(&mut self) -> Result<(String, Vec<u8>)>;
}

/// ZMQ DEALER request channel (client side of the controller's ROUTER).
pub struct ZmqRequestChannel {
    socket: DealerSocket,
}

impl ZmqRequestChannel {
    /// Connect to the controller's request endpoint.
    pub async fn connect(endpoint: &str, connect_timeout: Duration) -> Result<Self> {
        let mut socket = DealerSocket::new();
        timeout(connect_timeout, socket.connect(endpoint))
            .await
            .map_err(|_| {
                AgentError::ConnectFailed(format!("connect to {} timed out", endpoint))
            })??;
        debug!("[TRANSPORT] request channel connected to {}", endpoint);
        Ok(Self { socket })
    }
}

#[async_trait]
impl RequestChannel for ZmqRequestChannel {
    async fn send(&mut self, payload: Vec<u8>) -> Result<()> {
        // REP-compatible framing: [delimiter, payload]
        let mut message = ZmqMessage::from(payload);
        message.prepend(&ZmqMessage::from(Vec::new()));
        self.socket.send(message).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>> {
        let message = self.socket.recv().await?;
        let mut frames = message.into_vec();
        if frames
            .first()
            .map(|frame| frame.is_empty())
            .unwrap_or(false)
        {
            frames.remove(0);
        }
        if frames.len() != 1 {
            return Err(AgentError::InvalidFraming(format!(
                "expected single reply frame, got {}",
                frames.len()
            )));
        }
        Ok(frames.remove(0).to_vec())
    }
}

/// ZMQ SUB snapshot channel (client side of the controller's PUB).
pub struct ZmqSnapshotChannel {
    socket: SubSocket,
}

impl ZmqSnapshotChannel {
    /// Connect to the controller's publish endpoint. No topics are
    /// subscribed yet; the snapshot bus subscribes per component on demand.
    pub async fn connect(endpoint: &str, connect_timeout: Duration) -> Result<Self> {
        let mut socket = SubSocket::new();
        timeout(connect_timeout, socket.connect(endpoint))
            .await
            .map_err(|_| {
                AgentError::ConnectFailed(format!("connect to {} timed out", endpoint))
            })??;
        debug!("[TRANSPORT] snapshot channel connected to {}", endpoint);
        Ok(Self { socket })
    }
}

#[async_trait]
impl SnapshotChannel for ZmqSnapshotChannel {
    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        self.socket.subscribe(topic).await?;
        debug!("[TRANSPORT] subscribed to topic '{}'", topic);
        Ok(())
    }

    async fn next(&mut self) -> Result<(String, Vec<u8>)> {
        let message = self.socket.recv().await?;
        let mut frames = message.into_vec();
        match frames.len() {
            // [topic, payload] multipart, the controller's publish format
            2 => {
                let topic = String::from_utf8_lossy(&frames[0]).into_owned();
                let payload = frames.remove(1).to_vec();
                trace!("[TRANSPORT] snapshot on '{}' ({} bytes)", topic, payload.len());
                Ok((topic, payload))
            }
            n => Err(AgentError::InvalidFraming(format!(
                "expected [topic, payload] publication, got {} frames",
                n
            ))),
        }
    }
}
